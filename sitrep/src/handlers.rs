use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pager::Pager;
use sitrep_core::aggregate::{ContentFilter, Granularity, count_by_first_folder};
use sitrep_core::dataset::{Dataset, FolderFilter, ViewFilter};
use sitrep_core::report::{ReportData, ReportFormat, save_report};
use sitrep_core::session::ReportSession;
use sitrep_scanner::{
    FailurePolicy, FileFetcher, HttpFetcher, ResolveEvent, ResolveOptions, ScanError,
    SitemapResolver, file_url,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use url::Url;

/// Parse a single line as a sitemap URL, adding https:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(line)
        && matches!(url.scheme(), "http" | "https")
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("https://{line}");
    match Url::parse(&with_scheme) {
        Ok(url) if url.host_str().is_some_and(|h| !h.is_empty() && !h.contains(' ')) => {
            Some(with_scheme)
        }
        _ => None,
    }
}

/// Route tracing output to stderr, `WARN` by default and `DEBUG` when verbose.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    // A second initialization (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

/// Resolution settings shared by every subcommand
pub fn resolve_options(args: &ArgMatches) -> ResolveOptions {
    let defaults = ResolveOptions::default();
    ResolveOptions {
        concurrency: args
            .get_one::<usize>("threads")
            .copied()
            .unwrap_or(defaults.concurrency)
            .max(1),
        fetch_timeout: args
            .get_one::<u64>("timeout")
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(defaults.fetch_timeout),
        max_depth: args
            .get_one::<usize>("max-depth")
            .copied()
            .unwrap_or(defaults.max_depth),
        failure_policy: if args.get_flag("partial") {
            FailurePolicy::Partial
        } else {
            FailurePolicy::Abort
        },
    }
}

/// Options for a `report` run
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub url: String,
    pub view: ViewFilter,
    pub granularity: Granularity,
    pub format: ReportFormat,
    pub output: Option<PathBuf>,
    pub use_pager: bool,
    pub resolve: ResolveOptions,
}

impl ReportOptions {
    pub fn from_matches(args: &ArgMatches) -> Result<Self> {
        let url = sitemap_url(args)?;

        let filter = args.get_one::<String>("filter").map(String::as_str).unwrap_or("all");
        let content = ContentFilter::from_str(filter)
            .ok_or_else(|| anyhow!("Unknown content filter '{filter}'"))?;
        let first_folder = FolderFilter::from_option(args.get_one::<String>("folder").map(String::as_str));

        let period = args.get_one::<String>("period").map(String::as_str).unwrap_or("year");
        let granularity = Granularity::from_str(period)
            .ok_or_else(|| anyhow!("Unknown period '{period}'"))?;

        let format_str = args.get_one::<String>("format").map(String::as_str).unwrap_or("text");
        let format = ReportFormat::from_str(format_str)
            .ok_or_else(|| anyhow!("Unknown report format '{format_str}'"))?;

        let output = args.get_one::<PathBuf>("output").map(|p| expand_path(p));

        Ok(Self {
            url,
            view: ViewFilter::new(first_folder, content),
            granularity,
            format,
            output,
            use_pager: !args.get_flag("no-pager"),
            resolve: resolve_options(args),
        })
    }
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

/// Root sitemap location from `--file` (as a `file://` URL) or `--url`.
pub fn sitemap_url(args: &ArgMatches) -> Result<String> {
    if let Some(path) = args.get_one::<PathBuf>("file") {
        let path = expand_path(path);
        return file_url(&path)
            .with_context(|| format!("Invalid sitemap path '{}'", path.display()));
    }

    let raw = args
        .get_one::<String>("url")
        .ok_or_else(|| anyhow!("--url or --file is required"))?;
    parse_url_line(raw).ok_or_else(|| anyhow!("Invalid sitemap URL '{raw}'"))
}

/// One-line summary of a failed generation: the kind, and the failing
/// sitemap when it is not the root.
pub fn describe_failure(root_url: &str, err: &ScanError) -> String {
    match err.url() {
        Some(failed) if failed != root_url => format!(
            "Failed to generate report for {root_url} ({} in {failed})",
            err.kind().as_str()
        ),
        _ => format!(
            "Failed to generate report for {root_url} ({})",
            err.kind().as_str()
        ),
    }
}

fn new_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Fetching sitemap...");
    pb
}

/// Build a resolver reporting progress on `spinner` and stopping on Ctrl-C.
///
/// A `file://` root is read from disk; anything it references over HTTP is
/// still fetched.
pub fn build_resolver(
    root_url: &str,
    options: &ResolveOptions,
    spinner: &ProgressBar,
) -> Result<SitemapResolver> {
    let http = HttpFetcher::with_timeout(options.fetch_timeout.as_secs().max(1))
        .context("Failed to set up HTTP client")?;
    let resolver = if root_url.starts_with("file:") {
        SitemapResolver::new(FileFetcher::with_remote(http))
    } else {
        SitemapResolver::new(http)
    };

    let fetched = Arc::new(AtomicUsize::new(0));
    let pb = spinner.clone();
    let progress = Arc::new(move |event: ResolveEvent| match event {
        ResolveEvent::Fetching { url, .. } => {
            let count = fetched.fetch_add(1, Ordering::Relaxed) + 1;
            pb.set_message(format!("Fetching sitemap {count}: {url}"));
        }
        ResolveEvent::BranchFailed { url, .. } => {
            pb.println(format!("{} Skipping {}", "[!]".yellow(), url));
        }
        _ => {}
    });

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    Ok(resolver
        .with_options(options.clone())
        .with_progress_callback(progress)
        .with_cancellation_token(token))
}

async fn generate(
    session: &mut ReportSession,
    url: &str,
    options: &ResolveOptions,
    quiet: bool,
) -> Result<()> {
    let spinner = new_spinner(quiet);
    let resolver = build_resolver(url, options, &spinner)?;

    match session.generate(&resolver, url).await {
        Ok(dataset) => {
            spinner.finish_and_clear();
            if !quiet {
                summarize(dataset);
            }
            Ok(())
        }
        Err(e) => {
            spinner.finish_and_clear();
            let summary = describe_failure(url, &e);
            Err(anyhow!(e).context(summary))
        }
    }
}

fn summarize(dataset: &Dataset) {
    eprintln!(
        "{} Resolved {} URLs from {} sitemap(s)",
        "✓".green().bold(),
        dataset.len(),
        dataset.nested_sitemap_count
    );
    if dataset.is_partial() {
        eprintln!(
            "{} {} nested sitemap(s) failed and were skipped",
            "⚠".yellow().bold(),
            dataset.failures.len()
        );
    }
}

pub async fn handle_report(args: &ArgMatches) -> Result<()> {
    let options = ReportOptions::from_matches(args)?;
    let quiet = args.get_flag("quiet");

    let mut session = ReportSession::new();
    generate(&mut session, &options.url, &options.resolve, quiet).await?;

    // Files never carry terminal escapes
    if options.output.is_some() {
        colored::control::set_override(false);
    }

    let data = session
        .report(&options.view, options.granularity)
        .ok_or_else(|| anyhow!("No report data available"))?;
    let rendered = render(&options, &data)?;

    match options.output {
        Some(ref path) => {
            save_report(&rendered, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            colored::control::unset_override();
            if !quiet {
                println!(
                    "{} Report saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }
        None => {
            if options.use_pager && options.format == ReportFormat::Text {
                Pager::with_pager("less -R").setup();
            }
            print!("{rendered}");
        }
    }

    Ok(())
}

fn render(options: &ReportOptions, data: &ReportData) -> Result<String> {
    options
        .format
        .render(data)
        .context("Failed to serialize report")
}

pub async fn handle_folders(args: &ArgMatches) -> Result<()> {
    let url = sitemap_url(args)?;
    let options = resolve_options(args);
    let quiet = args.get_flag("quiet");

    let mut session = ReportSession::new();
    generate(&mut session, &url, &options, quiet).await?;

    let dataset = session
        .dataset()
        .ok_or_else(|| anyhow!("No report data available"))?;
    print!("{}", format_folder_list(dataset));
    Ok(())
}

/// The first-folder filter options, in the order they first appear, with counts.
pub fn format_folder_list(dataset: &Dataset) -> String {
    let records: Vec<_> = dataset.records.iter().collect();
    let counts: HashMap<String, usize> = count_by_first_folder(&records)
        .into_iter()
        .map(|c| (c.key, c.count))
        .collect();

    let folders = dataset.first_folders();
    let width = folders.iter().map(|f| f.len()).max().unwrap_or(0).max(3);

    let mut list = format!("  {:<width$}  {}\n", "All", dataset.len());
    for folder in folders {
        let count = counts.get(folder).copied().unwrap_or(0);
        list.push_str(&format!("  {folder:<width$}  {count}\n"));
    }
    list
}
