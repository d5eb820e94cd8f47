// Report generation from a dataset view

use chrono::{DateTime, NaiveDateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::aggregate::{
    self, ContentFilter, ContentMetrics, DuplicateReport, FacetCount, Granularity, LastmodCoverage,
    Timeline,
};
use crate::dataset::{Dataset, ViewFilter};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }

    pub fn render(&self, data: &ReportData) -> Result<String, serde_json::Error> {
        match self {
            ReportFormat::Text => Ok(generate_text_report(data)),
            ReportFormat::Json => generate_json_report(data),
            ReportFormat::Csv => Ok(generate_csv_report(data)),
            ReportFormat::Markdown => Ok(generate_markdown_report(data)),
        }
    }
}

/// One line of the full URL info table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRow {
    pub url: String,
    pub lastmod: Option<NaiveDateTime>,
    pub first_folder: String,
    pub second_folder: String,
    /// Image locations joined with ", "
    pub images: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBranch {
    pub url: String,
    pub kind: String,
    pub reason: String,
}

/// Everything a display layer needs for one (dataset, filter) selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub root_url: String,
    pub generated_at: DateTime<Utc>,
    pub nested_sitemap_count: usize,
    pub total_records: usize,
    pub first_folder: String,
    pub content_filter: ContentFilter,
    pub view_records: usize,
    pub metrics: ContentMetrics,
    pub duplicates: DuplicateReport,
    pub timeline: Timeline,
    pub coverage: LastmodCoverage,
    pub extensions: Vec<FacetCount>,
    pub domains: Vec<FacetCount>,
    /// First folder counts over the whole dataset, i.e. the folder filter options
    pub first_folders: Vec<FacetCount>,
    pub rows: Vec<InfoRow>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<FailedBranch>,
}

impl ReportData {
    pub fn gather(dataset: &Dataset, filter: &ViewFilter, granularity: Granularity) -> Self {
        let view = dataset.view(filter);
        let everything: Vec<_> = dataset.records.iter().collect();

        let mut rows: Vec<InfoRow> = view
            .iter()
            .map(|r| InfoRow {
                url: r.url().to_string(),
                lastmod: r.lastmod().copied(),
                first_folder: r.facets.first_folder.clone(),
                second_folder: r.facets.second_folder.clone(),
                images: r.images().collect::<Vec<_>>().join(", "),
            })
            .collect();
        rows.sort_by(|a, b| a.url.cmp(&b.url));

        let failures = dataset
            .failures
            .iter()
            .map(|f| FailedBranch {
                url: f.url.clone(),
                kind: f.error.kind().as_str().to_string(),
                reason: f.error.to_string(),
            })
            .collect();

        ReportData {
            root_url: dataset.root_url.clone(),
            generated_at: dataset.generated_at,
            nested_sitemap_count: dataset.nested_sitemap_count,
            total_records: dataset.len(),
            first_folder: filter.first_folder.label().to_string(),
            content_filter: filter.content,
            view_records: view.len(),
            metrics: aggregate::summarize_counts(&view, filter.content),
            duplicates: aggregate::find_duplicates(&view, filter.content),
            timeline: aggregate::group_by_period(&view, granularity),
            coverage: aggregate::lastmod_coverage(&view),
            extensions: aggregate::count_by_extension(&view),
            domains: aggregate::count_by_domain(&view),
            first_folders: aggregate::count_by_first_folder(&everything),
            rows,
            failures,
        }
    }

    fn format_timestamp(&self) -> String {
        self.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }
}

fn section(report: &mut String, title: &str) {
    report.push_str(RULE);
    report.push('\n');
    report.push_str(&format!("{}\n", title.bold()));
    report.push_str(RULE);
    report.push_str("\n\n");
}

fn format_lastmod(lastmod: Option<&NaiveDateTime>) -> String {
    lastmod
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push('\n');
    report.push_str(&format!("{}\n", "                           SITEMAP REPORT".bold()));
    report.push_str(RULE);
    report.push_str("\n\n");

    report.push_str(&format!("Sitemap:         {}\n", data.root_url));
    report.push_str(&format!("Generated:       {}\n", data.format_timestamp()));
    report.push_str(&format!("Nested sitemaps: {}\n", data.nested_sitemap_count));
    report.push_str(&format!(
        "Records:         {} of {}\n",
        data.view_records, data.total_records
    ));
    report.push_str(&format!("First folder:    {}\n", data.first_folder));
    report.push_str(&format!("Content:         {}\n\n", data.content_filter.label()));

    if !data.failures.is_empty() {
        report.push_str(&format!(
            "{}\n\n",
            format!(
                "[!] Partial report: {} nested sitemap(s) could not be resolved",
                data.failures.len()
            )
            .yellow()
        ));
    }

    section(&mut report, "CONTENT METRICS");
    let m = &data.metrics;
    match m.filter {
        ContentFilter::HtmlOnly => {
            report.push_str(&format!("  Total HTML URLs:            {}\n", m.html_count));
            report.push_str(&format!("  Percentage of HTML docs:    {:.2}%\n", m.html_percentage));
        }
        ContentFilter::ImagesOnly => {
            report.push_str(&format!("  Total images:               {}\n", m.image_count));
            report.push_str(&format!("  Percentage of images:       {:.2}%\n", m.image_percentage));
            report.push_str(&format!("  Images per record:          {:.2}\n", m.images_per_record));
        }
        ContentFilter::All => {
            report.push_str(&format!("  Total URLs (HTML + images): {}\n", m.combined_count));
            report.push_str(&format!("  Percentage of HTML docs:    {:.2}%\n", m.html_percentage));
            report.push_str(&format!("  Percentage of images:       {:.2}%\n", m.image_percentage));
        }
    }
    report.push_str(&format!("  Total nested sitemaps:      {}\n", data.nested_sitemap_count));
    report.push_str(&format!("  Total duplicates:           {}\n", data.duplicates.total_count));
    report.push_str(&format!(
        "  Repeated URLs / images:     {} / {}\n\n",
        data.duplicates.excess_url_count, data.duplicates.excess_image_count
    ));

    section(&mut report, "TIMELINE");
    if data.coverage.with_lastmod == 0 {
        report.push_str(&format!("  {}\n\n", "No 'lastmod' values found in the sitemap.".yellow()));
    } else {
        report.push_str(&format!(
            "  {} out of {} URLs have 'lastmod' values.\n",
            data.coverage.with_lastmod, data.coverage.total
        ));
        report.push_str(&format!(
            "  URLs grouped by {}:\n\n",
            data.timeline.granularity.label()
        ));
        let widest = data.timeline.periods.iter().map(|p| p.count).max().unwrap_or(0);
        for period in &data.timeline.periods {
            report.push_str(&format!(
                "  {:<10} {} {}\n",
                period.period,
                bar(period.count, widest).cyan(),
                period.count
            ));
        }
        report.push('\n');
    }

    section(&mut report, "URLS PER FILE EXTENSION");
    push_counts(&mut report, &data.extensions);

    section(&mut report, "URLS PER DOMAIN");
    push_counts(&mut report, &data.domains);

    section(&mut report, "URL INFO");
    if data.rows.is_empty() {
        report.push_str("  (empty)\n\n");
    }
    for row in &data.rows {
        report.push_str(&format!("  {}\n", row.url));
        let mut details = vec![
            format!("folder: {}", row.first_folder),
            format!("sub: {}", row.second_folder),
        ];
        if row.lastmod.is_some() {
            details.push(format!("lastmod: {}", format_lastmod(row.lastmod.as_ref())));
        }
        report.push_str(&format!("    {}\n", details.join("  ").dimmed()));
        if !row.images.is_empty() {
            report.push_str(&format!("    {}\n", format!("images: {}", row.images).dimmed()));
        }
    }
    report.push('\n');

    section(&mut report, "DUPLICATES");
    if data.duplicates.total_count == 0 {
        report.push_str(&format!("  {}\n\n", "No duplicate URLs or images found.".green()));
    } else {
        if !data.duplicates.duplicate_url_records.is_empty() {
            report.push_str("  Duplicate URLs:\n");
            for record in &data.duplicates.duplicate_url_records {
                report.push_str(&format!("    {}\n", record.url().red()));
            }
            report.push('\n');
        }
        if !data.duplicates.duplicate_image_records.is_empty() {
            report.push_str("  Duplicate images:\n");
            for occurrence in &data.duplicates.duplicate_image_records {
                report.push_str(&format!(
                    "    {}  {}\n",
                    occurrence.image.red(),
                    format!("on {}", occurrence.page_url).dimmed()
                ));
            }
            report.push('\n');
        }
    }

    if !data.failures.is_empty() {
        section(&mut report, "FAILED SITEMAPS");
        for failure in &data.failures {
            report.push_str(&format!("  [{}] {}\n", failure.kind, failure.url));
            report.push_str(&format!("    {}\n", failure.reason.dimmed()));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push('\n');
    report.push_str("                             End of Report\n");
    report.push_str(RULE);
    report.push_str(&format!(
        "\n\nGenerated by sitrep {}\n\n",
        env!("CARGO_PKG_VERSION")
    ));

    report
}

fn push_counts(report: &mut String, counts: &[FacetCount]) {
    if counts.is_empty() {
        report.push_str("  (empty)\n\n");
        return;
    }
    let width = counts.iter().map(|c| c.key.len()).max().unwrap_or(0);
    for count in counts {
        report.push_str(&format!("  {:<width$}  {}\n", count.key, count.count));
    }
    report.push('\n');
}

fn bar(count: usize, widest: usize) -> String {
    if widest == 0 {
        return String::new();
    }
    let len = (count * BAR_WIDTH).div_ceil(widest);
    "█".repeat(len)
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "sitrep",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": data.generated_at.to_rfc3339(),
                "format": "json"
            },
            "source": {
                "sitemap": data.root_url,
                "nested_sitemaps": data.nested_sitemap_count,
                "total_records": data.total_records,
                "partial": !data.failures.is_empty()
            },
            "view": {
                "first_folder": data.first_folder,
                "content_filter": data.content_filter,
                "records": data.view_records
            },
            "metrics": data.metrics,
            "duplicates": data.duplicates,
            "timeline": data.timeline,
            "lastmod_coverage": data.coverage,
            "extensions": data.extensions,
            "domains": data.domains,
            "first_folders": data.first_folders,
            "records": data.rows,
            "failures": data.failures
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// The URL info table as CSV.
pub fn generate_csv_report(data: &ReportData) -> String {
    let mut report = String::from("url,lastmod,first_folder,second_folder,images\n");
    for row in &data.rows {
        let lastmod = format_lastmod(row.lastmod.as_ref());
        let fields = [
            row.url.as_str(),
            lastmod.as_str(),
            row.first_folder.as_str(),
            row.second_folder.as_str(),
            row.images.as_str(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        report.push_str(&line.join(","));
        report.push('\n');
    }
    report
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn generate_markdown_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str("# Sitemap Report\n\n");
    report.push_str(&format!("- **Sitemap:** {}\n", data.root_url));
    report.push_str(&format!("- **Generated:** {}\n", data.format_timestamp()));
    report.push_str(&format!("- **Nested sitemaps:** {}\n", data.nested_sitemap_count));
    report.push_str(&format!(
        "- **Records:** {} of {}\n",
        data.view_records, data.total_records
    ));
    report.push_str(&format!(
        "- **Filter:** folder `{}`, content `{}`\n\n",
        data.first_folder,
        data.content_filter.label()
    ));

    let m = &data.metrics;
    report.push_str("## Content metrics\n\n");
    report.push_str("| Metric | Value |\n|---|---|\n");
    report.push_str(&format!("| HTML URLs | {} |\n", m.html_count));
    report.push_str(&format!("| Images | {} |\n", m.image_count));
    report.push_str(&format!("| HTML percentage | {:.2}% |\n", m.html_percentage));
    report.push_str(&format!("| Image percentage | {:.2}% |\n", m.image_percentage));
    report.push_str(&format!("| Duplicates | {} |\n", data.duplicates.total_count));
    report.push_str(&format!("| Repeated URLs | {} |\n", data.duplicates.excess_url_count));
    report.push_str(&format!("| Repeated images | {} |\n\n", data.duplicates.excess_image_count));

    report.push_str(&format!(
        "## Timeline ({})\n\n",
        data.timeline.granularity.label()
    ));
    report.push_str(&format!(
        "{} out of {} URLs have `lastmod` values.\n\n",
        data.coverage.with_lastmod, data.coverage.total
    ));
    if !data.timeline.periods.is_empty() {
        report.push_str("| Period | URLs |\n|---|---|\n");
        for period in &data.timeline.periods {
            report.push_str(&format!("| {} | {} |\n", period.period, period.count));
        }
        report.push('\n');
    }

    push_markdown_counts(&mut report, "URLs per file extension", "Extension", &data.extensions);
    push_markdown_counts(&mut report, "URLs per domain", "Domain", &data.domains);

    report.push_str("## URL info\n\n");
    report.push_str("| URL | Last mod | First folder | Second folder | Images |\n");
    report.push_str("|---|---|---|---|---|\n");
    for row in &data.rows {
        report.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            markdown_cell(&row.url),
            format_lastmod(row.lastmod.as_ref()),
            markdown_cell(&row.first_folder),
            markdown_cell(&row.second_folder),
            markdown_cell(&row.images)
        ));
    }
    report.push('\n');

    report.push_str("## Duplicates\n\n");
    if data.duplicates.total_count == 0 {
        report.push_str("No duplicate URLs or images found.\n\n");
    } else {
        for record in &data.duplicates.duplicate_url_records {
            report.push_str(&format!("- URL `{}`\n", record.url()));
        }
        for occurrence in &data.duplicates.duplicate_image_records {
            report.push_str(&format!(
                "- Image `{}` on {}\n",
                occurrence.image, occurrence.page_url
            ));
        }
        report.push('\n');
    }

    if !data.failures.is_empty() {
        report.push_str("## Failed sitemaps\n\n");
        for failure in &data.failures {
            report.push_str(&format!("- `{}` ({}): {}\n", failure.url, failure.kind, failure.reason));
        }
        report.push('\n');
    }

    report
}

fn push_markdown_counts(report: &mut String, title: &str, column: &str, counts: &[FacetCount]) {
    report.push_str(&format!("## {title}\n\n| {column} | URLs |\n|---|---|\n"));
    for count in counts {
        report.push_str(&format!("| {} | {} |\n", markdown_cell(&count.key), count.count));
    }
    report.push('\n');
}

fn markdown_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
