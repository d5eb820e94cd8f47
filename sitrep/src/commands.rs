use clap::{arg, command};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

fn resolve_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-u --"url" <URL>)
            .required(false)
            .required_unless_present("file")
            .conflicts_with("file")
            .help("URL of the sitemap or sitemap index (https:// is assumed when no scheme is given)"),
    )
    .arg(
        arg!(--"file" <PATH>)
            .required(false)
            .help("Read the sitemap from a local file instead of fetching it")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
    )
    .arg(
        arg!(-t --"threads" <NUM_FETCHES>)
            .required(false)
            .help("Maximum number of sitemaps fetched concurrently")
            .value_parser(clap::value_parser!(usize))
            .default_value("8"),
    )
    .arg(
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Timeout for each sitemap request")
            .value_parser(clap::value_parser!(u64).range(1..))
            .default_value("30"),
    )
    .arg(
        arg!(--"max-depth" <LEVELS>)
            .required(false)
            .help("Maximum nesting of sitemap indexes")
            .value_parser(clap::value_parser!(usize))
            .default_value("16"),
    )
    .arg(
        arg!(--"partial")
            .required(false)
            .help("Skip nested sitemaps that fail instead of aborting the report")
            .action(clap::ArgAction::SetTrue),
    )
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitrep")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitrep")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Log every fetched sitemap to stderr")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(resolve_args(
            command!("report")
                .about(
                    "Resolve a sitemap and report on its URLs: content metrics, duplicates, \
                lastmod timeline and per-extension/per-domain counts.",
                )
                .arg(
                    arg!(-F --"filter" <CONTENT>)
                        .required(false)
                        .help("Restrict the report to HTML documents or to pages with images")
                        .value_parser(["all", "html", "images"])
                        .default_value("all"),
                )
                .arg(
                    arg!(--"folder" <NAME>)
                        .required(false)
                        .help("Only include URLs whose first folder matches (see `sitrep folders`)"),
                )
                .arg(
                    arg!(-p --"period" <PERIOD>)
                        .required(false)
                        .help("Group the lastmod timeline by year, month or day")
                        .value_parser(["year", "month", "day"])
                        .default_value("year"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, csv, markdown")
                        .value_parser(["text", "json", "csv", "markdown", "md"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"no-pager")
                        .required(false)
                        .help("Print the report directly instead of through a pager")
                        .action(clap::ArgAction::SetTrue),
                ),
        ))
        .subcommand(resolve_args(
            command!("folders").about("List the first folders found in a sitemap, with URL counts"),
        ))
}
