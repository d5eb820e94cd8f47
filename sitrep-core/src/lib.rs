pub mod aggregate;
pub mod dataset;
pub mod facets;
pub mod report;
pub mod session;

use colored::Colorize;

pub use aggregate::{ContentFilter, Granularity};
pub use dataset::{Dataset, EnrichedRecord, FolderFilter, ViewFilter, build_dataset, enrich};
pub use facets::{UrlFacets, extract};
pub use report::{ReportData, ReportFormat};
pub use session::ReportSession;

pub fn print_banner() {
    let banner = r#"
      _ _
  ___(_) |_ _ __ ___ _ __
 / __| | __| '__/ _ \ '_ \
 \__ \ | |_| | |  __/ |_) |
 |___/_|\__|_|  \___| .__/
                    |_|"#;
    println!("{}", banner.cyan());
    println!(
        "{}\n",
        format!(
            "  sitemap report generator v{}",
            env!("CARGO_PKG_VERSION")
        )
        .dimmed()
    );
}
