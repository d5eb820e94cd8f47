use sitrep_scanner::{ScanError, SitemapResolver};
use tracing::{info, warn};

use crate::aggregate::Granularity;
use crate::dataset::{Dataset, ViewFilter, build_dataset};
use crate::report::ReportData;

/// Owns the dataset of the most recent successful generation.
///
/// Each call to [`ReportSession::generate`] replaces the dataset wholesale.
/// A failed generation leaves the session empty, never holding the previous
/// report.
#[derive(Debug, Default)]
pub struct ReportSession {
    dataset: Option<Dataset>,
}

impl ReportSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn generate(
        &mut self,
        resolver: &SitemapResolver,
        root_url: &str,
    ) -> Result<&Dataset, ScanError> {
        self.dataset = None;

        let resolved = resolver.resolve(root_url).await.inspect_err(|e| {
            warn!("Report generation for {} failed: {}", root_url, e);
        })?;

        let dataset = build_dataset(root_url, resolved);
        info!(
            "Report dataset ready: {} records from {} sitemap(s)",
            dataset.len(),
            dataset.nested_sitemap_count
        );
        Ok(self.dataset.insert(dataset))
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn has_report(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn clear(&mut self) {
        self.dataset = None;
    }

    /// Computed views of the current dataset, if one exists.
    pub fn report(&self, filter: &ViewFilter, granularity: Granularity) -> Option<ReportData> {
        self.dataset
            .as_ref()
            .map(|dataset| ReportData::gather(dataset, filter, granularity))
    }
}
