use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sitrep_scanner::{BranchFailure, PageRecord, ResolvedSitemap};
use tracing::debug;

use crate::aggregate::ContentFilter;
use crate::facets::{self, DEFAULT_EXTENSION, UrlFacets};

/// A page record together with the facets derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: PageRecord,
    #[serde(flatten)]
    pub facets: UrlFacets,
}

impl EnrichedRecord {
    pub fn new(record: PageRecord) -> Self {
        let facets = facets::extract(&record.url, record.lastmod.as_ref());
        Self { record, facets }
    }

    pub fn url(&self) -> &str {
        &self.record.url
    }

    pub fn lastmod(&self) -> Option<&NaiveDateTime> {
        self.record.lastmod.as_ref()
    }

    /// Non-empty image locations
    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.record
            .images
            .iter()
            .map(String::as_str)
            .filter(|i| !i.is_empty())
    }

    pub fn is_html(&self) -> bool {
        self.facets.file_extension == DEFAULT_EXTENSION
    }

    pub fn has_images(&self) -> bool {
        self.images().next().is_some()
    }
}

/// Restricts a dataset to one first folder, or keeps every folder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FolderFilter {
    #[default]
    All,
    Folder(String),
}

impl FolderFilter {
    /// `None` and the exact label `All` select every folder; `all` is a real folder name.
    pub fn from_option(value: Option<&str>) -> Self {
        match value {
            None | Some("All") => FolderFilter::All,
            Some(v) => FolderFilter::Folder(v.to_string()),
        }
    }

    pub fn matches(&self, record: &EnrichedRecord) -> bool {
        match self {
            FolderFilter::All => true,
            FolderFilter::Folder(name) => record.facets.first_folder == *name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FolderFilter::All => "All",
            FolderFilter::Folder(name) => name,
        }
    }
}

/// Folder and content selection applied before aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewFilter {
    pub first_folder: FolderFilter,
    pub content: ContentFilter,
}

impl ViewFilter {
    pub fn new(first_folder: FolderFilter, content: ContentFilter) -> Self {
        Self {
            first_folder,
            content,
        }
    }

    pub fn matches(&self, record: &EnrichedRecord) -> bool {
        self.first_folder.matches(record) && self.content.keeps(record)
    }
}

/// Every enriched record of one report, in resolution order.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub root_url: String,
    pub generated_at: DateTime<Utc>,
    pub records: Vec<EnrichedRecord>,
    pub nested_sitemap_count: usize,
    pub failures: Vec<BranchFailure>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records selected by `filter`, in dataset order.
    pub fn view(&self, filter: &ViewFilter) -> Vec<&EnrichedRecord> {
        self.records.iter().filter(|r| filter.matches(r)).collect()
    }

    /// Distinct first folders in the order they first appear.
    pub fn first_folders(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .map(|r| r.facets.first_folder.as_str())
            .filter(|folder| seen.insert(*folder))
            .collect()
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Attach facets to every record, keeping order and duplicates.
pub fn enrich(records: Vec<PageRecord>) -> Vec<EnrichedRecord> {
    records.into_iter().map(EnrichedRecord::new).collect()
}

pub fn build_dataset(root_url: &str, resolved: ResolvedSitemap) -> Dataset {
    let ResolvedSitemap {
        records,
        nested_sitemap_count,
        failures,
    } = resolved;

    let records = enrich(records);
    debug!(
        "Built dataset for {} with {} records from {} sitemap(s)",
        root_url,
        records.len(),
        nested_sitemap_count
    );

    Dataset {
        root_url: root_url.to_string(),
        generated_at: Utc::now(),
        records,
        nested_sitemap_count,
        failures,
    }
}
