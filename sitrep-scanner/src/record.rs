use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// One `<url>` entry of a urlset document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub lastmod: Option<NaiveDateTime>,
    pub images: Vec<String>,
}

impl PageRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            lastmod: None,
            images: Vec::new(),
        }
    }

    pub fn with_lastmod(mut self, lastmod: Option<NaiveDateTime>) -> Self {
        self.lastmod = lastmod;
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: child sitemap locations in document order
    Index(Vec<String>),
    /// `<urlset>`: page records in document order
    UrlSet(Vec<PageRecord>),
}

/// A child branch that failed while resolving under the partial policy.
#[derive(Debug, Clone)]
pub struct BranchFailure {
    pub url: String,
    pub error: ScanError,
}

/// Outcome of resolving a root sitemap.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSitemap {
    pub records: Vec<PageRecord>,
    /// Number of leaf (urlset) documents resolved
    pub nested_sitemap_count: usize,
    pub failures: Vec<BranchFailure>,
}

impl ResolvedSitemap {
    pub fn leaf(records: Vec<PageRecord>) -> Self {
        Self {
            records,
            nested_sitemap_count: 1,
            failures: Vec::new(),
        }
    }

    pub fn failed(url: String, error: ScanError) -> Self {
        Self {
            records: Vec::new(),
            nested_sitemap_count: 0,
            failures: vec![BranchFailure { url, error }],
        }
    }

    /// Append a sibling branch, keeping document order.
    pub fn merge(&mut self, other: ResolvedSitemap) {
        self.records.extend(other.records);
        self.nested_sitemap_count += other.nested_sitemap_count;
        self.failures.extend(other.failures);
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}
