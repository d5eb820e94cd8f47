// Tests for report session ownership of the dataset

use async_trait::async_trait;
use sitrep_core::aggregate::Granularity;
use sitrep_core::dataset::ViewFilter;
use sitrep_core::session::ReportSession;
use sitrep_scanner::error::Result;
use sitrep_scanner::{Fetcher, ScanError, SitemapResolver};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Serves documents from a map that tests can swap between generations.
#[derive(Clone, Default)]
struct SwappableFetcher {
    documents: Arc<Mutex<HashMap<String, String>>>,
}

impl SwappableFetcher {
    fn serve(&self, url: &str, body: &str) {
        self.documents
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }

    fn remove(&self, url: &str) {
        self.documents.lock().unwrap().remove(url);
    }
}

#[async_trait]
impl Fetcher for SwappableFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.documents
            .lock()
            .unwrap()
            .get(url)
            .map(|body| body.clone().into_bytes())
            .ok_or_else(|| ScanError::transport(url, "HTTP 404 Not Found"))
    }
}

const ROOT: &str = "https://x.com/sitemap.xml";

fn urlset(urls: &[&str]) -> String {
    let entries: String = urls
        .iter()
        .map(|u| format!("<url><loc>{u}</loc><lastmod>2024-01-01</lastmod></url>"))
        .collect();
    format!(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</urlset>"#)
}

// ============================================================================
// Generation Tests
// ============================================================================

#[tokio::test]
async fn test_new_session_has_no_report() {
    let session = ReportSession::new();
    assert!(!session.has_report());
    assert!(session.dataset().is_none());
    assert!(session.report(&ViewFilter::default(), Granularity::Year).is_none());
}

#[tokio::test]
async fn test_generate_builds_dataset() {
    let fetcher = SwappableFetcher::default();
    fetcher.serve(ROOT, &urlset(&["https://x.com/a/1", "https://x.com/a/2"]));
    let resolver = SitemapResolver::new(fetcher);

    let mut session = ReportSession::new();
    let dataset = session.generate(&resolver, ROOT).await.unwrap();

    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.nested_sitemap_count, 1);
    assert_eq!(dataset.root_url, ROOT);

    let report = session
        .report(&ViewFilter::default(), Granularity::Year)
        .unwrap();
    assert_eq!(report.timeline.periods[0].period, "2024");
}

#[tokio::test]
async fn test_generate_replaces_dataset_wholesale() {
    let fetcher = SwappableFetcher::default();
    fetcher.serve(ROOT, &urlset(&["https://x.com/a/1", "https://x.com/a/2"]));
    let resolver = SitemapResolver::new(fetcher.clone());

    let mut session = ReportSession::new();
    session.generate(&resolver, ROOT).await.unwrap();

    fetcher.serve(ROOT, &urlset(&["https://x.com/b/1"]));
    session.generate(&resolver, ROOT).await.unwrap();

    let dataset = session.dataset().unwrap();
    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.records[0].url(), "https://x.com/b/1");
}

#[tokio::test]
async fn test_failed_generation_discards_previous_report() {
    let fetcher = SwappableFetcher::default();
    fetcher.serve(ROOT, &urlset(&["https://x.com/a/1"]));
    let resolver = SitemapResolver::new(fetcher.clone());

    let mut session = ReportSession::new();
    session.generate(&resolver, ROOT).await.unwrap();
    assert!(session.has_report());

    fetcher.remove(ROOT);
    let err = session.generate(&resolver, ROOT).await.unwrap_err();

    assert!(matches!(err, ScanError::Transport { .. }));
    assert!(!session.has_report());
}

#[tokio::test]
async fn test_malformed_root_is_terminal() {
    let fetcher = SwappableFetcher::default();
    fetcher.serve(ROOT, "<rss><channel/></rss>");
    let resolver = SitemapResolver::new(fetcher);

    let mut session = ReportSession::new();
    let err = session.generate(&resolver, ROOT).await.unwrap_err();

    assert!(matches!(err, ScanError::MalformedDocument { ref url, .. } if url == ROOT));
    assert!(!session.has_report());
}

#[tokio::test]
async fn test_clear() {
    let fetcher = SwappableFetcher::default();
    fetcher.serve(ROOT, &urlset(&["https://x.com/a/1"]));
    let resolver = SitemapResolver::new(fetcher);

    let mut session = ReportSession::new();
    session.generate(&resolver, ROOT).await.unwrap();
    session.clear();
    assert!(!session.has_report());
}
