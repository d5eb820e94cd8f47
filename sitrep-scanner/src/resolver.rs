use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::error::{Result, ScanError};
use crate::fetch::{DEFAULT_TIMEOUT_SECS, Fetcher};
use crate::parser;
use crate::record::{ResolvedSitemap, SitemapDocument};

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_MAX_DEPTH: usize = 16;

pub type ProgressCallback = Arc<dyn Fn(ResolveEvent) + Send + Sync>;

/// Progress notifications emitted while resolving.
#[derive(Debug, Clone)]
pub enum ResolveEvent {
    Fetching { url: String, depth: usize },
    Index { url: String, children: usize },
    UrlSet { url: String, records: usize },
    BranchFailed { url: String, error: String },
}

/// What to do when a nested sitemap cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Any failing branch aborts the whole resolution
    #[default]
    Abort,
    /// Failing child branches are recorded and skipped; the root must still succeed
    Partial,
}

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub concurrency: usize,
    pub fetch_timeout: Duration,
    pub max_depth: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            fetch_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_depth: DEFAULT_MAX_DEPTH,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

/// Expands a root sitemap into the flat list of page records it references.
///
/// Sibling sitemaps of an index are fetched concurrently, but every branch
/// returns its own result and parents concatenate them in index order, so the
/// output is the same as a sequential depth-first walk.
pub struct SitemapResolver {
    fetcher: Arc<dyn Fetcher>,
    options: ResolveOptions,
    cancel: Option<CancellationToken>,
    progress_callback: Option<ProgressCallback>,
}

impl SitemapResolver {
    pub fn new(fetcher: impl Fetcher + 'static) -> Self {
        Self::with_shared_fetcher(Arc::new(fetcher))
    }

    pub fn with_shared_fetcher(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            options: ResolveOptions::default(),
            cancel: None,
            progress_callback: None,
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.options.concurrency = concurrency;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.options.fetch_timeout = timeout;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.options.max_depth = depth;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.options.failure_policy = policy;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    pub async fn resolve(&self, root_url: &str) -> Result<ResolvedSitemap> {
        Url::parse(root_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{root_url}: {e}")))?;

        let concurrency = self.options.concurrency.max(1);
        info!(
            "Resolving sitemap {} ({} concurrent fetches, max depth {}, {:?} on failure)",
            root_url, concurrency, self.options.max_depth, self.options.failure_policy
        );

        let limiter = Semaphore::new(concurrency);
        let resolved = self
            .resolve_node(root_url.to_string(), 0, Arc::new(Vec::new()), &limiter)
            .await?;

        info!(
            "Resolution complete. {} records from {} sitemap(s), {} failed branch(es)",
            resolved.records.len(),
            resolved.nested_sitemap_count,
            resolved.failures.len()
        );
        Ok(resolved)
    }

    fn resolve_node<'a>(
        &'a self,
        url: String,
        depth: usize,
        ancestors: Arc<Vec<String>>,
        limiter: &'a Semaphore,
    ) -> BoxFuture<'a, Result<ResolvedSitemap>> {
        async move {
            let key = normalize(&url);
            if ancestors.contains(&key) {
                return Err(ScanError::CycleDetected { url });
            }
            if depth > self.options.max_depth {
                return Err(ScanError::DepthExceeded {
                    url,
                    max_depth: self.options.max_depth,
                });
            }

            let bytes = self.fetch_document(&url, depth, limiter).await?;
            let document = parser::parse(&bytes).map_err(|e| ScanError::from_parse(&url, e))?;

            let children = match document {
                SitemapDocument::UrlSet(records) => {
                    debug!("{} is a urlset with {} records", url, records.len());
                    self.notify(ResolveEvent::UrlSet {
                        url,
                        records: records.len(),
                    });
                    return Ok(ResolvedSitemap::leaf(records));
                }
                SitemapDocument::Index(children) => children,
            };

            debug!("{} is an index with {} children", url, children.len());
            self.notify(ResolveEvent::Index {
                url: url.clone(),
                children: children.len(),
            });

            let mut path = Vec::with_capacity(ancestors.len() + 1);
            path.extend(ancestors.iter().cloned());
            path.push(key);
            let path = Arc::new(path);

            let branches = stream::iter(children)
                .map(|loc| {
                    let path = path.clone();
                    let parent = url.as_str();
                    async move {
                        let outcome = match absolutize(parent, &loc) {
                            Ok(child) => self.resolve_node(child, depth + 1, path, limiter).await,
                            Err(e) => Err(e),
                        };
                        (loc, outcome)
                    }
                })
                .buffered(self.options.concurrency.max(1));
            let mut branches = pin!(branches);

            let mut merged = ResolvedSitemap::default();
            while let Some((child, outcome)) = branches.next().await {
                match outcome {
                    Ok(branch) => merged.merge(branch),
                    Err(ScanError::Cancelled) => return Err(ScanError::Cancelled),
                    Err(err) => match self.options.failure_policy {
                        FailurePolicy::Abort => return Err(err),
                        FailurePolicy::Partial => {
                            debug!("Skipping sitemap {}: {}", child, err);
                            self.notify(ResolveEvent::BranchFailed {
                                url: child.clone(),
                                error: err.to_string(),
                            });
                            merged.merge(ResolvedSitemap::failed(child, err));
                        }
                    },
                }
            }

            Ok(merged)
        }
        .boxed()
    }

    async fn fetch_document(&self, url: &str, depth: usize, limiter: &Semaphore) -> Result<Vec<u8>> {
        let timeout = self.options.fetch_timeout;
        let work = async {
            let _permit = limiter
                .acquire()
                .await
                .map_err(|_| ScanError::Cancelled)?;
            self.notify(ResolveEvent::Fetching {
                url: url.to_string(),
                depth,
            });
            tokio::time::timeout(timeout, self.fetcher.fetch(url))
                .await
                .map_err(|_| ScanError::transport(url, format!("timed out after {timeout:?}")))?
        };

        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(ScanError::Cancelled),
                outcome = work => outcome,
            },
            None => work.await,
        }
    }

    fn notify(&self, event: ResolveEvent) {
        if let Some(ref callback) = self.progress_callback {
            callback(event);
        }
    }
}

/// Canonical form used to recognize a sitemap already on the current path.
fn normalize(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

/// Child locations are meant to be absolute, but relative ones are resolved
/// against the index that lists them.
fn absolutize(parent: &str, loc: &str) -> Result<String> {
    if let Ok(url) = Url::parse(loc) {
        return Ok(url.to_string());
    }
    Url::parse(parent)
        .and_then(|base| base.join(loc))
        .map(|url| url.to_string())
        .map_err(|e| ScanError::InvalidUrl(format!("{loc}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory fetcher keyed by URL.
    struct MapFetcher {
        documents: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn new(documents: &[(&str, String)]) -> Self {
            Self {
                documents: documents
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.clone()))
                    .collect(),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.requests.lock().unwrap().push(url.to_string());
            self.documents
                .get(url)
                .map(|body| body.clone().into_bytes())
                .ok_or_else(|| ScanError::transport(url, "HTTP 404 Not Found"))
        }
    }

    fn index(children: &[&str]) -> String {
        let entries: String = children
            .iter()
            .map(|c| format!("<sitemap><loc>{c}</loc></sitemap>"))
            .collect();
        format!(
            r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</sitemapindex>"#
        )
    }

    fn urlset(urls: &[&str]) -> String {
        let entries: String = urls
            .iter()
            .map(|u| format!("<url><loc>{u}</loc></url>"))
            .collect();
        format!(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</urlset>"#)
    }

    fn urls(resolved: &ResolvedSitemap) -> Vec<&str> {
        resolved.records.iter().map(|r| r.url.as_str()).collect()
    }

    #[tokio::test]
    async fn test_single_urlset() {
        let fetcher = MapFetcher::new(&[(
            "https://x.com/sitemap.xml",
            urlset(&["https://x.com/a", "https://x.com/b"]),
        )]);

        let resolved = SitemapResolver::new(fetcher)
            .resolve("https://x.com/sitemap.xml")
            .await
            .unwrap();

        assert_eq!(resolved.nested_sitemap_count, 1);
        assert_eq!(urls(&resolved), vec!["https://x.com/a", "https://x.com/b"]);
    }

    #[tokio::test]
    async fn test_nested_index_preserves_depth_first_order() {
        let fetcher = MapFetcher::new(&[
            (
                "https://x.com/index.xml",
                index(&["https://x.com/inner.xml", "https://x.com/c.xml"]),
            ),
            (
                "https://x.com/inner.xml",
                index(&["https://x.com/a.xml", "https://x.com/b.xml"]),
            ),
            ("https://x.com/a.xml", urlset(&["https://x.com/1", "https://x.com/2"])),
            ("https://x.com/b.xml", urlset(&["https://x.com/3"])),
            ("https://x.com/c.xml", urlset(&["https://x.com/4"])),
        ]);

        let resolved = SitemapResolver::new(fetcher)
            .with_concurrency(4)
            .resolve("https://x.com/index.xml")
            .await
            .unwrap();

        assert_eq!(resolved.nested_sitemap_count, 3);
        assert_eq!(
            urls(&resolved),
            vec!["https://x.com/1", "https://x.com/2", "https://x.com/3", "https://x.com/4"]
        );
    }

    #[tokio::test]
    async fn test_cycle_is_detected() {
        let fetcher = MapFetcher::new(&[
            ("https://x.com/a.xml", index(&["https://x.com/b.xml"])),
            ("https://x.com/b.xml", index(&["https://x.com/a.xml#again"])),
        ]);

        let err = SitemapResolver::new(fetcher)
            .resolve("https://x.com/a.xml")
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::CycleDetected { ref url } if url.contains("a.xml")));
    }

    #[tokio::test]
    async fn test_diamond_is_not_a_cycle() {
        let fetcher = MapFetcher::new(&[
            (
                "https://x.com/root.xml",
                index(&["https://x.com/left.xml", "https://x.com/right.xml"]),
            ),
            ("https://x.com/left.xml", index(&["https://x.com/shared.xml"])),
            ("https://x.com/right.xml", index(&["https://x.com/shared.xml"])),
            ("https://x.com/shared.xml", urlset(&["https://x.com/page"])),
        ]);

        let resolved = SitemapResolver::new(fetcher)
            .resolve("https://x.com/root.xml")
            .await
            .unwrap();

        assert_eq!(resolved.nested_sitemap_count, 2);
        assert_eq!(urls(&resolved), vec!["https://x.com/page", "https://x.com/page"]);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let fetcher = MapFetcher::new(&[
            ("https://x.com/0.xml", index(&["https://x.com/1.xml"])),
            ("https://x.com/1.xml", index(&["https://x.com/2.xml"])),
            ("https://x.com/2.xml", urlset(&["https://x.com/deep"])),
        ]);

        let err = SitemapResolver::new(fetcher)
            .with_max_depth(1)
            .resolve("https://x.com/0.xml")
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::DepthExceeded { max_depth: 1, .. }));
    }

    #[tokio::test]
    async fn test_partial_policy_keeps_successful_branches() {
        let fetcher = MapFetcher::new(&[
            (
                "https://x.com/index.xml",
                index(&["https://x.com/ok.xml", "https://x.com/gone.xml"]),
            ),
            ("https://x.com/ok.xml", urlset(&["https://x.com/page"])),
        ]);

        let resolved = SitemapResolver::new(fetcher)
            .with_failure_policy(FailurePolicy::Partial)
            .resolve("https://x.com/index.xml")
            .await
            .unwrap();

        assert_eq!(urls(&resolved), vec!["https://x.com/page"]);
        assert_eq!(resolved.nested_sitemap_count, 1);
        assert_eq!(resolved.failures.len(), 1);
        assert_eq!(resolved.failures[0].url, "https://x.com/gone.xml");
        assert!(resolved.is_partial());
    }

    #[tokio::test]
    async fn test_nested_record_without_loc_names_child() {
        let fetcher = MapFetcher::new(&[
            (
                "https://x.com/index.xml",
                index(&["https://x.com/ok.xml", "https://x.com/broken.xml"]),
            ),
            ("https://x.com/ok.xml", urlset(&["https://x.com/a"])),
            (
                "https://x.com/broken.xml",
                r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                     <url><loc>https://x.com/b</loc></url>
                     <url><lastmod>2024-01-01</lastmod></url>
                   </urlset>"#
                    .to_string(),
            ),
        ]);

        let err = SitemapResolver::new(fetcher)
            .resolve("https://x.com/index.xml")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedRecord);
        assert_eq!(err.url(), Some("https://x.com/broken.xml"));
        assert!(err.to_string().contains("#2"), "unexpected message: {err}");
    }

    #[tokio::test]
    async fn test_partial_policy_records_malformed_child() {
        let fetcher = MapFetcher::new(&[
            (
                "https://x.com/index.xml",
                index(&["https://x.com/broken.xml", "https://x.com/ok.xml"]),
            ),
            ("https://x.com/ok.xml", urlset(&["https://x.com/a"])),
            (
                "https://x.com/broken.xml",
                "<urlset><url></url></urlset>".to_string(),
            ),
        ]);

        let resolved = SitemapResolver::new(fetcher)
            .with_failure_policy(FailurePolicy::Partial)
            .resolve("https://x.com/index.xml")
            .await
            .unwrap();

        assert_eq!(urls(&resolved), vec!["https://x.com/a"]);
        assert_eq!(resolved.failures.len(), 1);
        assert_eq!(resolved.failures[0].error.kind(), ErrorKind::MalformedRecord);
        assert_eq!(resolved.failures[0].error.url(), Some("https://x.com/broken.xml"));
    }

    #[tokio::test]
    async fn test_partial_policy_root_failure_is_terminal() {
        let fetcher = MapFetcher::new(&[]);

        let err = SitemapResolver::new(fetcher)
            .with_failure_policy(FailurePolicy::Partial)
            .resolve("https://x.com/missing.xml")
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_relative_child_locations() {
        let fetcher = MapFetcher::new(&[
            ("https://x.com/maps/index.xml", index(&["pages.xml"])),
            ("https://x.com/maps/pages.xml", urlset(&["https://x.com/p"])),
        ]);

        let resolved = SitemapResolver::new(fetcher)
            .resolve("https://x.com/maps/index.xml")
            .await
            .unwrap();
        assert_eq!(urls(&resolved), vec!["https://x.com/p"]);
    }

    #[tokio::test]
    async fn test_invalid_root_url() {
        let err = SitemapResolver::new(MapFetcher::new(&[]))
            .resolve("not a url")
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();

        let fetcher = MapFetcher::new(&[("https://x.com/s.xml", urlset(&["https://x.com/"]))]);
        let err = SitemapResolver::new(fetcher)
            .with_cancellation_token(token)
            .resolve("https://x.com/s.xml")
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::Cancelled));
    }

    #[tokio::test]
    async fn test_progress_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        let fetcher = MapFetcher::new(&[
            ("https://x.com/index.xml", index(&["https://x.com/a.xml"])),
            ("https://x.com/a.xml", urlset(&["https://x.com/1"])),
        ]);
        SitemapResolver::new(fetcher)
            .with_progress_callback(Arc::new(move |event| sink.lock().unwrap().push(event)))
            .resolve("https://x.com/index.xml")
            .await
            .unwrap();

        let events = events.lock().unwrap();
        let fetches = events
            .iter()
            .filter(|e| matches!(e, ResolveEvent::Fetching { .. }))
            .count();
        assert_eq!(fetches, 2);
        assert!(events
            .iter()
            .any(|e| matches!(e, ResolveEvent::UrlSet { records: 1, .. })));
    }

    #[tokio::test]
    async fn test_partial_policy_reports_each_skipped_branch_once() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        let fetcher = MapFetcher::new(&[
            (
                "https://x.com/index.xml",
                index(&["https://x.com/gone.xml", "https://x.com/ok.xml"]),
            ),
            ("https://x.com/ok.xml", urlset(&["https://x.com/1"])),
        ]);
        SitemapResolver::new(fetcher)
            .with_failure_policy(FailurePolicy::Partial)
            .with_progress_callback(Arc::new(move |event| sink.lock().unwrap().push(event)))
            .resolve("https://x.com/index.xml")
            .await
            .unwrap();

        let events = events.lock().unwrap();
        let skipped: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                ResolveEvent::BranchFailed { url, .. } => Some(url.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(skipped, vec!["https://x.com/gone.xml"]);
    }

    mod local {
        use super::*;
        use crate::fetch::{FileFetcher, file_url};
        use tempfile::TempDir;

        #[tokio::test]
        async fn test_local_index_with_relative_child() {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("index.xml"), index(&["pages.xml"])).unwrap();
            std::fs::write(
                dir.path().join("pages.xml"),
                urlset(&["https://x.com/a.html", "https://x.com/b.html"]),
            )
            .unwrap();

            let root = file_url(&dir.path().join("index.xml")).unwrap();
            let resolved = SitemapResolver::new(FileFetcher::new())
                .resolve(&root)
                .await
                .unwrap();

            assert_eq!(resolved.nested_sitemap_count, 1);
            assert_eq!(urls(&resolved), vec!["https://x.com/a.html", "https://x.com/b.html"]);
        }

        #[tokio::test]
        async fn test_local_missing_child_names_file() {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("index.xml"), index(&["gone.xml"])).unwrap();

            let root = file_url(&dir.path().join("index.xml")).unwrap();
            let err = SitemapResolver::new(FileFetcher::new())
                .resolve(&root)
                .await
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::Transport);
            assert!(err.url().is_some_and(|u| u.ends_with("/gone.xml")));
        }
    }

    mod http {
        use super::*;
        use crate::fetch::HttpFetcher;
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;
        use wiremock::{
            Mock, MockServer, ResponseTemplate,
            matchers::{method, path},
        };

        async fn serve(server: &MockServer, route: &str, body: String) {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(server)
                .await;
        }

        /// Index of three urlsets, fetched over HTTP with full concurrency
        #[tokio::test]
        async fn test_index_over_http_keeps_index_order() {
            let mock_server = MockServer::start().await;
            let base = mock_server.uri();

            serve(
                &mock_server,
                "/sitemap_index.xml",
                index(&[
                    &format!("{base}/posts.xml"),
                    &format!("{base}/pages.xml"),
                    &format!("{base}/products.xml"),
                ]),
            )
            .await;
            // The first child is the slowest to answer
            Mock::given(method("GET"))
                .and(path("/posts.xml"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(urlset(&["https://x.com/posts/1", "https://x.com/posts/2"]))
                        .set_delay(Duration::from_millis(300)),
                )
                .mount(&mock_server)
                .await;
            serve(&mock_server, "/pages.xml", urlset(&["https://x.com/about"])).await;
            serve(&mock_server, "/products.xml", urlset(&["https://x.com/shop/a"])).await;

            let resolved = SitemapResolver::new(HttpFetcher::new().unwrap())
                .with_concurrency(3)
                .resolve(&format!("{base}/sitemap_index.xml"))
                .await
                .unwrap();

            assert_eq!(resolved.nested_sitemap_count, 3);
            assert_eq!(
                urls(&resolved),
                vec![
                    "https://x.com/posts/1",
                    "https://x.com/posts/2",
                    "https://x.com/about",
                    "https://x.com/shop/a",
                ]
            );
        }

        #[tokio::test]
        async fn test_malformed_child_aborts_whole_resolution() {
            let mock_server = MockServer::start().await;
            let base = mock_server.uri();

            serve(
                &mock_server,
                "/index.xml",
                index(&[&format!("{base}/good.xml"), &format!("{base}/bad.xml")]),
            )
            .await;
            serve(&mock_server, "/good.xml", urlset(&["https://x.com/a"])).await;
            serve(&mock_server, "/bad.xml", "<feed><entry/></feed>".to_string()).await;

            let err = SitemapResolver::new(HttpFetcher::new().unwrap())
                .resolve(&format!("{base}/index.xml"))
                .await
                .unwrap_err();

            match err {
                ScanError::MalformedDocument { url, .. } => assert_eq!(url, format!("{base}/bad.xml")),
                other => panic!("Expected malformed document, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_server_error_is_transport_failure() {
            let mock_server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/sitemap.xml"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&mock_server)
                .await;

            let err = SitemapResolver::new(HttpFetcher::new().unwrap())
                .resolve(&format!("{}/sitemap.xml", mock_server.uri()))
                .await
                .unwrap_err();
            assert!(matches!(err, ScanError::Transport { .. }));
        }

        #[tokio::test]
        async fn test_fetch_timeout_is_transport_failure() {
            let mock_server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/slow.xml"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(urlset(&["https://x.com/a"]))
                        .set_delay(Duration::from_secs(2)),
                )
                .mount(&mock_server)
                .await;

            let err = SitemapResolver::new(HttpFetcher::new().unwrap())
                .with_fetch_timeout(Duration::from_millis(200))
                .resolve(&format!("{}/slow.xml", mock_server.uri()))
                .await
                .unwrap_err();

            match err {
                ScanError::Transport { reason, .. } => assert!(reason.contains("timed out")),
                other => panic!("Expected transport error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_cancellation_abandons_in_flight_fetch() {
            let mock_server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/slow.xml"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(urlset(&["https://x.com/a"]))
                        .set_delay(Duration::from_secs(5)),
                )
                .mount(&mock_server)
                .await;

            let token = CancellationToken::new();
            let canceller = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                canceller.cancel();
            });

            let err = SitemapResolver::new(HttpFetcher::new().unwrap())
                .with_cancellation_token(token)
                .with_failure_policy(FailurePolicy::Partial)
                .resolve(&format!("{}/slow.xml", mock_server.uri()))
                .await
                .unwrap_err();
            assert!(matches!(err, ScanError::Cancelled));
        }

        #[tokio::test]
        async fn test_gzipped_sitemap() {
            let mock_server = MockServer::start().await;
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(urlset(&["https://x.com/zipped"]).as_bytes())
                .unwrap();
            let gz = encoder.finish().unwrap();

            Mock::given(method("GET"))
                .and(path("/sitemap.xml.gz"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(gz))
                .mount(&mock_server)
                .await;

            let resolved = SitemapResolver::new(HttpFetcher::new().unwrap())
                .resolve(&format!("{}/sitemap.xml.gz", mock_server.uri()))
                .await
                .unwrap();
            assert_eq!(urls(&resolved), vec!["https://x.com/zipped"]);
        }
    }
}
