use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{Result, ScanError};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const REDIRECT_LIMIT: usize = 10;

/// Retrieves the raw bytes of a sitemap document.
///
/// Implementations must treat any non-2xx response, connection failure or
/// timeout as [`ScanError::Transport`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Default fetcher backed by a pooled reqwest client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(
                "sitrep/",
                env!("CARGO_PKG_VERSION"),
                " (https://github.com/trapdoorsec/sitrep)"
            ))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(REDIRECT_LIMIT))
            .gzip(true)
            .build()
            .map_err(|e| ScanError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScanError::transport(url, describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::transport(url, format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ScanError::transport(url, describe(&e)))?;

        debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body.to_vec())
    }
}

/// Reads `file://` sitemaps from disk.
///
/// Other URLs go to the remote fetcher when one is set, so a local index can
/// still list hosted sitemaps.
#[derive(Clone, Default)]
pub struct FileFetcher {
    remote: Option<Arc<dyn Fetcher>>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote(remote: impl Fetcher + 'static) -> Self {
        Self {
            remote: Some(Arc::new(remote)),
        }
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{url}: {e}")))?;

        if parsed.scheme() != "file" {
            return match self.remote {
                Some(ref remote) => remote.fetch(url).await,
                None => Err(ScanError::transport(
                    url,
                    format!("cannot fetch '{}' URLs from a local source", parsed.scheme()),
                )),
            };
        }

        let path = parsed
            .to_file_path()
            .map_err(|_| ScanError::transport(url, "not a local file path"))?;

        debug!("Reading {}", path.display());
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| ScanError::transport(url, format!("cannot read {}: {e}", path.display())))?;

        debug!("Read {} ({} bytes)", path.display(), body.len());
        Ok(body)
    }
}

/// `file://` URL for a sitemap on disk. Relative paths start at the working directory.
pub fn file_url(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path)
        .map_err(|e| ScanError::InvalidUrl(format!("{}: {e}", path.display())))?;
    Url::from_file_path(&absolute)
        .map(|url| url.to_string())
        .map_err(|_| ScanError::InvalidUrl(path.display().to_string()))
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else if err.is_redirect() {
        format!("too many redirects: {err}")
    } else {
        err.to_string()
    }
}
