use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use url::Url;

/// Extension assumed for paths whose last segment has none
pub const DEFAULT_EXTENSION: &str = "html";
/// Second folder placeholder for paths shallower than three segments
pub const NO_FOLDER: &str = "none";
/// Suffix of the pseudo folder given to files that sit directly under the root
pub const BARE_FILE_SUFFIX: &str = "-Dateiendung";

/// Structural metadata derived from a page URL and its lastmod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlFacets {
    pub year: Option<i32>,
    pub file_extension: String,
    pub first_folder: String,
    pub second_folder: String,
    pub domain: String,
}

/// Derive the facets of a URL.
///
/// Only the path takes part in folder and extension detection; query strings
/// and fragments are ignored. An unparseable URL yields an empty domain and is
/// segmented on a best-effort basis.
pub fn extract(url: &str, lastmod: Option<&NaiveDateTime>) -> UrlFacets {
    let parsed = Url::parse(url).ok();

    let domain = parsed.as_ref().map(authority).unwrap_or_default();
    let path = match parsed {
        Some(ref u) => u.path().to_string(),
        None => fallback_path(url),
    };

    let file_extension = file_extension(&path);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let first_folder = if segments.len() > 1 {
        segments[0].to_string()
    } else {
        format!("{file_extension}{BARE_FILE_SUFFIX}")
    };

    let second_folder = if segments.len() > 2 {
        segments[1].to_string()
    } else {
        NO_FOLDER.to_string()
    };

    UrlFacets {
        year: lastmod.map(|t| t.year()),
        file_extension,
        first_folder,
        second_folder,
        domain,
    }
}

/// Lower-cased extension of the last path segment, `html` when there is none.
///
/// A leading dot (`/.well-known`) does not start an extension and a trailing
/// dot yields no extension.
pub fn file_extension(path: &str) -> String {
    let last = path.rsplit('/').next().unwrap_or_default();
    match last.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < last.len() => last[idx + 1..].to_lowercase(),
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

fn authority(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

fn fallback_path(raw: &str) -> String {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let raw = &raw[..end];
    match raw.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| rest[i..].to_string()).unwrap_or_default(),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension_edge_cases() {
        assert_eq!(file_extension("/a/b.PDF"), "pdf");
        assert_eq!(file_extension("/.well-known"), "html");
        assert_eq!(file_extension("/file."), "html");
        assert_eq!(file_extension("/archive.tar.gz"), "gz");
        assert_eq!(file_extension("/v1.2/"), "html");
        assert_eq!(file_extension(""), "html");
    }

    #[test]
    fn test_fallback_path() {
        assert_eq!(fallback_path("blog/post.html?x=1"), "blog/post.html");
        assert_eq!(fallback_path("weird://host/a/b#frag"), "/a/b");
        assert_eq!(fallback_path("weird://host"), "");
    }
}
