pub mod error;
pub mod fetch;
pub mod parser;
pub mod record;
pub mod resolver;

pub use error::{ErrorKind, ParseError, ScanError};
pub use fetch::{FileFetcher, Fetcher, HttpFetcher, file_url};
pub use parser::{parse, parse_lastmod};
pub use record::{BranchFailure, PageRecord, ResolvedSitemap, SitemapDocument};
pub use resolver::{FailurePolicy, ProgressCallback, ResolveEvent, ResolveOptions, SitemapResolver};
