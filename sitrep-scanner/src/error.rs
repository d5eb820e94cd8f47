use thiserror::Error;

/// Errors raised while parsing a single sitemap document.
///
/// The parser does not know where the bytes came from; the resolver lifts
/// these into [`ScanError`] together with the document URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("malformed document at {url}: {reason}")]
    MalformedDocument { url: String, reason: String },

    #[error("malformed record in {url}: {reason}")]
    MalformedRecord { url: String, reason: String },

    #[error("sitemap cycle detected at {url}")]
    CycleDetected { url: String },

    #[error("sitemap index nesting exceeds {max_depth} levels at {url}")]
    DepthExceeded { url: String, max_depth: usize },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("resolution cancelled")]
    Cancelled,

    #[error("Other error: {0}")]
    Other(String),
}

/// Coarse classification of a [`ScanError`], used in reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    MalformedDocument,
    MalformedRecord,
    CycleDetected,
    DepthExceeded,
    InvalidUrl,
    Cancelled,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::MalformedDocument => "malformed_document",
            ErrorKind::MalformedRecord => "malformed_record",
            ErrorKind::CycleDetected => "cycle_detected",
            ErrorKind::DepthExceeded => "depth_exceeded",
            ErrorKind::InvalidUrl => "invalid_url",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Other => "other",
        }
    }
}

impl ScanError {
    pub fn transport(url: &str, reason: impl Into<String>) -> Self {
        ScanError::Transport {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Attach the document URL to a parser error.
    pub fn from_parse(url: &str, err: ParseError) -> Self {
        match err {
            ParseError::MalformedDocument(reason) => ScanError::MalformedDocument {
                url: url.to_string(),
                reason,
            },
            ParseError::MalformedRecord(reason) => ScanError::MalformedRecord {
                url: url.to_string(),
                reason,
            },
        }
    }

    /// URL of the document that triggered the error, when there is one.
    pub fn url(&self) -> Option<&str> {
        match self {
            ScanError::Transport { url, .. }
            | ScanError::MalformedDocument { url, .. }
            | ScanError::MalformedRecord { url, .. }
            | ScanError::CycleDetected { url }
            | ScanError::DepthExceeded { url, .. } => Some(url),
            ScanError::InvalidUrl(url) => Some(url),
            ScanError::Cancelled | ScanError::Other(_) => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::Transport { .. } => ErrorKind::Transport,
            ScanError::MalformedDocument { .. } => ErrorKind::MalformedDocument,
            ScanError::MalformedRecord { .. } => ErrorKind::MalformedRecord,
            ScanError::CycleDetected { .. } => ErrorKind::CycleDetected,
            ScanError::DepthExceeded { .. } => ErrorKind::DepthExceeded,
            ScanError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            ScanError::Cancelled => ErrorKind::Cancelled,
            ScanError::Other(_) => ErrorKind::Other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
