//! Library error type

use thiserror::Error;

/// Errors raised while fetching, decoding or rendering blog content
#[derive(Debug, Error)]
pub enum BlogError {
    /// Transport or HTTP status failure talking to the content API
    #[error("content API request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The content API answered with a payload we could not decode
    #[error("failed to decode content API response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The content API answered with something we cannot use
    #[error("content API error: {0}")]
    Api(String),

    /// The configured API endpoint is not a URL
    #[error("invalid API endpoint '{0}'")]
    InvalidEndpoint(String),

    /// No document of the given type carries this uid
    #[error("no {doc_type} found for slug '{uid}'")]
    NotFound { doc_type: String, uid: String },

    /// A document came back without the uid we index posts by
    #[error("document {0} has no uid")]
    MissingUid(String),

    /// A pagination cursor we refuse to follow
    #[error("invalid pagination cursor '{0}'")]
    InvalidCursor(String),

    /// A slug that cannot be used as a path segment
    #[error("invalid slug '{0}'")]
    InvalidSlug(String),

    /// Input that does not parse as a date
    #[error("invalid date '{0}'")]
    InvalidDate(String),

    /// Locale name chrono has no month/day names for
    #[error("unknown locale '{0}'")]
    UnknownLocale(String),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("configuration error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BlogError {
    /// Whether this error means the requested post does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlogError::NotFound { .. })
    }
}

pub type Result<T, E = BlogError> = std::result::Result<T, E>;
