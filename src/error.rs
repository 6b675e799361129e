/// Crate result type
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors raised while listing, fetching or storing images
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} for URL: {url}")]
    Status { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No embedded image payload for id '{0}'")]
    NoPayload(String),

    #[error("Invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Invalid path component: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FetchError {
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
