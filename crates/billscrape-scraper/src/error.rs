use thiserror::Error;

/// Failures from the login-page token flow. Fatal for a batch when they occur
/// before the first fetch; mid-batch they end only the affected fetch chain.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("HTTP error fetching login page: {0}")]
    Http(#[from] reqwest::Error),

    #[error("login page returned HTTP {status}")]
    UnexpectedStatus { status: u16 },

    #[error("token marker not found in login page")]
    MarkerNotFound,

    #[error("embedded token blob is not valid JSON: {0}")]
    InvalidBlob(#[source] serde_json::Error),

    #[error("embedded token blob has no access_token field")]
    MissingAccessToken,

    #[error(transparent)]
    Cache(#[from] ScraperError),
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token cache I/O error at {path}: {source}")]
    TokenCacheIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error for {context}: {source}")]
    Serialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
