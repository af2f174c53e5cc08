use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced by the market-data client and the store operations built on it
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Rate limit exceeded. Please wait {} seconds", .wait_ms.div_ceil(1000))]
    RateLimitExceeded { wait_ms: u64 },

    #[error("Unauthorized: invalid or missing API key")]
    Unauthorized,

    #[error("Rate limit exceeded by the market data provider")]
    RateLimited,

    #[error("Forbidden: API access denied")]
    Forbidden,

    #[error("Endpoint not found")]
    NotFound,

    #[error("Market data server error, please try again later")]
    ServerError,

    #[error("API error {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("{0}")]
    Validation(String),

    #[error("Token not found: {0}")]
    UnknownToken(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map a non-success HTTP status to its error kind
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            429 => ApiError::RateLimited,
            403 => ApiError::Forbidden,
            404 => ApiError::NotFound,
            500 => ApiError::ServerError,
            code => ApiError::Http {
                status: code,
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// Failures of the key-value persistence backends
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Serde(#[from] serde_json::Error),
}
