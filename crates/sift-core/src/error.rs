use thiserror::Error;

/// Application-wide error types for Sift.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a page).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// A URL could not be parsed or joined.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Oracle API call failed.
    #[error("Oracle error (HTTP {status_code}): {message}")]
    OracleError {
        message: String,
        status_code: u16,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// The oracle answered, but not with what was asked for.
    #[error("Malformed oracle response: {0}")]
    MalformedResponse(String),

    /// A rule set lacks a container rule or any data field rule.
    #[error("Unusable rule set: {0}")]
    UnusableRules(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Tabular export failed.
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Returns true if the page itself could not be obtained.
    ///
    /// Fatal for a session when it happens on the initial page.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_)
                | AppError::NetworkError(_)
                | AppError::Timeout(_)
                | AppError::InvalidUrl(_)
        )
    }

    /// Returns true if an oracle call failed or returned unusable data.
    pub fn is_oracle_failure(&self) -> bool {
        matches!(
            self,
            AppError::OracleError { .. }
                | AppError::RateLimitExceeded
                | AppError::MalformedResponse(_)
                | AppError::UnusableRules(_)
        )
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::CsvError(err.to_string())
    }
}
