use thiserror::Error;

/// Application-wide error types for forage.
///
/// The taxonomy is closed: every failure a collector or store can surface
/// is either transient (worth retrying) or permanent (retrying cannot
/// help). Anything the classifier does not recognize is treated as
/// permanent, so unknown failures are never hidden behind retries.
#[derive(Error, Debug)]
pub enum AppError {
    /// Network/connection error (remote outage, reset, refused).
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Non-success HTTP status from an upstream source.
    #[error("HTTP {status_code} for {url}")]
    HttpStatus { status_code: u16, url: String },

    /// Transport-level HTTP failure surfaced by a collaborator library
    /// as a bare message.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Authentication/authorization failure.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Invalid input or unusable content.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or malformed configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Content extraction failed.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

/// HTTP status codes that indicate a transient upstream condition.
const RETRYABLE_STATUS: &[u16] = &[429, 503, 504];

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    ///
    /// Unclassified errors default to `false`: retrying a real bug only
    /// delays its discovery.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Network(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::HttpStatus { status_code, .. } => RETRYABLE_STATUS.contains(status_code),
            AppError::HttpError(msg) => {
                // Well-known transient transport failures raised by
                // collaborator libraries rather than this taxonomy.
                let msg = msg.to_ascii_lowercase();
                msg.contains("timeout")
                    || msg.contains("connect")
                    || msg.contains("reset")
                    || msg.contains("refused")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(AppError::Network("connection reset".into()).is_retryable());
        assert!(AppError::Timeout(30).is_retryable());
        assert!(AppError::RateLimitExceeded.is_retryable());
    }

    #[test]
    fn permanent_errors_are_not_retryable() {
        assert!(!AppError::Authentication("bad token".into()).is_retryable());
        assert!(!AppError::Validation("empty page".into()).is_retryable());
        assert!(!AppError::Config("missing setting".into()).is_retryable());
        assert!(!AppError::Extraction("no article body".into()).is_retryable());
        assert!(!AppError::Database("disk full".into()).is_retryable());
    }

    #[test]
    fn http_status_classification() {
        for code in [429u16, 503, 504] {
            assert!(
                AppError::HttpStatus {
                    status_code: code,
                    url: "https://example.com".into(),
                }
                .is_retryable(),
                "status {code} should be retryable"
            );
        }
        for code in [400u16, 401, 403, 404, 410, 500, 501, 502] {
            assert!(
                !AppError::HttpStatus {
                    status_code: code,
                    url: "https://example.com".into(),
                }
                .is_retryable(),
                "status {code} should be permanent"
            );
        }
    }

    #[test]
    fn transport_message_sniffing() {
        assert!(AppError::HttpError("read timeout".into()).is_retryable());
        assert!(AppError::HttpError("Connection refused".into()).is_retryable());
        assert!(AppError::HttpError("connection reset by peer".into()).is_retryable());
        assert!(!AppError::HttpError("certificate invalid".into()).is_retryable());
    }

    #[test]
    fn unknown_errors_default_to_permanent() {
        assert!(!AppError::Generic("something odd".into()).is_retryable());
    }
}
