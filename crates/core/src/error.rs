//! Error types for the Agora domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Prompt selection and assembly never fail, so the only bounded context with
//! its own error enum is the upstream provider.

use thiserror::Error;

/// The top-level error type for Agora operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Server I/O ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the upstream completion call.
///
/// Every variant is an "upstream error" from the caller's point of view: the
/// gateway logs the detail and reports a static message to the client.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned an empty completion")]
    EmptyResponse,
}

impl ProviderError {
    /// Map a transport error from the HTTP client into a provider error.
    pub fn from_transport(err: impl std::fmt::Display, timed_out: bool) -> Self {
        if timed_out {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 502,
            message: "Bad gateway".into(),
        });
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("Bad gateway"));
    }

    #[test]
    fn io_errors_convert() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("port taken"));
    }

    #[test]
    fn transport_errors_split_on_timeout() {
        assert!(matches!(
            ProviderError::from_transport("deadline elapsed", true),
            ProviderError::Timeout(_)
        ));
        assert!(matches!(
            ProviderError::from_transport("connection refused", false),
            ProviderError::Network(_)
        ));
    }

    #[test]
    fn empty_response_has_readable_message() {
        assert_eq!(
            ProviderError::EmptyResponse.to_string(),
            "Provider returned an empty completion"
        );
    }
}
