//! Global error types for the Stream Demo client.
//!
//! All error categories across the workspace are unified into a single
//! `SdError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using SdError.
pub type SdResult<T> = Result<T, SdError>;

/// Unified error type covering all error categories in the client.
#[derive(Error, Debug)]
pub enum SdError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Real-time channel errors --
    /// The transport could not be established.
    #[error("transport open failed: {0}")]
    TransportOpen(String),

    /// The channel closed without a caller request.
    #[error("connection closed unexpectedly (code {code:?}): {reason}")]
    UnexpectedClose {
        /// Close code reported by the peer, if any.
        code: Option<u16>,
        /// Close reason reported by the peer.
        reason: String,
    },

    /// Every automatic reconnection attempt has been spent.
    #[error("reconnection budget exhausted after {attempts} attempt(s)")]
    RetryBudgetExhausted {
        /// Number of retries that were attempted.
        attempts: u32,
    },

    /// An inbound frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A send was attempted while the channel was not open.
    #[error("cannot send while {0}")]
    SendWhileClosed(String),

    /// The session actor is gone.
    #[error("session disconnected")]
    Disconnected,

    // -- Network errors --
    /// HTTP request failed.
    #[error("http error: {0}")]
    Http(String),

    /// HTTP request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Server returned an error response.
    #[error("server error (status {status}): {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Error message from server.
        message: String,
    },

    /// The response envelope reported a failure.
    #[error("api error: {0}")]
    Api(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SdError {
    /// Whether the reconnection policy may recover from this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SdError::TransportOpen(_)
                | SdError::UnexpectedClose { .. }
                | SdError::Decode(_)
                | SdError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for SdError {
    fn from(e: serde_json::Error) -> Self {
        SdError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for SdError {
    fn from(e: toml::de::Error) -> Self {
        SdError::Config(e.to_string())
    }
}

impl From<url::ParseError> for SdError {
    fn from(e: url::ParseError) -> Self {
        SdError::Config(format!("invalid url: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sd_error_display() {
        let err = SdError::Config("bad value".to_string());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn test_realtime_error_display() {
        let err = SdError::RetryBudgetExhausted { attempts: 5 };
        assert_eq!(
            err.to_string(),
            "reconnection budget exhausted after 5 attempt(s)"
        );

        let err = SdError::SendWhileClosed("closed_clean".into());
        assert_eq!(err.to_string(), "cannot send while closed_clean");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(SdError::TransportOpen("refused".into()).is_recoverable());
        assert!(SdError::UnexpectedClose {
            code: Some(1006),
            reason: String::new()
        }
        .is_recoverable());
        assert!(!SdError::RetryBudgetExhausted { attempts: 5 }.is_recoverable());
        assert!(!SdError::SendWhileClosed("idle".into()).is_recoverable());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: SdError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, SdError::Serialization(_)));
    }
}
