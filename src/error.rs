//! Error types for the orderbook-feed crate.
//!
//! Transport failures (socket, framing, serialization) are the only errors
//! that leave the core. Protocol oddities such as duplicate subscriptions or
//! malformed price levels are absorbed where they occur and never surface
//! here.

use thiserror::Error;

/// The main error type for this crate
#[derive(Debug, Error)]
pub enum Error {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Socket-level I/O error (bind, accept)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration (missing fields, bad format)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The duplex channel is gone (peer closed or local half dropped)
    #[error("connection closed")]
    ConnectionClosed,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,
}

impl Error {
    /// Whether this error means the peer is unreachable over the current
    /// channel. Such errors end the affected subscription or session; they
    /// are never retried.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::WebSocket(_) | Error::Io(_) | Error::ConnectionClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = Error::Config("bad interval".to_string());
        assert!(err.to_string().contains("bad interval"));
    }

    #[test]
    fn test_transport_classification() {
        assert!(Error::ConnectionClosed.is_transport());
        assert!(!Error::Timeout.is_transport());
        assert!(!Error::Config(String::new()).is_transport());
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: Result<u32, _> = serde_json::from_str("not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().starts_with("JSON error"));
    }
}
