//! # Error Types
//!
//! Three failure families surface from the client:
//!
//! - [`ConfigError`]: the provider configuration cannot back a client. Raised
//!   at construction time, never from a request.
//! - [`TransportError`]: the HTTP exchange failed (bad status, timeout,
//!   connection or body read failure).
//! - [`ChatError::Cancelled`]: the caller's cancellation token fired.
//!
//! Malformed stream lines are not errors at all; the frame decoder drops them.

use thiserror::Error;

/// Configuration problems detected while loading or validating provider data.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("AI service is disabled; set use_ai=1 and use_platform in the config file")]
    Disabled,
    #[error("AI endpoint not found for the active platform; check url_<platform> in the config file")]
    MissingEndpoint,
    #[error("Invalid AI endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("AI credential not found for the active platform; check token_<platform> in the config file")]
    MissingCredential,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the underlying HTTP exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Request timeout - backend service did not respond in time")]
    Timeout,
    #[error("Connection failed - unable to reach backend service: {0}")]
    Connection(String),
    #[error("Failed to read response body: {0}")]
    Body(String),
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
    #[error("Transport worker stopped before completing the request")]
    WorkerLost,
}

impl TransportError {
    /// Status code carried by a non-success response, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    /// Classify reqwest failures so both transports report identical error
    /// variants.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else if err.is_builder() {
            TransportError::Client(err.to_string())
        } else {
            TransportError::Connection(err.to_string())
        }
    }
}

/// Error returned by every public client operation.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Request cancelled")]
    Cancelled,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChatError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChatError::Cancelled)
    }

    /// HTTP status of a failed response, when the failure was a bad status.
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::Transport(err) => err.status(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(TransportError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_exposed() {
        let err = ChatError::from(TransportError::Status {
            status: 503,
            body: "overloaded".to_string(),
        });
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_cancelled());
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_cancelled_has_no_status() {
        let err = ChatError::Cancelled;
        assert!(err.is_cancelled());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_config_error_converts() {
        let err: ChatError = ConfigError::Disabled.into();
        assert!(matches!(err, ChatError::Config(ConfigError::Disabled)));
    }
}
