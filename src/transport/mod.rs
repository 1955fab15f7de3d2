//! # Transports
//!
//! A transport sends one JSON request and hands back the response body as a
//! stream of byte chunks. Two realizations share the [`Transport`] contract:
//!
//! - [`AsyncReadTransport`]: reqwest's async client, body read with a
//!   non-blocking read loop.
//! - [`CallbackTransport`]: a callback-driven request/response API. The
//!   completion callback runs on a worker thread and reads the body
//!   synchronously.
//!
//! Both attach bearer auth and a JSON content type, apply the same total
//! timeout to head and body, report non-success statuses as
//! [`TransportError::Status`](crate::error::TransportError::Status) without
//! reading the body as a stream, and return
//! [`ChatError::Cancelled`](crate::error::ChatError::Cancelled) when the
//! cancellation token fires before the response head arrives. Chunk
//! boundaries are arbitrary.

pub mod async_read;
pub mod callback;

pub use async_read::AsyncReadTransport;
pub use callback::CallbackTransport;

use crate::core::http_client::HttpClientBuilder;
use crate::error::{ChatError, TransportError};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use std::fmt;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

/// Response body as it arrives off the wire.
pub type ChunkStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// One request handed to a transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub endpoint: String,
    /// Serialized JSON body.
    pub body: Vec<u8>,
}

/// A successful response head plus its body stream.
pub struct TransportResponse {
    pub status: u16,
    pub chunks: ChunkStream,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Send a request, stream back the body, honour cancellation.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &'static str;

    async fn send(
        &self,
        request: TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse, ChatError>;

    /// Release pooled connections and abort anything still running.
    /// Called exactly once by the owning client.
    fn shutdown(&self) {}
}

/// Which transport a client is constructed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportKind {
    #[default]
    AsyncRead,
    Callback,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::AsyncRead => "async",
            TransportKind::Callback => "callback",
        }
    }

    /// Construct the selected transport.
    pub fn build(self, http: HttpClientBuilder) -> Result<Box<dyn Transport>, TransportError> {
        Ok(match self {
            TransportKind::AsyncRead => Box::new(AsyncReadTransport::new(http)?),
            TransportKind::Callback => Box::new(CallbackTransport::new(http)?),
        })
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "async" | "async-read" | "asyncread" => Ok(TransportKind::AsyncRead),
            "callback" | "legacy" => Ok(TransportKind::Callback),
            other => Err(format!(
                "Invalid transport '{}'. Valid options are: async, callback",
                other
            )),
        }
    }
}

/// Read at most this many bytes of an error body for diagnostics.
pub(crate) const ERROR_BODY_LIMIT: usize = 2048;

pub(crate) fn truncate_error_body(mut body: String) -> String {
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_parsing() {
        assert_eq!("async".parse::<TransportKind>(), Ok(TransportKind::AsyncRead));
        assert_eq!("Callback".parse::<TransportKind>(), Ok(TransportKind::Callback));
        assert_eq!("legacy".parse::<TransportKind>(), Ok(TransportKind::Callback));
        assert!("carrier-pigeon".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_transport_kind_display_roundtrips() {
        for kind in [TransportKind::AsyncRead, TransportKind::Callback] {
            assert_eq!(kind.to_string().parse::<TransportKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_error_body_truncation_respects_char_boundary() {
        let body = "é".repeat(ERROR_BODY_LIMIT);
        let truncated = truncate_error_body(body);
        assert!(truncated.len() <= ERROR_BODY_LIMIT);
        assert!(truncated.chars().all(|c| c == 'é'));
    }
}
