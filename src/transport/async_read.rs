//! # Async Read Transport
//!
//! Sends the request with reqwest's async client and exposes the body as
//! `bytes_stream()`. Cancellation drops the in-flight request future, which
//! closes the connection.

use super::{truncate_error_body, ChunkStream, Transport, TransportRequest, TransportResponse};
use crate::core::http_client::HttpClientBuilder;
use crate::error::{ChatError, TransportError};
use futures_util::{StreamExt, TryStreamExt};
use reqwest::Client;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct AsyncReadTransport {
    client: Mutex<Option<Client>>,
}

impl AsyncReadTransport {
    pub fn new(http: HttpClientBuilder) -> Result<Self, TransportError> {
        let client = http.build()?;
        Ok(Self {
            client: Mutex::new(Some(client)),
        })
    }

    fn client(&self) -> Result<Client, TransportError> {
        self.client
            .lock()
            .map_err(|_| TransportError::Client("client lock poisoned".to_string()))?
            .clone()
            .ok_or_else(|| TransportError::Client("transport has been shut down".to_string()))
    }
}

#[async_trait::async_trait]
impl Transport for AsyncReadTransport {
    fn name(&self) -> &'static str {
        "async"
    }

    async fn send(
        &self,
        request: TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse, ChatError> {
        if cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }

        let client = self.client()?;
        let pending = client.post(&request.endpoint).body(request.body).send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(transport = self.name(), "Request cancelled before response head");
                return Err(ChatError::Cancelled);
            }
            result = pending => result.map_err(TransportError::from)?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ChatError::Cancelled),
                text = response.text() => text.unwrap_or_default(),
            };
            debug!(transport = self.name(), status = status.as_u16(), "Backend returned error status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate_error_body(body),
            }
            .into());
        }

        let chunks: ChunkStream = response.bytes_stream().map_err(TransportError::from).boxed();

        Ok(TransportResponse {
            status: status.as_u16(),
            chunks,
        })
    }

    fn shutdown(&self) {
        if let Ok(mut client) = self.client.lock() {
            if client.take().is_some() {
                debug!(transport = "async", "Released HTTP client");
            }
        }
    }
}
