//! # Chat Client
//!
//! One client owns one transport for its whole life and runs at most one
//! request at a time; the request methods take `&mut self`, so overlapping
//! requests on a single client do not compile. Use one client per
//! concurrent conversation.
//!
//! Fragment callbacks passed to [`ChatClient::start_streaming`] always run on
//! the task awaiting the call, whichever transport is in use. With the
//! callback transport the HTTP completion callback and the body reads happen
//! on a worker thread, and the chunks are handed back to the caller's task
//! for decoding.

use crate::core::http_client::{HttpClientBuilder, HttpClientConfig, DEFAULT_TIMEOUT};
use crate::error::{ChatError, ConfigError, TransportError};
use crate::provider::ProviderConfig;
use crate::request::RequestBuilder;
use crate::schemas::Message;
use crate::streaming::{read_stream, Accumulator, DecodeOutcome, DeltaSink, ForwardDeltas};
use crate::transport::{Transport, TransportKind, TransportRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};
use url::Url;
use uuid::Uuid;

/// Per-client settings that do not come from the provider file.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub transport: TransportKind,
    /// Overall request deadline, body included.
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientOptions {
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Check that `config` can back a client.
pub fn validate_config(config: &ProviderConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Err(ConfigError::Disabled);
    }

    let endpoint = config.endpoint.trim();
    if endpoint.is_empty() {
        return Err(ConfigError::MissingEndpoint);
    }

    let url = Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
        url: endpoint.to_string(),
        reason: e.to_string(),
    })?;
    if !["http", "https"].contains(&url.scheme()) {
        return Err(ConfigError::InvalidEndpoint {
            url: endpoint.to_string(),
            reason: format!("unsupported scheme '{}'; only http and https are allowed", url.scheme()),
        });
    }
    if url.host().is_none() {
        return Err(ConfigError::InvalidEndpoint {
            url: endpoint.to_string(),
            reason: "missing host".to_string(),
        });
    }

    if config.credential.is_empty() {
        return Err(ConfigError::MissingCredential);
    }

    Ok(())
}

/// Endpoint reduced to scheme and host, for logs.
pub fn safe_endpoint(endpoint: &str) -> String {
    match Url::parse(endpoint) {
        Ok(url) => format!("{}://{}", url.scheme(), url.host_str().unwrap_or("unknown")),
        Err(_) => "invalid-url".to_string(),
    }
}

pub struct ChatClient {
    config: Arc<ProviderConfig>,
    requests: RequestBuilder,
    transport: Option<Box<dyn Transport>>,
}

impl ChatClient {
    /// Create a client, failing fast if the configuration is unusable.
    pub fn new(config: Arc<ProviderConfig>, options: ClientOptions) -> Result<Self, ChatError> {
        validate_config(&config)?;

        let http = HttpClientBuilder::from_config(HttpClientConfig {
            timeout: options.timeout,
            connect_timeout: options.connect_timeout,
            ..Default::default()
        })
        .bearer(config.credential.clone());

        let transport = options.transport.build(http)?;

        info!(
            transport = transport.name(),
            endpoint = %safe_endpoint(&config.endpoint),
            timeout_secs = options.timeout.as_secs(),
            "Chat client ready"
        );

        Ok(Self::assemble(config, transport))
    }

    /// Create a client around a caller-provided transport.
    pub fn with_transport(config: Arc<ProviderConfig>, transport: Box<dyn Transport>) -> Result<Self, ChatError> {
        validate_config(&config)?;
        Ok(Self::assemble(config, transport))
    }

    fn assemble(config: Arc<ProviderConfig>, transport: Box<dyn Transport>) -> Self {
        Self {
            requests: RequestBuilder::new(config.clone()),
            config,
            transport: Some(transport),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn transport_name(&self) -> Option<&'static str> {
        self.transport.as_ref().map(|t| t.name())
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    /// Send `messages` and return the whole reply once the stream ends.
    pub async fn get_all(
        &mut self,
        messages: &[Message],
        cancel: Option<&CancellationToken>,
    ) -> Result<String, ChatError> {
        let mut acc = Accumulator::new();
        self.run(messages, &mut acc, cancel).await?;
        Ok(acc.into_string())
    }

    /// Send `messages` and hand each content delta to `on_fragment` as it
    /// is decoded.
    pub async fn start_streaming<F>(
        &mut self,
        messages: &[Message],
        on_fragment: F,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), ChatError>
    where
        F: FnMut(&str),
    {
        let mut sink = ForwardDeltas(on_fragment);
        self.run(messages, &mut sink, cancel).await?;
        Ok(())
    }

    async fn run<S: DeltaSink + ?Sized>(
        &mut self,
        messages: &[Message],
        sink: &mut S,
        cancel: Option<&CancellationToken>,
    ) -> Result<DecodeOutcome, ChatError> {
        let transport = self
            .transport
            .as_deref()
            .ok_or_else(|| TransportError::Client("client has been closed".to_string()))?;
        let cancel = cancel.cloned().unwrap_or_else(CancellationToken::new);

        let payload = self.requests.build(messages, true);
        let request = TransportRequest {
            endpoint: self.config.endpoint.clone(),
            body: payload.to_bytes()?,
        };

        let span = tracing::info_span!(
            "chat_request",
            request_id = %Uuid::new_v4(),
            transport = transport.name(),
            messages = messages.len(),
        );

        async move {
            let started = Instant::now();
            let response = transport.send(request, &cancel).await?;
            debug!(status = response.status, "Response head received");

            let outcome = read_stream(response.chunks, &cancel, sink).await?;
            debug!(
                outcome = ?outcome,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Chat request finished"
            );
            Ok::<_, ChatError>(outcome)
        }
        .instrument(span)
        .await
    }

    /// Release the transport. Safe to call more than once; only the first
    /// call does anything.
    pub fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.shutdown();
            debug!(transport = transport.name(), "Chat client closed");
        }
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.close();
    }
}
