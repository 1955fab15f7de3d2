//! # HTTP Client Factory
//!
//! Centralized HTTP client creation so that both transports send identical
//! headers, pool connections the same way and apply the same total timeout.

use crate::error::TransportError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use thiserror::Error;

/// Overall request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// HTTP client configuration errors
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("Failed to build HTTP client: {0}")]
    BuildError(#[from] reqwest::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<HttpClientError> for TransportError {
    fn from(err: HttpClientError) -> Self {
        TransportError::Client(err.to_string())
    }
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Whole-request deadline, body reads included.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
            max_idle_per_host: 2,
        }
    }
}

/// HTTP client builder with configurable options
#[derive(Debug, Clone)]
pub struct HttpClientBuilder {
    config: HttpClientConfig,
    credential: Option<String>,
}

impl HttpClientBuilder {
    /// Create a new HTTP client builder with default configuration
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
            credential: None,
        }
    }

    pub fn from_config(config: HttpClientConfig) -> Self {
        Self {
            config,
            credential: None,
        }
    }

    /// Set request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Send `Authorization: Bearer <credential>` on every request.
    pub fn bearer(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Headers attached to every request: bearer auth and JSON content type.
    pub fn default_headers(&self) -> Result<HeaderMap, HttpClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(credential) = &self.credential {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", credential))
                .map_err(|e| HttpClientError::InvalidConfig(format!("credential is not a valid header value: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// Build the async client. `timeout` is a total deadline covering the
    /// response head and every body read.
    pub fn build(&self) -> Result<reqwest::Client, HttpClientError> {
        reqwest::Client::builder()
            .timeout(self.config.timeout)
            .connect_timeout(self.config.connect_timeout)
            .pool_max_idle_per_host(self.config.max_idle_per_host)
            .default_headers(self.default_headers()?)
            .build()
            .map_err(HttpClientError::from)
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
