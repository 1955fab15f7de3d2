//! # nexus_chat_stream - Streaming Chat-Completion Client
//!
//! A client for OpenAI-style chat-completion endpoints that stream their
//! reply as newline-delimited `data: <json>` events (or bare JSON lines).
//!
//! ## Features
//!
//! - **Two interchangeable transports**: an async read loop on reqwest, and a
//!   callback-driven request/response API with synchronous body reads on a
//!   worker thread
//! - **Chunk-boundary independent decoding**: lines split across reads,
//!   several lines per read, a trailing partial line, split UTF-8
//! - **Whole-result or streaming delivery** of content deltas
//! - **Cooperative cancellation** with `tokio_util::sync::CancellationToken`
//! - **Property-file provider configuration** with typed extra body fields
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nexus_chat_stream::{ChatClient, ClientOptions, Message, ProviderConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(ProviderConfig::load("ai_config.txt")?);
//!     let mut client = ChatClient::new(config, ClientOptions::default())?;
//!
//!     let reply = client.get_all(&[Message::user("hi")], None).await?;
//!     println!("{}", reply);
//!
//!     client
//!         .start_streaming(&[Message::user("tell me a story")], |delta| print!("{}", delta), None)
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`provider`] - property file parsing and typed provider settings
//! - [`config`] - runtime options (transport, timeouts, logging)
//! - [`request`] - request body construction
//! - [`transport`] - the transport contract and both realizations
//! - [`streaming`] - frame decoder and stream reader
//! - [`client`] - client lifecycle
//! - [`error`] - error taxonomy

pub mod core;
pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod request;
pub mod schemas;
pub mod streaming;
pub mod transport;

// Re-export commonly used types for convenience
pub use client::{ChatClient, ClientOptions};
pub use config::Config;
pub use error::{ChatError, ConfigError, TransportError};
pub use provider::{classify, NumberKind, ProviderConfig, TypedValue};
pub use request::{RequestBuilder, RequestPayload};
pub use schemas::Message;
pub use streaming::{DecodeOutcome, FrameDecoder, StreamEvent};
pub use transport::{Transport, TransportKind};
pub use self::core::http_client::{HttpClientBuilder, HttpClientConfig};
pub use tokio_util::sync::CancellationToken;

/// The result type used throughout the library
pub type Result<T> = std::result::Result<T, ChatError>;
