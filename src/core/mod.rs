//! Shared infrastructure used by the transports.

pub mod http_client;
