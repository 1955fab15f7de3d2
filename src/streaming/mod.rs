//! # Streaming Module
//!
//! Turns an arbitrarily chunked response body into content deltas.
//!
//! ## Key Features:
//! - Line reassembly across chunk boundaries, including split UTF-8 sequences
//! - `data: `-prefixed event lines and raw JSON lines
//! - Two content shapes (`delta.content` and `message.content`)
//! - Idempotent completion on `{"completed": true}`
//! - Cooperative cancellation between chunk reads

pub mod core;
pub mod reader;

pub use self::core::{
    decode_line, Accumulator, DecoderState, DeltaSink, ForwardDeltas, FrameDecoder, StreamEvent,
};
pub use reader::{read_stream, DecodeOutcome};
