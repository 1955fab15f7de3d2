//! # Stream Reader
//!
//! Pumps a transport's chunk stream through a [`FrameDecoder`], checking the
//! cancellation token before every read.

use super::core::{DecoderState, DeltaSink, FrameDecoder};
use crate::error::ChatError;
use crate::transport::ChunkStream;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How a successfully read stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A `{"completed": true}` frame was seen.
    Completed,
    /// The body ended without a completion frame.
    Exhausted,
}

/// Decode `chunks` into `sink` until completion, end of body, error or
/// cancellation.
///
/// Cancellation wins over a chunk that is ready at the same time, so a
/// cancelled read never reports success. The stream is dropped on every exit
/// path, which releases the underlying connection.
pub async fn read_stream<S: DeltaSink + ?Sized>(
    mut chunks: ChunkStream,
    cancel: &CancellationToken,
    sink: &mut S,
) -> Result<DecodeOutcome, ChatError> {
    let mut decoder = FrameDecoder::new();
    let mut bytes_read = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(bytes_read, "Stream read cancelled");
                return Err(ChatError::Cancelled);
            }
            next = chunks.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                bytes_read += chunk.len();
                if decoder.feed(&chunk, sink) == DecoderState::Completed {
                    let stats = decoder.stats();
                    debug!(bytes_read, lines = stats.lines, deltas = stats.deltas, "Stream completed");
                    return Ok(DecodeOutcome::Completed);
                }
            }
            Some(Err(err)) => {
                debug!(bytes_read, error = %err, "Stream read failed");
                return Err(err.into());
            }
            None => break,
        }
    }

    let outcome = match decoder.finish(sink) {
        DecoderState::Completed => DecodeOutcome::Completed,
        _ => DecodeOutcome::Exhausted,
    };
    let stats = decoder.stats();
    debug!(
        bytes_read,
        lines = stats.lines,
        deltas = stats.deltas,
        unparsable = stats.unparsable,
        "Stream exhausted"
    );
    Ok(outcome)
}
