//! # Callback Transport
//!
//! Request/response API in the completion-callback style: [`CallbackTransport::begin_post`]
//! starts the request on a dedicated worker thread and returns a
//! [`PendingRequest`] handle immediately; when the response head arrives the
//! completion callback is invoked *on that worker thread* with a
//! [`CallbackResponse`], whose body is read synchronously through
//! [`std::io::Read`].
//!
//! The transport owns one pooled reqwest client and a one-worker I/O runtime
//! for its lifetime. The network future is driven on that runtime and
//! raced against the request's abort token, so aborting drops the in-flight
//! request (waiting for the head or mid-body) and closes its connection.
//!
//! The [`Transport`] impl builds on this: its completion callback forwards the
//! status through a oneshot and body chunks through a bounded channel, and
//! `send` races the oneshot against the caller's cancellation token.

use super::{truncate_error_body, ChunkStream, Transport, TransportRequest, TransportResponse};
use crate::core::http_client::HttpClientBuilder;
use crate::error::{ChatError, TransportError};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::io::{self, Read};
use std::sync::Mutex;
use std::thread::JoinHandle;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Size of each synchronous body read.
const READ_BUFFER_SIZE: usize = 4096;

/// Body chunks the worker may queue ahead of the decoder.
const CHUNK_QUEUE_DEPTH: usize = 16;

type BodyStream = BoxStream<'static, io::Result<Bytes>>;

/// Response head plus a blocking body reader.
///
/// Reads block the worker thread. The body ends early (reads return `0`)
/// once the request is aborted.
pub struct CallbackResponse {
    status: StatusCode,
    body: SyncIoBridge<StreamReader<BodyStream, Bytes>>,
}

impl CallbackResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Read the remaining body as lossy UTF-8.
    pub fn text(mut self) -> Result<String, TransportError> {
        let mut raw = Vec::new();
        self.body.read_to_end(&mut raw).map_err(io_to_transport)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

impl Read for CallbackResponse {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

impl fmt::Debug for CallbackResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Completion callback: runs on the worker thread with the response (or the
/// failure) and the abort token of the request.
pub type Completion =
    Box<dyn FnOnce(Result<CallbackResponse, TransportError>, &CancellationToken) + Send + 'static>;

/// Box a closure as a [`Completion`].
pub fn completion<F>(f: F) -> Completion
where
    F: FnOnce(Result<CallbackResponse, TransportError>, &CancellationToken) + Send + 'static,
{
    Box::new(f)
}

/// Handle to a request started with [`CallbackTransport::begin_post`].
///
/// Dropping the handle aborts the request.
#[derive(Debug)]
pub struct PendingRequest {
    abort: CancellationToken,
    worker: JoinHandle<()>,
}

impl PendingRequest {
    /// Abort the request. Idempotent.
    pub fn abort(&self) {
        self.abort.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// True once the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.abort.cancel();
    }
}

/// Client and runtime held for the transport's lifetime.
struct IoContext {
    client: Client,
    runtime: Runtime,
}

pub struct CallbackTransport {
    io: Mutex<Option<IoContext>>,
    /// Parent of every request's abort token.
    shutdown: CancellationToken,
}

impl CallbackTransport {
    pub fn new(http: HttpClientBuilder) -> Result<Self, TransportError> {
        let client = http.build()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("nnchat-io")
            .enable_all()
            .build()
            .map_err(|e| TransportError::Client(format!("failed to start I/O runtime: {}", e)))?;

        Ok(Self {
            io: Mutex::new(Some(IoContext { client, runtime })),
            shutdown: CancellationToken::new(),
        })
    }

    /// Start a POST on a worker thread; `on_complete` runs there once the
    /// response head is available or the request failed.
    ///
    /// The callback is not invoked if the request was aborted first.
    pub fn begin_post(
        &self,
        request: TransportRequest,
        on_complete: Completion,
    ) -> Result<PendingRequest, TransportError> {
        let (client, handle) = {
            let io = self
                .io
                .lock()
                .map_err(|_| TransportError::Client("I/O context lock poisoned".to_string()))?;
            let io = io
                .as_ref()
                .ok_or_else(|| TransportError::Client("transport has been shut down".to_string()))?;
            (io.client.clone(), io.runtime.handle().clone())
        };

        let abort = self.shutdown.child_token();
        let worker_abort = abort.clone();

        let worker = std::thread::Builder::new()
            .name("nnchat-callback".to_string())
            .spawn(move || match execute(&client, &handle, request, &worker_abort) {
                Some(outcome) => on_complete(outcome, &worker_abort),
                None => debug!(transport = "callback", "Request aborted before completion callback"),
            })
            .map_err(|e| TransportError::Client(format!("failed to spawn transport worker: {}", e)))?;

        Ok(PendingRequest { abort, worker })
    }
}

/// Send the request and wait for the head. `None` means aborted; the request
/// future has been dropped and its connection closed.
fn execute(
    client: &Client,
    handle: &Handle,
    request: TransportRequest,
    abort: &CancellationToken,
) -> Option<Result<CallbackResponse, TransportError>> {
    let TransportRequest { endpoint, body: payload } = request;

    // Built inside the runtime: reqwest arms its total timeout here.
    let response = handle.block_on(async move {
        let pending = client.post(&endpoint).body(payload).send();
        tokio::select! {
            biased;
            _ = abort.cancelled() => None,
            result = pending => Some(result),
        }
    })?;

    let response = match response {
        Ok(response) => response,
        Err(err) => return Some(Err(err.into())),
    };

    let status = response.status();
    let body: BodyStream = response
        .bytes_stream()
        .map_err(body_error)
        .take_until(abort.clone().cancelled_owned())
        .boxed();

    Some(Ok(CallbackResponse {
        status,
        body: SyncIoBridge::new_with_handle(StreamReader::new(body), handle.clone()),
    }))
}

fn body_error(err: reqwest::Error) -> io::Error {
    let kind = if err.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    io::Error::new(kind, err)
}

fn io_to_transport(err: io::Error) -> TransportError {
    if err.kind() == io::ErrorKind::TimedOut {
        return TransportError::Timeout;
    }
    match err.get_ref().and_then(|inner| inner.downcast_ref::<reqwest::Error>()) {
        Some(inner) if inner.is_timeout() => TransportError::Timeout,
        _ => TransportError::Body(err.to_string()),
    }
}

/// Completion callback used by [`Transport::send`]: reports the head, then
/// pumps the body into the chunk channel until EOF, error, abort, or the
/// receiver going away.
fn forward_response(
    outcome: Result<CallbackResponse, TransportError>,
    abort: &CancellationToken,
    head: oneshot::Sender<Result<u16, TransportError>>,
    chunks: mpsc::Sender<Result<Bytes, TransportError>>,
) {
    let mut response = match outcome {
        Ok(response) => response,
        Err(err) => {
            let _ = head.send(Err(err));
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        let _ = head.send(Err(TransportError::Status {
            status: status.as_u16(),
            body: truncate_error_body(body),
        }));
        return;
    }

    if head.send(Ok(status.as_u16())).is_err() {
        return;
    }

    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        if abort.is_cancelled() {
            debug!(transport = "callback", "Body read aborted");
            return;
        }
        match response.read(&mut buf) {
            Ok(0) => {
                trace!(transport = "callback", aborted = abort.is_cancelled(), "Body ended");
                return;
            }
            Ok(n) => {
                // Blocks while the queue is full, so a slow consumer holds
                // back further reads.
                if chunks.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                    return;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                let _ = chunks.blocking_send(Err(io_to_transport(err)));
                return;
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for CallbackTransport {
    fn name(&self) -> &'static str {
        "callback"
    }

    async fn send(
        &self,
        request: TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse, ChatError> {
        if cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }

        let (head_tx, head_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_QUEUE_DEPTH);

        let pending = self.begin_post(
            request,
            completion(move |outcome, abort| forward_response(outcome, abort, head_tx, chunk_tx)),
        )?;

        let head = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                pending.abort();
                debug!(transport = self.name(), "Request cancelled before response head");
                return Err(ChatError::Cancelled);
            }
            head = head_rx => head,
        };

        let status = match head {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => {
                return Err(if pending.is_aborted() {
                    ChatError::Cancelled
                } else {
                    TransportError::WorkerLost.into()
                })
            }
        };

        // The stream owns the pending request; dropping it aborts the worker.
        let chunks: ChunkStream = ReceiverStream::new(chunk_rx)
            .map(move |chunk| {
                let _held = &pending;
                chunk
            })
            .boxed();

        Ok(TransportResponse { status, chunks })
    }

    fn shutdown(&self) {
        self.shutdown.cancel();

        let io = match self.io.lock() {
            Ok(mut io) => io.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(IoContext { client, runtime }) = io {
            drop(client);
            // Safe from async code; closes pooled and in-flight connections.
            runtime.shutdown_background();
            debug!(transport = "callback", "Released HTTP client and I/O runtime");
        }
    }
}

impl Drop for CallbackTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}
