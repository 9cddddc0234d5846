//! Per-request transport abstraction.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use maplink_obex::HeaderSet;

use crate::error::{Error, Result};

/// One GET or PUT as seen by the request handler.
///
/// The transport assembles the request headers and, for PUT, the full
/// request body before the handler runs. Response headers must be set
/// before the first body chunk is written.
pub trait Operation: Send {
    /// Headers of the request.
    fn request_headers(&self) -> &HeaderSet;

    /// Assembled request body; empty for GET.
    fn request_body(&self) -> &[u8];

    /// Largest body chunk the transport can send at once.
    fn max_body_chunk(&self) -> usize;

    /// Sets the headers sent with the first response packet.
    fn set_response_headers(&mut self, headers: HeaderSet);

    /// Sends one body chunk.
    fn write_body(&mut self, chunk: &[u8]) -> impl Future<Output = Result<()>> + Send;
}

/// An operation that collects the response in memory.
///
/// Used to drive a handler without a transport, and in tests.
#[derive(Debug, Clone)]
pub struct BufferedOperation {
    headers: HeaderSet,
    body: Vec<u8>,
    max_chunk: usize,
    response_headers: HeaderSet,
    written: Vec<u8>,
    chunks: usize,
    abort_after: Option<(usize, Arc<AtomicBool>)>,
    fail_after: Option<usize>,
}

impl BufferedOperation {
    /// Creates an operation with the given request headers.
    #[must_use]
    pub fn new(headers: HeaderSet) -> Self {
        Self {
            headers,
            body: Vec::new(),
            max_chunk: 4096,
            response_headers: HeaderSet::new(),
            written: Vec::new(),
            chunks: 0,
            abort_after: None,
            fail_after: None,
        }
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the chunk size.
    #[must_use]
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk.max(1);
        self
    }

    /// Raises `flag` once `chunks` body chunks have been written.
    #[must_use]
    pub fn abort_after(mut self, chunks: usize, flag: Arc<AtomicBool>) -> Self {
        self.abort_after = Some((chunks, flag));
        self
    }

    /// Fails the write of chunk number `chunks` (zero-based).
    #[must_use]
    pub const fn fail_after(mut self, chunks: usize) -> Self {
        self.fail_after = Some(chunks);
        self
    }

    /// Headers set by the handler.
    #[must_use]
    pub const fn response_headers(&self) -> &HeaderSet {
        &self.response_headers
    }

    /// Body bytes written by the handler.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Number of body chunks written.
    #[must_use]
    pub const fn chunks(&self) -> usize {
        self.chunks
    }
}

impl Operation for BufferedOperation {
    fn request_headers(&self) -> &HeaderSet {
        &self.headers
    }

    fn request_body(&self) -> &[u8] {
        &self.body
    }

    fn max_body_chunk(&self) -> usize {
        self.max_chunk
    }

    fn set_response_headers(&mut self, headers: HeaderSet) {
        self.response_headers = headers;
    }

    async fn write_body(&mut self, chunk: &[u8]) -> Result<()> {
        if self.fail_after == Some(self.chunks) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "peer went away",
            )));
        }
        self.written.extend_from_slice(chunk);
        self.chunks += 1;
        if let Some((after, flag)) = &self.abort_after {
            if self.chunks >= *after {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}
