//! Sequential delivery: push-based streaming into a local byte sink.
//!
//! For consumers that cannot be offered random access (no declared
//! size, or the platform lacks random-access virtual files). The loop
//! runs on its own worker thread, so a stalled chunk fetch never blocks
//! the consumer's reads from the other end of the pipe, and a blocking
//! sink write never blocks the dispatch context.
//!
//! Each fetch is issued only after the previous chunk is fully written:
//! writes hit the sink strictly in increasing-offset order, with no
//! gaps or overlaps, and at most one chunk is buffered at a time. The
//! original callback-chasing formulation (read → callback → next read)
//! is an explicit loop here, so cancellation is one flag check per
//! iteration and the call stack stays flat.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use causeway_core::{BridgeError, ChunkRequest, ChunkResult};

use crate::channel::ChunkChannel;
use crate::dispatch::DispatchGate;
use crate::pending::PendingCall;

pub struct SequentialTransfer {
    path: String,
    chunk_size: u32,
    gate: Arc<DispatchGate>,
    channel: Arc<dyn ChunkChannel>,
    timeout: Option<Duration>,
}

/// Control handle for a running transfer. Dropping it detaches the
/// worker; the transfer still terminates on EOF, failure, or the
/// reader closing its end of the pipe.
pub struct TransferHandle {
    cancel: Arc<AtomicBool>,
    worker: thread::JoinHandle<Result<u64, BridgeError>>,
}

impl TransferHandle {
    /// Request termination. Observed between iterations; the sink is
    /// closed without flushing whatever the channel still had for us.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Wait for the loop to finish. Returns total bytes written to the
    /// sink, or the terminal failure.
    pub fn join(self) -> Result<u64, BridgeError> {
        self.worker
            .join()
            .unwrap_or_else(|_| Err(BridgeError::Protocol("transfer worker panicked".into())))
    }
}

impl SequentialTransfer {
    pub fn new(
        path: impl Into<String>,
        chunk_size: u32,
        gate: Arc<DispatchGate>,
        channel: Arc<dyn ChunkChannel>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            path: path.into(),
            chunk_size,
            gate,
            channel,
            timeout,
        }
    }

    /// Spawn the transfer loop on a dedicated worker thread. The sink
    /// is owned exclusively by the loop from here until termination.
    pub fn start<W>(self, sink: W) -> std::io::Result<TransferHandle>
    where
        W: Write + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let worker = thread::Builder::new()
            .name("causeway-transfer".into())
            .spawn(move || self.run(sink, flag))?;
        Ok(TransferHandle { cancel, worker })
    }

    fn run<W: Write>(self, mut sink: W, cancel: Arc<AtomicBool>) -> Result<u64, BridgeError> {
        let mut cursor: u64 = 0;
        loop {
            if cancel.load(Ordering::Relaxed) {
                tracing::debug!(path = %self.path, bytes = cursor, "transfer canceled");
                // Dropping the sink closes it; no flush on this path.
                return Ok(cursor);
            }

            let request = ChunkRequest {
                path: self.path.clone(),
                offset: cursor,
                length: self.chunk_size,
            };
            let (call, completion) = PendingCall::new(request.clone());
            let channel = Arc::clone(&self.channel);
            // Blocking submit: the request is on the dispatch context
            // before we park on the pending call, so iteration N+1 can
            // never overtake iteration N.
            self.gate
                .submit_blocking(move || channel.request(request, completion))?;

            match call.wait(self.timeout)? {
                ChunkResult::Data(chunk) => {
                    sink.write_all(&chunk).map_err(|e| {
                        tracing::warn!(path = %self.path, offset = cursor, error = %e,
                            "sink rejected chunk, terminating transfer");
                        BridgeError::Sink(e)
                    })?;
                    tracing::trace!(path = %self.path, offset = cursor, len = chunk.len(),
                        "chunk written");
                    cursor += chunk.len() as u64;
                }
                ChunkResult::EndOfStream => {
                    sink.flush().map_err(BridgeError::Sink)?;
                    tracing::debug!(path = %self.path, bytes = cursor, "transfer complete");
                    return Ok(cursor);
                }
                ChunkResult::Failure(fault) => {
                    tracing::warn!(path = %self.path, offset = cursor, fault = %fault,
                        "channel failed, closing sink unflushed");
                    return Err(BridgeError::Channel {
                        path: self.path.clone(),
                        offset: cursor,
                        fault,
                    });
                }
            }
        }
    }
}
