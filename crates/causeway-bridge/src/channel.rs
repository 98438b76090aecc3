//! The chunk channel boundary.
//!
//! Everything on the far side of [`ChunkChannel`] is somebody else's
//! problem: how a chunk is produced, retried, or transported is not
//! defined here. The bridge only relies on the contract below.

use bytes::Bytes;
use futures::future::BoxFuture;

use causeway_core::{ChannelFault, ChunkRequest, ChunkResult};

use crate::pending::Completion;

/// Asynchronous request/response channel to the remote data source.
///
/// Contract:
/// - `request` is only ever invoked from the dispatch context (the
///   [`crate::dispatch::DispatchGate`] guarantees this).
/// - The implementation answers at most once per request, from any
///   thread, by resolving `completion` with a chunk (possibly shorter
///   than asked for; empty means end-of-stream) or a fault.
/// - A second resolution is rejected by the completion itself; the
///   channel does not need to guard against it, but a well-behaved
///   transport never does it.
pub trait ChunkChannel: Send + Sync {
    fn request(&self, request: ChunkRequest, completion: Completion);
}

/// Future returned by an async transport for one chunk fetch.
pub type ChunkFuture = BoxFuture<'static, Result<Bytes, ChannelFault>>;

/// Adapter plugging an async transport into the callback-shaped
/// [`ChunkChannel`] contract.
///
/// The fetch closure is invoked on the dispatch context; the returned
/// future is spawned on `run_on` and resolves the completion when it
/// finishes. Pass [`crate::dispatch::DispatchGate::runtime`] to drive
/// fetches on the dispatch context's own event loop — in that case the
/// waiter must not be the dispatch thread, which designed callers
/// (consumer threads, the transfer worker) never are.
pub struct FutureChannel<F> {
    run_on: tokio::runtime::Handle,
    fetch: F,
}

impl<F> FutureChannel<F>
where
    F: Fn(ChunkRequest) -> ChunkFuture + Send + Sync,
{
    pub fn new(run_on: tokio::runtime::Handle, fetch: F) -> Self {
        Self { run_on, fetch }
    }
}

impl<F> ChunkChannel for FutureChannel<F>
where
    F: Fn(ChunkRequest) -> ChunkFuture + Send + Sync,
{
    fn request(&self, request: ChunkRequest, completion: Completion) {
        let path = request.path.clone();
        let offset = request.offset;
        let fut = (self.fetch)(request);
        self.run_on.spawn(async move {
            let result = match fut.await {
                Ok(chunk) => ChunkResult::from_chunk(chunk),
                Err(fault) => {
                    tracing::warn!(path = %path, offset, fault = %fault, "chunk fetch failed");
                    ChunkResult::Failure(fault)
                }
            };
            completion.complete(result);
        });
    }
}
