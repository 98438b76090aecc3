//! DispatchGate — marshals work onto the single dispatch context.
//!
//! The backing chunk channel may only be invoked from one execution
//! context. That is a scheduling constraint, not a mutual-exclusion
//! constraint, so it is modeled as a single-consumer work queue owned
//! by a dedicated thread rather than as a lock. The thread runs a
//! current-thread tokio runtime so channel implementations backed by
//! async transports have somewhere to drive their futures
//! (see [`crate::channel::FutureChannel`]).
//!
//! A caller that already is the dispatch context runs its job inline.
//! Without that fast path, a blocking submit issued from within the
//! dispatch context would wait on the very queue it needs to drain.

use std::sync::Mutex;
use std::thread::{self, JoinHandle, ThreadId};

use causeway_core::BridgeError;
use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct DispatchGate {
    jobs: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    runtime: tokio::runtime::Handle,
    thread_id: ThreadId,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DispatchGate {
    /// Spawn the dispatch thread. Process-wide: one gate outlives any
    /// number of bridge sessions.
    pub fn new() -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();

        let worker = thread::Builder::new()
            .name("causeway-dispatch".into())
            .spawn(move || {
                runtime.block_on(async move {
                    while let Some(job) = rx.recv().await {
                        job();
                    }
                });
                tracing::debug!("dispatch context stopped");
            })?;
        let thread_id = worker.thread().id();

        Ok(Self {
            jobs: Mutex::new(Some(tx)),
            runtime: handle,
            thread_id,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Handle to the dispatch context's runtime, for channel adapters
    /// that need to spawn futures.
    pub fn runtime(&self) -> tokio::runtime::Handle {
        self.runtime.clone()
    }

    pub fn is_dispatch_context(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    fn sender(&self) -> Result<mpsc::UnboundedSender<Job>, BridgeError> {
        self.jobs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or(BridgeError::DispatchUnavailable)
    }

    /// Run `job` on the dispatch context. Inline if already there;
    /// otherwise returns once the job is queued (fire-and-forget).
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), BridgeError> {
        if self.is_dispatch_context() {
            job();
            return Ok(());
        }
        self.sender()?
            .send(Box::new(job))
            .map_err(|_| BridgeError::DispatchUnavailable)
    }

    /// Run `job` on the dispatch context and wait until it has run.
    /// For callers that need submission ordering, e.g. the sequential
    /// transfer loop. Must not be combined with holding the dispatch
    /// context hostage: the inline fast path covers the on-context case.
    pub fn submit_blocking(&self, job: impl FnOnce() + Send + 'static) -> Result<(), BridgeError> {
        if self.is_dispatch_context() {
            job();
            return Ok(());
        }
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        self.sender()?
            .send(Box::new(move || {
                job();
                let _ = done_tx.send(());
            }))
            .map_err(|_| BridgeError::DispatchUnavailable)?;
        done_rx
            .recv()
            .map_err(|_| BridgeError::DispatchUnavailable)
    }

    /// Close the queue and join the dispatch thread. Queued jobs drain
    /// first; later submits fail with `DispatchUnavailable` instead of
    /// hanging.
    pub fn shutdown(&self) {
        self.jobs.lock().unwrap_or_else(|p| p.into_inner()).take();
        if !self.is_dispatch_context() {
            let worker = self.worker.lock().unwrap_or_else(|p| p.into_inner()).take();
            if let Some(worker) = worker {
                let _ = worker.join();
            }
        }
    }
}

impl Drop for DispatchGate {
    fn drop(&mut self) {
        self.shutdown();
    }
}
