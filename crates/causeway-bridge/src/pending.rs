//! One-shot synchronization between a blocking caller and an
//! asynchronously delivered chunk result.
//!
//! A raw single-permit semaphore cannot tell a legitimate completion
//! from a double one. This slot can: exactly one writer wins, a second
//! write is rejected as a protocol violation, and a write after the
//! waiter gave up is discarded (the remote call cannot be canceled once
//! in flight — only its result can be ignored).

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use causeway_core::{BridgeError, ChunkRequest, ChunkResult};

enum Slot {
    Empty,
    Ready(ChunkResult),
    Taken,
    Abandoned,
    /// Every completion handle was dropped before answering — the
    /// dispatch context or the transport discarded the call. The
    /// waiter observes this as `DispatchUnavailable` instead of
    /// parking forever on a latch nobody can release.
    Orphaned,
}

struct CallState {
    slot: Mutex<Slot>,
    ready: Condvar,
}

/// What happened to a result handed to [`Completion::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// First completion — the waiter will observe this value.
    Delivered,
    /// The waiter abandoned the call (timeout); value dropped quietly.
    Discarded,
    /// The call already resolved. Protocol violation, value dropped.
    Rejected,
}

/// Waiter half. Blocks an arbitrary thread until the channel answers.
pub struct PendingCall {
    request: ChunkRequest,
    state: Arc<CallState>,
}

/// Writer half, handed to the chunk channel. Cloneable because channel
/// implementations route it through callbacks; at most one clone may
/// ever complete successfully.
///
/// When the last clone is dropped without answering (a shut-down gate
/// drops its runtime, taking every in-flight fetch future with it),
/// the waiter is woken with a failure rather than left parked.
#[derive(Clone)]
pub struct Completion {
    state: Arc<CallState>,
    _guard: Arc<CompletionGuard>,
}

/// Shared by all clones of one [`Completion`]; fires when the last
/// clone goes away.
struct CompletionGuard {
    state: Arc<CallState>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let mut slot = lock_slot(&self.state);
        if matches!(*slot, Slot::Empty) {
            tracing::warn!("chunk call dropped unanswered, waking waiter");
            *slot = Slot::Orphaned;
            self.state.ready.notify_one();
        }
    }
}

fn lock_slot(state: &CallState) -> MutexGuard<'_, Slot> {
    // A poisoned slot means a panicked waiter or completer; the state
    // machine itself is still coherent.
    state.slot.lock().unwrap_or_else(|p| p.into_inner())
}

impl PendingCall {
    pub fn new(request: ChunkRequest) -> (PendingCall, Completion) {
        let state = Arc::new(CallState {
            slot: Mutex::new(Slot::Empty),
            ready: Condvar::new(),
        });
        (
            PendingCall {
                request,
                state: Arc::clone(&state),
            },
            Completion {
                state: Arc::clone(&state),
                _guard: Arc::new(CompletionGuard { state }),
            },
        )
    }

    pub fn request(&self) -> &ChunkRequest {
        &self.request
    }

    /// Block until the channel answers, or until `timeout` expires.
    ///
    /// Exactly one result is observed per call. On timeout the slot is
    /// marked abandoned so a late completion is discarded rather than
    /// delivered to nobody. If every completion handle is dropped
    /// before answering, the wait fails with `DispatchUnavailable`
    /// instead of parking forever.
    pub fn wait(self, timeout: Option<Duration>) -> Result<ChunkResult, BridgeError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut slot = lock_slot(&self.state);
        loop {
            match std::mem::replace(&mut *slot, Slot::Taken) {
                Slot::Ready(result) => return Ok(result),
                Slot::Empty => *slot = Slot::Empty,
                Slot::Orphaned => return Err(BridgeError::DispatchUnavailable),
                // wait() consumes self and is the only reader, so
                // neither of these can be observed here.
                other => {
                    *slot = other;
                    return Err(BridgeError::Protocol(
                        "pending call waited on twice".into(),
                    ));
                }
            }
            slot = match deadline {
                None => self
                    .state
                    .ready
                    .wait(slot)
                    .unwrap_or_else(|p| p.into_inner()),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        *slot = Slot::Abandoned;
                        return Err(BridgeError::Timeout {
                            path: self.request.path.clone(),
                            offset: self.request.offset,
                        });
                    }
                    let (guard, _) = self
                        .state
                        .ready
                        .wait_timeout(slot, deadline - now)
                        .unwrap_or_else(|p| p.into_inner());
                    guard
                }
            };
        }
    }
}

impl Completion {
    /// Deliver the channel's answer. First write wins and releases the
    /// waiter; anything else is dropped (see [`Delivery`]).
    pub fn complete(&self, result: ChunkResult) -> Delivery {
        let mut slot = lock_slot(&self.state);
        match *slot {
            Slot::Empty => {
                *slot = Slot::Ready(result);
                self.state.ready.notify_one();
                Delivery::Delivered
            }
            // Orphaned is unobservable while a completion is alive;
            // the arm only keeps the match exhaustive.
            Slot::Abandoned | Slot::Orphaned => {
                tracing::debug!("late completion for abandoned call discarded");
                Delivery::Discarded
            }
            Slot::Ready(_) | Slot::Taken => {
                tracing::warn!(
                    "second completion for an already-resolved call rejected — \
                     channel violated its at-most-one-response contract"
                );
                Delivery::Rejected
            }
        }
    }
}
