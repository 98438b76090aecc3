//! Error taxonomy for the bridge.
//!
//! Failures are local to one session: a read error or sink error is
//! reported to that session's caller and never aborts other sessions or
//! the dispatch context. No retries happen at this layer.

use crate::stream::ChannelFault;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The dispatch context cannot accept work (shut down). Fatal for
    /// the in-flight call; surfaced, never swallowed.
    #[error("dispatch context unavailable")]
    DispatchUnavailable,

    /// The channel reported an error for one specific request.
    #[error("channel failure for {path} at offset {offset}: {fault}")]
    Channel {
        path: String,
        offset: u64,
        fault: ChannelFault,
    },

    /// The channel broke its contract: a second completion for a call
    /// that already resolved, or end-of-stream before the declared size
    /// was reached.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The local write sink rejected data (reader gone, disk full).
    #[error("sink failure: {0}")]
    Sink(#[source] std::io::Error),

    /// Bounded wait expired. The call is abandoned; a late completion
    /// is discarded.
    #[error("timed out waiting for chunk of {path} at offset {offset}")]
    Timeout { path: String, offset: u64 },

    /// `open()` was handed a token nobody registered.
    #[error("no stream registered for this handle token")]
    Unregistered,
}

impl From<BridgeError> for std::io::Error {
    fn from(err: BridgeError) -> Self {
        use std::io::ErrorKind;
        let kind = match &err {
            BridgeError::DispatchUnavailable => ErrorKind::BrokenPipe,
            BridgeError::Channel { .. } => ErrorKind::Other,
            BridgeError::Protocol(_) => ErrorKind::InvalidData,
            BridgeError::Sink(e) => e.kind(),
            BridgeError::Timeout { .. } => ErrorKind::TimedOut,
            BridgeError::Unregistered => ErrorKind::NotFound,
        };
        std::io::Error::new(kind, err)
    }
}
