//! causeway-bridge — the Streaming Read Bridge.
//!
//! Exposes files living inside a remote, asynchronous data source as
//! ordinary readable handles. The consumer reads synchronously from
//! arbitrary threads; the source only answers async "read chunk at
//! offset" requests, and only from one designated dispatch context.
//! This crate is the bridge between those two worlds:
//!
//! - [`dispatch::DispatchGate`] gets a request onto the dispatch
//!   context no matter which thread asked.
//! - [`pending::PendingCall`] lets a foreign thread block for exactly
//!   one asynchronously delivered result.
//! - [`random_access::RandomAccessBridge`] serves arbitrary-offset
//!   reads of a stream with a known size.
//! - [`sequential::SequentialTransfer`] pumps a stream in order into a
//!   local sink for consumers without random access.
//! - [`provider::StreamProvider`] ties it together behind handle
//!   tokens and picks the delivery mode per stream.

pub mod channel;
pub mod dispatch;
pub mod pending;
pub mod provider;
pub mod random_access;
pub mod sequential;

pub use channel::{ChunkChannel, ChunkFuture, FutureChannel};
pub use dispatch::DispatchGate;
pub use pending::{Completion, Delivery, PendingCall};
pub use provider::{ReadHandle, StreamProvider};
pub use random_access::{RandomAccessBridge, RandomAccessFile};
pub use sequential::{SequentialTransfer, TransferHandle};
