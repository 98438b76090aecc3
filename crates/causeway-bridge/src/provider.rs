//! StreamProvider — the registration surface the OS-integration layer
//! talks to.
//!
//! Maps opaque handle tokens to stream identities and opens read
//! sessions in one of the two delivery modes. Mode selection: random
//! access whenever the declared size is known and the platform supports
//! it, pipe streaming otherwise. The chunk-fetch machinery underneath
//! is shared — both modes go through the same gate, pending call, and
//! channel.

use std::io::Read;
use std::sync::Arc;

use dashmap::DashMap;

use causeway_core::config::TransferConfig;
use causeway_core::stream::handle_token;
use causeway_core::{BridgeError, HandleToken, StreamIdentity};

use crate::channel::ChunkChannel;
use crate::dispatch::DispatchGate;
use crate::random_access::{RandomAccessBridge, RandomAccessFile};
use crate::sequential::{SequentialTransfer, TransferHandle};

/// A readable handle for the consumer, in whichever delivery mode the
/// stream supports.
pub enum ReadHandle {
    /// Seekable handle with a known size.
    RandomAccess(RandomAccessFile),
    /// Read end of a local pipe fed by a background transfer. EOF on
    /// success; a failed transfer shows up as truncation.
    Pipe {
        reader: std::io::PipeReader,
        transfer: TransferHandle,
    },
}

impl std::fmt::Debug for ReadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadHandle::RandomAccess(_) => f.write_str("ReadHandle::RandomAccess"),
            ReadHandle::Pipe { .. } => f.write_str("ReadHandle::Pipe"),
        }
    }
}

impl ReadHandle {
    /// Declared size, when the handle supports random access.
    pub fn size(&self) -> Option<u64> {
        match self {
            ReadHandle::RandomAccess(file) => Some(file.size()),
            ReadHandle::Pipe { .. } => None,
        }
    }
}

impl Read for ReadHandle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            ReadHandle::RandomAccess(file) => file.read(buf),
            ReadHandle::Pipe { reader, .. } => reader.read(buf),
        }
    }
}

/// Process-wide provider pairing one dispatch gate with one channel.
/// Sessions opened through it are independent: a failure in one never
/// aborts another.
pub struct StreamProvider {
    gate: Arc<DispatchGate>,
    channel: Arc<dyn ChunkChannel>,
    config: TransferConfig,
    registry: DashMap<HandleToken, StreamIdentity>,
}

impl StreamProvider {
    pub fn new(
        gate: Arc<DispatchGate>,
        channel: Arc<dyn ChunkChannel>,
        config: TransferConfig,
    ) -> Self {
        Self {
            gate,
            channel,
            config,
            registry: DashMap::new(),
        }
    }

    /// Register a stream for later opening. Returns its stable token;
    /// registering the same identity twice yields the same token.
    pub fn register(&self, identity: StreamIdentity) -> HandleToken {
        let token = handle_token(&identity);
        tracing::debug!(
            token = hex::encode(&token[..8]),
            path = %identity.path,
            size = identity.size,
            "stream registered"
        );
        self.registry.insert(token, identity);
        token
    }

    pub fn unregister(&self, token: &HandleToken) -> bool {
        self.registry.remove(token).is_some()
    }

    /// Openable metadata for a registered stream: identity carries the
    /// display name and declared size.
    pub fn metadata(&self, token: &HandleToken) -> Option<StreamIdentity> {
        self.registry.get(token).map(|entry| entry.clone())
    }

    /// Open a read session for a registered stream.
    pub fn open(&self, token: &HandleToken) -> Result<ReadHandle, BridgeError> {
        let identity = self
            .registry
            .get(token)
            .map(|entry| entry.clone())
            .ok_or(BridgeError::Unregistered)?;

        match identity.size {
            Some(size) if !self.config.force_sequential => {
                tracing::debug!(path = %identity.path, size, "opening random-access session");
                let bridge = RandomAccessBridge::new(
                    identity.path,
                    size,
                    Arc::clone(&self.gate),
                    Arc::clone(&self.channel),
                    self.config.request_timeout(),
                );
                Ok(ReadHandle::RandomAccess(RandomAccessFile::new(Arc::new(
                    bridge,
                ))))
            }
            _ => {
                tracing::debug!(
                    path = %identity.path,
                    size_known = identity.size.is_some(),
                    "opening pipe session"
                );
                let (reader, writer) = std::io::pipe().map_err(BridgeError::Sink)?;
                let transfer = SequentialTransfer::new(
                    identity.path,
                    self.config.chunk_size,
                    Arc::clone(&self.gate),
                    Arc::clone(&self.channel),
                    self.config.request_timeout(),
                );
                let transfer = transfer.start(writer).map_err(BridgeError::Sink)?;
                Ok(ReadHandle::Pipe { reader, transfer })
            }
        }
    }
}
