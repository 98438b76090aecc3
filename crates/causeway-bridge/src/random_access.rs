//! Random-access delivery: pull-based reads of a fixed-size virtual
//! file backed by on-demand chunk fetches.

use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use causeway_core::{BridgeError, ChunkRequest, ChunkResult};

use crate::channel::ChunkChannel;
use crate::dispatch::DispatchGate;
use crate::pending::PendingCall;

/// One random-access session over a stream with a declared size.
///
/// `read_at` may be called from arbitrary threads, concurrently.
/// Concurrent calls are serialized, not pipelined: the backing channel
/// answers one in-flight request per logical file, so a second caller
/// blocks until the first resolves. Deliberate simplification, not a
/// performance feature.
pub struct RandomAccessBridge {
    path: String,
    size: u64,
    gate: Arc<DispatchGate>,
    channel: Arc<dyn ChunkChannel>,
    timeout: Option<Duration>,
    /// Serialization lock: held for exactly one request+wait. An
    /// abandoned wait (timeout) drops the guard, so later reads are
    /// never permanently stuck behind a dead call.
    in_flight: Mutex<()>,
}

impl RandomAccessBridge {
    pub fn new(
        path: impl Into<String>,
        size: u64,
        gate: Arc<DispatchGate>,
        channel: Arc<dyn ChunkChannel>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            gate,
            channel,
            timeout,
            in_flight: Mutex::new(()),
        }
    }

    /// Declared size, fixed at construction.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read up to `buf.len()` bytes at `offset`. Returns the number of
    /// bytes copied; may be short if the source returned fewer bytes —
    /// the caller re-requests the remainder, standard file semantics.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, BridgeError> {
        if buf.is_empty() || offset >= self.size {
            // Past the declared end: EOF without a channel round trip.
            return Ok(0);
        }
        let length = (buf.len() as u64)
            .min(self.size - offset)
            .min(u32::MAX as u64) as u32;

        let guard = self
            .in_flight
            .lock()
            .unwrap_or_else(|p| p.into_inner());

        let request = ChunkRequest {
            path: self.path.clone(),
            offset,
            length,
        };
        tracing::trace!(path = %self.path, offset, length, "random-access fetch");
        let (call, completion) = PendingCall::new(request.clone());
        let channel = Arc::clone(&self.channel);
        self.gate.submit(move || channel.request(request, completion))?;
        let result = call.wait(self.timeout);
        drop(guard);

        match result? {
            ChunkResult::Data(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            ChunkResult::EndOfStream => Err(BridgeError::Protocol(format!(
                "end of stream at offset {} but declared size is {}",
                offset, self.size
            ))),
            ChunkResult::Failure(fault) => Err(BridgeError::Channel {
                path: self.path.clone(),
                offset,
                fault,
            }),
        }
    }
}

/// The standard readable handle over a [`RandomAccessBridge`]: a
/// cursor plus `Read + Seek`, which is what the registration layer
/// hands to a random-access-capable consumer.
pub struct RandomAccessFile {
    bridge: Arc<RandomAccessBridge>,
    cursor: u64,
}

impl RandomAccessFile {
    pub fn new(bridge: Arc<RandomAccessBridge>) -> Self {
        Self { bridge, cursor: 0 }
    }

    pub fn size(&self) -> u64 {
        self.bridge.size()
    }
}

impl Read for RandomAccessFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.bridge.read_at(self.cursor, buf)?;
        self.cursor += n as u64;
        Ok(n)
    }
}

impl Seek for RandomAccessFile {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(d) => self.bridge.size().checked_add_signed(d),
            SeekFrom::Current(d) => self.cursor.checked_add_signed(d),
        };
        match target {
            Some(n) => {
                // Seeking past EOF is allowed; reads there return 0.
                self.cursor = n;
                Ok(n)
            }
            None => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek before byte 0",
            )),
        }
    }
}
