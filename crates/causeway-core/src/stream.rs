//! Stream types — the vocabulary shared by every Causeway component.

use bytes::Bytes;

/// What a registered stream IS: where it lives on the remote side and,
/// when known, how many bytes it holds.
///
/// `size == None` forces sequential delivery — without a declared size
/// there is nothing for a random-access consumer to seek against.
/// Immutable once a bridge session is created; the size is never
/// renegotiated mid-session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamIdentity {
    /// Path of the file inside the remote data source.
    pub path: String,
    /// Declared byte length, if the remote side reported one.
    pub size: Option<u64>,
}

impl StreamIdentity {
    pub fn new(path: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    /// Last path segment, used as the user-visible name of the stream.
    pub fn display_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// One chunk fetch. A bridge session never has two of these unanswered
/// at the same time — the backing channel answers one in-flight request
/// per logical file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    pub path: String,
    pub offset: u64,
    pub length: u32,
}

/// The error triple the channel reports for a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFault {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ChannelFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

impl std::fmt::Display for ChannelFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {} ({})", self.code, self.message, details),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

/// Outcome of one chunk fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResult {
    /// A chunk, possibly shorter than requested. Never empty — an empty
    /// chunk is normalized to `EndOfStream` at construction.
    Data(Bytes),
    EndOfStream,
    Failure(ChannelFault),
}

impl ChunkResult {
    /// Build a result from the bytes the channel returned.
    ///
    /// The wire convention is "empty chunk means no more data", so an
    /// empty chunk becomes `EndOfStream` here and nothing downstream
    /// ever has to special-case a zero-length `Data`.
    pub fn from_chunk(chunk: Bytes) -> Self {
        if chunk.is_empty() {
            ChunkResult::EndOfStream
        } else {
            ChunkResult::Data(chunk)
        }
    }
}

/// Opaque stable token for a registered stream.
pub type HandleToken = [u8; 32];

/// Derive the token for an identity: BLAKE3 over the path and the
/// declared size. Stable across processes for the same identity, so a
/// consumer can re-open a handle it was given earlier.
pub fn handle_token(identity: &StreamIdentity) -> HandleToken {
    let mut hasher = blake3::Hasher::new();
    hasher.update(identity.path.as_bytes());
    match identity.size {
        Some(size) => {
            hasher.update(&[1]);
            hasher.update(&size.to_le_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
    *hasher.finalize().as_bytes()
}
