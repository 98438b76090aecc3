//! causeway-core — shared types, error taxonomy, and configuration.
//! All other Causeway crates depend on this one.

pub mod config;
pub mod error;
pub mod stream;

pub use error::BridgeError;
pub use stream::{ChannelFault, ChunkRequest, ChunkResult, HandleToken, StreamIdentity};
