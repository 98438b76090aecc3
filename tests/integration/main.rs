//! Causeway integration test harness.
//!
//! Tests run against an in-process mock remote: a [`FutureChannel`]
//! serving files out of a map with a small async delay, driven on the
//! dispatch context's runtime — the same wiring a real remote-call
//! transport would use. No network, no OS registration; everything
//! here exercises the bridge end to end through the public API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;

use causeway_bridge::{DispatchGate, FutureChannel, StreamProvider};
use causeway_core::config::TransferConfig;
use causeway_core::{ChannelFault, ChunkRequest};

mod failures;

/// Counters the mock remote updates per request, so tests can assert
/// the one-in-flight property across real async completions.
#[derive(Default)]
pub struct RemoteStats {
    pub requests: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build the shared wiring over a mock remote holding `files`: one
/// dispatch gate, one channel. Each fetch takes a couple of
/// milliseconds of simulated transport latency.
pub fn mock_stack(
    files: Vec<(&str, Vec<u8>)>,
) -> (
    Arc<DispatchGate>,
    Arc<dyn causeway_bridge::ChunkChannel>,
    Arc<RemoteStats>,
) {
    init_tracing();
    let gate = Arc::new(DispatchGate::new().expect("spawn dispatch gate"));
    let files: Arc<HashMap<String, Vec<u8>>> = Arc::new(
        files
            .into_iter()
            .map(|(path, data)| (path.to_string(), data))
            .collect(),
    );
    let stats = Arc::new(RemoteStats::default());

    let fetch_stats = stats.clone();
    let channel = FutureChannel::new(gate.runtime(), move |req: ChunkRequest| {
        let files = files.clone();
        let stats = fetch_stats.clone();
        async move {
            stats.requests.fetch_add(1, Ordering::SeqCst);
            let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            stats.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            let result = match files.get(&req.path) {
                Some(data) => {
                    let start = (req.offset as usize).min(data.len());
                    let end = (start + req.length as usize).min(data.len());
                    Ok(Bytes::copy_from_slice(&data[start..end]))
                }
                None => Err(ChannelFault::new("not-found", "no such file on remote")),
            };
            stats.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
        .boxed()
    });

    (gate, Arc::new(channel), stats)
}

/// Provider built on [`mock_stack`].
pub fn mock_provider(
    files: Vec<(&str, Vec<u8>)>,
    config: TransferConfig,
) -> (StreamProvider, Arc<RemoteStats>) {
    let (gate, channel, stats) = mock_stack(files);
    (StreamProvider::new(gate, channel, config), stats)
}

/// Deterministic test payload.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
