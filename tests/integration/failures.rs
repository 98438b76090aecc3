//! Failure propagation: channel faults, timeouts, gate shutdown, and a
//! misbehaving remote that answers twice.

use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use futures::FutureExt;

use causeway_bridge::{
    ChunkChannel, Completion, Delivery, DispatchGate, FutureChannel, RandomAccessBridge,
};
use causeway_core::config::TransferConfig;
use causeway_core::{BridgeError, ChunkRequest, ChunkResult, StreamIdentity};

use crate::{init_tracing, mock_provider};

#[test]
fn missing_remote_file_fails_the_random_access_read() -> Result<()> {
    let (provider, _stats) = mock_provider(vec![], TransferConfig::default());
    // Registered locally, but the remote has never heard of it.
    let token = provider.register(StreamIdentity::new("ghost.bin", Some(100)));

    let mut handle = provider.open(&token)?;
    let mut buf = [0u8; 10];
    let err = handle.read(&mut buf).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::Other);
    Ok(())
}

#[test]
fn missing_remote_file_truncates_the_pipe() -> Result<()> {
    let (provider, _stats) = mock_provider(vec![], TransferConfig::default());
    let token = provider.register(StreamIdentity::new("ghost.bin", None));

    let mut handle = provider.open(&token)?;
    let mut all = Vec::new();
    // The consumer just sees the stream end with nothing in it; the
    // terminal error lives on the transfer handle.
    handle.read_to_end(&mut all)?;
    assert!(all.is_empty());
    Ok(())
}

#[test]
fn timeout_abandons_the_call_and_frees_the_session() {
    init_tracing();
    let gate = Arc::new(DispatchGate::new().unwrap());

    // First request hangs forever; all later ones answer promptly.
    let calls = Arc::new(AtomicUsize::new(0));
    let fetch_calls = calls.clone();
    let channel = FutureChannel::new(gate.runtime(), move |_req: ChunkRequest| {
        let first = fetch_calls.fetch_add(1, Ordering::SeqCst) == 0;
        async move {
            if first {
                futures::future::pending::<()>().await;
            }
            Ok(Bytes::from_static(b"late but fine"))
        }
        .boxed()
    });

    let bridge = RandomAccessBridge::new(
        "slow.bin",
        1000,
        gate,
        Arc::new(channel),
        Some(Duration::from_millis(50)),
    );

    let mut buf = [0u8; 13];
    let err = bridge.read_at(0, &mut buf).unwrap_err();
    assert!(matches!(err, BridgeError::Timeout { offset: 0, .. }));

    // Abandonment released the serialization lock: the session is not
    // permanently stuck behind the dead call.
    let n = bridge.read_at(100, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"late but fine");
}

#[test]
fn shut_down_gate_fails_reads_instead_of_hanging() {
    init_tracing();
    let gate = Arc::new(DispatchGate::new().unwrap());
    let channel = FutureChannel::new(gate.runtime(), |_req: ChunkRequest| {
        async move { Ok(Bytes::from_static(b"unreached")) }.boxed()
    });
    let bridge = RandomAccessBridge::new("f", 100, gate.clone(), Arc::new(channel), None);

    gate.shutdown();

    let mut buf = [0u8; 4];
    let err = bridge.read_at(0, &mut buf).unwrap_err();
    assert!(matches!(err, BridgeError::DispatchUnavailable));
}

#[test]
fn shutdown_mid_read_fails_the_parked_caller() {
    init_tracing();
    let gate = Arc::new(DispatchGate::new().unwrap());
    // A fetch far slower than the test; the reader parks on it with an
    // unbounded wait, the worst case for a gate that dies underneath.
    let channel = FutureChannel::new(gate.runtime(), |_req: ChunkRequest| {
        async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Bytes::from_static(b"never delivered"))
        }
        .boxed()
    });
    let bridge = Arc::new(RandomAccessBridge::new(
        "stalled.bin",
        100,
        gate.clone(),
        Arc::new(channel),
        None,
    ));

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let reader = std::thread::spawn(move || {
        let mut buf = [0u8; 4];
        let _ = done_tx.send(bridge.read_at(0, &mut buf));
    });

    // Let the fetch get in flight, then pull the gate down. Dropping
    // the dispatch runtime drops the fetch future and its completion;
    // that must surface to the parked reader, not strand it.
    std::thread::sleep(Duration::from_millis(100));
    gate.shutdown();

    let result = done_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("reader must be woken by gate shutdown, not left parked");
    assert!(matches!(result, Err(BridgeError::DispatchUnavailable)));
    reader.join().unwrap();
}

#[test]
fn double_answering_remote_delivers_once_and_is_flagged() {
    init_tracing();
    // A channel that breaks the at-most-one-response contract.
    struct DoubleTalker {
        second: Arc<std::sync::Mutex<Option<Delivery>>>,
    }
    impl ChunkChannel for DoubleTalker {
        fn request(&self, _request: ChunkRequest, completion: Completion) {
            let first = completion.complete(ChunkResult::Data(Bytes::from_static(b"real")));
            assert_eq!(first, Delivery::Delivered);
            let second = completion.complete(ChunkResult::Data(Bytes::from_static(b"fake")));
            *self.second.lock().unwrap() = Some(second);
        }
    }

    let gate = Arc::new(DispatchGate::new().unwrap());
    let second = Arc::new(std::sync::Mutex::new(None));
    let bridge = RandomAccessBridge::new(
        "f",
        100,
        gate,
        Arc::new(DoubleTalker {
            second: second.clone(),
        }),
        None,
    );

    let mut buf = [0u8; 16];
    let n = bridge.read_at(0, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"real");
    assert_eq!(*second.lock().unwrap(), Some(Delivery::Rejected));
}
