//! End-to-end behaviour of `KafkaTransport` against an in-memory broker.

mod test_utils;

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use kafka_log_shipper::{
    test_utils::MemoryBroker, ConnectionState, KafkaTransport, LogRecord, LogTransport,
    SerialiseError, SharedValue, TransportBuilder,
};
use rstest::rstest;
use serde_json::json;

use test_utils::{connected, decode, fixed_clock, pending, WAIT};

#[rstest]
fn ships_record_to_configured_topic() {
    let broker = MemoryBroker::new();
    let transport = TransportBuilder::new()
        .with_topic("app-logs")
        .with_partition(0)
        .with_clock(fixed_clock(1_700_000_000_000))
        .build(broker.clone())
        .expect("build");

    let mut result = None;
    transport.log(LogRecord::with_message("info", "hello"), |err, ok| {
        result = Some((err.is_none(), ok));
    });
    assert_eq!(result, Some((true, true)));

    assert!(transport.flush(WAIT));
    broker.fire_ready();
    let sent = broker.wait_for_sent(1, WAIT);
    assert_eq!(sent.len(), 1);
    assert_eq!(&*sent[0].topic, "app-logs");
    assert_eq!(sent[0].partition, 0);
    assert_eq!(
        decode(&sent[0]),
        json!({"level": "info", "message": "hello", "timestamp": 1_700_000_000_000_u64})
    );
}

#[rstest]
fn concurrent_loggers_are_accepted_before_connecting(
    pending: (MemoryBroker, KafkaTransport),
) {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;
    let (broker, transport) = pending;
    let transport = Arc::new(transport);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let transport = Arc::clone(&transport);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..PER_THREAD).all(|i| {
                    let mut accepted = false;
                    transport.log(
                        LogRecord::with_message("info", &format!("{t}-{i}")),
                        |err, ok| accepted = err.is_none() && ok,
                    );
                    accepted
                })
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().expect("logger thread"));
    }

    assert!(transport.flush(WAIT));
    assert!(broker.sent().is_empty());
    assert_eq!(broker.connect_attempts(), 1);

    broker.fire_ready();
    let sent = broker.wait_for_sent(THREADS * PER_THREAD, WAIT);
    assert_eq!(sent.len(), THREADS * PER_THREAD);

    // Each producer's own records keep their relative order.
    for t in 0..THREADS {
        let prefix = format!("{t}-");
        let order: Vec<usize> = sent
            .iter()
            .filter_map(|m| {
                decode(m)["message"]
                    .as_str()
                    .and_then(|s| s.strip_prefix(&prefix).map(str::to_owned))
            })
            .map(|i| i.parse().expect("index"))
            .collect();
        assert_eq!(order, (0..PER_THREAD).collect::<Vec<_>>());
    }
}

#[rstest]
fn timestamp_reflects_call_time(connected: (MemoryBroker, KafkaTransport)) {
    let (broker, transport) = connected;
    let before = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_millis() as u64;
    transport
        .try_log(LogRecord::with_message("info", "now").with("timestamp", "caller value"))
        .expect("log");
    let sent = broker.wait_for_sent(1, WAIT);
    let stamp = decode(&sent[0])["timestamp"].as_u64().expect("numeric timestamp");
    assert!(stamp >= before);
}

#[rstest]
fn cyclic_record_is_shipped_with_reference_marker(
    connected: (MemoryBroker, KafkaTransport),
) {
    let (broker, transport) = connected;
    let request = SharedValue::new(json!({"id": 7}));
    request.insert("self", request.clone());
    transport
        .try_log(LogRecord::with_message("warn", "loop").with("request", request))
        .expect("log");
    let sent = broker.wait_for_sent(1, WAIT);
    assert_eq!(
        decode(&sent[0])["request"],
        json!({"id": 7, "self": {"$ref": "$.request"}})
    );
}

#[rstest]
fn serialiser_failure_reaches_callback() {
    let broker = MemoryBroker::new();
    let transport = TransportBuilder::new()
        .with_serialiser(|_: &LogRecord| -> Result<Vec<u8>, SerialiseError> {
            Err(SerialiseError::Custom("unsupported field".into()))
        })
        .build(broker.clone())
        .expect("build");

    let mut result = None;
    transport.log(LogRecord::with_message("info", "bad"), |err, ok| {
        result = Some((err.map(|e| e.to_string()), ok));
    });
    let (err, ok) = result.expect("callback ran");
    assert!(!ok);
    assert!(err.expect("error reported").contains("unsupported field"));
    assert!(transport.flush(WAIT));
    assert_eq!(transport.stats().failed, 0);
}

#[rstest]
fn crash_then_reconnect_resumes_delivery(connected: (MemoryBroker, KafkaTransport)) {
    let (broker, transport) = connected;
    transport
        .try_log(LogRecord::with_message("info", "before"))
        .expect("log");
    assert_eq!(broker.wait_for_sent(1, WAIT).len(), 1);

    broker.fire_crash("broker went away");
    assert!(transport.flush(WAIT));
    assert_eq!(transport.state(), ConnectionState::Failed);

    transport
        .try_log(LogRecord::with_message("info", "after"))
        .expect("log");
    let sent = broker.wait_for_sent(2, WAIT);
    assert_eq!(sent.len(), 2);
    assert_eq!(broker.connect_attempts(), 2);
    assert!(transport.is_ready());
}

#[rstest]
fn explicit_connect_after_disconnect(connected: (MemoryBroker, KafkaTransport)) {
    let (broker, transport) = connected;
    assert!(transport.flush(WAIT));
    assert!(transport.is_ready());

    assert!(transport.disconnect());
    assert_eq!(transport.state(), ConnectionState::Disconnected);

    assert!(transport.connect());
    assert!(transport.flush(WAIT));
    assert!(transport.is_ready());
    assert_eq!(broker.connect_attempts(), 2);
}

#[rstest]
fn dropping_transport_disconnects(connected: (MemoryBroker, KafkaTransport)) {
    let (broker, transport) = connected;
    transport
        .try_log(LogRecord::with_message("info", "bye"))
        .expect("log");
    drop(transport);
    assert_eq!(broker.sent().len(), 1);
    assert_eq!(broker.disconnects(), 1);
}
