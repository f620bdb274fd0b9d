//! Fixtures providing `(MemoryBroker, KafkaTransport)` pairs for integration
//! tests. The broker clone kept by the test shares state with the one owned
//! by the transport's worker.

use std::sync::Arc;
use std::time::Duration;

use kafka_log_shipper::{
    test_utils::MemoryBroker, Clock, KafkaTransport, OutboundMessage, TransportBuilder,
};
use rstest::fixture;
use serde_json::Value;

pub const TOPIC: &str = "app-logs";

/// Upper bound on any wait for the worker.
pub const WAIT: Duration = Duration::from_secs(2);

/// Clock pinned to a fixed instant.
pub fn fixed_clock(millis: u64) -> Clock {
    Arc::new(move || millis)
}

/// Decode a message payload produced by the default serialiser.
pub fn decode(message: &OutboundMessage) -> Value {
    serde_json::from_slice(&message.value).expect("payload is JSON")
}

/// Transport whose broker reports readiness as soon as it is asked.
#[fixture]
pub fn connected() -> (MemoryBroker, KafkaTransport) {
    let broker = MemoryBroker::ready_on_connect();
    let transport = TransportBuilder::new()
        .with_topic(TOPIC)
        .build(broker.clone())
        .expect("build transport");
    (broker, transport)
}

/// Transport whose connection stays pending until the test fires readiness.
#[fixture]
pub fn pending() -> (MemoryBroker, KafkaTransport) {
    let broker = MemoryBroker::new();
    let transport = TransportBuilder::new()
        .with_topic(TOPIC)
        .build(broker.clone())
        .expect("build transport");
    (broker, transport)
}
