//! Asynchronous shipping of structured log records to a broker topic.
//!
//! Records are serialised on the caller's thread and handed to a worker that
//! owns the producer connection. Logging never blocks on the network and never
//! fails once a record has been serialised; delivery outcomes are surfaced
//! through logging, counters and an optional hook.
//!
//! The crate does not bundle a Kafka producer. Applications supply an adapter
//! implementing [`BrokerClient`] around the client library of their choice and
//! hand it to [`TransportBuilder::build`]. `test_utils::MemoryBroker` (feature
//! `test-util`) is the in-memory implementation used by the tests.

pub mod broker;
pub mod builder;
pub mod config;
pub mod error;
pub mod kafka_transport;
#[cfg(feature = "log-compat")]
pub mod log_compat;
pub mod log_record;
pub mod rate_limited_warner;
pub mod serialise;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use broker::{
    BrokerClient, BrokerError, ClientEvent, ClientEvents, ConnectSettings, OutboundMessage,
};
pub use builder::TransportBuilder;
pub use config::{
    BrokerOptions, ProducerOptions, RetryPolicy, TransportConfig, TransportOptions,
};
pub use error::{BuildError, ConnectionError, DeliveryError, SerialiseError};
pub use kafka_transport::{
    ConnectionState, DeliveryOutcome, DeliveryStats, KafkaTransport,
};
#[cfg(feature = "log-compat")]
pub use log_compat::ShipperLogger;
pub use log_record::{LogRecord, LogValue, SharedValue};
pub use serialise::{Clock, CycleSafeJson, RecordSerialiser, Serialiser};
pub use transport::LogTransport;
