//! Broker-backed log transport.
//!
//! This module defines [`KafkaTransport`], which serialises
//! [`LogRecord`](crate::log_record::LogRecord) values on the caller's thread
//! and forwards them to a worker thread that owns the broker client. The
//! worker tracks the connection lifecycle, parks messages until the client
//! reports readiness, dispatches them one at a time, and reports every
//! outcome without involving the caller.

mod backoff;
mod connection;
mod dispatcher;
mod handler;
mod pending;
mod reporter;
mod worker;


pub use connection::{ConnectionManager, ConnectionState, StateCell, Transition};
pub use dispatcher::{DeliveryOutcome, Dispatcher};
pub use handler::KafkaTransport;
pub use pending::PendingQueue;
pub use reporter::{DeliveryReporter, DeliveryStats, OutcomeHook};
