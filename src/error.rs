//! Error types surfaced by the transport.
//!
//! Only [`SerialiseError`] reaches the caller of `log`. Connection and
//! delivery failures happen on the worker thread after `log` has returned and
//! are surfaced through the delivery reporter instead.

use std::io;

use thiserror::Error;

use crate::broker::BrokerError;

/// A record could not be converted into a payload.
#[derive(Debug, Error)]
pub enum SerialiseError {
    #[error("failed to encode record as JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Raised by a caller-supplied serialiser.
    #[error("custom serialiser failed: {0}")]
    Custom(String),
}

/// The producer connection could not be established or was lost.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("broker client failed to connect: {0}")]
    Connect(String),
    #[error("broker request timed out: {0}")]
    RequestTimeout(String),
    #[error("broker client crashed: {0}")]
    Crashed(String),
}

/// An individual message was not delivered.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("broker rejected message: {0}")]
    Rejected(String),
    #[error("broker did not acknowledge message in time")]
    TimedOut,
    #[error("connection failed before delivery: {0}")]
    ConnectionFailed(String),
    #[error("transport disconnected before delivery")]
    Disconnected,
    #[error("pending queue full")]
    QueueFull,
    #[error("transport closed")]
    Closed,
}

impl DeliveryError {
    /// Whether the transport discarded the message itself, as opposed to the
    /// broker rejecting or not acknowledging it.
    pub fn is_dropped(&self) -> bool {
        matches!(
            self,
            DeliveryError::ConnectionFailed(_)
                | DeliveryError::Disconnected
                | DeliveryError::QueueFull
                | DeliveryError::Closed
        )
    }
}

impl From<BrokerError> for DeliveryError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Rejected(reason) => DeliveryError::Rejected(reason),
            BrokerError::TimedOut => DeliveryError::TimedOut,
            BrokerError::Unavailable(reason) => DeliveryError::ConnectionFailed(reason),
        }
    }
}

impl From<&ConnectionError> for DeliveryError {
    fn from(err: &ConnectionError) -> Self {
        DeliveryError::ConnectionFailed(err.to_string())
    }
}

/// Invalid configuration supplied when building a transport.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid user supplied configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),
    /// Options could not be merged or decoded.
    #[error("malformed transport options: {0}")]
    Options(#[from] serde_json::Error),
    /// The worker thread could not be spawned.
    #[error(transparent)]
    Io(#[from] io::Error),
}
