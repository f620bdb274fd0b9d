//! Seam between the transport and the broker client library.
//!
//! The transport never speaks the broker's wire protocol itself. It drives an
//! implementation of [`BrokerClient`] from a single worker thread and learns
//! about asynchronous connection changes through the [`ClientEvents`] handle
//! passed to [`BrokerClient::connect`].

use std::sync::Arc;

use crossbeam_channel::Sender;
use thiserror::Error;

use crate::config::{BrokerOptions, ProducerOptions};
use crate::error::ConnectionError;

/// Message published to the broker, built once per `log` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Random UUID identifying this message.
    pub key: String,
    /// Serialised record.
    pub value: Vec<u8>,
    pub partition: i32,
    pub topic: Arc<str>,
}

impl OutboundMessage {
    /// Build a message with a freshly generated key.
    pub fn new(topic: Arc<str>, partition: i32, value: Vec<u8>) -> Self {
        Self {
            key: uuid::Uuid::new_v4().to_string(),
            value,
            partition,
            topic,
        }
    }
}

/// Failure reported by the broker client for a single send.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("acknowledgement timed out")]
    TimedOut,
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous notifications raised by the broker client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// The producer connection is ready to accept sends.
    Ready,
    /// A request exceeded the client's own timeout and retry budget.
    RequestTimeout(String),
    /// The client stopped for any other fatal reason.
    Crashed(String),
}

impl ClientEvent {
    /// The connection error this event represents, or `None` for `Ready`.
    pub fn into_connection_error(self) -> Option<ConnectionError> {
        match self {
            ClientEvent::Ready => None,
            ClientEvent::RequestTimeout(reason) => Some(ConnectionError::RequestTimeout(reason)),
            ClientEvent::Crashed(reason) => Some(ConnectionError::Crashed(reason)),
        }
    }
}

/// Event tagged with the connection attempt that raised it.
#[derive(Debug)]
pub(crate) struct ClientNotice {
    pub(crate) generation: u64,
    pub(crate) event: ClientEvent,
}

/// Handle through which a client reports events for one connection attempt.
///
/// Events raised through a handle from an earlier attempt are ignored once
/// the transport has disconnected or reconnected.
#[derive(Clone, Debug)]
pub struct ClientEvents {
    tx: Sender<ClientNotice>,
    generation: u64,
}

impl ClientEvents {
    pub(crate) fn new(tx: Sender<ClientNotice>, generation: u64) -> Self {
        Self { tx, generation }
    }

    /// Report an event. Events sent after the transport closed are dropped.
    pub fn emit(&self, event: ClientEvent) {
        let _ = self.tx.send(ClientNotice {
            generation: self.generation,
            event,
        });
    }

    pub fn ready(&self) {
        self.emit(ClientEvent::Ready);
    }

    pub fn request_timeout(&self, reason: impl Into<String>) {
        self.emit(ClientEvent::RequestTimeout(reason.into()));
    }

    pub fn crashed(&self, reason: impl Into<String>) {
        self.emit(ClientEvent::Crashed(reason.into()));
    }
}

/// Settings handed to the client for each connection attempt.
#[derive(Clone, Copy, Debug)]
pub struct ConnectSettings<'a> {
    pub broker: &'a BrokerOptions,
    pub producer: &'a ProducerOptions,
}

/// Producer side of a broker client library.
///
/// No production implementation ships with this crate; wrap the Kafka client
/// in use behind this trait.
///
/// All methods are invoked from the transport's worker thread, one at a time.
/// `connect` should start the connection and return promptly; readiness is
/// reported later through [`ClientEvents::ready`].
pub trait BrokerClient: Send + 'static {
    /// Begin establishing the producer connection.
    fn connect(
        &mut self,
        settings: ConnectSettings<'_>,
        events: ClientEvents,
    ) -> Result<(), BrokerError>;

    /// Tear down the producer connection.
    fn disconnect(&mut self) -> Result<(), BrokerError>;

    /// Publish one message and wait for the configured acknowledgement.
    fn send(&mut self, message: &OutboundMessage) -> Result<(), BrokerError>;
}

impl<C: BrokerClient + ?Sized> BrokerClient for Box<C> {
    fn connect(
        &mut self,
        settings: ConnectSettings<'_>,
        events: ClientEvents,
    ) -> Result<(), BrokerError> {
        (**self).connect(settings, events)
    }

    fn disconnect(&mut self) -> Result<(), BrokerError> {
        (**self).disconnect()
    }

    fn send(&mut self, message: &OutboundMessage) -> Result<(), BrokerError> {
        (**self).send(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ClientEvent::Ready, None)]
    #[case(
        ClientEvent::RequestTimeout("metadata".into()),
        Some(ConnectionError::RequestTimeout("metadata".into()))
    )]
    #[case(
        ClientEvent::Crashed("socket reset".into()),
        Some(ConnectionError::Crashed("socket reset".into()))
    )]
    fn only_fatal_events_map_to_errors(
        #[case] event: ClientEvent,
        #[case] expected: Option<ConnectionError>,
    ) {
        assert_eq!(event.into_connection_error(), expected);
    }

    #[rstest]
    fn message_keys_are_unique() {
        let topic: Arc<str> = Arc::from("app-logs");
        let a = OutboundMessage::new(Arc::clone(&topic), 0, Vec::new());
        let b = OutboundMessage::new(topic, 0, Vec::new());
        assert_ne!(a.key, b.key);
    }
}
