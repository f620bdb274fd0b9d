//! Lifecycle of the single producer connection.
//!
//! [`ConnectionManager`] is owned by the worker thread and is the only writer
//! of the connection state. The state itself lives in a [`StateCell`] shared
//! with the transport handle so any thread can ask whether the connection is
//! ready.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam_channel::Sender;
use log::{debug, warn};

use crate::broker::{BrokerClient, ClientEvent, ClientEvents, ClientNotice, ConnectSettings};
use crate::config::{BrokerOptions, ProducerOptions};
use crate::error::ConnectionError;

/// Connection lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Failed = 3,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Failed,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Atomically readable connection state.
#[derive(Clone, Debug)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ConnectionState::Disconnected as u8)))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of feeding a client event to the manager.
#[derive(Debug, PartialEq, Eq)]
pub enum Transition {
    /// Connecting → Connected; the pending queue should be flushed.
    BecameReady,
    /// The connection failed; pending messages cannot be delivered.
    Failed(ConnectionError),
    /// The event did not change the state.
    Unchanged,
}

/// Owns the broker client and drives its connection state machine.
pub struct ConnectionManager<C> {
    client: C,
    state: StateCell,
    generation: u64,
    broker: BrokerOptions,
    producer: ProducerOptions,
    notices: Sender<ClientNotice>,
}

impl<C: BrokerClient> ConnectionManager<C> {
    pub(crate) fn new(
        client: C,
        state: StateCell,
        broker: BrokerOptions,
        producer: ProducerOptions,
        notices: Sender<ClientNotice>,
    ) -> Self {
        Self {
            client,
            state,
            generation: 0,
            broker,
            producer,
            notices,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Identifier of the current connection attempt.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a connection attempt unless one is already underway.
    ///
    /// Returns `Ok(true)` when a new attempt was started and `Ok(false)` when
    /// the call was a no-op. A client that fails to start connecting leaves
    /// the manager in [`ConnectionState::Failed`].
    pub fn connect(&mut self) -> Result<bool, ConnectionError> {
        match self.state.get() {
            ConnectionState::Connecting | ConnectionState::Connected => return Ok(false),
            ConnectionState::Disconnected | ConnectionState::Failed => {}
        }
        self.generation += 1;
        self.state.set(ConnectionState::Connecting);
        debug!(
            "KafkaTransport connecting to {:?} (attempt {})",
            self.broker.brokers, self.generation
        );
        let settings = ConnectSettings {
            broker: &self.broker,
            producer: &self.producer,
        };
        let events = ClientEvents::new(self.notices.clone(), self.generation);
        if let Err(err) = self.client.connect(settings, events) {
            self.state.set(ConnectionState::Failed);
            return Err(ConnectionError::Connect(err.to_string()));
        }
        Ok(true)
    }

    /// Close the connection. Returns `false` when already disconnected.
    pub fn disconnect(&mut self) -> bool {
        if self.state.get() == ConnectionState::Disconnected {
            return false;
        }
        // Events still in flight from this attempt must not revive it.
        self.generation += 1;
        self.state.set(ConnectionState::Disconnected);
        if let Err(err) = self.client.disconnect() {
            warn!("KafkaTransport disconnect failed: {err}");
        }
        true
    }

    /// Apply an event raised by the client for attempt `generation`.
    pub fn on_event(&mut self, generation: u64, event: ClientEvent) -> Transition {
        if generation != self.generation {
            debug!("KafkaTransport ignoring {event:?} from stale attempt {generation}");
            return Transition::Unchanged;
        }
        match (self.state.get(), event) {
            (ConnectionState::Connecting, ClientEvent::Ready) => {
                self.state.set(ConnectionState::Connected);
                Transition::BecameReady
            }
            (ConnectionState::Connecting | ConnectionState::Connected, event) => {
                match event.into_connection_error() {
                    Some(err) => {
                        self.state.set(ConnectionState::Failed);
                        Transition::Failed(err)
                    }
                    None => Transition::Unchanged,
                }
            }
            _ => Transition::Unchanged,
        }
    }

    /// Client to dispatch through, available only while connected.
    pub fn ready_client(&mut self) -> Option<&mut C> {
        if self.is_ready() {
            Some(&mut self.client)
        } else {
            None
        }
    }
}
