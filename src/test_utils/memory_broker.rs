//! A scriptable in-memory broker client for test assertions.
//!
//! Clones share state, so a test can hand one clone to the transport and keep
//! another to inspect what was sent or to raise client events.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::broker::{
    BrokerClient, BrokerError, ClientEvent, ClientEvents, ConnectSettings, OutboundMessage,
};
use crate::config::BrokerOptions;

#[derive(Default)]
struct BrokerState {
    connect_attempts: usize,
    disconnects: usize,
    send_attempts: usize,
    ready_on_connect: bool,
    connect_failure: Option<String>,
    send_failures: VecDeque<BrokerError>,
    events: Option<ClientEvents>,
    last_options: Option<BrokerOptions>,
    sent: Vec<OutboundMessage>,
}

/// Broker client that records every interaction.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    sent_signal: Arc<Condvar>,
}

impl MemoryBroker {
    /// Broker that stays connecting until a test fires [`MemoryBroker::fire_ready`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Broker that reports readiness as soon as it is asked to connect.
    pub fn ready_on_connect() -> Self {
        let broker = Self::default();
        broker.state.lock().ready_on_connect = true;
        broker
    }

    /// Make the next `connect` call fail.
    pub fn fail_connect(&self, reason: impl Into<String>) {
        self.state.lock().connect_failure = Some(reason.into());
    }

    /// Make the next sends fail with the given errors, in order.
    pub fn fail_next_sends(&self, errors: impl IntoIterator<Item = BrokerError>) {
        self.state.lock().send_failures.extend(errors);
    }

    pub fn fire_ready(&self) {
        self.fire(ClientEvent::Ready);
    }

    pub fn fire_request_timeout(&self, reason: impl Into<String>) {
        self.fire(ClientEvent::RequestTimeout(reason.into()));
    }

    pub fn fire_crash(&self, reason: impl Into<String>) {
        self.fire(ClientEvent::Crashed(reason.into()));
    }

    /// Raise `event` on the most recent connection attempt, if any.
    pub fn fire(&self, event: ClientEvent) {
        let events = self.state.lock().events.clone();
        if let Some(events) = events {
            events.emit(event);
        }
    }

    /// Messages acknowledged so far, in send order.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.state.lock().sent.clone()
    }

    /// Block until at least `count` messages were sent or `timeout` elapses.
    pub fn wait_for_sent(&self, count: usize, timeout: Duration) -> Vec<OutboundMessage> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.sent.len() < count {
            if self.sent_signal.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.sent.clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.lock().connect_attempts
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().disconnects
    }

    /// Every call to `send`, successful or not.
    pub fn send_attempts(&self) -> usize {
        self.state.lock().send_attempts
    }

    /// Broker options passed on the latest connection attempt.
    pub fn last_options(&self) -> Option<BrokerOptions> {
        self.state.lock().last_options.clone()
    }
}

impl BrokerClient for MemoryBroker {
    fn connect(
        &mut self,
        settings: ConnectSettings<'_>,
        events: ClientEvents,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.connect_attempts += 1;
        state.last_options = Some(settings.broker.clone());
        if let Some(reason) = state.connect_failure.take() {
            return Err(BrokerError::Unavailable(reason));
        }
        if state.ready_on_connect {
            events.ready();
        }
        state.events = Some(events);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BrokerError> {
        self.state.lock().disconnects += 1;
        Ok(())
    }

    fn send(&mut self, message: &OutboundMessage) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.send_attempts += 1;
        if let Some(err) = state.send_failures.pop_front() {
            return Err(err);
        }
        state.sent.push(message.clone());
        self.sent_signal.notify_all();
        Ok(())
    }
}
