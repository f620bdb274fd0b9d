//! Public transport handle exported by the crate.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{SendError, Sender, bounded};
use parking_lot::Mutex;

use crate::{
    broker::{BrokerClient, OutboundMessage},
    config::TransportConfig,
    error::{BuildError, DeliveryError, SerialiseError},
    log_record::LogRecord,
    serialise::Serialiser,
    transport::LogTransport,
};

use super::{
    connection::{ConnectionState, StateCell},
    dispatcher::DeliveryOutcome,
    reporter::{DeliveryReporter, DeliveryStats, OutcomeHook},
    worker::{TransportCommand, spawn_worker},
};

/// Ships log records to a broker topic from a background worker.
///
/// `log` serialises on the calling thread and hands the message to the
/// worker without waiting. The worker owns the broker client; messages
/// submitted before the connection is ready are parked and sent in order
/// once the client reports readiness.
pub struct KafkaTransport {
    tx: Option<Sender<TransportCommand>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    state: StateCell,
    serialiser: Serialiser,
    topic: Arc<str>,
    partition: i32,
    reporter: Arc<DeliveryReporter>,
    shutdown_timeout: Duration,
}

impl KafkaTransport {
    /// Spawn the worker and, when configured, start connecting.
    pub(crate) fn spawn<C: BrokerClient>(
        client: C,
        config: TransportConfig,
        serialiser: Serialiser,
        hook: Option<OutcomeHook>,
    ) -> Result<Self, BuildError> {
        let state = StateCell::new();
        let reporter = Arc::new(DeliveryReporter::new(
            config.verbose_delivery_logging,
            config.warn_interval(),
            hook,
        ));
        let (tx, handle) = spawn_worker(client, &config, state.clone(), Arc::clone(&reporter))?;
        if config.auto_connect {
            let _ = tx.send(TransportCommand::Connect);
        }
        Ok(Self {
            tx: Some(tx),
            handle: Mutex::new(Some(handle)),
            state,
            serialiser,
            topic: Arc::from(config.topic.as_str()),
            partition: config.partition,
            reporter,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Serialise `record` and submit it for delivery.
    ///
    /// Returns `Ok(true)` as soon as the message is handed off; delivery
    /// results are only visible through the reporter. Fails only when the
    /// record cannot be serialised, in which case nothing is submitted.
    pub fn try_log(&self, record: LogRecord) -> Result<bool, SerialiseError> {
        let payload = self.serialiser.serialise(record)?;
        let message = OutboundMessage::new(Arc::clone(&self.topic), self.partition, payload);
        let Some(tx) = &self.tx else {
            self.report_closed(&message);
            return Ok(true);
        };
        if let Err(SendError(TransportCommand::Message(message))) =
            tx.send(TransportCommand::Message(message))
        {
            self.report_closed(&message);
        }
        Ok(true)
    }

    /// Ask the worker to connect. A no-op while connecting or connected.
    pub fn connect(&self) -> bool {
        self.tx
            .as_ref()
            .is_some_and(|tx| tx.send(TransportCommand::Connect).is_ok())
    }

    /// Disconnect and discard any parked messages, waiting up to the
    /// shutdown timeout for the worker to acknowledge.
    pub fn disconnect(&self) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        request_with_ack(tx, TransportCommand::Disconnect, self.shutdown_timeout)
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Wait until the worker has processed every earlier command.
    ///
    /// Messages parked while the connection is still being established are
    /// not waited for.
    pub fn flush(&self, timeout: Duration) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        request_with_ack(tx, TransportCommand::Flush, timeout)
    }

    pub fn stats(&self) -> DeliveryStats {
        self.reporter.stats()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    /// Shut down the worker, disconnecting the client, and wait for it to exit.
    pub fn close(&mut self) {
        self.request_shutdown();
        self.join_worker();
    }

    fn report_closed(&self, message: &OutboundMessage) {
        self.reporter
            .report(&DeliveryOutcome::Failed(DeliveryError::Closed), message);
    }

    fn request_shutdown(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        request_with_ack(&tx, TransportCommand::Shutdown, self.shutdown_timeout);
    }

    fn join_worker(&mut self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            log::warn!("KafkaTransport: worker thread panicked");
        }
    }
}

/// Send a command carrying an ack channel and wait for the acknowledgement.
fn request_with_ack(
    tx: &Sender<TransportCommand>,
    command: impl FnOnce(Sender<()>) -> TransportCommand,
    timeout: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    let (ack_tx, ack_rx) = bounded(1);
    if tx.send(command(ack_tx)).is_err() {
        return false;
    }
    let remaining = deadline.saturating_duration_since(Instant::now());
    ack_rx.recv_timeout(remaining).is_ok()
}

impl LogTransport for KafkaTransport {
    fn try_log(&self, record: LogRecord) -> Result<bool, SerialiseError> {
        KafkaTransport::try_log(self, record)
    }

    fn flush(&self, timeout: Duration) -> bool {
        KafkaTransport::flush(self, timeout)
    }

    fn close(&mut self) {
        KafkaTransport::close(self);
    }
}

impl Drop for KafkaTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for KafkaTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaTransport")
            .field("topic", &self.topic)
            .field("partition", &self.partition)
            .field("state", &self.state.get())
            .finish()
    }
}
