//! Worker thread owning the producer connection.
//!
//! Every operation that touches the broker client runs here, one at a time:
//! fresh dispatches, pending-queue drains, connects and disconnects. Client
//! events arrive on a second channel; they are always applied before the
//! next command so a flush observes every event raised before it.

use std::{io, sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender, select, unbounded};
use log::debug;

use crate::broker::{BrokerClient, ClientNotice, OutboundMessage};
use crate::config::TransportConfig;
use crate::error::{ConnectionError, DeliveryError};

use super::{
    connection::{ConnectionManager, StateCell, Transition},
    dispatcher::{DeliveryOutcome, Dispatcher},
    pending::PendingQueue,
    reporter::DeliveryReporter,
};

/// Commands processed by the worker thread.
#[derive(Debug)]
pub enum TransportCommand {
    Message(OutboundMessage),
    Connect,
    Disconnect(Sender<()>),
    Flush(Sender<()>),
    Shutdown(Sender<()>),
}

pub fn spawn_worker<C: BrokerClient>(
    client: C,
    config: &TransportConfig,
    state: StateCell,
    reporter: Arc<DeliveryReporter>,
) -> io::Result<(Sender<TransportCommand>, thread::JoinHandle<()>)> {
    let (tx, rx) = unbounded();
    let (notice_tx, notice_rx) = unbounded();
    let worker = Worker {
        manager: ConnectionManager::new(
            client,
            state,
            config.broker_options.clone(),
            config.producer.clone(),
            notice_tx,
        ),
        pending: PendingQueue::new(config.pending_capacity),
        dispatcher: Dispatcher::new(
            config.resend_attempts,
            config.broker_options.retry.clone(),
        ),
        reporter,
    };
    let handle = thread::Builder::new()
        .name("kafka-transport".into())
        .spawn(move || worker.run(rx, notice_rx))?;
    Ok((tx, handle))
}

struct Worker<C> {
    manager: ConnectionManager<C>,
    pending: PendingQueue,
    dispatcher: Dispatcher,
    reporter: Arc<DeliveryReporter>,
}

impl<C: BrokerClient> Worker<C> {
    fn run(mut self, commands: Receiver<TransportCommand>, notices: Receiver<ClientNotice>) {
        loop {
            select! {
                recv(notices) -> notice => {
                    if let Ok(notice) = notice {
                        self.handle_notice(notice);
                    }
                }
                recv(commands) -> command => {
                    self.drain_notices(&notices);
                    match command {
                        Ok(TransportCommand::Shutdown(ack)) => {
                            self.shutdown(&commands, &notices);
                            let _ = ack.send(());
                            break;
                        }
                        Ok(command) => self.handle_command(command),
                        Err(_) => {
                            self.shutdown(&commands, &notices);
                            break;
                        }
                    }
                }
            }
        }
    }

    fn handle_command(&mut self, command: TransportCommand) {
        match command {
            TransportCommand::Message(message) => self.submit(message),
            TransportCommand::Connect => self.connect(),
            TransportCommand::Disconnect(ack) => {
                self.disconnect();
                let _ = ack.send(());
            }
            TransportCommand::Flush(ack) => {
                self.reporter.flush_warnings();
                let _ = ack.send(());
            }
            TransportCommand::Shutdown(ack) => {
                let _ = ack.send(());
            }
        }
    }

    fn handle_notice(&mut self, notice: ClientNotice) {
        match self.manager.on_event(notice.generation, notice.event) {
            Transition::BecameReady => {
                debug!("KafkaTransport connection ready");
                self.flush_pending();
            }
            Transition::Failed(err) => self.fail_connection(&err),
            Transition::Unchanged => {}
        }
    }

    fn drain_notices(&mut self, notices: &Receiver<ClientNotice>) {
        while let Ok(notice) = notices.try_recv() {
            self.handle_notice(notice);
        }
    }

    /// Dispatch now if connected, otherwise park the message and connect.
    fn submit(&mut self, message: OutboundMessage) {
        if self.manager.is_ready() {
            self.dispatch(message);
            return;
        }
        if let Err(err) = self.manager.connect() {
            self.fail_connection(&err);
            self.reporter
                .report(&DeliveryOutcome::Failed((&err).into()), &message);
            return;
        }
        if let Err(message) = self.pending.enqueue(message) {
            self.reporter
                .report(&DeliveryOutcome::Failed(DeliveryError::QueueFull), &message);
        }
    }

    fn dispatch(&mut self, message: OutboundMessage) {
        let outcome = match self.manager.ready_client() {
            Some(client) => self.dispatcher.send(&message, client),
            None => DeliveryOutcome::Failed(DeliveryError::Disconnected),
        };
        self.reporter.report(&outcome, &message);
    }

    fn flush_pending(&mut self) {
        let queued = self.pending.drain_in_order();
        if !queued.is_empty() {
            debug!("KafkaTransport flushing {} pending messages", queued.len());
        }
        for message in queued {
            self.dispatch(message);
        }
    }

    fn connect(&mut self) {
        if let Err(err) = self.manager.connect() {
            self.fail_connection(&err);
        }
    }

    fn disconnect(&mut self) {
        if self.manager.disconnect() {
            debug!("KafkaTransport disconnected");
        }
        self.fail_pending(DeliveryError::Disconnected);
    }

    fn fail_connection(&mut self, err: &ConnectionError) {
        self.reporter.connection_failed(err);
        self.fail_pending(err.into());
    }

    fn fail_pending(&mut self, reason: DeliveryError) {
        for message in self.pending.drain_in_order() {
            self.reporter
                .report(&DeliveryOutcome::Failed(reason.clone()), &message);
        }
    }

    fn shutdown(
        &mut self,
        commands: &Receiver<TransportCommand>,
        notices: &Receiver<ClientNotice>,
    ) {
        while let Ok(command) = commands.try_recv() {
            self.drain_notices(notices);
            self.handle_command(command);
        }
        self.drain_notices(notices);
        self.disconnect();
        self.reporter.flush_warnings();
    }
}
