//! Observation of delivery outcomes.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{info, warn};

use crate::broker::OutboundMessage;
use crate::error::ConnectionError;
use crate::rate_limited_warner::RateLimitedWarner;

use super::dispatcher::DeliveryOutcome;

/// Callback invoked for every delivery outcome.
pub type OutcomeHook = Arc<dyn Fn(&DeliveryOutcome, &OutboundMessage) + Send + Sync>;

/// Snapshot of the reporter's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    /// Rejected or unacknowledged by the broker.
    pub failed: u64,
    /// Discarded by the transport without a broker verdict.
    pub dropped: u64,
    pub connection_failures: u64,
}

/// Surfaces delivery outcomes without influencing the pipeline.
///
/// Shared between the transport handle and its worker. Nothing here returns
/// an error or lets a panic from the user hook escape.
pub struct DeliveryReporter {
    verbose: bool,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    connection_failures: AtomicU64,
    warner: RateLimitedWarner,
    hook: Option<OutcomeHook>,
}

impl DeliveryReporter {
    pub fn new(verbose: bool, warn_interval: Duration, hook: Option<OutcomeHook>) -> Self {
        Self {
            verbose,
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            connection_failures: AtomicU64::new(0),
            warner: RateLimitedWarner::new(warn_interval),
            hook,
        }
    }

    /// Record the outcome of one message.
    pub fn report(&self, outcome: &DeliveryOutcome, message: &OutboundMessage) {
        match outcome {
            DeliveryOutcome::Delivered => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                if self.verbose {
                    info!(
                        "KafkaTransport delivered {} to {}[{}]",
                        message.key, message.topic, message.partition
                    );
                }
            }
            DeliveryOutcome::Failed(err) => {
                let counter = if err.is_dropped() {
                    &self.dropped
                } else {
                    &self.failed
                };
                counter.fetch_add(1, Ordering::Relaxed);
                if self.verbose {
                    warn!(
                        "KafkaTransport failed to deliver {} to {}[{}]: {err}",
                        message.key, message.topic, message.partition
                    );
                } else {
                    self.warner.record_drop();
                    self.warner.warn_if_due(|count| {
                        warn!("KafkaTransport dropped {count} messages; last error: {err}");
                    });
                }
            }
        }
        self.call_hook(outcome, message);
    }

    /// Record a fatal connection error. Always logged.
    pub fn connection_failed(&self, err: &ConnectionError) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
        warn!("KafkaTransport connection failed: {err}");
    }

    /// Emit any drop warning held back by the rate limit.
    pub fn flush_warnings(&self) {
        self.warner.flush(|count| {
            warn!("KafkaTransport dropped {count} messages in the last interval");
        });
    }

    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
        }
    }

    fn call_hook(&self, outcome: &DeliveryOutcome, message: &OutboundMessage) {
        let Some(hook) = &self.hook else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| hook(outcome, message))).is_err() {
            log::debug!("KafkaTransport delivery hook panicked; ignoring");
        }
    }
}

impl fmt::Debug for DeliveryReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryReporter")
            .field("verbose", &self.verbose)
            .field("stats", &self.stats())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
