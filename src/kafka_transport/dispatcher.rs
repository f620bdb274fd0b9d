//! Single-message dispatch through a ready broker client.

use std::thread;

use log::debug;

use crate::broker::{BrokerClient, OutboundMessage};
use crate::config::RetryPolicy;
use crate::error::DeliveryError;

use super::backoff::BackoffState;

/// Terminal result of delivering one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(DeliveryError),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Sends messages and interprets the client's result.
///
/// By default a failed send is final. With `resend_attempts > 0` the
/// dispatcher retries on the calling (worker) thread, sleeping according to
/// the retry policy between attempts. The schedule restarts for each message.
pub struct Dispatcher {
    resend_attempts: u32,
    backoff: BackoffState,
}

impl Dispatcher {
    pub fn new(resend_attempts: u32, policy: RetryPolicy) -> Self {
        Self {
            resend_attempts,
            backoff: BackoffState::new(policy),
        }
    }

    /// Deliver `message` through `client`.
    pub fn send<C: BrokerClient + ?Sized>(
        &mut self,
        message: &OutboundMessage,
        client: &mut C,
    ) -> DeliveryOutcome {
        // Each message starts its resend schedule at the minimum delay.
        self.backoff.reset();
        let mut attempt = 0;
        loop {
            match client.send(message) {
                Ok(()) => return DeliveryOutcome::Delivered,
                Err(err) if attempt < self.resend_attempts => {
                    attempt += 1;
                    let delay = self.backoff.next_delay();
                    debug!(
                        "KafkaTransport resending {} after {err} (attempt {attempt}, in {delay:?})",
                        message.key
                    );
                    thread::sleep(delay);
                }
                Err(err) => return DeliveryOutcome::Failed(err.into()),
            }
        }
    }
}
