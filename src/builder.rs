//! Builder for [`KafkaTransport`](crate::kafka_transport::KafkaTransport).
//!
//! Every setter records an override in [`TransportOptions`], so values set
//! here and values supplied as raw options go through the same deep merge
//! and validation when [`TransportBuilder::build`] runs.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    broker::{BrokerClient, OutboundMessage},
    config::{TransportConfig, TransportOptions},
    error::BuildError,
    kafka_transport::{DeliveryOutcome, KafkaTransport, OutcomeHook},
    serialise::{Clock, CycleSafeJson, RecordSerialiser, Serialiser, system_clock},
};

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $path:literal, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.options = self.options.set($path, value);
            self
        }
    };
}

#[derive(Clone, Default)]
pub struct TransportBuilder {
    options: TransportOptions,
    serialiser: Option<Arc<dyn RecordSerialiser>>,
    clock: Option<Clock>,
    hook: Option<OutcomeHook>,
}

impl TransportBuilder {
    /// Start from the defaults plus any environment overrides.
    pub fn new() -> Self {
        Self {
            options: TransportOptions::new().with_env(),
            ..Self::default()
        }
    }

    /// Merge raw option overrides over those already recorded.
    pub fn with_options(mut self, options: &TransportOptions) -> Self {
        self.options = self.options.merge(options);
        self
    }

    /// Destination topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.options = self.options.set("topic", topic.into());
        self
    }

    /// Bootstrap broker addresses (`host:port`).
    pub fn with_brokers<I, S>(mut self, brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<Value> = brokers
            .into_iter()
            .map(|b| Value::String(b.into()))
            .collect();
        self.options = self.options.set("broker_options.brokers", list);
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.options = self
            .options
            .set("broker_options.client_id", client_id.into());
        self
    }

    option_setter!(
        /// Fixed target partition.
        with_partition, "partition", i32
    );
    option_setter!(
        /// Start connecting as soon as the transport is built.
        with_auto_connect, "auto_connect", bool
    );
    option_setter!(
        /// Log every delivery outcome instead of rate-limited failure summaries.
        with_verbose_delivery_logging, "verbose_delivery_logging", bool
    );
    option_setter!(
        /// Bound the number of messages parked while connecting.
        with_pending_capacity, "pending_capacity", usize
    );
    option_setter!(
        /// Resend a failed message up to this many extra times.
        with_resend_attempts, "resend_attempts", u32
    );
    option_setter!(with_shutdown_timeout_ms, "shutdown_timeout_ms", u64);
    option_setter!(with_warn_interval_ms, "warn_interval_ms", u64);

    /// Replace the default cycle-safe JSON encoder.
    pub fn with_serialiser(mut self, serialiser: impl RecordSerialiser + 'static) -> Self {
        self.serialiser = Some(Arc::new(serialiser));
        self
    }

    /// Replace the clock used to stamp records.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Observe every delivery outcome. Panics in the hook are contained.
    pub fn with_outcome_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DeliveryOutcome, &OutboundMessage) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Resolve and validate the configuration without spawning anything.
    pub fn config(&self) -> Result<TransportConfig, BuildError> {
        TransportConfig::from_options(&self.options)
    }

    /// Build the transport around `client`.
    pub fn build<C: BrokerClient>(self, client: C) -> Result<KafkaTransport, BuildError> {
        let config = self.config()?;
        let serialiser = Serialiser::new(
            self.serialiser.unwrap_or_else(|| Arc::new(CycleSafeJson)),
            self.clock.unwrap_or_else(system_clock),
        );
        KafkaTransport::spawn(client, config, serialiser, self.hook)
    }
}

impl std::fmt::Debug for TransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportBuilder")
            .field("options", self.options.as_value())
            .field("custom_serialiser", &self.serialiser.is_some())
            .field("custom_clock", &self.clock.is_some())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
