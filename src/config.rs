//! Transport configuration.
//!
//! [`TransportConfig`] is assembled once at construction by deep-merging the
//! caller's [`TransportOptions`] over the serialised defaults and decoding the
//! result. The snapshot is read-only for the lifetime of the transport.

use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BuildError;

/// Default destination topic.
pub const DEFAULT_TOPIC: &str = "winston-kafka-logs";
/// Default client identifier announced to the broker.
pub const DEFAULT_CLIENT_ID: &str = "winston-kafka-logger";
/// Default broker address.
pub const DEFAULT_BROKER: &str = "127.0.0.1:9092";
/// Environment variable toggling verbose delivery logging.
pub const VERBOSE_ENV_VAR: &str = "KAFKA_TRANSPORT_VERBOSE";

static DEFAULTS: Lazy<Value> = Lazy::new(|| {
    serde_json::to_value(TransportConfig::default()).unwrap_or_else(|_| Value::Object(Map::new()))
});

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(BuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok(())
        }
    }};
}

/// Retry policy shared with the broker client and used for opt-in resends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Attempts the broker client may make before giving up.
    pub retries: u32,
    pub factor: u32,
    pub min_timeout_ms: u64,
    pub max_timeout_ms: u64,
    /// Apply random jitter to each delay.
    pub randomize: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            factor: 2,
            min_timeout_ms: 1_000,
            max_timeout_ms: 60_000,
            randomize: true,
        }
    }
}

impl RetryPolicy {
    pub fn min_timeout(&self) -> Duration {
        Duration::from_millis(self.min_timeout_ms)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }
}

/// Options handed to the broker client on every connection attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerOptions {
    /// `host:port` addresses of the bootstrap brokers.
    pub brokers: Vec<String>,
    pub client_id: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            brokers: vec![DEFAULT_BROKER.to_owned()],
            client_id: DEFAULT_CLIENT_ID.to_owned(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl BrokerOptions {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Acknowledgement policy applied by the broker client to each send.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProducerOptions {
    /// Number of broker acknowledgements required (`-1` for all replicas).
    pub require_acks: i16,
    pub ack_timeout_ms: u64,
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self {
            require_acks: 1,
            ack_timeout_ms: 100,
        }
    }
}

/// Complete configuration snapshot for one transport instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    pub topic: String,
    pub partition: i32,
    pub broker_options: BrokerOptions,
    pub producer: ProducerOptions,
    /// Start connecting when the transport is constructed.
    pub auto_connect: bool,
    pub verbose_delivery_logging: bool,
    /// Upper bound on messages parked while connecting; unbounded if `None`.
    pub pending_capacity: Option<usize>,
    /// Extra attempts made by the transport after a failed send.
    pub resend_attempts: u32,
    /// How long `close` waits for the worker to acknowledge shutdown.
    pub shutdown_timeout_ms: u64,
    /// Minimum interval between rate-limited drop warnings.
    pub warn_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_owned(),
            partition: 0,
            broker_options: BrokerOptions::default(),
            producer: ProducerOptions::default(),
            auto_connect: true,
            verbose_delivery_logging: false,
            pending_capacity: None,
            resend_attempts: 0,
            shutdown_timeout_ms: 5_000,
            warn_interval_ms: 5_000,
        }
    }
}

impl TransportConfig {
    /// Merge `options` over the defaults and validate the result.
    pub fn from_options(options: &TransportOptions) -> Result<Self, BuildError> {
        let mut merged = DEFAULTS.clone();
        deep_merge(&mut merged, &options.overrides);
        let config: Self = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn warn_interval(&self) -> Duration {
        Duration::from_millis(self.warn_interval_ms)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.topic.trim().is_empty() {
            return Err(BuildError::InvalidConfig("topic must not be empty".into()));
        }
        if self.partition < 0 {
            return Err(BuildError::InvalidConfig(
                "partition must not be negative".into(),
            ));
        }
        let brokers = &self.broker_options.brokers;
        if brokers.is_empty() || brokers.iter().any(|b| b.trim().is_empty()) {
            return Err(BuildError::InvalidConfig(
                "broker_options.brokers must list at least one address".into(),
            ));
        }
        ensure_positive!(
            self.broker_options.connect_timeout_ms,
            "broker_options.connect_timeout_ms"
        )?;
        ensure_positive!(
            self.broker_options.request_timeout_ms,
            "broker_options.request_timeout_ms"
        )?;
        let retry = &self.broker_options.retry;
        ensure_positive!(retry.factor, "broker_options.retry.factor")?;
        if retry.min_timeout_ms > retry.max_timeout_ms {
            return Err(BuildError::InvalidConfig(
                "broker_options.retry.min_timeout_ms exceeds max_timeout_ms".into(),
            ));
        }
        if let Some(capacity) = self.pending_capacity {
            ensure_positive!(capacity, "pending_capacity")?;
        }
        ensure_positive!(self.shutdown_timeout_ms, "shutdown_timeout_ms")?;
        Ok(())
    }
}

/// User-supplied overrides, merged over [`TransportConfig::default`].
///
/// Overrides are a JSON object whose shape mirrors [`TransportConfig`];
/// nested objects merge key by key, every other value replaces the default.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportOptions {
    overrides: Value,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            overrides: Value::Object(Map::new()),
        }
    }
}

impl TransportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object of overrides.
    pub fn from_value(overrides: Value) -> Result<Self, BuildError> {
        if !overrides.is_object() {
            return Err(BuildError::InvalidConfig(
                "transport options must be a JSON object".into(),
            ));
        }
        Ok(Self { overrides })
    }

    /// Set the value at `path` (dot separated), creating parents as needed.
    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        set_path(&mut self.overrides, path, value.into());
        self
    }

    /// Merge another set of overrides over this one.
    pub fn merge(mut self, other: &TransportOptions) -> Self {
        deep_merge(&mut self.overrides, &other.overrides);
        self
    }

    /// Apply the verbose toggle from [`VERBOSE_ENV_VAR`] when it is set.
    pub fn with_env(self) -> Self {
        match std::env::var(VERBOSE_ENV_VAR)
            .ok()
            .as_deref()
            .and_then(parse_flag)
        {
            Some(flag) => self.set("verbose_delivery_logging", flag),
            None => self,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.overrides
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Write `value` at a dot-separated `path`, replacing non-object parents.
fn set_path(root: &mut Value, path: &str, value: Value) {
    let mut node = root;
    for segment in path.split('.') {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Some(map) = node.as_object_mut() else {
            return;
        };
        node = map.entry(segment.to_owned()).or_insert(Value::Null);
    }
    *node = value;
}

/// Recursively merge `overlay` into `base`.
fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                deep_merge(base.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}
