//! Cycle-safe record serialisation.
//!
//! The default encoder walks the [`LogValue`] tree and emits JSON. Every
//! [`SharedValue`] node is remembered by identity together with the path at
//! which it was first written; any later visit (a cycle back to an ancestor or
//! a second reference to the same node) is emitted as `{"$ref": "<path>"}`.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::{Map, Number, Value};

use crate::error::SerialiseError;
use crate::log_record::{LogRecord, LogValue};

/// Field added to every record before it is serialised.
pub const TIMESTAMP_FIELD: &str = "timestamp";
/// Key of the marker object substituted for repeated references.
pub const REF_MARKER: &str = "$ref";

/// Returns the current time in milliseconds since the Unix epoch.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Clock backed by the system wall clock.
pub fn system_clock() -> Clock {
    Arc::new(|| u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0))
}

/// Converts a record into a transportable payload.
pub trait RecordSerialiser: Send + Sync {
    fn serialise(&self, record: &LogRecord) -> Result<Vec<u8>, SerialiseError>;
}

impl<F> RecordSerialiser for F
where
    F: Fn(&LogRecord) -> Result<Vec<u8>, SerialiseError> + Send + Sync,
{
    fn serialise(&self, record: &LogRecord) -> Result<Vec<u8>, SerialiseError> {
        self(record)
    }
}

/// Default serialiser producing cycle-safe JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct CycleSafeJson;

impl CycleSafeJson {
    /// Convert a record into a JSON value, replacing repeated references.
    pub fn to_value(record: &LogRecord) -> Value {
        let mut encoder = Encoder::default();
        let mut path = String::from("$");
        let mut object = Map::with_capacity(record.len());
        for (key, value) in record.fields() {
            let mark = path.len();
            push_key(&mut path, key);
            object.insert(key.clone(), encoder.encode(value, &mut path));
            path.truncate(mark);
        }
        Value::Object(object)
    }
}

impl RecordSerialiser for CycleSafeJson {
    fn serialise(&self, record: &LogRecord) -> Result<Vec<u8>, SerialiseError> {
        Ok(serde_json::to_vec(&Self::to_value(record))?)
    }
}

#[derive(Default)]
struct Encoder {
    seen: HashMap<usize, String>,
}

impl Encoder {
    fn encode(&mut self, value: &LogValue, path: &mut String) -> Value {
        match value {
            LogValue::Null => Value::Null,
            LogValue::Bool(b) => Value::Bool(*b),
            LogValue::Int(i) => Value::from(*i),
            LogValue::UInt(u) => Value::from(*u),
            // Non-finite floats have no JSON form; encode them as null.
            LogValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            LogValue::String(s) => Value::String(s.clone()),
            LogValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let mark = path.len();
                    let _ = write!(path, "[{index}]");
                    out.push(self.encode(item, path));
                    path.truncate(mark);
                }
                Value::Array(out)
            }
            LogValue::Map(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, item) in map {
                    let mark = path.len();
                    push_key(path, key);
                    out.insert(key.clone(), self.encode(item, path));
                    path.truncate(mark);
                }
                Value::Object(out)
            }
            LogValue::Shared(node) => {
                if let Some(first) = self.seen.get(&node.id()) {
                    let mut marker = Map::with_capacity(1);
                    marker.insert(REF_MARKER.to_owned(), Value::String(first.clone()));
                    return Value::Object(marker);
                }
                self.seen.insert(node.id(), path.clone());
                let guard = node.read();
                self.encode(&guard, path)
            }
        }
    }
}

fn push_key(path: &mut String, key: &str) {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plain {
        path.push('.');
        path.push_str(key);
    } else {
        // serde_json never fails to encode a string.
        let quoted = serde_json::to_string(key).unwrap_or_default();
        let _ = write!(path, "[{quoted}]");
    }
}

/// Stamps records with the capture time and runs the configured serialiser.
#[derive(Clone)]
pub struct Serialiser {
    inner: Arc<dyn RecordSerialiser>,
    clock: Clock,
}

impl Serialiser {
    pub fn new(inner: Arc<dyn RecordSerialiser>, clock: Clock) -> Self {
        Self { inner, clock }
    }

    /// Serialise `record`, overwriting any caller-supplied timestamp field.
    pub fn serialise(&self, mut record: LogRecord) -> Result<Vec<u8>, SerialiseError> {
        record.insert(TIMESTAMP_FIELD, (self.clock)());
        self.inner.serialise(&record)
    }
}

impl Default for Serialiser {
    fn default() -> Self {
        Self::new(Arc::new(CycleSafeJson), system_clock())
    }
}

impl std::fmt::Debug for Serialiser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Serialiser").finish_non_exhaustive()
    }
}
