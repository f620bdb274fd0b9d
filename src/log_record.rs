//! Log record representation shipped by the transport.
//!
//! A [`LogRecord`] is an ordered mapping of field names to [`LogValue`]s. The
//! value tree mirrors JSON, with one addition: [`SharedValue`] nodes let the
//! caller reuse the same sub-tree in several places, or point a node back at
//! one of its ancestors. The serialiser tracks these nodes by identity so
//! cyclic records still encode to a finite payload.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// A single value stored in a [`LogRecord`].
#[derive(Clone, Debug, Default)]
pub enum LogValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Array(Vec<LogValue>),
    Map(BTreeMap<String, LogValue>),
    /// Reference-counted node that may be shared or form a cycle.
    Shared(SharedValue),
}

impl LogValue {
    /// Construct an empty map value.
    pub fn map() -> Self {
        LogValue::Map(BTreeMap::new())
    }

    /// Return the string payload when this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LogValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Shared, interior-mutable value node.
///
/// Cloning a `SharedValue` clones the handle, not the contents. Building a
/// cycle out of `SharedValue`s leaks the nodes once the last outside handle is
/// dropped; callers producing cyclic records should break the cycle with
/// [`SharedValue::set`] when they are done with it.
#[derive(Clone, Default)]
pub struct SharedValue(Arc<RwLock<LogValue>>);

impl SharedValue {
    pub fn new(value: impl Into<LogValue>) -> Self {
        Self(Arc::new(RwLock::new(value.into())))
    }

    /// Replace the node's contents.
    pub fn set(&self, value: impl Into<LogValue>) {
        *self.0.write() = value.into();
    }

    /// Insert `value` under `key`, converting the node into a map if needed.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<LogValue>) {
        let mut guard = self.0.write();
        if !matches!(*guard, LogValue::Map(_)) {
            *guard = LogValue::map();
        }
        if let LogValue::Map(map) = &mut *guard {
            map.insert(key.into(), value.into());
        }
    }

    /// Append `value`, converting the node into an array if needed.
    pub fn push(&self, value: impl Into<LogValue>) {
        let mut guard = self.0.write();
        if !matches!(*guard, LogValue::Array(_)) {
            *guard = LogValue::Array(Vec::new());
        }
        if let LogValue::Array(items) = &mut *guard {
            items.push(value.into());
        }
    }

    /// Identity of the node, stable for as long as any handle is alive.
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub(crate) fn read(&self) -> parking_lot::RwLockReadGuard<'_, LogValue> {
        self.0.read()
    }
}

impl fmt::Debug for SharedValue {
    // Contents are not printed: the node may be part of a cycle.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedValue")
            .field(&format_args!("{:#x}", self.id()))
            .finish()
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for LogValue {
                fn from(value: $ty) -> Self {
                    LogValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_value! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => UInt,
    u64 => UInt,
    f64 => Float,
    String => String,
    &str => String,
    Vec<LogValue> => Array,
    BTreeMap<String, LogValue> => Map,
    SharedValue => Shared,
}

impl<T: Into<LogValue>> From<Option<T>> for LogValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(LogValue::Null, Into::into)
    }
}

impl From<serde_json::Value> for LogValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => LogValue::Null,
            Value::Bool(b) => LogValue::Bool(b),
            Value::Number(n) => n
                .as_i64()
                .map(LogValue::Int)
                .or_else(|| n.as_u64().map(LogValue::UInt))
                .unwrap_or_else(|| LogValue::Float(n.as_f64().unwrap_or(f64::NAN))),
            Value::String(s) => LogValue::String(s),
            Value::Array(items) => LogValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                LogValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Structured log entry handed to the transport by the application.
#[derive(Clone, Debug, Default)]
pub struct LogRecord {
    fields: BTreeMap<String, LogValue>,
}

impl LogRecord {
    /// Construct an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct the conventional `level`/`message` pair.
    pub fn with_message(level: &str, message: &str) -> Self {
        Self::new().with("level", level).with("message", message)
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<LogValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<LogValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&LogValue> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &BTreeMap<String, LogValue> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for LogRecord
where
    K: Into<String>,
    V: Into<LogValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = self.get("level").and_then(LogValue::as_str).unwrap_or("-");
        let message = self.get("message").and_then(LogValue::as_str).unwrap_or("");
        write!(f, "{level} - {message}")
    }
}
