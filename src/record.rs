use crate::level::Level;
use serde::Serialize;
use serde_json::{Map, Value};

/// Keys taken by the entry metadata of a [`LogRecord`].
pub const RESERVED_KEYS: [&str; 5] = ["ts", "level", "logger", "msg", "caller"];

/// Prefix given to field keys that collide with [`RESERVED_KEYS`].
pub const RESERVED_PREFIX: &str = "fields.";

/// One rendered entry, as produced by the JSON backend and consumed by
/// [`LogSink`](crate::sink::LogSink)s.
///
/// Serializes to a flat JSON object: the entry metadata first, then the
/// bound context fields, then the call's own fields in input order. Fill
/// `fields` through [`insert_field`] so no field shadows the metadata.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub ts: String,
    pub level: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Insert a field, renaming a key taken by the metadata to
/// `fields.<key>`. A key already present keeps its position and takes the
/// new value.
pub fn insert_field(fields: &mut Map<String, Value>, key: String, value: Value) {
    let key = if RESERVED_KEYS.contains(&key.as_str()) {
        format!("{RESERVED_PREFIX}{key}")
    } else {
        key
    };
    fields.insert(key, value);
}
