//! JSON backend: every field becomes a `serde_json::Value`, every entry a
//! flat JSON object.

use crate::dispatch::Dispatcher;
use crate::encoder::{
    ArrayEncoder, ArrayMarshaler, ErrorRef, FieldMapper, ObjectEncoder, ObjectMarshaler,
};
use crate::field::{AnyValue, Field};
use crate::level::Level;
use crate::logger::{conclude, join_name, Backend, BuildError, Caller, Logger, Options};
use crate::record::{insert_field, LogRecord};
use crate::sink::SinkError;
use crate::translate::translate;
use crate::writer_sink::WriterSink;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value as JsonValue};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// How long [`Logger::sync`] waits for a dispatcher to drain.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(5);

/// A ready-made JSON value carried through an `Any` field.
///
/// Built by [`native`]; the mapper emits it untouched under its own key.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonNative {
    key: String,
    value: JsonValue,
}

/// Escape hatch: a field whose value is already JSON.
pub fn native(key: impl Into<String>, value: JsonValue) -> Field {
    let key = key.into();
    Field::any(key.clone(), JsonNative { key, value })
}

/// [`FieldMapper`] producing `(key, serde_json::Value)` pairs.
#[derive(Debug, Clone, Default)]
pub struct JsonMapper {
    time_layout: Option<String>,
}

impl JsonMapper {
    /// Mapper rendering times with a chrono `strftime` layout, or RFC 3339
    /// with nanoseconds when `None`.
    pub fn with_layout(time_layout: Option<String>) -> Result<Self, BuildError> {
        if let Some(layout) = &time_layout {
            if StrftimeItems::new(layout).any(|item| matches!(item, Item::Error)) {
                return Err(BuildError::InvalidTimeLayout(layout.clone()));
            }
        }
        Ok(JsonMapper { time_layout })
    }

    pub fn render_time(&self, at: DateTime<Utc>) -> String {
        let Some(layout) = &self.time_layout else {
            return at.to_rfc3339_opts(SecondsFormat::Nanos, true);
        };
        let mut out = String::new();
        match write!(out, "{}", at.format(layout)) {
            Ok(()) => out,
            Err(_) => at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        }
    }

    fn reflected_value(&self, value: &AnyValue) -> (Option<String>, JsonValue) {
        match value.downcast_ref::<JsonNative>() {
            Some(native) => (Some(native.key.clone()), native.value.clone()),
            None => (None, JsonValue::String(format!("{value:?}"))),
        }
    }
}

fn float(value: f64) -> JsonValue {
    match Number::from_f64(value) {
        Some(n) => JsonValue::Number(n),
        None => JsonValue::String(value.to_string()),
    }
}

fn seconds(value: Duration) -> JsonValue {
    float(value.as_secs_f64())
}

fn raw(json: &[u8]) -> JsonValue {
    serde_json::from_slice(json)
        .unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(json).into_owned()))
}

/// The message of `err` followed by each of its sources.
fn error_chain(err: ErrorRef<'_>) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

impl FieldMapper for JsonMapper {
    type Field = (String, JsonValue);

    fn native(&self, value: &AnyValue) -> Option<Self::Field> {
        value
            .downcast_ref::<JsonNative>()
            .map(|native| (native.key.clone(), native.value.clone()))
    }

    fn string(&self, key: &str, value: &str) -> Self::Field {
        (key.to_string(), JsonValue::from(value))
    }

    fn bool(&self, key: &str, value: bool) -> Self::Field {
        (key.to_string(), JsonValue::Bool(value))
    }

    fn i64(&self, key: &str, value: i64) -> Self::Field {
        (key.to_string(), JsonValue::from(value))
    }

    fn u64(&self, key: &str, value: u64) -> Self::Field {
        (key.to_string(), JsonValue::from(value))
    }

    fn f64(&self, key: &str, value: f64) -> Self::Field {
        (key.to_string(), float(value))
    }

    fn time(&self, key: &str, value: DateTime<Utc>) -> Self::Field {
        (key.to_string(), JsonValue::String(self.render_time(value)))
    }

    fn duration(&self, key: &str, value: Duration) -> Self::Field {
        (key.to_string(), seconds(value))
    }

    fn error(&self, key: &str, err: ErrorRef<'_>) -> Self::Field {
        (key.to_string(), JsonValue::String(error_chain(err)))
    }

    fn raw_json(&self, key: &str, json: &[u8]) -> Self::Field {
        (key.to_string(), raw(json))
    }

    fn reflected(&self, key: &str, value: &AnyValue) -> Self::Field {
        let (_, json) = self.reflected_value(value);
        (key.to_string(), json)
    }

    fn array(&self, key: &str, array: &dyn ArrayMarshaler) -> Self::Field {
        let mut enc = JsonArray::default();
        array.marshal_array(&mut enc);
        (key.to_string(), JsonValue::Array(enc.0))
    }

    fn object(&self, key: &str, object: &dyn ObjectMarshaler) -> Self::Field {
        let mut enc = JsonObject::new(self);
        object.marshal_object(&mut enc);
        (key.to_string(), JsonValue::Object(enc.map))
    }
}

#[derive(Default)]
struct JsonArray(Vec<JsonValue>);

impl ArrayEncoder for JsonArray {
    fn append_str(&mut self, value: &str) {
        self.0.push(JsonValue::from(value));
    }

    fn append_bool(&mut self, value: bool) {
        self.0.push(JsonValue::Bool(value));
    }

    fn append_i64(&mut self, value: i64) {
        self.0.push(JsonValue::from(value));
    }

    fn append_u64(&mut self, value: u64) {
        self.0.push(JsonValue::from(value));
    }

    fn append_f64(&mut self, value: f64) {
        self.0.push(float(value));
    }
}

struct JsonObject<'a> {
    mapper: &'a JsonMapper,
    map: Map<String, JsonValue>,
}

impl<'a> JsonObject<'a> {
    fn new(mapper: &'a JsonMapper) -> Self {
        JsonObject {
            mapper,
            map: Map::new(),
        }
    }
}

impl ObjectEncoder for JsonObject<'_> {
    fn add_str(&mut self, key: &str, value: &str) {
        self.map.insert(key.to_string(), JsonValue::from(value));
    }

    fn add_bool(&mut self, key: &str, value: bool) {
        self.map.insert(key.to_string(), JsonValue::Bool(value));
    }

    fn add_i64(&mut self, key: &str, value: i64) {
        self.map.insert(key.to_string(), JsonValue::from(value));
    }

    fn add_u64(&mut self, key: &str, value: u64) {
        self.map.insert(key.to_string(), JsonValue::from(value));
    }

    fn add_f64(&mut self, key: &str, value: f64) {
        self.map.insert(key.to_string(), float(value));
    }

    fn add_time(&mut self, key: &str, value: DateTime<Utc>) {
        let rendered = self.mapper.render_time(value);
        self.map.insert(key.to_string(), JsonValue::String(rendered));
    }

    fn add_duration(&mut self, key: &str, value: Duration) {
        self.map.insert(key.to_string(), seconds(value));
    }

    fn add_raw_json(&mut self, key: &str, json: &[u8]) {
        self.map.insert(key.to_string(), raw(json));
    }

    fn add_reflected(&mut self, key: &str, value: &AnyValue) {
        let (native_key, json) = self.mapper.reflected_value(value);
        self.map
            .insert(native_key.unwrap_or_else(|| key.to_string()), json);
    }

    fn add_array(&mut self, key: &str, array: &dyn ArrayMarshaler) {
        let mut enc = JsonArray::default();
        array.marshal_array(&mut enc);
        self.map.insert(key.to_string(), JsonValue::Array(enc.0));
    }

    fn add_object(&mut self, key: &str, object: &dyn ObjectMarshaler) {
        let mut enc = JsonObject::new(self.mapper);
        object.marshal_object(&mut enc);
        self.map.insert(key.to_string(), JsonValue::Object(enc.map));
    }
}

/// Builds [`JsonLogger`]s.
///
/// Entries go to `Options::writer` when one is given, otherwise to the
/// dispatcher set with [`with_dispatcher`](JsonBackend::with_dispatcher),
/// otherwise to stderr.
#[derive(Clone, Default)]
pub struct JsonBackend {
    development: bool,
    time_layout: Option<String>,
    dispatcher: Option<Dispatcher>,
}

impl JsonBackend {
    pub fn new() -> Self {
        JsonBackend::default()
    }

    /// Development loggers panic on `DPanic`.
    pub fn development(mut self, on: bool) -> Self {
        self.development = on;
        self
    }

    /// Time layout used when `Options::time_layout` is unset.
    pub fn with_time_layout(mut self, layout: impl Into<String>) -> Self {
        self.time_layout = Some(layout.into());
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }
}

impl Backend for JsonBackend {
    fn build(&self, options: Options) -> Result<Box<dyn Logger>, BuildError> {
        let layout = options.time_layout.or_else(|| self.time_layout.clone());
        let mapper = JsonMapper::with_layout(layout)?;

        let output = match (options.writer, &self.dispatcher) {
            (Some(writer), _) => Output::Writer(WriterSink::from_boxed(writer)),
            (None, Some(dispatcher)) => Output::Dispatch(dispatcher.clone()),
            (None, None) => Output::Writer(WriterSink::stderr()),
        };

        let root = JsonLogger {
            core: Arc::new(Core {
                mapper,
                level: options.level,
                development: self.development,
                add_source: options.add_source,
                output,
            }),
            name: options.name,
            context: Arc::new(Map::new()),
        };

        if options.fields.is_empty() {
            Ok(Box::new(root))
        } else {
            Ok(root.with(&options.fields))
        }
    }
}

enum Output {
    Writer(WriterSink),
    Dispatch(Dispatcher),
}

impl Output {
    fn emit(&self, record: LogRecord) {
        match self {
            Output::Writer(sink) => {
                if let Err(err) = sink.write_record(&record) {
                    tracing::warn!(target: "fieldlog", error = %err, "failed to write log record");
                }
            }
            Output::Dispatch(dispatcher) => dispatcher.submit(record),
        }
    }

    fn sync(&self) -> Result<(), SinkError> {
        match self {
            Output::Writer(sink) => sink.flush_writer(),
            Output::Dispatch(dispatcher) => dispatcher.flush_blocking(SYNC_TIMEOUT),
        }
    }
}

struct Core {
    mapper: JsonMapper,
    level: Level,
    development: bool,
    add_source: bool,
    output: Output,
}

/// [`Logger`] writing [`LogRecord`]s.
///
/// Bound context is encoded once, when [`with`](Logger::with) is called,
/// and shared by every entry of the child. A call field reusing a bound key
/// replaces the bound value in place. Keys taken by the entry metadata
/// (`ts`, `level`, `logger`, `msg`, `caller`) are written as `fields.<key>`.
///
/// With a dispatcher, [`sync`](Logger::sync) blocks until the queued
/// entries reach the sink, for at most [`SYNC_TIMEOUT`].
#[derive(Clone)]
pub struct JsonLogger {
    core: Arc<Core>,
    name: String,
    context: Arc<Map<String, JsonValue>>,
}

impl JsonLogger {
    fn record(&self, level: Level, msg: &str, fields: &[Field], caller: Caller) -> LogRecord {
        let mut map = (*self.context).clone();
        for (key, value) in translate(&self.core.mapper, level, &|l| self.enabled(l), fields) {
            insert_field(&mut map, key, value);
        }
        LogRecord {
            ts: self.core.mapper.render_time(Utc::now()),
            level,
            logger: (!self.name.is_empty()).then(|| self.name.clone()),
            msg: msg.to_string(),
            caller: self
                .core
                .add_source
                .then(|| format!("{}:{}", caller.file(), caller.line())),
            fields: map,
        }
    }
}

impl Logger for JsonLogger {
    fn enabled(&self, level: Level) -> bool {
        level >= self.core.level
    }

    fn log(&self, level: Level, msg: &str, fields: &[Field], caller: Caller) {
        if self.enabled(level) {
            self.core.output.emit(self.record(level, msg, fields, caller));
        }
        conclude(level, self.core.development, msg, || self.sync());
    }

    fn with(&self, fields: &[Field]) -> Box<dyn Logger> {
        let mut context = (*self.context).clone();
        for (key, value) in translate(&self.core.mapper, Level::Info, &|l| self.enabled(l), fields) {
            insert_field(&mut context, key, value);
        }
        Box::new(JsonLogger {
            core: Arc::clone(&self.core),
            name: self.name.clone(),
            context: Arc::new(context),
        })
    }

    fn named(&self, name: &str) -> Box<dyn Logger> {
        Box::new(JsonLogger {
            core: Arc::clone(&self.core),
            name: join_name(&self.name, name),
            context: Arc::clone(&self.context),
        })
    }

    fn sync(&self) -> Result<(), SinkError> {
        self.core.output.sync()
    }
}
