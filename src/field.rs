//! Portable structured fields: a key plus a typed value.
//!
//! [`Value`] is a closed sum type with one variant per [`Kind`], so a field's
//! discriminant and its payload can never disagree. Fields are built through
//! the constructors on [`Field`] and are immutable afterwards.

use crate::level::Level;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Key used by [`Field::error`] and by translators when an error field has
/// an empty key.
pub const ERROR_KEY: &str = "error";

/// Key used by [`Field::timestamp`].
pub const TIMESTAMP_KEY: &str = "ts";

pub type Key = Cow<'static, str>;

/// Error payload shared between clones of a field.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Discriminant of a [`Field`]'s payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Kind {
    /// No-op marker.
    Invalid,
    Any,
    String,
    Bool,
    Int64,
    Uint64,
    Float64,
    Time,
    Duration,
    Error,
    Strings,
    Bools,
    Int64s,
    Uint64s,
    Float64s,
    Errors,
    Dict,
    RawJson,
    HexBytes,
    LazyFields,
    LazyValue,
    Timestamp,
}

/// Anything that can travel in an [`Value::Any`] payload.
///
/// Implemented for every `Debug + Send + Sync + 'static` type. The
/// [`as_any`](Reflect::as_any) hook lets backends recognise their own
/// native wrapper types.
pub trait Reflect: fmt::Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

impl<T: fmt::Debug + Send + Sync + 'static> Reflect for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Unconstrained payload of the `Any` kind.
#[derive(Clone)]
pub struct AnyValue(Arc<dyn Reflect>);

impl AnyValue {
    pub fn new<T: Reflect>(value: T) -> Self {
        AnyValue(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        <dyn Reflect as Reflect>::as_any(&*self.0).downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    pub fn ptr_eq(&self, other: &AnyValue) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Context handed to a lazy producer when it is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LazyContext {
    level: Level,
    depth: usize,
}

impl LazyContext {
    pub fn new(level: Level, depth: usize) -> Self {
        LazyContext { level, depth }
    }

    /// Severity of the entry being translated.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Number of lazy producers enclosing this one; zero for a top-level producer.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Deferred producer of fields.
///
/// Only called when the target severity is enabled, synchronously on the
/// logging thread. Implementations must be fast and free of side effects.
pub trait Expand: Send + Sync {
    fn expand(&self, cx: &LazyContext) -> Vec<Field>;
}

impl<F> Expand for F
where
    F: Fn(&LazyContext) -> Vec<Field> + Send + Sync,
{
    fn expand(&self, cx: &LazyContext) -> Vec<Field> {
        self(cx)
    }
}

#[derive(Clone)]
pub struct Lazy(Arc<dyn Expand>);

impl Lazy {
    pub fn new<E: Expand + 'static>(producer: E) -> Self {
        Lazy(Arc::new(producer))
    }

    pub fn expand(&self, cx: &LazyContext) -> Vec<Field> {
        self.0.expand(cx)
    }

    pub fn ptr_eq(&self, other: &Lazy) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Lazy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Lazy(..)")
    }
}

/// Payload of a [`Field`], one variant per [`Kind`].
///
/// Sequence payloads are moved in, never copied. Translators must treat
/// variants they do not know as no-ops.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub enum Value {
    #[default]
    Invalid,
    Any(AnyValue),
    String(Cow<'static, str>),
    Bool(bool),
    Int64(i64),
    Uint64(u64),
    Float64(f64),
    Time(DateTime<Utc>),
    Duration(Duration),
    Error(SharedError),
    Strings(Vec<String>),
    Bools(Vec<bool>),
    Int64s(Vec<i64>),
    Uint64s(Vec<u64>),
    Float64s(Vec<f64>),
    /// `None` entries render as a `"<nil>"` placeholder so indexes line up.
    Errors(Vec<Option<SharedError>>),
    Dict(Vec<Field>),
    /// Already-encoded JSON, passed through unvalidated.
    RawJson(Vec<u8>),
    /// Bytes rendered as a lowercase hex string.
    HexBytes(Vec<u8>),
    LazyFields(Lazy),
    LazyValue(Lazy),
    /// `None` means "now", read when the field is translated.
    Timestamp(Option<DateTime<Utc>>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Invalid => Kind::Invalid,
            Value::Any(_) => Kind::Any,
            Value::String(_) => Kind::String,
            Value::Bool(_) => Kind::Bool,
            Value::Int64(_) => Kind::Int64,
            Value::Uint64(_) => Kind::Uint64,
            Value::Float64(_) => Kind::Float64,
            Value::Time(_) => Kind::Time,
            Value::Duration(_) => Kind::Duration,
            Value::Error(_) => Kind::Error,
            Value::Strings(_) => Kind::Strings,
            Value::Bools(_) => Kind::Bools,
            Value::Int64s(_) => Kind::Int64s,
            Value::Uint64s(_) => Kind::Uint64s,
            Value::Float64s(_) => Kind::Float64s,
            Value::Errors(_) => Kind::Errors,
            Value::Dict(_) => Kind::Dict,
            Value::RawJson(_) => Kind::RawJson,
            Value::HexBytes(_) => Kind::HexBytes,
            Value::LazyFields(_) => Kind::LazyFields,
            Value::LazyValue(_) => Kind::LazyValue,
            Value::Timestamp(_) => Kind::Timestamp,
        }
    }
}

fn same_error(a: &SharedError, b: &SharedError) -> bool {
    Arc::ptr_eq(a, b)
}

impl PartialEq for Value {
    /// Plain data compares by value; opaque payloads (any, errors, lazy
    /// producers) compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Invalid, Value::Invalid) => true,
            (Value::Any(a), Value::Any(b)) => a.ptr_eq(b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Uint64(a), Value::Uint64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => same_error(a, b),
            (Value::Strings(a), Value::Strings(b)) => a == b,
            (Value::Bools(a), Value::Bools(b)) => a == b,
            (Value::Int64s(a), Value::Int64s(b)) => a == b,
            (Value::Uint64s(a), Value::Uint64s(b)) => a == b,
            (Value::Float64s(a), Value::Float64s(b)) => a == b,
            (Value::Errors(a), Value::Errors(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|pair| match pair {
                        (None, None) => true,
                        (Some(x), Some(y)) => same_error(x, y),
                        _ => false,
                    })
            }
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::RawJson(a), Value::RawJson(b)) => a == b,
            (Value::HexBytes(a), Value::HexBytes(b)) => a == b,
            (Value::LazyFields(a), Value::LazyFields(b)) => a.ptr_eq(b),
            (Value::LazyValue(a), Value::LazyValue(b)) => a.ptr_eq(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

/// One structured key/value pair attached to a log entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Field {
    key: Key,
    value: Value,
}

impl Field {
    fn new(key: impl Into<Key>, value: Value) -> Self {
        Field {
            key: key.into(),
            value,
        }
    }

    /// The no-op field: empty key, [`Kind::Invalid`]. Contributes nothing.
    pub const fn nop() -> Self {
        Field {
            key: Cow::Borrowed(""),
            value: Value::Invalid,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn kind(&self) -> Kind {
        self.value.kind()
    }

    pub fn into_parts(self) -> (Key, Value) {
        (self.key, self.value)
    }

    /// Reports whether this is the no-op field.
    pub fn is_zero(&self) -> bool {
        matches!(self.value, Value::Invalid)
    }

    /// Reports whether translators should skip this field entirely.
    pub fn is_skip(&self) -> bool {
        self.is_zero()
    }

    // Scalars

    pub fn any<T: Reflect>(key: impl Into<Key>, value: T) -> Self {
        Field::new(key, Value::Any(AnyValue::new(value)))
    }

    pub fn string(key: impl Into<Key>, value: impl Into<Cow<'static, str>>) -> Self {
        Field::new(key, Value::String(value.into()))
    }

    pub fn bool(key: impl Into<Key>, value: bool) -> Self {
        Field::new(key, Value::Bool(value))
    }

    /// Platform-sized integer, widened to 64 bits.
    pub fn int(key: impl Into<Key>, value: isize) -> Self {
        Field::new(key, Value::Int64(value as i64))
    }

    pub fn int64(key: impl Into<Key>, value: i64) -> Self {
        Field::new(key, Value::Int64(value))
    }

    /// Platform-sized unsigned integer, widened to 64 bits.
    pub fn uint(key: impl Into<Key>, value: usize) -> Self {
        Field::new(key, Value::Uint64(value as u64))
    }

    pub fn uint64(key: impl Into<Key>, value: u64) -> Self {
        Field::new(key, Value::Uint64(value))
    }

    pub fn float64(key: impl Into<Key>, value: f64) -> Self {
        Field::new(key, Value::Float64(value))
    }

    pub fn time(key: impl Into<Key>, value: DateTime<Utc>) -> Self {
        Field::new(key, Value::Time(value))
    }

    pub fn duration(key: impl Into<Key>, value: Duration) -> Self {
        Field::new(key, Value::Duration(value))
    }

    // Errors

    /// Error under [`ERROR_KEY`]. `None` means there is nothing to report
    /// and yields [`Field::nop`].
    pub fn error<E>(err: Option<E>) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Field::named_error(ERROR_KEY, err)
    }

    /// Error under a custom key; `None` yields [`Field::nop`].
    pub fn named_error<E>(key: impl Into<Key>, err: Option<E>) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Field::shared_error(key, err.map(|e| Arc::new(e) as SharedError))
    }

    /// Like [`Field::named_error`] for errors that are already shared or boxed.
    pub fn shared_error(key: impl Into<Key>, err: Option<SharedError>) -> Self {
        match err {
            Some(err) => Field::new(key, Value::Error(err)),
            None => Field::nop(),
        }
    }

    // Sequences. The vectors are moved in as-is.

    pub fn strings(key: impl Into<Key>, values: Vec<String>) -> Self {
        Field::new(key, Value::Strings(values))
    }

    pub fn bools(key: impl Into<Key>, values: Vec<bool>) -> Self {
        Field::new(key, Value::Bools(values))
    }

    pub fn int64s(key: impl Into<Key>, values: Vec<i64>) -> Self {
        Field::new(key, Value::Int64s(values))
    }

    pub fn uint64s(key: impl Into<Key>, values: Vec<u64>) -> Self {
        Field::new(key, Value::Uint64s(values))
    }

    pub fn float64s(key: impl Into<Key>, values: Vec<f64>) -> Self {
        Field::new(key, Value::Float64s(values))
    }

    pub fn errors(key: impl Into<Key>, values: Vec<Option<SharedError>>) -> Self {
        Field::new(key, Value::Errors(values))
    }

    // Special

    /// Groups sub-fields under one key, encoded as a nested object.
    pub fn dict(key: impl Into<Key>, fields: impl Into<Vec<Field>>) -> Self {
        Field::new(key, Value::Dict(fields.into()))
    }

    /// Pre-encoded JSON. The bytes are not validated.
    pub fn raw_json(key: impl Into<Key>, json: impl Into<Vec<u8>>) -> Self {
        Field::new(key, Value::RawJson(json.into()))
    }

    pub fn hex(key: impl Into<Key>, bytes: impl Into<Vec<u8>>) -> Self {
        Field::new(key, Value::HexBytes(bytes.into()))
    }

    /// Fields produced at log time, only if the entry's level is enabled.
    /// The producer receives the entry's [`LazyContext`].
    pub fn lazy_fields<E: Expand + 'static>(producer: E) -> Self {
        Field::new("", Value::LazyFields(Lazy::new(producer)))
    }

    /// Context-free variant of [`Field::lazy_fields`].
    pub fn lazy<F>(producer: F) -> Self
    where
        F: Fn() -> Vec<Field> + Send + Sync + 'static,
    {
        Field::new(
            "",
            Value::LazyValue(Lazy::new(move |_: &LazyContext| producer())),
        )
    }

    /// Timestamp under [`TIMESTAMP_KEY`]; `None` is resolved to the current
    /// time when the field is translated.
    pub fn timestamp(at: Option<DateTime<Utc>>) -> Self {
        Field::timestamp_at(TIMESTAMP_KEY, at)
    }

    pub fn timestamp_at(key: impl Into<Key>, at: Option<DateTime<Utc>>) -> Self {
        Field::new(key, Value::Timestamp(at))
    }

    /// Picks the kind from the runtime type of `value`, falling back to
    /// [`Kind::Any`] for anything unrecognised.
    pub fn infer<T: Reflect>(key: impl Into<Key>, value: T) -> Self {
        let key = key.into();
        let boxed: Box<dyn Any> = Box::new(value);

        macro_rules! try_kind {
            ($boxed:ident, $ty:ty, |$v:ident| $make:expr) => {
                let $boxed = match $boxed.downcast::<$ty>() {
                    Ok($v) => {
                        let $v = *$v;
                        return $make;
                    }
                    Err(other) => other,
                };
            };
        }

        try_kind!(boxed, String, |v| Field::string(key, v));
        try_kind!(boxed, &'static str, |v| Field::string(key, v));
        try_kind!(boxed, Cow<'static, str>, |v| Field::string(key, v));
        try_kind!(boxed, bool, |v| Field::bool(key, v));
        try_kind!(boxed, i8, |v| Field::int64(key, v.into()));
        try_kind!(boxed, i16, |v| Field::int64(key, v.into()));
        try_kind!(boxed, i32, |v| Field::int64(key, v.into()));
        try_kind!(boxed, i64, |v| Field::int64(key, v));
        try_kind!(boxed, isize, |v| Field::int(key, v));
        try_kind!(boxed, u8, |v| Field::uint64(key, v.into()));
        try_kind!(boxed, u16, |v| Field::uint64(key, v.into()));
        try_kind!(boxed, u32, |v| Field::uint64(key, v.into()));
        try_kind!(boxed, u64, |v| Field::uint64(key, v));
        try_kind!(boxed, usize, |v| Field::uint(key, v));
        try_kind!(boxed, f32, |v| Field::float64(key, v.into()));
        try_kind!(boxed, f64, |v| Field::float64(key, v));
        try_kind!(boxed, DateTime<Utc>, |v| Field::time(key, v));
        try_kind!(boxed, Duration, |v| Field::duration(key, v));
        try_kind!(boxed, SharedError, |v| Field::shared_error(key, Some(v)));
        try_kind!(boxed, Box<dyn StdError + Send + Sync>, |v| Field::shared_error(
            key,
            Some(Arc::from(v))
        ));

        match boxed.downcast::<T>() {
            Ok(v) => Field::any(key, *v),
            Err(_) => Field::nop(),
        }
    }
}
