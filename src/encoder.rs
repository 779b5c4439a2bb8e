//! Encoding primitives a backend exposes to the translation protocol.
//!
//! Most logging engines distinguish "append a field to an entry" from
//! "append a key/value into an already-open object". The former is
//! [`FieldMapper`], which turns one field into the backend's native field
//! type; the latter is [`ObjectEncoder`], driven through an
//! [`ObjectMarshaler`] for nested groups. Arrays go through
//! [`ArrayMarshaler`] / [`ArrayEncoder`] on both paths.

use crate::field::AnyValue;
use chrono::{DateTime, Utc};
use std::error::Error as StdError;
use std::time::Duration;

pub type ErrorRef<'a> = &'a (dyn StdError + Send + Sync + 'static);

/// Receives the elements of an array in order.
pub trait ArrayEncoder {
    fn append_str(&mut self, value: &str);
    fn append_bool(&mut self, value: bool);
    fn append_i64(&mut self, value: i64);
    fn append_u64(&mut self, value: u64);
    fn append_f64(&mut self, value: f64);
}

/// Something that knows how to write itself into an [`ArrayEncoder`].
pub trait ArrayMarshaler {
    fn marshal_array(&self, enc: &mut dyn ArrayEncoder);
}

/// Receives the members of an open nested object.
///
/// There is no error slot: errors nested in an object arrive through
/// [`add_str`](ObjectEncoder::add_str) as their message.
pub trait ObjectEncoder {
    fn add_str(&mut self, key: &str, value: &str);
    fn add_bool(&mut self, key: &str, value: bool);
    fn add_i64(&mut self, key: &str, value: i64);
    fn add_u64(&mut self, key: &str, value: u64);
    fn add_f64(&mut self, key: &str, value: f64);
    fn add_time(&mut self, key: &str, value: DateTime<Utc>);
    fn add_duration(&mut self, key: &str, value: Duration);
    /// `json` is handed over as-is; it is not validated on the way.
    fn add_raw_json(&mut self, key: &str, json: &[u8]);
    fn add_reflected(&mut self, key: &str, value: &AnyValue);
    fn add_array(&mut self, key: &str, array: &dyn ArrayMarshaler);
    fn add_object(&mut self, key: &str, object: &dyn ObjectMarshaler);
}

/// Something that knows how to write itself into an [`ObjectEncoder`].
pub trait ObjectMarshaler {
    fn marshal_object(&self, enc: &mut dyn ObjectEncoder);
}

/// Builds a backend's native top-level fields.
///
/// Implementations never see the facade's [`Field`](crate::field::Field)
/// type; the translation protocol calls exactly one of these methods per
/// emitted entry.
pub trait FieldMapper {
    /// The backend's native field type.
    type Field;

    /// Escape hatch: recognise a backend-native value smuggled through an
    /// `Any` field. Checked before [`reflected`](FieldMapper::reflected).
    fn native(&self, value: &AnyValue) -> Option<Self::Field> {
        let _ = value;
        None
    }

    fn string(&self, key: &str, value: &str) -> Self::Field;
    fn bool(&self, key: &str, value: bool) -> Self::Field;
    fn i64(&self, key: &str, value: i64) -> Self::Field;
    fn u64(&self, key: &str, value: u64) -> Self::Field;
    fn f64(&self, key: &str, value: f64) -> Self::Field;
    fn time(&self, key: &str, value: DateTime<Utc>) -> Self::Field;
    fn duration(&self, key: &str, value: Duration) -> Self::Field;
    /// Structured error value. `key` is never empty.
    fn error(&self, key: &str, err: ErrorRef<'_>) -> Self::Field;
    fn raw_json(&self, key: &str, json: &[u8]) -> Self::Field;
    fn reflected(&self, key: &str, value: &AnyValue) -> Self::Field;
    fn array(&self, key: &str, array: &dyn ArrayMarshaler) -> Self::Field;
    fn object(&self, key: &str, object: &dyn ObjectMarshaler) -> Self::Field;
}
