//! Field translation: facade [`Field`]s in, backend-native fields out.
//!
//! The walk is depth-first with no depth limit. No-op fields vanish at
//! every level, lazy producers are expanded in place only when the
//! entry's level is enabled, and `Dict` payloads go down the nested
//! object path. Translation cannot fail.

use crate::encoder::{ArrayEncoder, ArrayMarshaler, FieldMapper, ObjectEncoder, ObjectMarshaler};
use crate::field::{Field, LazyContext, SharedError, Value, ERROR_KEY, TIMESTAMP_KEY};
use crate::level::Level;
use chrono::Utc;
use std::cell::Cell;

/// Placeholder for a missing error inside an errors array.
pub const NIL_ERROR: &str = "<nil>";

/// Translate `fields` for an entry at `level`.
///
/// `enabled` is asked at most once, and only if a lazy field is present.
/// The output keeps input order; no-op fields contribute nothing and each
/// lazy field is replaced by the translation of whatever it produces.
pub fn translate<M>(
    mapper: &M,
    level: Level,
    enabled: &dyn Fn(Level) -> bool,
    fields: &[Field],
) -> Vec<M::Field>
where
    M: FieldMapper + ?Sized,
{
    if fields.is_empty() {
        return Vec::new();
    }
    let gate = Gate::new(level, enabled);
    let mut out = Vec::with_capacity(fields.len());
    append_fields(mapper, &gate, 0, fields, &mut out);
    out
}

struct Gate<'a> {
    level: Level,
    enabled: &'a dyn Fn(Level) -> bool,
    open: Cell<Option<bool>>,
}

impl<'a> Gate<'a> {
    fn new(level: Level, enabled: &'a dyn Fn(Level) -> bool) -> Self {
        Gate {
            level,
            enabled,
            open: Cell::new(None),
        }
    }

    fn is_open(&self) -> bool {
        if let Some(open) = self.open.get() {
            return open;
        }
        let open = (self.enabled)(self.level);
        self.open.set(Some(open));
        open
    }

    fn context(&self, depth: usize) -> LazyContext {
        LazyContext::new(self.level, depth)
    }
}

fn error_key(key: &str) -> &str {
    if key.is_empty() {
        ERROR_KEY
    } else {
        key
    }
}

fn timestamp_key(key: &str) -> &str {
    if key.is_empty() {
        TIMESTAMP_KEY
    } else {
        key
    }
}

fn append_fields<M>(
    mapper: &M,
    gate: &Gate<'_>,
    depth: usize,
    fields: &[Field],
    out: &mut Vec<M::Field>,
) where
    M: FieldMapper + ?Sized,
{
    for field in fields {
        let key = field.key();
        let encoded = match field.value() {
            Value::Invalid => continue,
            Value::LazyFields(lazy) | Value::LazyValue(lazy) => {
                if gate.is_open() {
                    let produced = lazy.expand(&gate.context(depth));
                    append_fields(mapper, gate, depth + 1, &produced, out);
                }
                continue;
            }
            Value::Any(any) => match mapper.native(any) {
                Some(native) => native,
                None => mapper.reflected(key, any),
            },
            Value::String(v) => mapper.string(key, v),
            Value::Bool(v) => mapper.bool(key, *v),
            Value::Int64(v) => mapper.i64(key, *v),
            Value::Uint64(v) => mapper.u64(key, *v),
            Value::Float64(v) => mapper.f64(key, *v),
            Value::Time(v) => mapper.time(key, *v),
            Value::Duration(v) => mapper.duration(key, *v),
            Value::Error(err) => mapper.error(error_key(key), &**err),
            Value::Strings(v) => mapper.array(key, &StrArray(v)),
            Value::Bools(v) => mapper.array(key, &BoolArray(v)),
            Value::Int64s(v) => mapper.array(key, &I64Array(v)),
            Value::Uint64s(v) => mapper.array(key, &U64Array(v)),
            Value::Float64s(v) => mapper.array(key, &F64Array(v)),
            Value::Errors(v) => mapper.array(key, &ErrorArray(v)),
            Value::Dict(sub) => mapper.object(
                key,
                &Dict {
                    fields: sub,
                    gate,
                    depth,
                },
            ),
            Value::RawJson(json) => mapper.raw_json(key, json),
            Value::HexBytes(bytes) => mapper.string(key, &hex::encode(bytes)),
            Value::Timestamp(at) => mapper.time(timestamp_key(key), at.unwrap_or_else(Utc::now)),
        };
        out.push(encoded);
    }
}

/// Nested path for `Dict` payloads. Shares the gate of the enclosing
/// translation so lazy producers inside groups follow the same rule.
struct Dict<'a, 'g> {
    fields: &'a [Field],
    gate: &'a Gate<'g>,
    depth: usize,
}

impl ObjectMarshaler for Dict<'_, '_> {
    fn marshal_object(&self, enc: &mut dyn ObjectEncoder) {
        encode_object(enc, self.gate, self.depth, self.fields);
    }
}

fn encode_object(enc: &mut dyn ObjectEncoder, gate: &Gate<'_>, depth: usize, fields: &[Field]) {
    for field in fields {
        let key = field.key();
        match field.value() {
            Value::Invalid => {}
            Value::LazyFields(lazy) | Value::LazyValue(lazy) => {
                if gate.is_open() {
                    let produced = lazy.expand(&gate.context(depth));
                    encode_object(enc, gate, depth + 1, &produced);
                }
            }
            Value::Any(any) => enc.add_reflected(key, any),
            Value::String(v) => enc.add_str(key, v),
            Value::Bool(v) => enc.add_bool(key, *v),
            Value::Int64(v) => enc.add_i64(key, *v),
            Value::Uint64(v) => enc.add_u64(key, *v),
            Value::Float64(v) => enc.add_f64(key, *v),
            Value::Time(v) => enc.add_time(key, *v),
            Value::Duration(v) => enc.add_duration(key, *v),
            // Object encoders have no error slot.
            Value::Error(err) => enc.add_str(error_key(key), &err.to_string()),
            Value::Strings(v) => enc.add_array(key, &StrArray(v)),
            Value::Bools(v) => enc.add_array(key, &BoolArray(v)),
            Value::Int64s(v) => enc.add_array(key, &I64Array(v)),
            Value::Uint64s(v) => enc.add_array(key, &U64Array(v)),
            Value::Float64s(v) => enc.add_array(key, &F64Array(v)),
            Value::Errors(v) => enc.add_array(key, &ErrorArray(v)),
            Value::Dict(sub) => enc.add_object(
                key,
                &Dict {
                    fields: sub,
                    gate,
                    depth,
                },
            ),
            Value::RawJson(json) => enc.add_raw_json(key, json),
            Value::HexBytes(bytes) => enc.add_str(key, &hex::encode(bytes)),
            Value::Timestamp(at) => enc.add_time(timestamp_key(key), at.unwrap_or_else(Utc::now)),
        }
    }
}

macro_rules! array_marshaler {
    ($name:ident, $elem:ty, |$enc:ident, $v:ident| $append:expr) => {
        struct $name<'a>(&'a [$elem]);

        impl ArrayMarshaler for $name<'_> {
            fn marshal_array(&self, $enc: &mut dyn ArrayEncoder) {
                for $v in self.0 {
                    $append;
                }
            }
        }
    };
}

array_marshaler!(StrArray, String, |enc, v| enc.append_str(v));
array_marshaler!(BoolArray, bool, |enc, v| enc.append_bool(*v));
array_marshaler!(I64Array, i64, |enc, v| enc.append_i64(*v));
array_marshaler!(U64Array, u64, |enc, v| enc.append_u64(*v));
array_marshaler!(F64Array, f64, |enc, v| enc.append_f64(*v));
array_marshaler!(ErrorArray, Option<SharedError>, |enc, v| match v {
    Some(err) => enc.append_str(&err.to_string()),
    None => enc.append_str(NIL_ERROR),
});
