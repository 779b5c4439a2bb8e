use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use fieldlog::encoder::{ArrayEncoder, ArrayMarshaler, ErrorRef, FieldMapper, ObjectMarshaler};
use fieldlog::field::AnyValue;
use fieldlog::logger::{BuildError, Caller};
use fieldlog::sink::SinkError;
use fieldlog::{translate, Backend, Field, Level, Logger, Options};

/// Example of integrating a completely custom backend by implementing
/// `FieldMapper` and `Logger` directly. Imagine this feeds some
/// proprietary collector that wants flat `key=value` pairs. Nested
/// groups are flattened to their element count to keep it short.
struct PairMapper;

struct Count(usize);

impl ArrayEncoder for Count {
    fn append_str(&mut self, _: &str) {
        self.0 += 1;
    }
    fn append_bool(&mut self, _: bool) {
        self.0 += 1;
    }
    fn append_i64(&mut self, _: i64) {
        self.0 += 1;
    }
    fn append_u64(&mut self, _: u64) {
        self.0 += 1;
    }
    fn append_f64(&mut self, _: f64) {
        self.0 += 1;
    }
}

impl FieldMapper for PairMapper {
    type Field = (String, String);

    fn string(&self, key: &str, value: &str) -> Self::Field {
        (key.into(), value.into())
    }
    fn bool(&self, key: &str, value: bool) -> Self::Field {
        (key.into(), value.to_string())
    }
    fn i64(&self, key: &str, value: i64) -> Self::Field {
        (key.into(), value.to_string())
    }
    fn u64(&self, key: &str, value: u64) -> Self::Field {
        (key.into(), value.to_string())
    }
    fn f64(&self, key: &str, value: f64) -> Self::Field {
        (key.into(), value.to_string())
    }
    fn time(&self, key: &str, value: DateTime<Utc>) -> Self::Field {
        (key.into(), value.to_rfc3339())
    }
    fn duration(&self, key: &str, value: Duration) -> Self::Field {
        (key.into(), format!("{}ms", value.as_millis()))
    }
    fn error(&self, key: &str, err: ErrorRef<'_>) -> Self::Field {
        (key.into(), err.to_string())
    }
    fn raw_json(&self, key: &str, json: &[u8]) -> Self::Field {
        (key.into(), String::from_utf8_lossy(json).into_owned())
    }
    fn reflected(&self, key: &str, value: &AnyValue) -> Self::Field {
        (key.into(), format!("{value:?}"))
    }
    fn array(&self, key: &str, array: &dyn ArrayMarshaler) -> Self::Field {
        let mut count = Count(0);
        array.marshal_array(&mut count);
        (key.into(), format!("<{} items>", count.0))
    }
    fn object(&self, key: &str, _object: &dyn ObjectMarshaler) -> Self::Field {
        (key.into(), "<object>".into())
    }
}

struct PairBackend;

struct PairLogger {
    min: Level,
    name: Arc<str>,
}

impl Backend for PairBackend {
    fn build(&self, options: Options) -> Result<Box<dyn Logger>, BuildError> {
        Ok(Box::new(PairLogger {
            min: options.level,
            name: options.name.into(),
        }))
    }
}

impl Logger for PairLogger {
    fn enabled(&self, level: Level) -> bool {
        level >= self.min
    }

    fn log(&self, level: Level, msg: &str, fields: &[Field], caller: Caller) {
        if !self.enabled(level) {
            return;
        }
        let pairs: Vec<String> = translate(&PairMapper, level, &|l| self.enabled(l), fields)
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        println!(
            "[my-collector] {level} {} {msg} ({caller}) {}",
            self.name,
            pairs.join(" ")
        );
    }

    // Context binding is left out of this example.
    fn with(&self, _fields: &[Field]) -> Box<dyn Logger> {
        self.named("")
    }

    fn named(&self, name: &str) -> Box<dyn Logger> {
        let name = match (self.name.is_empty(), name.is_empty()) {
            (_, true) => self.name.to_string(),
            (true, false) => name.to_string(),
            (false, false) => format!("{}.{name}", self.name),
        };
        Box::new(PairLogger {
            min: self.min,
            name: name.into(),
        })
    }

    fn sync(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

fn main() {
    let log = PairBackend
        .build(Options {
            name: "example".into(),
            ..Options::default()
        })
        .expect("build logger");

    log.info("custom backend example started", &[]);
    log.named("db").error(
        "simulated error sent via custom backend",
        &[
            Field::string("db", "my-custom-db"),
            Field::duration("elapsed", Duration::from_millis(42)),
            Field::int64s("shards", vec![1, 2, 3]),
            Field::dict("conn", vec![Field::string("host", "10.0.0.7")]),
        ],
    );
}
