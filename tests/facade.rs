//! Drives the public API the way a third-party backend would.

use chrono::{DateTime, TimeZone, Utc};
use fieldlog::encoder::{
    ArrayEncoder, ArrayMarshaler, ErrorRef, FieldMapper, ObjectEncoder, ObjectMarshaler,
};
use fieldlog::field::{AnyValue, LazyContext};
use fieldlog::logger::{BuildError, Caller};
use fieldlog::sink::SinkError;
use fieldlog::{translate, Backend, Field, Kind, Level, Logger, Options};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Renders fields as `key=value` text, nested groups in braces.
struct Logfmt;

#[derive(Default)]
struct Items(Vec<String>);

impl ArrayEncoder for Items {
    fn append_str(&mut self, value: &str) {
        self.0.push(value.to_string());
    }
    fn append_bool(&mut self, value: bool) {
        self.0.push(value.to_string());
    }
    fn append_i64(&mut self, value: i64) {
        self.0.push(value.to_string());
    }
    fn append_u64(&mut self, value: u64) {
        self.0.push(value.to_string());
    }
    fn append_f64(&mut self, value: f64) {
        self.0.push(value.to_string());
    }
}

fn items(array: &dyn ArrayMarshaler) -> String {
    let mut enc = Items::default();
    array.marshal_array(&mut enc);
    format!("[{}]", enc.0.join(","))
}

fn group(object: &dyn ObjectMarshaler) -> String {
    let mut enc = Items::default();
    object.marshal_object(&mut enc);
    format!("{{{}}}", enc.0.join(" "))
}

impl ObjectEncoder for Items {
    fn add_str(&mut self, key: &str, value: &str) {
        self.0.push(format!("{key}={value}"));
    }
    fn add_bool(&mut self, key: &str, value: bool) {
        self.0.push(format!("{key}={value}"));
    }
    fn add_i64(&mut self, key: &str, value: i64) {
        self.0.push(format!("{key}={value}"));
    }
    fn add_u64(&mut self, key: &str, value: u64) {
        self.0.push(format!("{key}={value}"));
    }
    fn add_f64(&mut self, key: &str, value: f64) {
        self.0.push(format!("{key}={value}"));
    }
    fn add_time(&mut self, key: &str, value: DateTime<Utc>) {
        self.0.push(format!("{key}={}", value.timestamp()));
    }
    fn add_duration(&mut self, key: &str, value: Duration) {
        self.0.push(format!("{key}={value:?}"));
    }
    fn add_raw_json(&mut self, key: &str, json: &[u8]) {
        self.0.push(format!("{key}={}", String::from_utf8_lossy(json)));
    }
    fn add_reflected(&mut self, key: &str, value: &AnyValue) {
        self.0.push(format!("{key}={value:?}"));
    }
    fn add_array(&mut self, key: &str, array: &dyn ArrayMarshaler) {
        self.0.push(format!("{key}={}", items(array)));
    }
    fn add_object(&mut self, key: &str, object: &dyn ObjectMarshaler) {
        self.0.push(format!("{key}={}", group(object)));
    }
}

impl FieldMapper for Logfmt {
    type Field = String;

    fn string(&self, key: &str, value: &str) -> String {
        format!("{key}={value}")
    }
    fn bool(&self, key: &str, value: bool) -> String {
        format!("{key}={value}")
    }
    fn i64(&self, key: &str, value: i64) -> String {
        format!("{key}={value}")
    }
    fn u64(&self, key: &str, value: u64) -> String {
        format!("{key}={value}")
    }
    fn f64(&self, key: &str, value: f64) -> String {
        format!("{key}={value}")
    }
    fn time(&self, key: &str, value: DateTime<Utc>) -> String {
        format!("{key}={}", value.timestamp())
    }
    fn duration(&self, key: &str, value: Duration) -> String {
        format!("{key}={value:?}")
    }
    fn error(&self, key: &str, err: ErrorRef<'_>) -> String {
        format!("{key}={err}")
    }
    fn raw_json(&self, key: &str, json: &[u8]) -> String {
        format!("{key}={}", String::from_utf8_lossy(json))
    }
    fn reflected(&self, key: &str, value: &AnyValue) -> String {
        format!("{key}={value:?}")
    }
    fn array(&self, key: &str, array: &dyn ArrayMarshaler) -> String {
        format!("{key}={}", items(array))
    }
    fn object(&self, key: &str, object: &dyn ObjectMarshaler) -> String {
        format!("{key}={}", group(object))
    }
}

fn always(_: Level) -> bool {
    true
}

#[test]
fn third_party_mapper_sees_every_kind() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let fields = vec![
        Field::string("method", "GET"),
        Field::uint64("bytes", 512),
        Field::time("at", at),
        Field::strings("tags", vec!["a".into(), "b".into()]),
        Field::dict(
            "req",
            vec![
                Field::int64("id", 9),
                Field::nop(),
                Field::dict("peer", vec![Field::string("ip", "::1")]),
            ],
        ),
        Field::lazy_fields(|cx: &LazyContext| vec![Field::string("lvl", cx.level().as_str())]),
        Field::hex("sum", vec![0x0a, 0xff]),
    ];

    let out = translate(&Logfmt, Level::Warn, &always, &fields);
    assert_eq!(
        out,
        vec![
            "method=GET",
            "bytes=512",
            format!("at={}", at.timestamp()).as_str(),
            "tags=[a,b]",
            "req={id=9 peer={ip=::1}}",
            "lvl=warn",
            "sum=0aff",
        ]
    );
}

#[test]
fn disabled_level_drops_lazy_output_only() {
    let fields = [
        Field::bool("kept", true),
        Field::lazy(|| vec![Field::bool("lazy", true)]),
    ];
    let out = translate(&Logfmt, Level::Debug, &|_| false, &fields);
    assert_eq!(out, vec!["kept=true"]);
}

#[test]
fn inferred_fields_choose_their_kind() {
    assert_eq!(Field::infer("n", 3u8).kind(), Kind::Uint64);
    assert_eq!(Field::infer("s", "hi").kind(), Kind::String);
    assert_eq!(Field::infer("d", Duration::from_secs(1)).kind(), Kind::Duration);
    assert_eq!(Field::infer("v", vec![1, 2]).kind(), Kind::Any);
}

/// Minimal in-memory backend built only on public items.
#[derive(Clone, Default)]
struct Memory {
    entries: Arc<Mutex<Vec<(Level, String, Vec<String>, u32)>>>,
}

struct MemoryLogger {
    sink: Memory,
    min: Level,
    bound: Vec<String>,
}

impl Backend for Memory {
    fn build(&self, options: Options) -> Result<Box<dyn Logger>, BuildError> {
        let root = MemoryLogger {
            sink: self.clone(),
            min: options.level,
            bound: Vec::new(),
        };
        Ok(root.with(&options.fields))
    }
}

impl Logger for MemoryLogger {
    fn enabled(&self, level: Level) -> bool {
        level >= self.min
    }

    fn log(&self, level: Level, msg: &str, fields: &[Field], caller: Caller) {
        if !self.enabled(level) {
            return;
        }
        let mut rendered = self.bound.clone();
        rendered.extend(translate(&Logfmt, level, &|l| self.enabled(l), fields));
        self.sink
            .entries
            .lock()
            .unwrap()
            .push((level, msg.to_string(), rendered, caller.line()));
    }

    fn with(&self, fields: &[Field]) -> Box<dyn Logger> {
        let mut bound = self.bound.clone();
        bound.extend(translate(&Logfmt, Level::Info, &|l| self.enabled(l), fields));
        Box::new(MemoryLogger {
            sink: self.sink.clone(),
            min: self.min,
            bound,
        })
    }

    fn named(&self, _name: &str) -> Box<dyn Logger> {
        self.with(&[])
    }

    fn sync(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[test]
fn leveled_methods_report_the_calling_line() {
    let memory = Memory::default();
    let log = memory
        .build(Options {
            level: Level::Info,
            fields: vec![Field::string("app", "demo")],
            ..Options::default()
        })
        .unwrap();

    log.debug("skipped", &[]);
    let line = line!() + 1;
    log.info("hello", &[Field::error(Some(std::fmt::Error))]);

    let entries = memory.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    let (level, msg, fields, at) = &entries[0];
    assert_eq!(*level, Level::Info);
    assert_eq!(msg, "hello");
    assert_eq!(
        *fields,
        vec![
            "app=demo".to_string(),
            "error=an error occurred when formatting an argument".to_string()
        ]
    );
    assert_eq!(*at, line);
}
