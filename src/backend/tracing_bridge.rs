//! Backend forwarding entries to the `tracing` ecosystem.
//!
//! Each entry becomes one event under target `fieldlog` carrying the
//! logger name, the call site, the translated fields as one JSON text and
//! the message. Whatever subscriber is installed decides where it goes.

use super::json::JsonMapper;
use crate::field::Field;
use crate::level::Level;
use crate::logger::{conclude, join_name, Backend, BuildError, Caller, Logger, Options};
use crate::sink::SinkError;
use crate::translate::translate;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

/// Builds [`TracingLogger`]s. `Options::writer` is ignored; output goes
/// wherever the installed subscriber sends it.
#[derive(Clone, Debug, Default)]
pub struct TracingBackend {
    development: bool,
    time_layout: Option<String>,
}

impl TracingBackend {
    pub fn new() -> Self {
        TracingBackend::default()
    }

    pub fn development(mut self, on: bool) -> Self {
        self.development = on;
        self
    }

    pub fn with_time_layout(mut self, layout: impl Into<String>) -> Self {
        self.time_layout = Some(layout.into());
        self
    }
}

impl Backend for TracingBackend {
    fn build(&self, options: Options) -> Result<Box<dyn Logger>, BuildError> {
        let layout = options.time_layout.or_else(|| self.time_layout.clone());
        let root = TracingLogger {
            core: Arc::new(Core {
                mapper: JsonMapper::with_layout(layout)?,
                level: options.level,
                development: self.development,
                add_source: options.add_source,
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

struct Core {
    mapper: JsonMapper,
    level: Level,
    development: bool,
    add_source: bool,
}

#[derive(Clone)]
pub struct TracingLogger {
    core: Arc<Core>,
    name: String,
    context: Arc<Map<String, JsonValue>>,
}

/// Runs `$body` with `$lvl` bound to a constant equal to `$level`.
///
/// `enabled!` and `event!` register a static callsite whose metadata
/// holds the level, so the level must be a constant; this expands one
/// branch per level [`Level::to_tracing`] can yield.
macro_rules! at_tracing_level {
    ($level:expr, $lvl:ident => $body:expr) => {{
        let level: tracing::Level = $level;
        if level == tracing::Level::DEBUG {
            const $lvl: tracing::Level = tracing::Level::DEBUG;
            $body
        } else if level == tracing::Level::INFO {
            const $lvl: tracing::Level = tracing::Level::INFO;
            $body
        } else if level == tracing::Level::WARN {
            const $lvl: tracing::Level = tracing::Level::WARN;
            $body
        } else {
            const $lvl: tracing::Level = tracing::Level::ERROR;
            $body
        }
    }};
}

fn subscriber_wants(level: Level) -> bool {
    at_tracing_level!(level.to_tracing(), LEVEL => tracing::enabled!(target: "fieldlog", LEVEL))
}

impl Logger for TracingLogger {
    fn enabled(&self, level: Level) -> bool {
        level >= self.core.level && subscriber_wants(level)
    }

    fn log(&self, level: Level, msg: &str, fields: &[Field], caller: Caller) {
        if self.enabled(level) {
            let mut map = (*self.context).clone();
            for (key, value) in translate(&self.core.mapper, level, &|l| self.enabled(l), fields) {
                map.insert(key, value);
            }
            let fields = JsonValue::Object(map);
            let caller = if self.core.add_source {
                format!("{}:{}", caller.file(), caller.line())
            } else {
                String::new()
            };
            let logger = self.name.as_str();
            let caller = caller.as_str();

            at_tracing_level!(level.to_tracing(), LEVEL => tracing::event!(
                target: "fieldlog",
                LEVEL,
                logger,
                caller,
                fields = %fields,
                "{}",
                msg
            ));
        }
        conclude(level, self.core.development, msg, || self.sync());
    }

    fn with(&self, fields: &[Field]) -> Box<dyn Logger> {
        let mut context = (*self.context).clone();
        for (key, value) in translate(&self.core.mapper, Level::Info, &|l| self.enabled(l), fields) {
            context.insert(key, value);
        }
        Box::new(TracingLogger {
            core: Arc::clone(&self.core),
            name: self.name.clone(),
            context: Arc::new(context),
        })
    }

    fn named(&self, name: &str) -> Box<dyn Logger> {
        Box::new(TracingLogger {
            core: Arc::clone(&self.core),
            name: join_name(&self.name, name),
            context: Arc::clone(&self.context),
        })
    }

    fn sync(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tracing::field::Visit;
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    type Captured = Arc<Mutex<Vec<(tracing::Level, BTreeMap<String, String>)>>>;

    struct Capture(Captured);

    struct FieldVisitor<'a>(&'a mut BTreeMap<String, String>);

    impl Visit for FieldVisitor<'_> {
        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            self.0.insert(field.name().to_string(), value.to_string());
        }

        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.0.insert(field.name().to_string(), format!("{value:?}"));
        }
    }

    impl<S: Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = BTreeMap::new();
            event.record(&mut FieldVisitor(&mut fields));
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), fields));
        }
    }

    fn capture<F: FnOnce()>(f: F) -> Vec<(tracing::Level, BTreeMap<String, String>)> {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry().with(Capture(Arc::clone(&captured)));
        tracing::subscriber::with_default(subscriber, f);
        let events = captured.lock().unwrap().clone();
        events
    }

    #[test]
    fn entries_become_events() {
        let events = capture(|| {
            let log = TracingBackend::new()
                .build(Options {
                    name: "svc".into(),
                    add_source: true,
                    ..Options::default()
                })
                .unwrap();
            log.named("db").warn(
                "slow query",
                &[
                    Field::int64("rows", 3),
                    Field::dict("q", vec![Field::string("table", "users")]),
                ],
            );
        });

        assert_eq!(events.len(), 1);
        let (level, fields) = &events[0];
        assert_eq!(*level, tracing::Level::WARN);
        assert_eq!(fields["message"], "slow query");
        assert_eq!(fields["logger"], "svc.db");
        assert!(fields["caller"].contains("tracing_bridge.rs:"));
        assert_eq!(fields["fields"], r#"{"rows":3,"q":{"table":"users"}}"#);
    }

    #[test]
    fn minimum_level_filters_before_tracing() {
        let events = capture(|| {
            let log = TracingBackend::new()
                .build(Options {
                    level: Level::Error,
                    ..Options::default()
                })
                .unwrap();
            let bound = log.with(&[Field::bool("bound", true)]);
            bound.info("dropped", &[]);
            bound.dpanic("kept", &[]);
        });

        assert_eq!(events.len(), 1);
        let (level, fields) = &events[0];
        assert_eq!(*level, tracing::Level::ERROR);
        assert_eq!(fields["fields"], r#"{"bound":true}"#);
    }

    #[test]
    fn each_level_lands_on_its_tracing_level() {
        let events = capture(|| {
            let log = TracingBackend::new()
                .build(Options {
                    level: Level::Debug,
                    ..Options::default()
                })
                .unwrap();
            log.debug("d", &[]);
            log.info("i", &[]);
            log.warn("w", &[]);
            log.error("e", &[]);
            log.dpanic("dp", &[]);
        });

        let levels: Vec<_> = events.iter().map(|(level, _)| *level).collect();
        assert_eq!(
            levels,
            [
                tracing::Level::DEBUG,
                tracing::Level::INFO,
                tracing::Level::WARN,
                tracing::Level::ERROR,
                tracing::Level::ERROR,
            ]
        );
    }
}
