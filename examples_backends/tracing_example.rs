use fieldlog::backend::tracing_bridge::TracingBackend;
use fieldlog::init::{init_tracing, SubscriberConfig};
use fieldlog::{Backend, Field, Level, Options};

fn main() {
    init_tracing(SubscriberConfig {
        level: Level::Debug,
        ..SubscriberConfig::default()
    })
    .expect("install subscriber");

    let log = TracingBackend::new()
        .build(Options {
            level: Level::Debug,
            name: "bridge".into(),
            ..Options::default()
        })
        .expect("build logger");

    log.debug("connecting", &[Field::string("addr", "127.0.0.1:5432")]);
    log.with(&[Field::int64("attempt", 2)])
        .warn("connection reset", &[Field::timestamp(None)]);
}
