use std::sync::Arc;

use async_trait::async_trait;
use fieldlog::backend::json::{native, JsonBackend};
use fieldlog::dispatch::{DispatchConfig, Dispatcher};
use fieldlog::record::LogRecord;
use fieldlog::sink::{LogSink, SinkError};
use fieldlog::{Backend, Field, Options};
use serde_json::json;
use tokio::time::Duration;

/// Stand-in for a remote collector: prints what it would ship.
struct CollectorSink;

#[async_trait]
impl LogSink for CollectorSink {
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        println!("[collector] {}", serde_json::to_string(record)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let config = DispatchConfig {
        batch_size: 16,
        flush_interval: Duration::from_millis(200),
        ..DispatchConfig::default()
    };
    let (dispatcher, handle) = Dispatcher::spawn(Arc::new(CollectorSink), config);

    let log = JsonBackend::new()
        .with_dispatcher(dispatcher.clone())
        .build(Options {
            name: "checkout".into(),
            add_source: true,
            fields: vec![Field::string("region", "eu-west-1")],
            ..Options::default()
        })
        .expect("build logger");

    log.info(
        "order placed",
        &[
            Field::uint64("order_id", 1842),
            Field::float64("total", 99.5),
            native("items", json!([{"sku": "A-1", "qty": 2}])),
        ],
    );
    log.warn(
        "payment retried",
        &[Field::error(Some(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "gateway timeout",
        )))],
    );

    dispatcher.flush().await.expect("flush");
    println!("{:?}", dispatcher.stats());

    drop(log);
    drop(dispatcher);
    handle.await.expect("dispatcher task");
}
