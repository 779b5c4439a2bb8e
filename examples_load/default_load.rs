use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;

use fieldlog::backend::json::JsonBackend;
use fieldlog::dispatch::{DispatchConfig, Dispatcher};
use fieldlog::noop_sink::NoopSink;
use fieldlog::{Backend, Field, Options};

#[tokio::main]
async fn main() {
    let (dispatcher, _handle) = Dispatcher::spawn(Arc::new(NoopSink), DispatchConfig::default());
    let log = JsonBackend::new()
        .with_dispatcher(dispatcher.clone())
        .build(Options::default())
        .expect("build logger");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        log.error(
            "default load test error",
            &[Field::uint64("iteration", i), Field::string("stage", "load")],
        );
        if i % 1_000 == 0 {
            // Let the background task keep up with the producer.
            tokio::task::yield_now().await;
        }
    }

    let elapsed = start.elapsed();
    println!(
        "default config: logged {} entries in {:?} (~{:.0} entries/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    tokio::time::timeout(Duration::from_secs(5), dispatcher.flush())
        .await
        .expect("flush timed out")
        .expect("flush");
    println!("{:?}", dispatcher.stats());
}
