use std::time::Instant;

use fieldlog::backend::json::JsonBackend;
use fieldlog::field::LazyContext;
use fieldlog::{Backend, Field, Level, Options};

/// Compares the cost of disabled entries with eager and lazy fields.
fn main() {
    let log = JsonBackend::new()
        .build(
            Options {
                level: Level::Info,
                ..Options::default()
            }
            .with_writer(std::io::sink()),
        )
        .expect("build logger");

    let n = 1_000_000;

    let start = Instant::now();
    for i in 0..n {
        log.debug(
            "eager",
            &[Field::string("payload", format!("expensive {i}"))],
        );
    }
    let eager = start.elapsed();

    let start = Instant::now();
    for i in 0..n {
        log.debug(
            "lazy",
            &[Field::lazy_fields(move |cx: &LazyContext| {
                vec![Field::string("payload", format!("expensive {i} at {}", cx.level()))]
            })],
        );
    }
    let lazy = start.elapsed();

    println!("disabled debug x{n}: eager {eager:?}, lazy {lazy:?}");
}
