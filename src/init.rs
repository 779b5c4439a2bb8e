use crate::level::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Registry;

/// Configuration of the console subscriber installed by [`init_tracing`].
///
/// **Fields**
/// - `level`: most verbose level let through. `DPanic` and above map onto
///   `ERROR`.
/// - `with_target`: print the event target (`fieldlog` for entries from
///   the tracing backend).
/// - `ansi`: colorize output.
#[derive(Clone, Debug)]
pub struct SubscriberConfig {
    pub level: Level,
    pub with_target: bool,
    pub ansi: bool,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            with_target: true,
            ansi: true,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// Install a global `tracing` subscriber printing events to stdout.
///
/// This is the usual companion of the
/// [`TracingBackend`](crate::backend::tracing_bridge::TracingBackend); it
/// also shows the crate's own diagnostics (dropped records, sink
/// failures). Fails instead of panicking when a subscriber is already set.
pub fn init_tracing(config: SubscriberConfig) -> Result<(), InitError> {
    let filter = LevelFilter::from_level(config.level.to_tracing());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(config.with_target)
        .with_ansi(config.ansi);

    Registry::default().with(filter).with(fmt_layer).try_init()?;
    Ok(())
}
