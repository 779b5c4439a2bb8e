use crate::field::Field;
use crate::level::Level;
use crate::sink::SinkError;
use std::fmt;
use std::io::Write;
use std::panic::Location;

/// Call-site location captured by the leveled methods.
pub type Caller = &'static Location<'static>;

/// The small, portable logging interface.
///
/// Backends implement [`log`](Logger::log) and the context methods; the
/// leveled methods forward to `log` with the caller's location, so source
/// capture works without frame skipping.
pub trait Logger: Send + Sync {
    /// Reports whether entries at `level` would be emitted.
    fn enabled(&self, level: Level) -> bool;

    /// Emit one entry. Terminal levels (`DPanic`, `Panic`, `Fatal`) apply
    /// their after-emission behavior here.
    fn log(&self, level: Level, msg: &str, fields: &[Field], caller: Caller);

    /// Child logger with `fields` bound to every entry. Fields bound to the
    /// child don't affect the parent. Lazy fields are evaluated now, as if
    /// for an `Info` entry.
    fn with(&self, fields: &[Field]) -> Box<dyn Logger>;

    /// Child logger with `name` appended to this logger's name, segments
    /// joined by periods.
    fn named(&self, name: &str) -> Box<dyn Logger>;

    /// Flush any buffered entries.
    fn sync(&self) -> Result<(), SinkError>;

    /// DEBUG (-1): messages useful for debugging.
    #[track_caller]
    fn debug(&self, msg: &str, fields: &[Field]) {
        self.log(Level::Debug, msg, fields, Location::caller());
    }

    /// INFO (0): normal application operations.
    #[track_caller]
    fn info(&self, msg: &str, fields: &[Field]) {
        self.log(Level::Info, msg, fields, Location::caller());
    }

    /// WARN (1): something unusual happened that may need attention before
    /// it escalates.
    #[track_caller]
    fn warn(&self, msg: &str, fields: &[Field]) {
        self.log(Level::Warn, msg, fields, Location::caller());
    }

    /// ERROR (2): unexpected error conditions.
    #[track_caller]
    fn error(&self, msg: &str, fields: &[Field]) {
        self.log(Level::Error, msg, fields, Location::caller());
    }

    /// DPANIC (3): severe errors; panics after logging in development.
    #[track_caller]
    fn dpanic(&self, msg: &str, fields: &[Field]) {
        self.log(Level::DPanic, msg, fields, Location::caller());
    }

    /// PANIC (4): panics after logging.
    #[track_caller]
    fn panic(&self, msg: &str, fields: &[Field]) {
        self.log(Level::Panic, msg, fields, Location::caller());
    }

    /// FATAL (5): syncs and exits the process with status 1 after logging.
    #[track_caller]
    fn fatal(&self, msg: &str, fields: &[Field]) {
        self.log(Level::Fatal, msg, fields, Location::caller());
    }
}

/// Hints used by a [`Backend`] when constructing a [`Logger`].
/// Backends may ignore some of them.
#[derive(Default)]
pub struct Options {
    /// Minimum level to record.
    pub level: Level,
    /// Include `file:line` of the call site.
    pub add_source: bool,
    /// Initial logger name.
    pub name: String,
    /// Preferred destination.
    pub writer: Option<Box<dyn Write + Send>>,
    /// chrono `strftime` pattern for rendered times.
    pub time_layout: Option<String>,
    /// Fields bound to the base logger.
    pub fields: Vec<Field>,
}

impl Options {
    pub fn with_writer<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("level", &self.level)
            .field("add_source", &self.add_source)
            .field("name", &self.name)
            .field("writer", &self.writer.is_some())
            .field("time_layout", &self.time_layout)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Error returned when a backend cannot build a logger from [`Options`].
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("invalid time layout {0:?}")]
    InvalidTimeLayout(String),

    #[error("backend {0:?} is not compiled in")]
    FeatureDisabled(&'static str),
}

/// Builds a [`Logger`] from [`Options`].
pub trait Backend {
    fn build(&self, options: Options) -> Result<Box<dyn Logger>, BuildError>;
}

/// Join a child name onto its parent's.
pub(crate) fn join_name(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (false, true) => parent.to_string(),
        (false, false) => format!("{parent}.{child}"),
    }
}

/// After-emission behavior of the terminal levels.
pub(crate) fn conclude<F>(level: Level, development: bool, msg: &str, sync: F)
where
    F: FnOnce() -> Result<(), SinkError>,
{
    match level {
        Level::DPanic if development => panic!("{msg}"),
        Level::Panic => panic!("{msg}"),
        Level::Fatal => {
            if let Err(err) = sync() {
                tracing::warn!(target: "fieldlog", error = %err, "sync before exit failed");
            }
            std::process::exit(1);
        }
        _ => {}
    }
}
