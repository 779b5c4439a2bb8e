//! Backend-agnostic structured logging.
//!
//! Application code builds typed [`Field`]s and logs through the small
//! [`Logger`] interface; a backend turns those fields into its own native
//! representation via [`translate`] and the traits in [`encoder`].

pub mod level;
pub mod field;
pub mod encoder;
pub mod translate;
pub mod logger;

pub mod record;
pub mod sink;
pub mod noop_sink;
pub mod writer_sink;
pub mod dispatch;

pub mod backend;
pub mod env;
#[cfg(feature = "tracing-backend")]
pub mod init;

pub use field::{Field, Kind, Value};
pub use level::Level;
pub use logger::{Backend, Logger, Options};
pub use translate::translate;
