//! Bundled [`Backend`](crate::logger::Backend) implementations.

use crate::logger::{Backend, BuildError, Logger, Options};
use std::str::FromStr;

pub mod json;

#[cfg(feature = "tracing-backend")]
pub mod tracing_bridge;

/// Bundled backends, selectable by name from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Json,
    Tracing,
}

/// Error returned when a backend name is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown backend {0:?}")]
pub struct UnknownBackend(pub String);

impl FromStr for BackendKind {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(BackendKind::Json),
            "tracing" => Ok(BackendKind::Tracing),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

/// Build a logger with the default configuration of a bundled backend.
///
/// Fails with [`BuildError::FeatureDisabled`] for the tracing backend when
/// the `tracing-backend` feature is off.
pub fn build_logger(kind: BackendKind, options: Options) -> Result<Box<dyn Logger>, BuildError> {
    match kind {
        BackendKind::Json => json::JsonBackend::new().build(options),
        BackendKind::Tracing => {
            #[cfg(feature = "tracing-backend")]
            {
                tracing_bridge::TracingBackend::new().build(options)
            }

            #[cfg(not(feature = "tracing-backend"))]
            {
                let _ = options;
                Err(BuildError::FeatureDisabled("tracing-backend"))
            }
        }
    }
}
