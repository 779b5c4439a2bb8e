use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Implementation-agnostic log severity.
///
/// Higher numbers are more severe. The zero value (and [`Default`]) is
/// [`Level::Info`], which describes normal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(i8)]
pub enum Level {
    /// Verbose diagnostic output, usually disabled in production.
    Debug = -1,
    /// Normal application operations.
    #[default]
    Info = 0,
    /// Something unusual happened that may need attention.
    Warn = 1,
    /// Unexpected error conditions.
    Error = 2,
    /// Severe errors that panic in development and behave like `Error` otherwise.
    DPanic = 3,
    /// The logger panics after emitting the entry.
    Panic = 4,
    /// The process exits after emitting the entry.
    Fatal = 5,
}

/// Error returned when a severity cannot be parsed or rendered.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LevelError {
    #[error("unknown level {0:?}")]
    Unknown(String),

    #[error("level {0} is out of range")]
    OutOfRange(i8),
}

impl Level {
    pub const ALL: [Level; 7] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::DPanic,
        Level::Panic,
        Level::Fatal,
    ];

    /// Lower-case name of the level.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::DPanic => "dpanic",
            Level::Panic => "panic",
            Level::Fatal => "fatal",
        }
    }

    pub fn as_i8(self) -> i8 {
        self as i8
    }

    /// Closest `tracing` level. Everything at or above `Error` collapses onto
    /// [`tracing::Level::ERROR`].
    pub fn to_tracing(self) -> tracing::Level {
        match self {
            Level::Debug => tracing::Level::DEBUG,
            Level::Info => tracing::Level::INFO,
            Level::Warn => tracing::Level::WARN,
            Level::Error | Level::DPanic | Level::Panic | Level::Fatal => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LevelError;

    /// Case-insensitive; surrounding whitespace is ignored and `warning` is
    /// accepted as an alias of `warn`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "dpanic" => Ok(Level::DPanic),
            "panic" => Ok(Level::Panic),
            "fatal" => Ok(Level::Fatal),
            _ => Err(LevelError::Unknown(s.to_string())),
        }
    }
}

impl TryFrom<i8> for Level {
    type Error = LevelError;

    fn try_from(value: i8) -> Result<Self, LevelError> {
        Level::ALL
            .iter()
            .copied()
            .find(|l| l.as_i8() == value)
            .ok_or(LevelError::OutOfRange(value))
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
