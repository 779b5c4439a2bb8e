//! Environment variable names used by this crate for convenient
//! configuration of loggers from services.
//!
//! These are purely helpers; backends and loggers never read the
//! environment themselves.

use crate::level::{Level, LevelError};
use crate::logger::Options;

/// Minimum level, e.g. `debug` or `WARN`.
pub const FIELDLOG_LEVEL_ENV: &str = "FIELDLOG_LEVEL";

/// Base logger name.
pub const FIELDLOG_NAME_ENV: &str = "FIELDLOG_NAME";

/// chrono `strftime` layout for rendered times.
pub const FIELDLOG_TIME_LAYOUT_ENV: &str = "FIELDLOG_TIME_LAYOUT";

/// `true`/`false` (also `1`/`0`, `yes`/`no`): include the call site.
pub const FIELDLOG_ADD_SOURCE_ENV: &str = "FIELDLOG_ADD_SOURCE";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {source}")]
    Level {
        var: &'static str,
        #[source]
        source: LevelError,
    },

    #[error("{var}: expected a boolean, got {value:?}")]
    Bool { var: &'static str, value: String },
}

/// [`Options`] from the `FIELDLOG_*` variables. Unset variables keep
/// their defaults.
pub fn options_from_env() -> Result<Options, ConfigError> {
    options_from_lookup(|key| std::env::var(key).ok())
}

/// Like [`options_from_env`], reading variables through `lookup`.
pub fn options_from_lookup<F>(lookup: F) -> Result<Options, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut options = Options::default();

    if let Some(raw) = lookup(FIELDLOG_LEVEL_ENV) {
        options.level = raw
            .parse::<Level>()
            .map_err(|source| ConfigError::Level {
                var: FIELDLOG_LEVEL_ENV,
                source,
            })?;
    }
    if let Some(name) = lookup(FIELDLOG_NAME_ENV) {
        options.name = name;
    }
    if let Some(layout) = lookup(FIELDLOG_TIME_LAYOUT_ENV).filter(|l| !l.is_empty()) {
        options.time_layout = Some(layout);
    }
    if let Some(raw) = lookup(FIELDLOG_ADD_SOURCE_ENV) {
        options.add_source = parse_bool(&raw).ok_or_else(|| ConfigError::Bool {
            var: FIELDLOG_ADD_SOURCE_ENV,
            value: raw.clone(),
        })?;
    }

    Ok(options)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn unset_variables_keep_defaults() {
        let options = options_from_lookup(lookup(&[])).unwrap();
        assert_eq!(options.level, Level::Info);
        assert!(options.name.is_empty());
        assert!(!options.add_source);
        assert!(options.time_layout.is_none());
    }

    #[test]
    fn variables_are_applied() {
        let options = options_from_lookup(lookup(&[
            ("FIELDLOG_LEVEL", " Warning "),
            ("FIELDLOG_NAME", "billing"),
            ("FIELDLOG_TIME_LAYOUT", "%H:%M:%S"),
            ("FIELDLOG_ADD_SOURCE", "YES"),
        ]))
        .unwrap();
        assert_eq!(options.level, Level::Warn);
        assert_eq!(options.name, "billing");
        assert_eq!(options.time_layout.as_deref(), Some("%H:%M:%S"));
        assert!(options.add_source);
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = options_from_lookup(lookup(&[("FIELDLOG_LEVEL", "loud")])).unwrap_err();
        assert!(err.to_string().starts_with("FIELDLOG_LEVEL"));

        let err = options_from_lookup(lookup(&[("FIELDLOG_ADD_SOURCE", "maybe")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Bool {
                var: FIELDLOG_ADD_SOURCE_ENV,
                value: "maybe".into()
            }
        );
    }

    #[test]
    fn env_or_falls_back() {
        assert_eq!(env_or("FIELDLOG_SURELY_UNSET_VARIABLE", "dflt"), "dflt");
    }
}
