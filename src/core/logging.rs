//! Logging setup
//!
//! Library code logs through `tracing` macros with structured fields
//! (`file`, `component`, `run_id`, ...). The binary installs one
//! subscriber at startup writing to stderr, so stdout stays free for
//! command output.
//!
//! `RUST_LOG` directives take precedence over the level picked from the
//! command line, e.g. `RUST_LOG=rwogp::alignment=trace`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    #[error("Invalid log filter directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// Subscriber settings
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Extra comma-separated directives, e.g. `rwogp::ingest=debug`
    pub filter_directives: Option<String>,
    pub include_targets: bool,
}

impl LogConfig {
    /// Level from the global CLI flags: verbose wins over quiet
    pub fn for_cli(verbose: bool, quiet: bool) -> Self {
        let level = if verbose {
            LogLevel::Debug
        } else if quiet {
            LogLevel::Error
        } else {
            LogLevel::Warn
        };
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn build_filter(&self) -> Result<EnvFilter, LoggingError> {
        let mut filter = EnvFilter::builder()
            .with_default_directive(self.level.to_tracing_level().into())
            .from_env_lossy();

        if let Some(directives) = &self.filter_directives {
            for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                let parsed = directive.parse().map_err(|e: tracing_subscriber::filter::ParseError| {
                    LoggingError::InvalidDirective {
                        directive: directive.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                filter = filter.add_directive(parsed);
            }
        }
        Ok(filter)
    }
}

/// Install the global subscriber
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = config.build_filter()?;
    let layer = tfmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.include_targets);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_cli_levels() {
        assert_eq!(LogConfig::for_cli(true, false).level, LogLevel::Debug);
        assert_eq!(LogConfig::for_cli(false, true).level, LogLevel::Error);
        assert_eq!(LogConfig::for_cli(false, false).level, LogLevel::Warn);
        assert_eq!(LogConfig::for_cli(true, true).level, LogLevel::Debug);
    }

    #[test]
    fn test_bad_directive_rejected() {
        let config = LogConfig {
            filter_directives: Some("rwogp=notalevel".to_string()),
            ..LogConfig::default()
        };
        assert!(matches!(
            config.build_filter(),
            Err(LoggingError::InvalidDirective { .. })
        ));
    }
}
