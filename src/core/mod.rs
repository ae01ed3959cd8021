//! Core module - configuration, logging and the upload inventory

pub mod config;
pub mod inventory;
pub mod logging;

pub use config::{Config, ConfigError};
pub use inventory::{InventoryDelta, InventoryError, InventoryTracker, Snapshot, SurveyScanner};
pub use logging::{init_logging, LogConfig, LogLevel, LoggingError};
