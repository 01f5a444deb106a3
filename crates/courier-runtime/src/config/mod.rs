//! Configuration module for the Courier runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for logging and the listener pipeline.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    CourierConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig, TelegramConfig,
};
pub use validation::validate_config;
