//! Courier Runtime - Orchestration layer for the Courier bot toolkit.
//!
//! This crate provides:
//! - Configuration loading (`CourierConfig`, `ConfigLoader`)
//! - Module and client registration (`Module`, `ModulesContainer`)
//! - Pipeline composition (`ListenersExplorer`)
//! - Runtime orchestration (`CourierRuntime`)
//! - Logging configuration
//!
//! # Pipeline
//!
//! On `init` the runtime builds one middleware chain for the configured
//! client and attaches it to the client's update stream:
//!
//! ```text
//! before.. ─▶ session ─▶ scene ─▶ scene.intercept ─▶ listeners.. ─▶ hear ─▶ after..
//! ```
//!
//! Listeners keep the order their modules and components were registered in.
//!
//! ```ignore
//! use courier_runtime::{CourierRuntime, Module};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = CourierRuntime::new();
//!     runtime.register_client(client.clone());
//!     runtime.register_module(Module::new("echo").component(echo));
//!
//!     // Run until the stream ends or Ctrl+C
//!     runtime.run(updates).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod explorer;
pub mod logging;
pub mod options;
pub mod runtime;

// Re-exports
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, CourierConfig, LoggingConfig, Profile, TelegramConfig,
};
pub use container::{Module, ModulesContainer};
pub use error::{RuntimeError, RuntimeResult};
pub use explorer::{ExplorerState, ListenersExplorer};
pub use logging::{LoggingBuilder, SpanEvents};
pub use options::TelegramModuleOptions;
pub use runtime::{CourierRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
