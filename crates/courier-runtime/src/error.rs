//! Runtime error types.

use thiserror::Error;

use courier_core::UpdatesError;
use courier_framework::BuildError;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The pipeline was already built and attached.
    #[error("Listener pipeline already initialized")]
    AlreadyInitialized,

    /// No client is registered under the configured name.
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    /// A scene component could not be built.
    #[error("Failed to build scene: {0}")]
    Build(#[from] BuildError),

    /// The client's update stream rejected the pipeline.
    #[error("Failed to attach pipeline: {0}")]
    Attach(#[from] UpdatesError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
