//! Error types for the Courier core.
//!
//! Framework-level errors (extraction, scene building) are defined in
//! courier-framework; configuration and lifecycle errors in courier-runtime.

use thiserror::Error;

/// Type-erased error carried through the middleware chain.
///
/// A failing handler's error travels through every composing middleware
/// unchanged until it reaches the runtime's dispatch boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// API Errors
// =============================================================================

/// Errors returned by chat-client API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The client has no live connection.
    #[error("client is not connected")]
    NotConnected,
    /// The update has no chat to answer in.
    #[error("update has no chat to send to")]
    MissingChat,
    /// The platform rejected the call.
    #[error("API error ({code}): {message}")]
    Api { code: i64, message: String },
    /// Other error.
    #[error("{0}")]
    Other(String),
}

// =============================================================================
// Update Stream Errors
// =============================================================================

/// Errors raised by a client's [`Updates`](crate::Updates) slot.
#[derive(Debug, Clone, Error)]
pub enum UpdatesError {
    /// A consumer is already attached; re-attachment is not supported.
    #[error("an update consumer is already attached to client '{client}'")]
    AlreadyAttached { client: String },
    /// An update arrived before any consumer was attached.
    #[error("no update consumer attached to client '{client}'")]
    NotAttached { client: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;
