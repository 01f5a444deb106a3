//! Error types for the Courier framework.

use thiserror::Error;

use crate::scene::SceneAction;

/// Errors that can occur during parameter extraction.
///
/// A failed extraction never reaches the caller: the handler is skipped and
/// the chain continues. See [`crate::handler`].
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// The update lacks a field the parameter needs.
    #[error("update has no {0}")]
    MissingField(&'static str),

    /// The continuation was already taken by another parameter.
    #[error("continuation already consumed")]
    NextConsumed,

    /// A middleware that provides the parameter did not run.
    #[error("no {0} in context; is its middleware installed?")]
    StateMissing(&'static str),

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors raised while turning declarations into dispatch structures.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    /// A scene declares more than one enter or leave callback.
    #[error("scene '{scene}' declares {action} on both '{first}' and '{second}'")]
    DuplicateSceneAction {
        scene: String,
        action: SceneAction,
        first: String,
        second: String,
    },
}

/// Errors raised by scene transitions.
#[derive(Debug, Clone, Error)]
pub enum SceneError {
    /// Scene progress is stored in the session, and no session is installed.
    #[error("scenes need a session; enable the session manager")]
    SessionUnavailable,

    /// No scene with this slug is registered.
    #[error("unknown scene '{0}'")]
    UnknownScene(String),

    /// The operation needs an active scene.
    #[error("not in a scene")]
    NotInScene,

    /// The update context was dropped before the transition ran.
    #[error("update context is no longer available")]
    ContextGone,
}
