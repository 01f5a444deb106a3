//! # Courier Framework
//!
//! Declarative listeners and scenes on top of [`courier_core`].
//!
//! This layer provides:
//! - Component declarations with listener and scene metadata
//! - Axum-style handler invocation with [`FromContext`] extractors
//! - Result handling that replies to messages with handler return values
//! - The listener registrar and the scene builder
//! - Session, scene and hear managers with their middlewares
//!
//! The runtime crate wires these into one pipeline; every piece is usable
//! on its own with a plain [`courier_core::Composer`].

pub mod component;
pub mod context;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod hear;
pub mod listener;
pub mod metadata;
pub mod registrar;
pub mod reply;
pub mod scene;
pub mod session;

pub use component::{Component, ComponentBuilder, MethodDecl, MethodDef, handler, method};
pub use context::{CONTEXT_TYPE, HandlerContext};
pub use error::{BuildError, ExtractError, ExtractResult, SceneError};
pub use extractor::{ChatId, FromContext, SenderId, Text};
pub use handler::{Handler, HandlerInvoker, InvocableHandler, Method};
pub use hear::{HearCondition, HearConditions, HearManager, HearMatch, HearPredicate};
pub use listener::{ListenerKind, ListenerMetadata};
pub use metadata::{DeclaredMetadata, MetadataAccessor};
pub use registrar::{ListenerRegistrar, RegistrationSummary};
pub use reply::{IntoReply, Reply, ReplyMode, reply_adapter};
pub use scene::{
    SCENE_SESSION_KEY, SceneAction, SceneBuilder, SceneContext, SceneManager, SceneProgress,
    SceneStep, StepScene,
};
pub use session::{MemoryStorage, Session, SessionData, SessionKeyFn, SessionManager, SessionStorage};
