//! # Courier
//!
//! Declarative listeners, multi-step scenes and one composed middleware
//! pipeline for chat bots.
//!
//! ## Overview
//!
//! Application code groups handler methods into components. Each method
//! declares how it listens: as a generic middleware, for certain update
//! kinds, for text patterns, or as the fallback for unmatched text. Scene
//! components declare the ordered steps of a conversation instead.
//!
//! At startup the runtime discovers every component of the registered
//! modules and wires them into a single chain attached to the chat client:
//!
//! ```text
//! ┌───────────┐     ┌─────────┐     ┌────────────────────────────────────────────────┐
//! │  client   │────▶│ Updates │────▶│ before ─▶ session ─▶ scene ─▶ listeners ─▶ hear │
//! └───────────┘     └─────────┘     └────────────────────────────────────────────────┘
//!       ▲                                                │ handler result
//!       └────────────────────────────────────────────────┘ (reply / send)
//! ```
//!
//! - **Runtime**: loads configuration, owns modules and clients, builds the pipeline
//! - **Components**: typed declarations of listener methods and scene steps
//! - **Managers**: session storage, scene transitions, text-pattern dispatch
//! - **Handlers**: async functions with [`FromContext`](prelude::FromContext) extractors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = CourierRuntime::new();
//!     runtime.register_client(client.clone());
//!
//!     runtime.register_module(Module::new("echo").component(
//!         Component::builder("echo", ())
//!             .update()
//!             .method(handler("ping", || async { "pong" }).hears("ping"))
//!             .method(handler("echo", |text: Text| async move { text.0 }).hear_fallback())
//!             .build(),
//!     ));
//!
//!     runtime.run(updates).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `testing`: the in-memory recording client

pub use courier_core as core;
pub use courier_framework as framework;
pub use courier_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use courier_runtime::{CourierConfig, CourierRuntime, Module, TelegramConfig};

    // Components - declaring listeners and scenes
    pub use courier_framework::{Component, HearConditions, handler, method};

    // Extractors - for handler parameters
    pub use courier_framework::{
        ChatId, FromContext, HearMatch, SceneContext, SenderId, Session, Text,
    };

    // Results
    pub use courier_framework::{IntoReply, Reply};

    // Core types for custom middlewares and clients
    pub use courier_core::{
        BoxError, BoxedClient, BoxedMiddleware, Client, Context, MiddlewareResult, Next, Update,
        UpdateKind, middleware_fn,
    };
}
