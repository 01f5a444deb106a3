//! # Courier Core
//!
//! The core engine of the Courier bot toolkit.
//!
//! This crate defines what flows through a bot (updates), what every
//! middleware sees (the per-update [`Context`]), how middlewares are chained
//! ([`Next`], [`Composer`]) and where the chain is attached (the [`Client`]
//! boundary and its [`Updates`] slot).
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! - **Updates**: [`Update`], [`UpdateKind`]
//! - **Context**: [`Context`] with a typed per-update state map
//! - **Errors**: [`ApiError`], [`UpdatesError`], [`BoxError`]
//!
//! ### Framework Layer
//!
//! - **Continuations**: [`Next`], consumed at most once
//! - **Middlewares**: [`BoxedMiddleware`], [`middleware_fn`]
//! - **Composition**: [`Composer`]
//!
//! ### Integration Layer
//!
//! - **Client boundary**: [`Client`], [`BoxedClient`], [`SendOptions`]
//! - **Update delivery**: [`Updates`], [`UpdateService`]
//!
//! ## Flow
//!
//! ```text
//! ┌───────────┐     ┌─────────┐     ┌──────────────────────────────┐
//! │ transport │────▶│ Updates │────▶│ composed pipeline (Composer) │
//! └───────────┘     └─────────┘     └──────────────────────────────┘
//!                                         │ ctx.reply(..)
//!                                         ▼
//!                                   ┌───────────┐
//!                                   │  Client   │
//!                                   └───────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use courier_core::{Composer, Next, Update, middleware_fn};
//!
//! let mut composer = Composer::new();
//! composer.push(
//!     "ping",
//!     middleware_fn(|ctx, next: Next| async move {
//!         if ctx.update().text() == Some("ping") {
//!             ctx.reply("pong").await?;
//!             return Ok(());
//!         }
//!         next.run().await
//!     }),
//! );
//!
//! client.updates().attach(composer.compose())?;
//! ```

// Architectural layers
pub mod foundation;
pub mod framework;
pub mod integration;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export foundation types
pub use foundation::{ApiError, ApiResult, BoxError, Context, Update, UpdateKind, UpdatesError};

// Re-export framework types
pub use framework::{
    BoxedMiddleware, Composer, MiddlewareResult, Next, middleware_fn, passthrough,
};

// Re-export integration types
pub use integration::{
    BoxedClient, Client, SendOptions, UpdateService, Updates, downcast_client,
};

// Commonly used by implementors of `Client`.
pub use async_trait::async_trait;
pub use futures::future::BoxFuture;
