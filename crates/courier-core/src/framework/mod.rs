//! Framework layer - the middleware chain.
//!
//! - [`Next`]: explicit, consume-once continuation
//! - [`BoxedMiddleware`]: type-erased `(ctx, next)` function
//! - [`Composer`]: ordered, labelled composition root

pub mod composer;
pub mod middleware;

pub use composer::Composer;
pub use middleware::{BoxedMiddleware, MiddlewareResult, Next, middleware_fn, passthrough};
