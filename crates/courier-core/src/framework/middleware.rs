//! Middleware and continuation model.
//!
//! A middleware is an async function of `(Arc<Context>, Next)`. It may act on
//! the update, then either call [`Next::run`] to hand control to the rest of
//! the chain or drop the [`Next`] to stop there.
//!
//! ```rust,ignore
//! let log = middleware_fn(|ctx: Arc<Context>, next: Next| async move {
//!     tracing::info!(kind = %ctx.update().kind, "update received");
//!     next.run().await
//! });
//! ```
//!
//! `Next` is consumed by value, so a continuation can run at most once.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::foundation::context::Context;
use crate::foundation::error::BoxError;

/// The result of running a middleware.
///
/// Errors are carried unchanged through every composing middleware.
pub type MiddlewareResult = Result<(), BoxError>;

/// A type-erased middleware.
pub type BoxedMiddleware =
    Arc<dyn Fn(Arc<Context>, Next) -> BoxFuture<'static, MiddlewareResult> + Send + Sync>;

type NextFn = Box<dyn FnOnce() -> BoxFuture<'static, MiddlewareResult> + Send>;

/// The continuation handed to a middleware: "run the rest of the chain".
pub struct Next {
    inner: Option<NextFn>,
}

impl Next {
    /// Wraps a closure producing the rest of the chain.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = MiddlewareResult> + Send + 'static,
    {
        Self {
            inner: Some(Box::new(move || f().boxed())),
        }
    }

    /// The terminal continuation. Running it does nothing.
    pub fn noop() -> Self {
        Self { inner: None }
    }

    /// Returns `true` for the terminal continuation.
    pub fn is_noop(&self) -> bool {
        self.inner.is_none()
    }

    /// Runs the rest of the chain.
    pub async fn run(self) -> MiddlewareResult {
        match self.inner {
            Some(f) => f().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("noop", &self.is_noop())
            .finish()
    }
}

/// Adapts an async closure into a [`BoxedMiddleware`].
pub fn middleware_fn<F, Fut>(f: F) -> BoxedMiddleware
where
    F: Fn(Arc<Context>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    Arc::new(move |ctx: Arc<Context>, next: Next| f(ctx, next).boxed())
}

/// A middleware that only calls its continuation.
pub fn passthrough() -> BoxedMiddleware {
    middleware_fn(|_ctx, next: Next| next.run())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::foundation::update::Update;
    use crate::testing::RecordingClient;

    fn ctx() -> Arc<Context> {
        Arc::new(Context::new(
            Update::message(1, 1, 1, 1, "hi"),
            RecordingClient::new(),
        ))
    }

    #[tokio::test]
    async fn test_next_runs_continuation_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let next = Next::new(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(!next.is_noop());
        next.run().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropping_next_short_circuits() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let stop = middleware_fn(|_ctx, _next: Next| async { Ok(()) });

        let next = Next::new(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        stop(ctx(), next).await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_passthrough_propagates_errors() {
        let next = Next::new(|| async { Err::<(), BoxError>("boom".into()) });
        let err = passthrough()(ctx(), next).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
