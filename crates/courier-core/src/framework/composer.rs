//! Ordered composition of middlewares.
//!
//! A [`Composer`] collects labelled middleware entries and folds them into a
//! single [`BoxedMiddleware`]. For one update the entries run strictly in
//! insertion order; each receives a [`Next`] that runs the following entry,
//! and the last one's `Next` runs the outer continuation.
//!
//! ```text
//!   ctx ──▶ [before] ──▶ [session] ──▶ [scene] ──▶ ... ──▶ [after] ──▶ outer next
//! ```
//!
//! Labels exist only so the order of a built pipeline can be inspected.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::foundation::context::Context;
use crate::framework::middleware::{BoxedMiddleware, MiddlewareResult, Next};

/// An ordered, labelled list of middleware entries.
#[derive(Clone, Default)]
pub struct Composer {
    entries: Vec<(String, BoxedMiddleware)>,
}

impl Composer {
    /// Creates an empty composer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&mut self, label: impl Into<String>, middleware: BoxedMiddleware) -> &mut Self {
        self.entries.push((label.into(), middleware));
        self
    }

    /// Appends an entry (builder pattern).
    pub fn with(mut self, label: impl Into<String>, middleware: BoxedMiddleware) -> Self {
        self.push(label, middleware);
        self
    }

    /// Returns the entry labels in execution order.
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|(label, _)| label.as_str()).collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries were pushed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Folds the entries into one middleware.
    ///
    /// The result snapshots the current entries; later pushes do not affect it.
    pub fn compose(&self) -> BoxedMiddleware {
        let chain: Arc<[BoxedMiddleware]> = self
            .entries
            .iter()
            .map(|(_, middleware)| middleware.clone())
            .collect();

        Arc::new(move |ctx: Arc<Context>, next: Next| {
            run_from(chain.clone(), 0, ctx, next)
        })
    }
}

fn run_from(
    chain: Arc<[BoxedMiddleware]>,
    index: usize,
    ctx: Arc<Context>,
    outer: Next,
) -> BoxFuture<'static, MiddlewareResult> {
    let Some(middleware) = chain.get(index).cloned() else {
        return outer.run().boxed();
    };

    let rest_ctx = ctx.clone();
    let next = Next::new(move || run_from(chain, index + 1, rest_ctx, outer));
    middleware(ctx, next)
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("entries", &self.labels())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::foundation::error::BoxError;
    use crate::foundation::update::Update;
    use crate::framework::middleware::middleware_fn;
    use crate::testing::RecordingClient;

    fn ctx() -> Arc<Context> {
        Arc::new(Context::new(
            Update::message(1, 1, 1, 1, "hi"),
            RecordingClient::new(),
        ))
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> BoxedMiddleware {
        let log = log.clone();
        middleware_fn(move |_ctx, next: Next| {
            let log = log.clone();
            async move {
                log.lock().push(name);
                next.run().await
            }
        })
    }

    #[tokio::test]
    async fn test_entries_run_in_insertion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let composer = Composer::new()
            .with("a", recorder(&log, "a"))
            .with("b", recorder(&log, "b"))
            .with("c", recorder(&log, "c"));

        let tail = log.clone();
        let outer = Next::new(move || async move {
            tail.lock().push("outer");
            Ok(())
        });
        composer.compose()(ctx(), outer).await.unwrap();

        assert_eq!(*log.lock(), vec!["a", "b", "c", "outer"]);
        assert_eq!(composer.labels(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let composer = Composer::new()
            .with("a", recorder(&log, "a"))
            .with("stop", middleware_fn(|_ctx, _next: Next| async { Ok(()) }))
            .with("c", recorder(&log, "c"));

        composer.compose()(ctx(), Next::noop()).await.unwrap();

        assert_eq!(*log.lock(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_error_propagates_unchanged() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let composer = Composer::new()
            .with("a", recorder(&log, "a"))
            .with(
                "fail",
                middleware_fn(|_ctx, _next: Next| async {
                    Err::<(), BoxError>("handler failed".into())
                }),
            )
            .with("c", recorder(&log, "c"));

        let err = composer.compose()(ctx(), Next::noop()).await.unwrap_err();

        assert_eq!(err.to_string(), "handler failed");
        assert_eq!(*log.lock(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_empty_composer_runs_outer() {
        let hit = Arc::new(Mutex::new(false));
        let flag = hit.clone();
        let outer = Next::new(move || async move {
            *flag.lock() = true;
            Ok(())
        });

        Composer::new().compose()(ctx(), outer).await.unwrap();
        assert!(*hit.lock());
    }
}
