//! Handler Invoker.
//!
//! Listener methods are plain async functions whose parameters implement
//! [`FromContext`], similar to Axum's handler system. Two shapes exist:
//!
//! - [`Method<S, T>`]: the first parameter is the component instance
//!   (`Arc<S>`), the rest are extracted.
//! - [`Handler<T>`]: every parameter is extracted.
//!
//! ```rust,ignore
//! struct Greeter { greeting: String }
//!
//! impl Greeter {
//!     async fn greet(self: Arc<Self>, text: Text) -> String {
//!         format!("{}, {}", self.greeting, &*text)
//!     }
//! }
//!
//! let invocable = HandlerInvoker::create(Arc::new(greeter), Greeter::greet);
//! ```
//!
//! [`HandlerInvoker`] binds either shape into an [`InvocableHandler`]: a
//! function of `(Arc<Context>, Next)` that resolves parameters fresh on every
//! call, runs the body and returns its [`Reply`]. Failures of the body
//! propagate unchanged.
//!
//! # Extraction failures
//!
//! If any parameter cannot be resolved the body is not run. The failure is
//! logged at debug level, a continuation taken by an earlier parameter is
//! handed back, and the continuation runs. An unresolvable handler is inert
//! instead of breaking the chain.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use courier_core::{BoxError, Context, Next};

use crate::context::{CONTEXT_TYPE, HandlerContext};
use crate::error::ExtractError;
use crate::extractor::FromContext;
use crate::reply::{IntoReply, Reply};

/// A bound, type-erased handler.
pub type InvocableHandler =
    Arc<dyn Fn(Arc<Context>, Next) -> BoxFuture<'static, Result<Reply, BoxError>> + Send + Sync>;

// ============================================================================
// Method / Handler traits
// ============================================================================

/// An async function taking a component instance plus extracted parameters.
///
/// Implemented for `Fn(Arc<S>, T1, ..., Tn)` with n up to 12.
pub trait Method<S, T>: Clone + Send + Sync + 'static {
    fn call(&self, instance: Arc<S>, cx: HandlerContext)
    -> BoxFuture<'static, Result<Reply, BoxError>>;
}

/// An async function taking only extracted parameters.
///
/// Implemented for `Fn(T1, ..., Tn)` with n up to 12.
pub trait Handler<T>: Clone + Send + Sync + 'static {
    fn call(&self, cx: HandlerContext) -> BoxFuture<'static, Result<Reply, BoxError>>;
}

async fn skip(cx: HandlerContext, errors: Vec<ExtractError>) -> Result<Reply, BoxError> {
    debug!(
        context = CONTEXT_TYPE,
        kind = %cx.update().kind,
        errors = ?errors,
        "parameter extraction failed, handler skipped"
    );
    if let Some(next) = cx.take_next() {
        next.run().await?;
    }
    Ok(Reply::None)
}

/// Extracts every parameter. If any fails, the values that did extract are
/// released back into `cx` and the handler is skipped.
macro_rules! extract_params {
    ($cx:ident; $($ty:ident),*) => {
        $( let $ty = $ty::from_context(&$cx); )*
        let ($($ty,)*) = match ($($ty,)*) {
            ($(Ok($ty),)*) => ($($ty,)*),
            ($($ty,)*) => {
                let mut errors: Vec<ExtractError> = Vec::new();
                $(
                    match $ty {
                        Ok(value) => value.release(&$cx),
                        Err(err) => errors.push(err),
                    }
                )*
                return skip($cx, errors).boxed();
            }
        };
    };
}

macro_rules! impl_method {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_variables, unused_mut, unreachable_patterns)]
        impl<F, Fut, Res, S, $($ty,)*> Method<S, ($($ty,)*)> for F
        where
            F: Fn(Arc<S>, $($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: IntoReply,
            S: Send + Sync + 'static,
            $( $ty: FromContext + Send + 'static, )*
        {
            fn call(
                &self,
                instance: Arc<S>,
                cx: HandlerContext,
            ) -> BoxFuture<'static, Result<Reply, BoxError>> {
                extract_params!(cx; $($ty),*);

                let fut = (self)(instance, $($ty,)*);
                async move { fut.await.into_reply() }.boxed()
            }
        }
    };
}

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_variables, unused_mut, unreachable_patterns)]
        impl<F, Fut, Res, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: IntoReply,
            $( $ty: FromContext + Send + 'static, )*
        {
            fn call(&self, cx: HandlerContext) -> BoxFuture<'static, Result<Reply, BoxError>> {
                extract_params!(cx; $($ty),*);

                let fut = (self)($($ty,)*);
                async move { fut.await.into_reply() }.boxed()
            }
        }
    };
}

macro_rules! all_arities {
    ($name:ident) => {
        $name!();
        $name!(T1);
        $name!(T1, T2);
        $name!(T1, T2, T3);
        $name!(T1, T2, T3, T4);
        $name!(T1, T2, T3, T4, T5);
        $name!(T1, T2, T3, T4, T5, T6);
        $name!(T1, T2, T3, T4, T5, T6, T7);
        $name!(T1, T2, T3, T4, T5, T6, T7, T8);
        $name!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
        $name!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
        $name!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
        $name!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
    };
}

all_arities!(impl_method);
all_arities!(impl_handler);

// ============================================================================
// HandlerInvoker
// ============================================================================

/// Binds methods and handlers into [`InvocableHandler`]s.
pub struct HandlerInvoker;

impl HandlerInvoker {
    /// Binds `method` to `instance`.
    pub fn create<S, M, T>(instance: Arc<S>, method: M) -> InvocableHandler
    where
        S: Send + Sync + 'static,
        M: Method<S, T>,
        T: 'static,
    {
        Arc::new(move |ctx: Arc<Context>, next: Next| {
            method.call(instance.clone(), HandlerContext::new(ctx, next))
        })
    }

    /// Wraps an instance-less handler.
    pub fn from_handler<H, T>(handler: H) -> InvocableHandler
    where
        H: Handler<T>,
        T: 'static,
    {
        Arc::new(move |ctx: Arc<Context>, next: Next| {
            handler.call(HandlerContext::new(ctx, next))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use courier_core::testing::RecordingClient;
    use courier_core::{MiddlewareResult, Update};

    use super::*;
    use crate::extractor::{ChatId, Text};

    struct Counter {
        calls: AtomicUsize,
    }

    impl Counter {
        async fn count(self: Arc<Self>, text: Text) -> String {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            format!("{} #{n}", &*text)
        }

        async fn fail(self: Arc<Self>) -> Result<(), std::io::Error> {
            Err(std::io::Error::other("method failed"))
        }
    }

    fn ctx(update: Update) -> Arc<Context> {
        Arc::new(Context::new(update, RecordingClient::new()))
    }

    fn flag_next(flag: &Arc<AtomicUsize>) -> Next {
        let flag = flag.clone();
        Next::new(move || async move {
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_method_resolves_fresh_each_call() {
        let counter = Arc::new(Counter {
            calls: AtomicUsize::new(0),
        });
        let invocable = HandlerInvoker::create(counter, Counter::count);

        let first = invocable(ctx(Update::message(1, 1, 1, 1, "a")), Next::noop())
            .await
            .unwrap();
        let second = invocable(ctx(Update::message(2, 1, 1, 2, "b")), Next::noop())
            .await
            .unwrap();

        assert_eq!(first, Reply::Text("a #1".into()));
        assert_eq!(second, Reply::Text("b #2".into()));
    }

    #[tokio::test]
    async fn test_method_failure_propagates_unchanged() {
        let counter = Arc::new(Counter {
            calls: AtomicUsize::new(0),
        });
        let invocable = HandlerInvoker::create(counter, Counter::fail);

        let err = invocable(ctx(Update::message(1, 1, 1, 1, "a")), Next::noop())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "method failed");
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_body_and_continues() {
        let body_runs = Arc::new(AtomicUsize::new(0));
        let runs = body_runs.clone();
        let invocable = HandlerInvoker::from_handler(move |_chat: ChatId| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        let continued = Arc::new(AtomicUsize::new(0));
        let reply = invocable(ctx(Update::new(1, "poll_answer")), flag_next(&continued))
            .await
            .unwrap();

        assert_eq!(reply, Reply::None);
        assert_eq!(body_runs.load(Ordering::SeqCst), 0);
        assert_eq!(continued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_extraction_failure_after_next_still_continues() {
        let body_runs = Arc::new(AtomicUsize::new(0));
        let runs = body_runs.clone();
        let invocable = HandlerInvoker::from_handler(move |next: Next, _text: Text| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                next.run().await
            }
        });

        let continued = Arc::new(AtomicUsize::new(0));
        let reply = invocable(ctx(Update::new(1, "callback_query")), flag_next(&continued))
            .await
            .unwrap();

        assert_eq!(reply, Reply::None);
        assert_eq!(body_runs.load(Ordering::SeqCst), 0);
        assert_eq!(continued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_method_extraction_failure_releases_optional_next() {
        struct Gate;

        impl Gate {
            async fn pass(self: Arc<Self>, next: Option<Next>, _chat: ChatId) -> MiddlewareResult {
                match next {
                    Some(next) => next.run().await,
                    None => Ok(()),
                }
            }
        }

        let invocable = HandlerInvoker::create(Arc::new(Gate), Gate::pass);
        let continued = Arc::new(AtomicUsize::new(0));
        invocable(ctx(Update::new(1, "poll_answer")), flag_next(&continued))
            .await
            .unwrap();

        assert_eq!(continued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_controls_continuation() {
        let continued = Arc::new(AtomicUsize::new(0));

        let pass = HandlerInvoker::from_handler(|next: Next| async move {
            next.run().await
        });
        pass(ctx(Update::new(1, "message")), flag_next(&continued))
            .await
            .unwrap();

        let stop = HandlerInvoker::from_handler(|| async {});
        stop(ctx(Update::new(2, "message")), flag_next(&continued))
            .await
            .unwrap();

        assert_eq!(continued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_returning_middleware_result() {
        async fn guarded(text: Text, next: Next) -> MiddlewareResult {
            if &*text == "blocked" {
                return Err("blocked".into());
            }
            next.run().await
        }

        let invocable = HandlerInvoker::from_handler(guarded);
        let err = invocable(ctx(Update::message(1, 1, 1, 1, "blocked")), Next::noop())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "blocked");
    }
}
