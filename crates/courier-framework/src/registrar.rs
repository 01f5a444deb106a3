//! Listener classification and registration.
//!
//! Turns the listener declarations of one component into entries of the
//! pipeline [`Composer`] or registrations on the [`HearManager`]:
//!
//! | entry            | destination                                       |
//! |------------------|---------------------------------------------------|
//! | `Use`            | composer, runs for every update                   |
//! | `On`             | composer, behind a gate on the update kind        |
//! | `Hears`          | hear manager, as a pattern handler                |
//! | `HearFallback`   | hear manager, as the fallback                     |
//!
//! Entries missing their required argument are skipped.

use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, trace};

use courier_core::{BoxedMiddleware, Composer, Context, Next, UpdateKind, middleware_fn};

use crate::component::Component;
use crate::hear::HearManager;
use crate::listener::{ListenerKind, ListenerMetadata};
use crate::metadata::MetadataAccessor;
use crate::reply::{ReplyMode, reply_adapter};

/// What one or more registrations produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationSummary {
    pub uses: usize,
    pub ons: usize,
    pub hears: usize,
    pub fallbacks: usize,
    pub skipped: usize,
}

impl RegistrationSummary {
    /// Number of registered entries.
    pub fn total(&self) -> usize {
        self.uses + self.ons + self.hears + self.fallbacks
    }

    /// Adds `other` to this summary.
    pub fn merge(&mut self, other: RegistrationSummary) {
        self.uses += other.uses;
        self.ons += other.ons;
        self.hears += other.hears;
        self.fallbacks += other.fallbacks;
        self.skipped += other.skipped;
    }
}

/// Registers the listeners of update components.
pub struct ListenerRegistrar<'a> {
    accessor: &'a dyn MetadataAccessor,
    hear: Arc<HearManager>,
    mode: ReplyMode,
}

impl<'a> ListenerRegistrar<'a> {
    pub fn new(accessor: &'a dyn MetadataAccessor, hear: Arc<HearManager>, mode: ReplyMode) -> Self {
        Self {
            accessor,
            hear,
            mode,
        }
    }

    /// Registers every listener entry of `component`, in method declaration
    /// order and, within a method, in entry order.
    pub fn register_component(
        &self,
        composer: &mut Composer,
        component: &Component,
    ) -> RegistrationSummary {
        let mut summary = RegistrationSummary::default();

        for method in component.methods() {
            let Some(listeners) = self.accessor.listener_metadata(method) else {
                continue;
            };

            let adapter = reply_adapter(method.invoker(), self.mode);
            let label = |kind: ListenerKind| format!("{}.{}:{}", component.name(), method.name(), kind);

            for listener in listeners {
                match listener {
                    ListenerMetadata::Use => {
                        composer.push(label(ListenerKind::Use), adapter.clone());
                        summary.uses += 1;
                    }
                    ListenerMetadata::On {
                        update: None, ..
                    } => {
                        debug!(
                            component = %component.name(),
                            method = %method.name(),
                            "on listener without update kind skipped"
                        );
                        summary.skipped += 1;
                    }
                    ListenerMetadata::On {
                        update: Some(kind),
                        middlewares,
                    } => {
                        let mut inner = Composer::new();
                        for (i, mw) in middlewares.iter().enumerate() {
                            inner.push(format!("{}.{}:on[{i}]", component.name(), method.name()), mw.clone());
                        }
                        inner.push(label(ListenerKind::On), adapter.clone());

                        composer.push(label(ListenerKind::On), gate(kind.clone(), inner.compose()));
                        summary.ons += 1;
                    }
                    ListenerMetadata::Hears { conditions: None } => {
                        debug!(
                            component = %component.name(),
                            method = %method.name(),
                            "hears listener without conditions skipped"
                        );
                        summary.skipped += 1;
                    }
                    ListenerMetadata::Hears {
                        conditions: Some(conditions),
                    } => {
                        self.hear.hear(conditions.clone(), adapter.clone());
                        summary.hears += 1;
                    }
                    ListenerMetadata::HearFallback => {
                        self.hear.on_fallback(adapter.clone());
                        summary.fallbacks += 1;
                    }
                }
            }
        }

        trace!(component = %component.name(), ?summary, "component registered");
        summary
    }
}

/// Runs `inner` for updates of `kind`; other updates skip straight to the
/// continuation.
fn gate(kind: UpdateKind, inner: BoxedMiddleware) -> BoxedMiddleware {
    middleware_fn(move |ctx: Arc<Context>, next: Next| {
        if ctx.update().is(std::slice::from_ref(&kind)) {
            inner(ctx, next)
        } else {
            next.run().boxed()
        }
    })
}

#[cfg(test)]
mod tests {
    use courier_core::Update;
    use courier_core::testing::RecordingClient;
    use parking_lot::Mutex;

    use super::*;
    use crate::component::handler;
    use crate::extractor::Text;
    use crate::metadata::DeclaredMetadata;

    fn registrar(hear: &Arc<HearManager>) -> ListenerRegistrar<'static> {
        ListenerRegistrar::new(&DeclaredMetadata, hear.clone(), ReplyMode::Reply)
    }

    #[test]
    fn test_labels_and_summary() {
        let hear = Arc::new(HearManager::new());
        let component = Component::builder("bot", ())
            .update()
            .method(handler("log", || async {}).uses())
            .method(handler("photo", || async {}).on(UpdateKind::Message).hears("hi"))
            .method(handler("nothing", || async {}))
            .method(handler("broken", || async {}).listener(ListenerMetadata::On {
                update: None,
                middlewares: Vec::new(),
            }))
            .method(handler("unknown", || async {}).hear_fallback())
            .build();

        let mut composer = Composer::new();
        let summary = registrar(&hear).register_component(&mut composer, &component);

        assert_eq!(composer.labels(), vec!["bot.log:use", "bot.photo:on"]);
        assert_eq!(
            summary,
            RegistrationSummary {
                uses: 1,
                ons: 1,
                hears: 1,
                fallbacks: 1,
                skipped: 1,
            }
        );
        assert_eq!(summary.total(), 4);
        assert_eq!(hear.handler_count(), 1);
        assert!(hear.has_fallback());
    }

    #[tokio::test]
    async fn test_on_gate_runs_inner_chain_for_matching_kind() {
        let hear = Arc::new(HearManager::new());
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let recorded = seen.clone();
        let before = middleware_fn(move |_ctx: Arc<Context>, next: Next| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().push("before".into());
                next.run().await
            }
        });

        let component = Component::builder("echo", ())
            .update()
            .method(
                handler("echo", |text: Text| async move { text.0 })
                    .on_with(UpdateKind::Message, vec![before]),
            )
            .build();

        let mut composer = Composer::new();
        registrar(&hear).register_component(&mut composer, &component);
        let pipeline = composer.compose();

        let client = RecordingClient::new();
        let ctx = Arc::new(Context::new(Update::message(1, 5, 6, 7, "hey"), client.clone()));
        pipeline(ctx, Next::noop()).await.unwrap();

        let ctx = Arc::new(Context::new(
            Update::new(2, UpdateKind::CallbackQuery).with_chat(5),
            client.clone(),
        ));
        pipeline(ctx, Next::noop()).await.unwrap();

        assert_eq!(*seen.lock(), vec!["before"]);
        assert_eq!(client.texts(), vec!["hey"]);
    }

    #[test]
    fn test_summary_merge() {
        let mut total = RegistrationSummary::default();
        total.merge(RegistrationSummary {
            uses: 2,
            skipped: 1,
            ..Default::default()
        });
        total.merge(RegistrationSummary {
            hears: 3,
            ..Default::default()
        });
        assert_eq!(total.total(), 5);
        assert_eq!(total.skipped, 1);
    }
}
