//! Text-pattern dispatch.
//!
//! The [`HearManager`] owns every `hears` and `hear_fallback` listener. Its
//! middleware looks at the message text and runs the first handler whose
//! conditions match, in registration order. When nothing matches it runs the
//! fallback, or continues the chain if there is none.
//!
//! Conditions are the classic kinds: an exact string, a regular expression or
//! a predicate. A [`HearConditions`] list matches when any of them does.
//!
//! ```rust,ignore
//! manager.hear("ping", pong);
//! manager.hear(Regex::new(r"^/start (\w+)$")?, start);
//! manager.hear(["hi", "hello"], greet);
//! manager.on_fallback(unknown);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use tracing::{debug, trace};

use courier_core::{BoxedMiddleware, Context, Next, middleware_fn};

use crate::context::HandlerContext;
use crate::error::{ExtractError, ExtractResult};
use crate::extractor::FromContext;

/// A predicate over the message text and its context.
pub type HearPredicate = Arc<dyn Fn(&str, &Context) -> bool + Send + Sync>;

// ============================================================================
// Conditions
// ============================================================================

/// One text condition.
#[derive(Clone)]
pub enum HearCondition {
    /// The text equals this string.
    Exact(String),
    /// The pattern matches somewhere in the text.
    Regex(Regex),
    /// The predicate returns `true`.
    Predicate(HearPredicate),
}

impl HearCondition {
    fn matches(&self, text: &str, ctx: &Context) -> Option<HearMatch> {
        match self {
            Self::Exact(expected) => (expected == text).then(|| HearMatch::plain(text)),
            Self::Regex(pattern) => pattern.captures(text).map(|caps| {
                let groups = caps
                    .iter()
                    .skip(1)
                    .map(|group| group.map(|m| m.as_str().to_string()))
                    .collect();
                let named = pattern
                    .capture_names()
                    .flatten()
                    .filter_map(|name| {
                        caps.name(name)
                            .map(|m| (name.to_string(), m.as_str().to_string()))
                    })
                    .collect();
                HearMatch {
                    text: text.to_string(),
                    groups,
                    named,
                }
            }),
            Self::Predicate(predicate) => predicate(text, ctx).then(|| HearMatch::plain(text)),
        }
    }
}

impl fmt::Debug for HearCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) => f.debug_tuple("Exact").field(s).finish(),
            Self::Regex(r) => f.debug_tuple("Regex").field(&r.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for HearCondition {
    fn from(s: &str) -> Self {
        Self::Exact(s.to_string())
    }
}

impl From<String> for HearCondition {
    fn from(s: String) -> Self {
        Self::Exact(s)
    }
}

impl From<Regex> for HearCondition {
    fn from(r: Regex) -> Self {
        Self::Regex(r)
    }
}

/// An any-of list of [`HearCondition`]s.
#[derive(Debug, Clone)]
pub struct HearConditions(Vec<HearCondition>);

impl HearConditions {
    /// Conditions from a predicate.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str, &Context) -> bool + Send + Sync + 'static,
    {
        Self(vec![HearCondition::Predicate(Arc::new(f))])
    }

    /// Conditions from a regular expression source.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self(vec![HearCondition::Regex(Regex::new(pattern)?)]))
    }

    pub fn conditions(&self) -> &[HearCondition] {
        &self.0
    }

    /// Returns the match of the first condition that matches.
    pub fn find(&self, text: &str, ctx: &Context) -> Option<HearMatch> {
        self.0.iter().find_map(|c| c.matches(text, ctx))
    }
}

impl From<HearCondition> for HearConditions {
    fn from(c: HearCondition) -> Self {
        Self(vec![c])
    }
}

impl From<&str> for HearConditions {
    fn from(s: &str) -> Self {
        Self(vec![s.into()])
    }
}

impl From<String> for HearConditions {
    fn from(s: String) -> Self {
        Self(vec![s.into()])
    }
}

impl From<Regex> for HearConditions {
    fn from(r: Regex) -> Self {
        Self(vec![r.into()])
    }
}

impl<T: Into<HearCondition>> From<Vec<T>> for HearConditions {
    fn from(items: Vec<T>) -> Self {
        Self(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<HearCondition>, const N: usize> From<[T; N]> for HearConditions {
    fn from(items: [T; N]) -> Self {
        Self(items.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// HearMatch
// ============================================================================

/// What matched, available to the handler as an extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HearMatch {
    /// The full message text.
    pub text: String,
    /// Positional regex groups, without the whole match.
    pub groups: Vec<Option<String>>,
    /// Named regex groups that participated in the match.
    pub named: HashMap<String, String>,
}

impl HearMatch {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    /// Returns positional group `index` (0 is the first group).
    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|g| g.as_deref())
    }

    /// Returns the named group `name`.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }
}

impl FromContext for HearMatch {
    fn from_context(cx: &HandlerContext) -> ExtractResult<Self> {
        cx.get_state::<HearMatch>()
            .ok_or(ExtractError::StateMissing("hear match"))
    }
}

// ============================================================================
// HearManager
// ============================================================================

/// Registry and dispatcher of text-pattern listeners.
#[derive(Default)]
pub struct HearManager {
    handlers: RwLock<Vec<(HearConditions, BoxedMiddleware)>>,
    fallback: RwLock<Option<BoxedMiddleware>>,
}

impl HearManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `conditions`.
    pub fn hear(&self, conditions: impl Into<HearConditions>, handler: BoxedMiddleware) {
        self.handlers.write().push((conditions.into(), handler));
    }

    /// Sets the catch-all handler. A later call replaces an earlier one.
    pub fn on_fallback(&self, handler: BoxedMiddleware) {
        if self.fallback.write().replace(handler).is_some() {
            debug!("hear fallback replaced");
        }
    }

    /// Returns the number of pattern handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Returns `true` if a fallback is set.
    pub fn has_fallback(&self) -> bool {
        self.fallback.read().is_some()
    }

    fn find(&self, text: &str, ctx: &Context) -> Option<(BoxedMiddleware, HearMatch)> {
        self.handlers
            .read()
            .iter()
            .find_map(|(conditions, handler)| {
                conditions.find(text, ctx).map(|m| (handler.clone(), m))
            })
    }

    /// The dispatching middleware.
    pub fn middleware(self: &Arc<Self>) -> BoxedMiddleware {
        let manager = Arc::clone(self);
        middleware_fn(move |ctx: Arc<Context>, next: Next| {
            let manager = manager.clone();
            async move {
                let Some(text) = ctx.update().text().map(str::to_owned) else {
                    return next.run().await;
                };

                if let Some((handler, matched)) = manager.find(&text, &ctx) {
                    trace!(text = %text, "hear condition matched");
                    ctx.set_state(matched);
                    return handler(ctx, next).await;
                }

                let fallback = manager.fallback.read().clone();
                match fallback {
                    Some(fallback) => fallback(ctx, next).await,
                    None => next.run().await,
                }
            }
        })
    }
}

impl fmt::Debug for HearManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HearManager")
            .field("handlers", &self.handler_count())
            .field("fallback", &self.has_fallback())
            .finish()
    }
}
