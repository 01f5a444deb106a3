//! Listener metadata.
//!
//! A method declares how it wants to be dispatched with one or more
//! [`ListenerMetadata`] entries. Each entry is registered on its own, so a
//! single method may be reachable through several dispatch paths.

use std::fmt;

use courier_core::{BoxedMiddleware, UpdateKind};

use crate::hear::HearConditions;

/// The dispatch strategy of a listener entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// Runs for every update reaching it.
    Use,
    /// Runs for updates of one kind.
    On,
    /// Runs when the message text matches.
    Hears,
    /// Runs when no text pattern matched.
    HearFallback,
}

impl ListenerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Use => "use",
            Self::On => "on",
            Self::Hears => "hears",
            Self::HearFallback => "hear_fallback",
        }
    }
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One listener declaration on a method.
///
/// Arguments are optional where a declaration can be left incomplete; an
/// entry missing its required argument is skipped at registration.
#[derive(Clone)]
pub enum ListenerMetadata {
    Use,
    On {
        update: Option<UpdateKind>,
        /// Run before the handler, only for matching updates.
        middlewares: Vec<BoxedMiddleware>,
    },
    Hears {
        conditions: Option<HearConditions>,
    },
    HearFallback,
}

impl ListenerMetadata {
    /// An update-filtered entry without extra middlewares.
    pub fn on(update: impl Into<UpdateKind>) -> Self {
        Self::On {
            update: Some(update.into()),
            middlewares: Vec::new(),
        }
    }

    /// A text-pattern entry.
    pub fn hears(conditions: impl Into<HearConditions>) -> Self {
        Self::Hears {
            conditions: Some(conditions.into()),
        }
    }

    pub fn kind(&self) -> ListenerKind {
        match self {
            Self::Use => ListenerKind::Use,
            Self::On { .. } => ListenerKind::On,
            Self::Hears { .. } => ListenerKind::Hears,
            Self::HearFallback => ListenerKind::HearFallback,
        }
    }
}

impl fmt::Debug for ListenerMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Use => f.write_str("Use"),
            Self::On {
                update,
                middlewares,
            } => f
                .debug_struct("On")
                .field("update", update)
                .field("middlewares", &middlewares.len())
                .finish(),
            Self::Hears { conditions } => f
                .debug_struct("Hears")
                .field("conditions", conditions)
                .finish(),
            Self::HearFallback => f.write_str("HearFallback"),
        }
    }
}
