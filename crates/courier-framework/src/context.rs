//! Per-invocation handler context.
//!
//! [`HandlerContext`] is what parameter extractors see. It pairs the shared
//! `Arc<Context>` of the update with the [`Next`] handed to this particular
//! invocation, so a handler can ask for the continuation as a parameter.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use courier_core::{Context, Next};

/// Context type under which handler parameters are resolved.
pub const CONTEXT_TYPE: &str = "telegram";

/// The view of one handler invocation.
pub struct HandlerContext {
    ctx: Arc<Context>,
    next: Mutex<Option<Next>>,
}

impl HandlerContext {
    pub fn new(ctx: Arc<Context>, next: Next) -> Self {
        Self {
            ctx,
            next: Mutex::new(Some(next)),
        }
    }

    /// Returns the shared update context.
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Takes the continuation, leaving `None` behind.
    pub fn take_next(&self) -> Option<Next> {
        self.next.lock().take()
    }

    /// Puts a taken continuation back into the slot.
    pub fn restore_next(&self, next: Next) {
        *self.next.lock() = Some(next);
    }

    /// Returns `true` while nobody has taken the continuation.
    pub fn has_next(&self) -> bool {
        self.next.lock().is_some()
    }
}

impl Deref for HandlerContext {
    type Target = Context;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("ctx", &self.ctx)
            .field("has_next", &self.has_next())
            .finish()
    }
}
