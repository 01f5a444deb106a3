//! Extractor system for the Courier framework.
//!
//! Handler parameters are resolved through the [`FromContext`] trait. Any
//! type implementing it can appear in a handler's signature, and the invoker
//! resolves it fresh for every call.
//!
//! ```rust,ignore
//! async fn echo(text: Text, chat: ChatId) -> String {
//!     format!("{} said {}", chat.0, text.0)
//! }
//! ```
//!
//! # Error Handling
//!
//! If an extractor fails, the handler body is skipped. Wrap a parameter in
//! [`Option<T>`] to make it optional; that never fails.
//!
//! Session, scene and hear-match extractors live next to their managers.

use std::ops::Deref;
use std::sync::Arc;

use courier_core::{BoxedClient, Context, Next, Update};

use crate::context::HandlerContext;
use crate::error::{ExtractError, ExtractResult};

/// A trait for types that can be extracted from a [`HandlerContext`].
pub trait FromContext: Sized {
    /// Attempts to extract this type from the given context.
    fn from_context(cx: &HandlerContext) -> ExtractResult<Self>;

    /// Hands back whatever extraction took from `cx`.
    ///
    /// Called on values that were extracted for a handler whose other
    /// parameters failed, before the handler is skipped.
    fn release(self, _cx: &HandlerContext) {}
}

impl FromContext for Arc<Context> {
    fn from_context(cx: &HandlerContext) -> ExtractResult<Self> {
        Ok(cx.context().clone())
    }
}

impl FromContext for Update {
    fn from_context(cx: &HandlerContext) -> ExtractResult<Self> {
        Ok(cx.update().clone())
    }
}

impl FromContext for BoxedClient {
    fn from_context(cx: &HandlerContext) -> ExtractResult<Self> {
        Ok(cx.client().clone())
    }
}

/// Takes the invocation's continuation.
///
/// A handler that takes `Next` decides itself whether the chain goes on.
/// Only one parameter per handler can take it.
impl FromContext for Next {
    fn from_context(cx: &HandlerContext) -> ExtractResult<Self> {
        cx.take_next().ok_or(ExtractError::NextConsumed)
    }

    fn release(self, cx: &HandlerContext) {
        cx.restore_next(self);
    }
}

impl<T: FromContext> FromContext for Option<T> {
    fn from_context(cx: &HandlerContext) -> ExtractResult<Self> {
        Ok(T::from_context(cx).ok())
    }

    fn release(self, cx: &HandlerContext) {
        if let Some(value) = self {
            value.release(cx);
        }
    }
}

// ============================================================================
// Update field extractors
// ============================================================================

/// The message text. Fails for updates without text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text(pub String);

impl Deref for Text {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromContext for Text {
    fn from_context(cx: &HandlerContext) -> ExtractResult<Self> {
        cx.update()
            .text()
            .map(|t| Text(t.to_string()))
            .ok_or(ExtractError::MissingField("text"))
    }
}

/// The chat the update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatId(pub i64);

impl FromContext for ChatId {
    fn from_context(cx: &HandlerContext) -> ExtractResult<Self> {
        cx.update()
            .chat_id
            .map(ChatId)
            .ok_or(ExtractError::MissingField("chat"))
    }
}

/// The user who caused the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderId(pub i64);

impl FromContext for SenderId {
    fn from_context(cx: &HandlerContext) -> ExtractResult<Self> {
        cx.update()
            .sender_id
            .map(SenderId)
            .ok_or(ExtractError::MissingField("sender"))
    }
}

#[cfg(test)]
mod tests {
    use courier_core::testing::RecordingClient;

    use super::*;

    fn cx(update: Update) -> HandlerContext {
        HandlerContext::new(
            Arc::new(Context::new(update, RecordingClient::new())),
            Next::noop(),
        )
    }

    #[test]
    fn test_field_extractors() {
        let cx = cx(Update::message(1, 10, 20, 30, "hello"));

        assert_eq!(&*Text::from_context(&cx).unwrap(), "hello");
        assert_eq!(ChatId::from_context(&cx).unwrap(), ChatId(10));
        assert_eq!(SenderId::from_context(&cx).unwrap(), SenderId(20));
    }

    #[test]
    fn test_missing_text_fails_but_option_succeeds() {
        let cx = cx(Update::new(1, "poll_answer"));

        assert!(matches!(
            Text::from_context(&cx),
            Err(ExtractError::MissingField("text"))
        ));
        assert_eq!(Option::<Text>::from_context(&cx).unwrap(), None);
    }

    #[test]
    fn test_next_can_be_taken_once() {
        let cx = cx(Update::new(1, "message"));

        assert!(Next::from_context(&cx).is_ok());
        assert!(matches!(
            Next::from_context(&cx),
            Err(ExtractError::NextConsumed)
        ));
        assert!(!cx.has_next());
    }
}
