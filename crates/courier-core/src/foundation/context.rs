//! Per-update context.
//!
//! A single [`Context`] is created for every inbound update and shared as an
//! `Arc<Context>` by every middleware that update passes through. It holds:
//!
//! - the [`Update`] itself,
//! - the [`Client`](crate::Client) that received it, and
//! - a typed state map that middlewares use to hand data down the chain
//!   (the session, the scene handle, regex captures, ...).
//!
//! State is scoped to the update; nothing in it outlives the dispatch.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use parking_lot::Mutex;

use crate::foundation::error::{ApiError, ApiResult};
use crate::foundation::update::Update;
use crate::integration::client::{BoxedClient, SendOptions};

/// The context object handed to middlewares for one update.
///
/// # Example
///
/// ```rust,ignore
/// async fn greet(ctx: Arc<Context>, next: Next) -> MiddlewareResult {
///     if ctx.update().text() == Some("/start") {
///         ctx.reply("hello!").await?;
///         return Ok(());
///     }
///     next.run().await
/// }
/// ```
pub struct Context {
    update: Update,
    client: BoxedClient,
    state: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl Context {
    /// Creates the context for one update.
    pub fn new(update: Update, client: BoxedClient) -> Self {
        Self {
            update,
            client,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the update being processed.
    pub fn update(&self) -> &Update {
        &self.update
    }

    /// Returns the client that received the update.
    pub fn client(&self) -> &BoxedClient {
        &self.client
    }

    /// Returns `true` if the update is a plain message.
    pub fn is_message(&self) -> bool {
        self.update.is_message()
    }

    /// Sends `text` as a new message to the update's chat.
    pub async fn send(&self, text: &str) -> ApiResult<i64> {
        let chat_id = self.update.chat_id.ok_or(ApiError::MissingChat)?;
        self.client
            .send_message(chat_id, text, SendOptions::default())
            .await
    }

    /// Sends `text` as a reply to the update's message.
    pub async fn reply(&self, text: &str) -> ApiResult<i64> {
        let chat_id = self.update.chat_id.ok_or(ApiError::MissingChat)?;
        let options = SendOptions {
            reply_to_message_id: self.update.message_id,
        };
        self.client.send_message(chat_id, text, options).await
    }

    // ─── Typed state ──────────────────────────────────────────────────────────

    /// Stores a value in this update's state map.
    ///
    /// Only one value per type can be stored; subsequent calls overwrite.
    pub fn set_state<T: Send + Sync + 'static>(&self, value: T) {
        self.state.lock().insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a cloned value from this update's state map.
    pub fn get_state<T: Clone + 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Returns `true` if a value of type `T` has been stored.
    pub fn has_state<T: 'static>(&self) -> bool {
        self.state.lock().contains_key(&TypeId::of::<T>())
    }

    /// Removes and returns a value from this update's state map.
    pub fn take_state<T: 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("update", &self.update)
            .field("client", &self.client.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::RecordingClient;

    #[tokio::test]
    async fn test_reply_targets_original_message() {
        let client = RecordingClient::new();
        let ctx = Context::new(Update::message(1, 10, 20, 30, "hi"), client.clone());

        ctx.reply("hello").await.unwrap();
        ctx.send("again").await.unwrap();

        let sent = client.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].reply_to_message_id, Some(30));
        assert_eq!(sent[1].reply_to_message_id, None);
        assert_eq!(sent[1].chat_id, 10);
    }

    #[tokio::test]
    async fn test_send_without_chat_fails() {
        let client = RecordingClient::new();
        let ctx = Context::new(Update::new(1, "poll_answer"), client);

        assert!(matches!(ctx.send("x").await, Err(ApiError::MissingChat)));
    }

    #[test]
    fn test_state_is_typed() {
        let ctx = Context::new(Update::new(1, "poll"), RecordingClient::new());
        ctx.set_state(Arc::new(5_u32));
        ctx.set_state("label".to_string());

        assert_eq!(ctx.get_state::<Arc<u32>>().map(|v| *v), Some(5));
        assert_eq!(ctx.take_state::<String>().as_deref(), Some("label"));
        assert!(!ctx.has_state::<String>());
    }
}
