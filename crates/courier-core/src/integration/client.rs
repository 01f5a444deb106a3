//! Chat-client boundary.
//!
//! A [`Client`] is the handle to one chat-platform connection. The toolkit
//! needs exactly two things from it: a way to send text back, and the
//! [`Updates`] slot its inbound update stream delivers into. Polling,
//! webhooks and the wire protocol stay behind the trait.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::foundation::error::ApiResult;
use crate::integration::updates::Updates;

/// Options for [`Client::send_message`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Sends the message as a reply to this message id.
    pub reply_to_message_id: Option<i64>,
}

impl SendOptions {
    /// Options for a reply to `message_id`.
    pub fn reply_to(message_id: i64) -> Self {
        Self {
            reply_to_message_id: Some(message_id),
        }
    }
}

/// The core chat-client trait.
///
/// Implementations are registered as named singletons in the runtime's
/// module container and resolved by name when the pipeline is attached.
#[async_trait]
pub trait Client: Send + Sync {
    /// Returns the name the client is registered under.
    fn name(&self) -> &str;

    /// Sends a text message to `chat_id`.
    ///
    /// Returns the id of the sent message.
    async fn send_message(&self, chat_id: i64, text: &str, options: SendOptions)
    -> ApiResult<i64>;

    /// Returns the consumer slot of this client's update stream.
    fn updates(&self) -> &Updates;

    /// Returns `self` as `Arc<dyn Any>` for downcasting.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A shared, type-erased client.
pub type BoxedClient = Arc<dyn Client>;

/// Downcasts a [`BoxedClient`] to its concrete type.
pub fn downcast_client<T: Client + 'static>(client: &BoxedClient) -> Option<Arc<T>> {
    client.clone().as_any().downcast::<T>().ok()
}
