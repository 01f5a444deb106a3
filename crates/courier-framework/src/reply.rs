//! Handler results and the result-handling adapter.
//!
//! Whatever a listener returns is normalised into a [`Reply`]. The
//! [`reply_adapter`] then decides what to do with it: for plain message
//! updates a [`Reply::Text`] is sent back, either as a reply to the original
//! message or as a new message depending on [`ReplyMode`]. Every other
//! combination is dropped.

use std::sync::Arc;

use courier_core::{BoxError, BoxedMiddleware, Context, Next, middleware_fn};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::handler::InvocableHandler;

// ============================================================================
// Reply
// ============================================================================

/// The normalised result of a handler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Reply {
    /// Nothing to send.
    #[default]
    None,
    /// Text to send back to the chat.
    Text(String),
}

impl Reply {
    /// Returns the reply text, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::None => None,
        }
    }
}

/// Conversion of handler return values into a [`Reply`].
///
/// An `Err` becomes an invocation failure and propagates unchanged.
pub trait IntoReply: Send + 'static {
    fn into_reply(self) -> Result<Reply, BoxError>;
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::None)
    }
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(self)
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::Text(self))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::Text(self.to_string()))
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Result<Reply, BoxError> {
        match self {
            Some(t) => t.into_reply(),
            None => Ok(Reply::None),
        }
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<BoxError> + Send + 'static,
{
    fn into_reply(self) -> Result<Reply, BoxError> {
        match self {
            Ok(t) => t.into_reply(),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Reply mode and adapter
// ============================================================================

/// How text results are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMode {
    /// Reply to the original message.
    #[default]
    Reply,
    /// Send a new message to the chat.
    Send,
}

impl ReplyMode {
    /// Maps the `not_reply_message` option onto a mode.
    pub fn from_not_reply(not_reply_message: bool) -> Self {
        if not_reply_message {
            Self::Send
        } else {
            Self::Reply
        }
    }
}

/// Wraps an invocable handler into a middleware that delivers its result.
///
/// Send failures propagate like handler failures.
pub fn reply_adapter(invocable: InvocableHandler, mode: ReplyMode) -> BoxedMiddleware {
    middleware_fn(move |ctx: Arc<Context>, next: Next| {
        let invocable = invocable.clone();
        async move {
            let reply = invocable(ctx.clone(), next).await?;

            match reply {
                Reply::Text(text) if ctx.is_message() => {
                    match mode {
                        ReplyMode::Reply => ctx.reply(&text).await?,
                        ReplyMode::Send => ctx.send(&text).await?,
                    };
                }
                other => {
                    trace!(kind = %ctx.update().kind, result = ?other, "handler result dropped");
                }
            }
            Ok(())
        }
    })
}

#[cfg(test)]
mod tests {
    use courier_core::Update;
    use courier_core::testing::RecordingClient;

    use super::*;
    use crate::handler::HandlerInvoker;

    async fn run(update: Update, handler: InvocableHandler, mode: ReplyMode) -> Arc<RecordingClient> {
        let client = RecordingClient::new();
        let ctx = Arc::new(Context::new(update, client.clone()));
        reply_adapter(handler, mode)(ctx, Next::noop()).await.unwrap();
        client
    }

    #[test]
    fn test_into_reply_conversions() {
        assert_eq!(().into_reply().unwrap(), Reply::None);
        assert_eq!("hi".into_reply().unwrap(), Reply::Text("hi".into()));
        assert_eq!(Some("x".to_string()).into_reply().unwrap().as_text(), Some("x"));
        assert_eq!(Option::<String>::None.into_reply().unwrap(), Reply::None);

        let failed: Result<String, std::io::Error> = Err(std::io::Error::other("nope"));
        assert_eq!(failed.into_reply().unwrap_err().to_string(), "nope");
    }

    #[tokio::test]
    async fn test_text_reply_to_message() {
        let handler = HandlerInvoker::from_handler(|| async { "pong" });
        let client = run(Update::message(1, 5, 6, 7, "ping"), handler, ReplyMode::Reply).await;

        let sent = client.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "pong");
        assert_eq!(sent[0].reply_to_message_id, Some(7));
    }

    #[tokio::test]
    async fn test_send_mode_sends_plain_message() {
        let handler = HandlerInvoker::from_handler(|| async { "pong" });
        let client = run(Update::message(1, 5, 6, 7, "ping"), handler, ReplyMode::Send).await;

        let sent = client.sent();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].is_reply());
    }

    #[tokio::test]
    async fn test_text_for_non_message_is_dropped() {
        let handler = HandlerInvoker::from_handler(|| async { "pong" });
        let update = Update::new(1, "callback_query").with_chat(5);
        let client = run(update, handler, ReplyMode::Reply).await;

        assert!(client.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_propagates() {
        let client = RecordingClient::new();
        client.fail_sends(true);
        let ctx = Arc::new(Context::new(Update::message(1, 5, 6, 7, "ping"), client.clone()));

        let handler = HandlerInvoker::from_handler(|| async { "pong" });
        let result = reply_adapter(handler, ReplyMode::Reply)(ctx, Next::noop()).await;

        assert!(result.is_err());
    }
}
