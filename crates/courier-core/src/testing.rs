//! Test doubles.
//!
//! [`RecordingClient`] is an in-memory [`Client`] that records every message
//! sent through it. Enable the `testing` feature to use it from other crates.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::foundation::error::{ApiError, ApiResult};
use crate::foundation::update::Update;
use crate::framework::middleware::MiddlewareResult;
use crate::integration::client::{Client, SendOptions};
use crate::integration::updates::Updates;

/// One message recorded by [`RecordingClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
    pub reply_to_message_id: Option<i64>,
}

impl SentMessage {
    /// Returns `true` if the message was sent as a reply.
    pub fn is_reply(&self) -> bool {
        self.reply_to_message_id.is_some()
    }
}

/// A [`Client`] that records sends instead of talking to a platform.
pub struct RecordingClient {
    name: String,
    updates: Updates,
    sent: Mutex<Vec<SentMessage>>,
    next_message_id: AtomicI64,
    fail_sends: Mutex<bool>,
}

impl RecordingClient {
    /// Creates a client named `"telegram"`.
    pub fn new() -> Arc<Self> {
        Self::named("telegram")
    }

    /// Creates a client with the given name.
    pub fn named(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self {
            updates: Updates::new(name.clone()),
            name,
            sent: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(1),
            fail_sends: Mutex::new(false),
        })
    }

    /// Returns a snapshot of all recorded messages.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Returns the texts of all recorded messages.
    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.text.clone()).collect()
    }

    /// Forgets all recorded messages.
    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    /// Makes subsequent sends fail with [`ApiError::NotConnected`].
    pub fn fail_sends(&self, fail: bool) {
        *self.fail_sends.lock() = fail;
    }

    /// Delivers one update into the attached pipeline.
    pub async fn push(self: &Arc<Self>, update: Update) -> MiddlewareResult {
        self.updates.dispatch(self.clone(), update).await
    }
}

#[async_trait]
impl Client for RecordingClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        options: SendOptions,
    ) -> ApiResult<i64> {
        if *self.fail_sends.lock() {
            return Err(ApiError::NotConnected);
        }
        self.sent.lock().push(SentMessage {
            chat_id,
            text: text.to_string(),
            reply_to_message_id: options.reply_to_message_id,
        });
        Ok(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }

    fn updates(&self) -> &Updates {
        &self.updates
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
