//! The update-consumer slot of a client.
//!
//! Every [`Client`](crate::Client) owns one [`Updates`]. The pipeline
//! composer attaches the composed middleware to it exactly once; the
//! transport then calls [`Updates::dispatch`] for each inbound update.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{Instrument, Level, debug, span};

use crate::foundation::context::Context;
use crate::foundation::error::UpdatesError;
use crate::foundation::update::Update;
use crate::framework::middleware::{BoxedMiddleware, MiddlewareResult, Next};
use crate::integration::client::BoxedClient;

/// Single-consumer attachment point of a client's update stream.
pub struct Updates {
    client: String,
    consumer: RwLock<Option<BoxedMiddleware>>,
}

impl Updates {
    /// Creates an empty slot for the client named `client`.
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            consumer: RwLock::new(None),
        }
    }

    /// Attaches the update consumer.
    ///
    /// Re-attachment is not supported: a second call fails with
    /// [`UpdatesError::AlreadyAttached`] and keeps the first consumer.
    pub fn attach(&self, consumer: BoxedMiddleware) -> Result<(), UpdatesError> {
        let mut slot = self.consumer.write();
        if slot.is_some() {
            return Err(UpdatesError::AlreadyAttached {
                client: self.client.clone(),
            });
        }
        *slot = Some(consumer);
        debug!(client = %self.client, "update consumer attached");
        Ok(())
    }

    /// Returns `true` once a consumer has been attached.
    pub fn is_attached(&self) -> bool {
        self.consumer.read().is_some()
    }

    /// Runs the attached consumer for one update.
    ///
    /// A fresh [`Context`] is built for the update and the consumer runs with
    /// the terminal continuation. Errors from the chain are returned as-is.
    pub async fn dispatch(&self, client: BoxedClient, update: Update) -> MiddlewareResult {
        let consumer = self.consumer.read().clone();
        let Some(consumer) = consumer else {
            return Err(UpdatesError::NotAttached {
                client: self.client.clone(),
            }
            .into());
        };

        let span = span!(
            Level::DEBUG,
            "dispatch",
            client = %self.client,
            update_id = update.update_id,
            kind = %update.kind,
        );
        let ctx = Arc::new(Context::new(update, client));
        consumer(ctx, Next::noop()).instrument(span).await
    }
}

impl std::fmt::Debug for Updates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updates")
            .field("client", &self.client)
            .field("attached", &self.is_attached())
            .finish()
    }
}
