//! Per-chat session storage.
//!
//! The [`SessionManager`] middleware loads the session of the update's
//! chat/sender pair before the rest of the chain runs and writes it back
//! afterwards. Handlers reach it through the [`Session`] extractor; the scene
//! manager keeps its progress in it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{trace, warn};

use courier_core::{BoxError, BoxedMiddleware, Context, Next, middleware_fn};

use crate::context::HandlerContext;
use crate::error::{ExtractError, ExtractResult};
use crate::extractor::FromContext;

/// Session payload as stored.
pub type SessionData = Map<String, Value>;

// ============================================================================
// Storage
// ============================================================================

/// Backend the session manager persists into.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<SessionData>, BoxError>;

    async fn set(&self, key: &str, data: SessionData) -> Result<(), BoxError>;

    async fn delete(&self, key: &str) -> Result<(), BoxError>;
}

/// In-process storage. Sessions are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, SessionData>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<SessionData>, BoxError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, data: SessionData) -> Result<(), BoxError> {
        self.entries.lock().insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BoxError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// Session handle
// ============================================================================

/// A shared handle to the current update's session.
///
/// Clones point at the same data; changes are persisted once the chain
/// after the session middleware has finished.
#[derive(Debug, Clone, Default)]
pub struct Session {
    data: Arc<Mutex<SessionData>>,
}

impl Session {
    pub fn new(data: SessionData) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.lock().get(key).cloned()
    }

    /// Reads `key` as `T`. Missing keys and mismatched shapes give `None`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.data.lock().insert(key.into(), value);
    }

    pub fn set_as<T: Serialize>(&self, key: impl Into<String>, value: &T) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.data.lock().remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    /// Returns a copy of the session data.
    pub fn snapshot(&self) -> SessionData {
        self.data.lock().clone()
    }
}

impl FromContext for Session {
    fn from_context(cx: &HandlerContext) -> ExtractResult<Self> {
        cx.get_state::<Session>()
            .ok_or(ExtractError::StateMissing("session"))
    }
}

// ============================================================================
// SessionManager
// ============================================================================

/// Derives the storage key of an update. `None` means "no session".
pub type SessionKeyFn = Arc<dyn Fn(&Context) -> Option<String> + Send + Sync>;

/// Loads and persists sessions around the rest of the chain.
pub struct SessionManager {
    storage: Arc<dyn SessionStorage>,
    key: SessionKeyFn,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            key: Arc::new(default_key),
        }
    }

    /// Replaces the key derivation.
    pub fn with_key<F>(mut self, key: F) -> Self
    where
        F: Fn(&Context) -> Option<String> + Send + Sync + 'static,
    {
        self.key = Arc::new(key);
        self
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    /// The session middleware.
    ///
    /// Updates without a key run without a session. An empty session is
    /// deleted instead of stored. A failed write is returned only if the chain
    /// itself succeeded.
    pub fn middleware(self: &Arc<Self>) -> BoxedMiddleware {
        let manager = Arc::clone(self);
        middleware_fn(move |ctx: Arc<Context>, next: Next| {
            let manager = manager.clone();
            async move {
                let Some(key) = (manager.key)(&ctx) else {
                    trace!("no session key for update");
                    return next.run().await;
                };

                let data = manager.storage.get(&key).await?.unwrap_or_default();
                let session = Session::new(data);
                ctx.set_state(session.clone());

                let result = next.run().await;

                let persisted = if session.is_empty() {
                    manager.storage.delete(&key).await
                } else {
                    manager.storage.set(&key, session.snapshot()).await
                };

                match (result, persisted) {
                    (Ok(()), persisted) => persisted,
                    (Err(err), Err(persist_err)) => {
                        warn!(key = %key, error = %persist_err, "failed to persist session");
                        Err(err)
                    }
                    (Err(err), Ok(())) => Err(err),
                }
            }
        })
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish_non_exhaustive()
    }
}

/// `"<chat>:<sender>"`, with `_` for a missing half.
fn default_key(ctx: &Context) -> Option<String> {
    let update = ctx.update();
    match (update.chat_id, update.sender_id) {
        (None, None) => None,
        (chat, sender) => Some(format!(
            "{}:{}",
            chat.map_or_else(|| "_".to_string(), |c| c.to_string()),
            sender.map_or_else(|| "_".to_string(), |s| s.to_string()),
        )),
    }
}
