//! Tower integration for update delivery.
//!
//! [`UpdateService`] exposes a client's attached pipeline as a
//! `tower::Service<Update>`, so transports can drive it with the usual
//! `ServiceExt` combinators (`oneshot`, `call_all`, ...).

use std::task::{Context as TaskContext, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::Service;

use crate::foundation::error::{BoxError, UpdatesError};
use crate::foundation::update::Update;
use crate::integration::client::BoxedClient;

/// A tower [`Service`] delivering updates into a client's pipeline.
#[derive(Clone)]
pub struct UpdateService {
    client: BoxedClient,
}

impl UpdateService {
    pub fn new(client: BoxedClient) -> Self {
        Self { client }
    }

    /// Returns the client this service delivers into.
    pub fn client(&self) -> &BoxedClient {
        &self.client
    }
}

impl Service<Update> for UpdateService {
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        if self.client.updates().is_attached() {
            Poll::Ready(Ok(()))
        } else {
            Poll::Ready(Err(UpdatesError::NotAttached {
                client: self.client.name().to_string(),
            }
            .into()))
        }
    }

    fn call(&mut self, update: Update) -> Self::Future {
        let client = self.client.clone();
        async move { client.updates().dispatch(client.clone(), update).await }.boxed()
    }
}

impl std::fmt::Debug for UpdateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateService")
            .field("client", &self.client.name())
            .finish()
    }
}
