//! Integration layer - the chat-client boundary.
//!
//! - [`Client`]: send side of a chat-platform connection
//! - [`Updates`]: single-consumer slot of its update stream
//! - [`UpdateService`]: tower view of an attached client

pub mod client;
pub mod service;
pub mod updates;

pub use client::{BoxedClient, Client, SendOptions, downcast_client};
pub use service::UpdateService;
pub use updates::Updates;
