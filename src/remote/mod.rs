//! Authoritative message store.
//!
//! The cache never owns message identity; it mirrors what this API returns.
//!
//! - `rest`: hosted PostgREST-style HTTP backend
//! - `memory`: in-process backend for tests and offline use

// Author: wiredFRONT contributors

pub mod memory;
pub mod rest;

pub use memory::MemoryMessageApi;
pub use rest::RestMessageApi;

use crate::error::Result;
use crate::models::{Message, NewMessage};
use async_trait::async_trait;

#[async_trait]
pub trait MessageApi: Send + Sync {
    /// Insert a message and return the stored row.
    async fn insert_message(&self, draft: &NewMessage) -> Result<Message>;

    /// All messages of a session, oldest first.
    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>>;
}
