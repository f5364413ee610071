// Session state container
// Author: wiredFRONT contributors

use super::messages::MessageStore;
use crate::error::Result;
use crate::models::Message;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tracks which chat session is open.
pub struct SessionStore {
    messages: Arc<MessageStore>,
    current: RwLock<Option<String>>,
}

impl SessionStore {
    pub fn new(messages: Arc<MessageStore>) -> Self {
        Self {
            messages,
            current: RwLock::new(None),
        }
    }

    pub fn current_session(&self) -> Option<String> {
        self.current.read().clone()
    }

    pub fn messages(&self) -> &Arc<MessageStore> {
        &self.messages
    }

    /// Open `session_id` and load its messages. The cache record of the
    /// session being left is compacted on the way out.
    pub async fn switch_session(&self, session_id: &str) -> Result<Vec<Message>> {
        let previous = self.current.write().replace(session_id.to_string());

        if let Some(previous) = previous.filter(|p| p != session_id) {
            self.leave(&previous).await;
        }

        debug!("Switched to session {}", session_id);
        self.messages.load_messages(session_id).await
    }

    /// Close the current session, if any, and return its id.
    pub async fn close_session(&self) -> Option<String> {
        let previous = self.current.write().take();
        if let Some(previous) = &previous {
            self.leave(previous).await;
        }
        previous
    }

    async fn leave(&self, session_id: &str) {
        if let Err(e) = self.messages.cache().optimize_cache(session_id).await {
            warn!("Could not optimize cache for session {}: {}", session_id, e);
        }
        self.messages.forget(session_id);
    }
}
