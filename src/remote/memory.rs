// In-process message API
// Author: wiredFRONT contributors

use super::MessageApi;
use crate::error::{CacheError, Result};
use crate::models::{Message, MessageStatus, NewMessage};
use crate::utils::{Clock, SystemClock};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Message store held in memory. Ids are random UUIDs, timestamps come from
/// the clock it was built with.
pub struct MemoryMessageApi {
    clock: Arc<dyn Clock>,
    messages: RwLock<Vec<Message>>,
    offline: AtomicBool,
    list_calls: AtomicUsize,
}

impl MemoryMessageApi {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            messages: RwLock::new(Vec::new()),
            offline: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Make every call fail with a 503 until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of `list_messages` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Insert an already-formed row, e.g. to seed a fixture.
    pub fn seed(&self, message: Message) {
        self.messages.write().push(message);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Remote {
                status: 503,
                message: "message store unavailable".into(),
            });
        }
        Ok(())
    }
}

impl Default for MemoryMessageApi {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl MessageApi for MemoryMessageApi {
    async fn insert_message(&self, draft: &NewMessage) -> Result<Message> {
        self.check_online()?;
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: draft.session_id.clone(),
            content: draft.content.clone(),
            role: draft.role,
            created_at: self.clock.now(),
            updated_at: None,
            status: MessageStatus::Sent,
            metadata: draft.metadata.clone(),
        };
        self.messages.write().push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        self.check_online()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut found: Vec<Message> = self
            .messages
            .read()
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        found.sort_by_key(|m| m.created_at);
        Ok(found)
    }
}
