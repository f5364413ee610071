// Message state container: read-through / write-through over the cache
// Author: wiredFRONT contributors

use crate::cache::{CacheStore, CacheWrite};
use crate::error::Result;
use crate::models::{Message, NewMessage};
use crate::remote::MessageApi;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a load was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Cache,
    Remote,
}

/// Holds the messages of the sessions the UI has open. Reads go to the cache
/// first and fall back to the remote store; writes go to the remote store and
/// are then mirrored into the cache.
pub struct MessageStore {
    cache: Arc<CacheStore>,
    api: Arc<dyn MessageApi>,
    loaded: RwLock<HashMap<String, Vec<Message>>>,
}

impl MessageStore {
    pub fn new(cache: Arc<CacheStore>, api: Arc<dyn MessageApi>) -> Self {
        Self {
            cache,
            api,
            loaded: RwLock::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Messages of a session, oldest first.
    pub async fn load_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        Ok(self.load_with_source(session_id).await?.0)
    }

    /// Like [`MessageStore::load_messages`], also reporting where the data
    /// came from.
    pub async fn load_with_source(&self, session_id: &str) -> Result<(Vec<Message>, LoadSource)> {
        if let Some(cached) = self.cache.get_cached_messages(session_id).await {
            let messages = display_order(cached);
            self.loaded.write().insert(session_id.to_string(), messages.clone());
            return Ok((messages, LoadSource::Cache));
        }

        let messages = self.fetch_remote(session_id).await?;
        Ok((messages, LoadSource::Remote))
    }

    /// Insert a message remotely, then mirror it into the cache.
    ///
    /// The message is only appended to a record a read would serve. Without
    /// one the cache is left alone and the next load fetches the full history.
    /// A failed cache write does not fail the send; the remote store already
    /// has the message.
    pub async fn send_message(&self, draft: NewMessage) -> Result<Message> {
        let message = self.api.insert_message(&draft).await?;

        match self
            .cache
            .append_to_cached(&message.session_id, std::slice::from_ref(&message))
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!(
                "Session {} not cached, message {} left to the next load",
                message.session_id, message.id
            ),
            Err(e) => warn!("Sent message {} but could not cache it: {}", message.id, e),
        }

        if let Some(loaded) = self.loaded.write().get_mut(&message.session_id) {
            loaded.push(message.clone());
        }
        Ok(message)
    }

    /// Drop the cached copy's validity and reload from the remote store.
    pub async fn refresh(&self, session_id: &str) -> Result<Vec<Message>> {
        if let Err(e) = self.cache.invalidate_cache(session_id).await {
            warn!("Could not invalidate cache for session {}: {}", session_id, e);
        }
        self.fetch_remote(session_id).await
    }

    /// Last loaded messages of a session, oldest first. Messages sent since
    /// the load are appended.
    pub fn messages(&self, session_id: &str) -> Vec<Message> {
        self.loaded.read().get(session_id).cloned().unwrap_or_default()
    }

    /// Forget the in-memory copy of a session. The cache is untouched.
    pub fn forget(&self, session_id: &str) {
        self.loaded.write().remove(session_id);
    }

    async fn fetch_remote(&self, session_id: &str) -> Result<Vec<Message>> {
        let messages = self.api.list_messages(session_id).await?;
        debug!(
            "Loaded {} messages for session {} from remote",
            messages.len(),
            session_id
        );

        // the remote list is complete, so it replaces the record
        let newest_first: Vec<Message> = messages.iter().rev().cloned().collect();
        if let Err(e) = self
            .cache
            .write(session_id, &newest_first, CacheWrite::Replace)
            .await
        {
            warn!("Could not cache messages for session {}: {}", session_id, e);
        }

        self.loaded.write().insert(session_id.to_string(), messages.clone());
        Ok(messages)
    }
}

fn display_order(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by_key(|m| m.created_at);
    messages
}
