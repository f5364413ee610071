//! Chat message as stored remotely and mirrored in the cache.
//!
//! Author: wiredFRONT contributors

use super::metadata::{null_as_default, MessageMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Delivery status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    #[default]
    Sent,
    Delivered,
    Failed,
}

/// A message row. The remote store owns `id`; the cache only mirrors it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub content: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "MessageMetadata::is_empty"
    )]
    pub metadata: MessageMetadata,
}

/// A message that has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessage {
    pub session_id: String,
    pub content: String,
    pub role: Role,
    #[serde(skip_serializing_if = "MessageMetadata::is_empty")]
    pub metadata: MessageMetadata,
}

impl NewMessage {
    pub fn new(session_id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            content: content.into(),
            role,
            metadata: MessageMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}
