//! Data models shared by the cache, the stores and the remote API.
//!
//! - `message`: chat message rows and drafts
//! - `metadata`: typed message metadata with a bounded extras map

// Author: wiredFRONT contributors

pub mod message;
pub mod metadata;

pub use message::{Message, MessageStatus, NewMessage, Role};
pub use metadata::{ExtraFields, MessageMetadata, MetadataKind, MAX_EXTRA_FIELDS, MAX_EXTRA_KEY_LEN};
