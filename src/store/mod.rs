// UI-facing state containers
// Author: wiredFRONT contributors

pub mod messages;
pub mod sessions;

pub use messages::{LoadSource, MessageStore};
pub use sessions::SessionStore;
