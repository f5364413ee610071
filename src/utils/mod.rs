//! Utility functions and helpers for wiredcache.
//!
//! This module provides cross-cutting concerns like structured logging,
//! credential redaction, retry logic with backoff and the injectable clock.
//!
//! # Submodules
//!
//! - `logging`: Tracing initialization with redaction helpers.
//! - `retry`: Retry with backoff for the remote message API.
//! - `clock`: Time source used for TTL decisions.
//!
//! Author: wiredFRONT contributors

pub mod clock;
pub mod logging;
pub mod retry;

pub use clock::{Clock, ManualClock, SystemClock};
