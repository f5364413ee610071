// wiredcache - Client-side message cache and sync layer for wiredFRONT
// Author: wiredFRONT contributors

pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod models;
pub mod remote;
pub mod storage;
pub mod store;
pub mod utils;
