//! Structured logging and redaction utilities.
//!
//! This module configures the `tracing` ecosystem for the application,
//! supporting multiple output formats and providing a helper that keeps API
//! keys of the hosted backend out of log sinks.
//!
//! Author: wiredFRONT contributors

use crate::config::LoggingConfig;
use crate::error::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global tracing subscriber for the application.
///
/// Supports two output formats:
/// - `json`: Structured JSON logs for production ingestion.
/// - `pretty` (default): Human-readable, colorized output for development.
///
/// Log levels are controlled via the `RUST_LOG` environment variable or
/// the provided `LoggingConfig`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    // try_init so a second call (tests, embedding apps) is not fatal
    let installed = match config.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }

    Ok(())
}

/// Redacts credentials from a string before it is logged.
///
/// Handles JWT-shaped API keys (`eyJ...`, as issued by the hosted backend),
/// secret keys with the `sb_secret_` / `sb_publishable_` prefixes and any
/// `Bearer <token>` pair.
pub fn sanitize(input: &str) -> String {
    let mut result = input.to_string();

    result = redact_after(&result, "Bearer ", "[REDACTED_BEARER]");
    for prefix in ["eyJ", "sb_secret_", "sb_publishable_"] {
        result = redact_token(&result, prefix, "[REDACTED_API_KEY]");
    }

    result
}

fn token_end(s: &str, start: usize) -> usize {
    s[start..]
        .find(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == ',')
        .map(|i| start + i)
        .unwrap_or(s.len())
}

fn redact_token(input: &str, prefix: &str, placeholder: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find(prefix) {
        out.push_str(&rest[..pos]);
        let end = token_end(rest, pos);
        out.push_str(placeholder);
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

fn redact_after(input: &str, marker: &str, placeholder: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find(marker) {
        let value_start = pos + marker.len();
        out.push_str(&rest[..value_start]);
        let end = token_end(rest, value_start);
        out.push_str(placeholder);
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}
