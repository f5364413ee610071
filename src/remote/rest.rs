// REST client for the hosted messages table
// Author: wiredFRONT contributors

use super::MessageApi;
use crate::config::RemoteConfig;
use crate::error::{CacheError, Result};
use crate::models::{Message, NewMessage};
use crate::utils::logging::sanitize;
use crate::utils::retry::{parse_retry_after, with_retry, AttemptError};
use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, warn};

/// Client for `{base_url}/rest/v1/{table}`.
#[derive(Clone)]
pub struct RestMessageApi {
    client: Client,
    endpoint: String,
    api_key: String,
    max_retries: u32,
}

impl RestMessageApi {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(CacheError::Config("remote.base_url is not set".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/rest/v1/{}",
                config.base_url.trim_end_matches('/'),
                config.table
            ),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

/// Send a request and return the body of a 2xx response.
async fn execute(request: RequestBuilder) -> std::result::Result<String, AttemptError> {
    let response = request.send().await.map_err(|e| AttemptError {
        status: 0,
        body: e.to_string(),
        retry_after: None,
    })?;

    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.map_err(|e| AttemptError {
        status: 0,
        body: e.to_string(),
        retry_after: None,
    })?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(AttemptError {
            status: status.as_u16(),
            body,
            retry_after,
        })
    }
}

fn remote_error(err: AttemptError) -> CacheError {
    CacheError::Remote {
        status: err.status,
        message: sanitize(&err.body),
    }
}

#[async_trait]
impl MessageApi for RestMessageApi {
    async fn insert_message(&self, draft: &NewMessage) -> Result<Message> {
        let body = with_retry("insert_message", self.max_retries, || {
            let request = self
                .authorized(self.client.post(&self.endpoint))
                .header("Prefer", "return=representation")
                .json(draft);
            execute(request)
        })
        .await
        .map_err(|e| {
            warn!("Message insert failed with status {}", e.status);
            remote_error(e)
        })?;

        // PostgREST returns the inserted rows as an array
        let mut rows: Vec<Message> = serde_json::from_str(&body)?;
        if rows.is_empty() {
            return Err(CacheError::Remote {
                status: 200,
                message: "insert returned no rows".into(),
            });
        }
        let message = rows.swap_remove(0);
        debug!("Inserted message {} into session {}", message.id, message.session_id);
        Ok(message)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let filter = format!("eq.{}", session_id);
        let body = with_retry("list_messages", self.max_retries, || {
            let request = self.authorized(self.client.get(&self.endpoint)).query(&[
                ("select", "*"),
                ("session_id", filter.as_str()),
                ("order", "created_at.asc"),
            ]);
            execute(request)
        })
        .await
        .map_err(remote_error)?;

        let messages: Vec<Message> = serde_json::from_str(&body)?;
        debug!("Fetched {} messages for session {}", messages.len(), session_id);
        Ok(messages)
    }
}
