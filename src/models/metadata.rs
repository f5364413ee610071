//! Typed message metadata.
//!
//! Metadata attached to a chat message is one of a fixed set of known shapes
//! plus a small map of extra fields. The extras map is bounded so cached
//! records cannot grow without limit through metadata alone.
//!
//! Rows written by other clients carry free-form metadata objects. Keys that
//! are not part of a known shape land in the extras map; beyond the bound
//! (or with unusable keys) they are dropped with a warning rather than
//! failing the whole row.
//!
//! Author: wiredFRONT contributors

use crate::error::{CacheError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Maximum number of entries in [`ExtraFields`].
pub const MAX_EXTRA_FIELDS: usize = 16;

/// Maximum key length in bytes for [`ExtraFields`].
pub const MAX_EXTRA_KEY_LEN: usize = 64;

/// Known metadata shapes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetadataKind {
    #[default]
    None,
    /// Reply produced by an LLM provider.
    ModelResponse {
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tokens_used: Option<u32>,
    },
    /// File uploaded alongside the message.
    Attachment {
        file_name: String,
        mime_type: String,
        size_bytes: u64,
    },
    /// Message that records a failed generation.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        message: String,
    },
}

/// Bounded string-keyed map of additional metadata values.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ExtraFields(BTreeMap<String, Value>);

impl ExtraFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field. Fails when the key is too long or when a
    /// new key would exceed [`MAX_EXTRA_FIELDS`].
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        check_key(&key)?;
        if !self.0.contains_key(&key) && self.0.len() >= MAX_EXTRA_FIELDS {
            return Err(CacheError::Metadata(format!(
                "extra fields limited to {} entries",
                MAX_EXTRA_FIELDS
            )));
        }
        self.0.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Keep as many fields as the bound allows. Returns the fields and the
    /// number that were dropped.
    fn bounded(fields: impl IntoIterator<Item = (String, Value)>) -> (Self, usize) {
        let mut extra = Self::new();
        let mut dropped = 0;
        for (key, value) in fields {
            if extra.insert(key, value).is_err() {
                dropped += 1;
            }
        }
        (extra, dropped)
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > MAX_EXTRA_KEY_LEN {
        return Err(CacheError::Metadata(format!(
            "extra field key must be 1..={} bytes, got {}",
            MAX_EXTRA_KEY_LEN,
            key.len()
        )));
    }
    Ok(())
}

/// Metadata carried by a message.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MessageMetadata {
    pub kind: MetadataKind,
    #[serde(skip_serializing_if = "ExtraFields::is_empty")]
    pub extra: ExtraFields,
}

impl MessageMetadata {
    pub fn model_response(model: impl Into<String>, tokens_used: Option<u32>) -> Self {
        Self {
            kind: MetadataKind::ModelResponse {
                model: model.into(),
                tokens_used,
            },
            extra: ExtraFields::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind == MetadataKind::None && self.extra.is_empty()
    }

    /// Split a metadata object into a known shape and extras. A `kind` that
    /// does not parse as a known shape is kept as an ordinary field.
    fn from_object(mut object: Map<String, Value>) -> Self {
        let mut kind = MetadataKind::None;
        if let Some(raw) = object.remove("kind") {
            match serde_json::from_value::<MetadataKind>(raw.clone()) {
                Ok(parsed) => kind = parsed,
                Err(_) => {
                    object.insert("kind".to_string(), raw);
                }
            }
        }

        let mut fields: Vec<(String, Value)> = Vec::with_capacity(object.len());
        match object.remove("extra") {
            Some(Value::Object(nested)) => fields.extend(nested),
            Some(other) => fields.push(("extra".to_string(), other)),
            None => {}
        }
        fields.extend(object);

        let (extra, dropped) = ExtraFields::bounded(fields);
        if dropped > 0 {
            warn!(
                "Dropped {} metadata fields beyond the {}-entry limit or with invalid keys",
                dropped, MAX_EXTRA_FIELDS
            );
        }
        Self { kind, extra }
    }
}

impl<'de> Deserialize<'de> for MessageMetadata {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Object(object) => Self::from_object(object),
            Value::Null => Self::default(),
            other => Self::from_object(Map::from_iter([("value".to_string(), other)])),
        })
    }
}

/// Accepts `null` as well as a missing field; the remote API sends either.
pub(crate) fn null_as_default<'de, D>(deserializer: D) -> std::result::Result<MessageMetadata, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<MessageMetadata>::deserialize(deserializer)?.unwrap_or_default())
}
