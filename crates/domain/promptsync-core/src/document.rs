use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire format version written on every upload.
pub const SYNC_DOCUMENT_VERSION: u32 = 1;

/// A prompt or category entry. Opaque apart from its `id` field.
pub type Record = Value;

/// The key a record is deduplicated by: the JSON text of its `id`, so that
/// `"1"` and `1` stay distinct. Records without an `id` have no key.
pub fn record_key(record: &Record) -> Option<String> {
    match record.get("id")? {
        Value::Null => None,
        Value::String(s) => Some(format!("\"{s}\"")),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document is not a JSON object")]
    NotAnObject,
    #[error("document has no `prompts` array")]
    MissingPrompts,
    #[error("document `categories` is not an array")]
    InvalidCategories,
}

/// The two synchronized collections as held by the local store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collections {
    pub prompts: Vec<Record>,
    pub categories: Vec<Record>,
}

impl Collections {
    pub fn new(prompts: Vec<Record>, categories: Vec<Record>) -> Self {
        Self {
            prompts,
            categories,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty() && self.categories.is_empty()
    }
}

/// The single JSON file that carries the whole dataset on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDocument {
    pub version: u32,
    pub exported_at: String,
    pub prompts: Vec<Record>,
    #[serde(default)]
    pub categories: Vec<Record>,
}

impl SyncDocument {
    /// Snapshot `collections` into a fresh document stamped with the current time.
    pub fn new(collections: Collections) -> Self {
        Self {
            version: SYNC_DOCUMENT_VERSION,
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            prompts: collections.prompts,
            categories: collections.categories,
        }
    }

    /// Parse a downloaded body.
    ///
    /// Only `prompts` is mandatory. A missing or `null` `categories` becomes
    /// an empty sequence; `version` and `exportedAt` are informational and
    /// fall back to defaults when absent.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        let Value::Object(mut map) = value else {
            return Err(DocumentError::NotAnObject);
        };

        let prompts = match map.remove("prompts") {
            Some(Value::Array(items)) => items,
            _ => return Err(DocumentError::MissingPrompts),
        };
        let categories = match map.remove("categories") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(DocumentError::InvalidCategories),
        };

        Ok(Self {
            version: read_version(&map),
            exported_at: map
                .get("exportedAt")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            prompts,
            categories,
        })
    }

    /// Pretty-printed body for PUT.
    pub fn to_pretty_json(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn into_collections(self) -> Collections {
        Collections::new(self.prompts, self.categories)
    }
}

fn read_version(map: &Map<String, Value>) -> u32 {
    map.get("version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(SYNC_DOCUMENT_VERSION)
}
