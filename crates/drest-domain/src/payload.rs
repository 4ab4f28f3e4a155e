use serde::Deserialize;
use serde_json::Value;

use crate::id::RecordId;

const META_KEY: &str = "meta";
const EMBEDDED_META_KEY: &str = "_meta";

/// Pagination block of a DREST collection envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u64>,
    #[serde(default)]
    pub total_results: Option<u64>,
}

impl PageMeta {
    /// Reads `meta` from an envelope; missing or malformed blocks yield the default.
    pub fn from_envelope(content: &Value) -> Self {
        content
            .get(META_KEY)
            .cloned()
            .and_then(|meta| serde_json::from_value(meta).ok())
            .unwrap_or_default()
    }
}

/// Extracts the primary payload of a response envelope for `resource`.
///
/// The key named after the resource wins, then its singular form, then the
/// first key other than `meta`. Empty and non-object content passes through.
pub fn unpack(resource: &str, content: Value) -> Value {
    let Value::Object(mut map) = content else {
        return content;
    };
    if map.is_empty() {
        return Value::Object(map);
    }
    let singular = resource.strip_suffix('s').unwrap_or(resource);
    let key = [resource, singular]
        .into_iter()
        .find(|candidate| map.contains_key(*candidate))
        .map(ToString::to_string)
        .or_else(|| map.keys().find(|key| *key != META_KEY).cloned());
    match key {
        Some(key) => map.remove(&key).unwrap_or(Value::Null),
        None => Value::Object(map),
    }
}

/// Type and id of an embedded record (`{"_meta": {"type": .., "id": ..}}`).
pub fn embedded_identity(value: &Value) -> Option<(String, RecordId)> {
    let meta = value.get(EMBEDDED_META_KEY)?;
    let kind = meta.get("type")?.as_str()?;
    if kind.is_empty() {
        return None;
    }
    let id = RecordId::from_value(meta.get("id")?)?;
    Some((kind.to_ascii_lowercase(), id))
}
