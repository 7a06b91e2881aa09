//! Content-addressed revision hashing and the revision-map wire form.

use std::collections::BTreeMap;

use iset_api::InstanceTemplate;
use sha2::{Digest, Sha256};

use crate::error::{ControllerError, ControllerResult};

/// Sentinel key under which a large revision map is stored as one
/// JSON-encoded value.
pub const AGGREGATED_KEY: &str = "@aggregated";

/// Largest revision map stored entry-per-entry; beyond this it is
/// aggregated.
pub const REVISION_MAP_INLINE_LIMIT: usize = 64;

/// Hex digits of the content hash used in revision object names.
const NAME_HASH_LEN: usize = 10;

/// A deterministic content hash of an instance template body.
///
/// Computed over canonical JSON (sorted keys, no whitespace) so that field
/// order never changes the hash; any change to the body does.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RevisionHash(String);

impl RevisionHash {
    /// Hash a rendered template.
    pub fn of_template(template: &InstanceTemplate) -> ControllerResult<Self> {
        let value = serde_json::to_value(template)
            .map_err(|e| ControllerError::Internal(e.to_string()))?;
        Ok(Self::from_json(&value))
    }

    /// Hash a canonical JSON body.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let canonical = canonical_json(value);
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = hasher.finalize();
        Self(format!("sha256:{}", hex::encode(&digest[..16])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The short hex form used in revision object names.
    pub fn short(&self) -> &str {
        let hex = self.0.trim_start_matches("sha256:");
        &hex[..NAME_HASH_LEN.min(hex.len())]
    }
}

impl std::fmt::Display for RevisionHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of the revision object snapshotting `hash` for `parent`.
pub fn revision_name(parent: &str, hash: &RevisionHash) -> String {
    format!("{parent}-{}", hash.short())
}

/// Produce canonical JSON (sorted keys, no extra whitespace).
fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let inner: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("\"{}\":{}", escape_json_string(k), canonical_json(v)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        serde_json::Value::Array(arr) => {
            let inner: Vec<String> = arr.iter().map(canonical_json).collect();
            format!("[{}]", inner.join(","))
        }
        serde_json::Value::String(s) => format!("\"{}\"", escape_json_string(s)),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "null".to_string(),
    }
}

fn escape_json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

/// Serialize an instance-name -> revision map for storage in status.
///
/// Small maps are stored entry-per-entry; large ones collapse to a single
/// JSON-encoded value under [`AGGREGATED_KEY`] to bound status size.
pub fn pack_revision_map(map: BTreeMap<String, String>) -> BTreeMap<String, String> {
    if map.len() <= REVISION_MAP_INLINE_LIMIT {
        return map;
    }
    let encoded = serde_json::to_string(&map).unwrap_or_default();
    BTreeMap::from([(AGGREGATED_KEY.to_string(), encoded)])
}

/// Expand a stored revision map back into instance-name -> revision.
///
/// Fails with a malformed-input error when the aggregated payload is not a
/// JSON string map; callers must not blind-retry that.
pub fn parse_revision_map(
    stored: &BTreeMap<String, String>,
) -> ControllerResult<BTreeMap<String, String>> {
    match stored.get(AGGREGATED_KEY) {
        None => Ok(stored.clone()),
        Some(encoded) => serde_json::from_str(encoded)
            .map_err(|e| ControllerError::MalformedRevisions(e.to_string())),
    }
}
