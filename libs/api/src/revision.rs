//! Immutable revision snapshots of instance templates.

use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

/// A content-addressed snapshot of one rendered instance template.
///
/// Revisions are append-only: once created they are never mutated, only
/// garbage-collected when unreferenced and outside the retained-history
/// window. `sequence` orders the history log; `generation` records which
/// spec generation produced the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub meta: ObjectMeta,

    /// Canonical JSON of the template body this revision snapshots.
    pub data: serde_json::Value,

    /// Content hash of `data`, `sha256:`-prefixed.
    pub hash: String,

    /// Position in the append-only history log.
    pub sequence: i64,

    /// Spec generation that produced this snapshot.
    pub generation: i64,
}
