//! Object metadata shared by every resource kind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label carrying the owning InstanceSet name on every dependent object.
pub const NAME_LABEL: &str = "iset.dev/name";

/// Label carrying the instance name on objects attached to one instance.
pub const INSTANCE_LABEL: &str = "iset.dev/instance";

/// Label carrying the revision an instance was created from.
pub const REVISION_LABEL: &str = "iset.dev/revision";

/// Label carrying the role an instance currently reports.
pub const ROLE_LABEL: &str = "iset.dev/role";

/// Label identifying the manager of an object.
pub const MANAGED_BY_LABEL: &str = "iset.dev/managed-by";

/// Value of [`MANAGED_BY_LABEL`] written by this controller.
pub const MANAGER: &str = "iset-controller";

/// Finalizer placed on the root InstanceSet.
pub const FINALIZER: &str = "iset.dev/finalizer";

/// Metadata common to all objects.
///
/// `resource_version` is the optimistic-concurrency token: the store rejects
/// an update whose version does not match the stored one. `generation` is
/// bumped by the store whenever the spec changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,

    #[serde(default)]
    pub generation: i64,

    #[serde(default)]
    pub resource_version: u64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Set when deletion has been requested but finalizers are still pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Metadata for a new, not-yet-stored object.
    pub fn named(namespace: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Self::default()
        }
    }

    /// Look up a label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Set a label, returning true if the value changed.
    pub fn set_label(&mut self, key: &str, value: &str) -> bool {
        match self.labels.get(key) {
            Some(v) if v == value => false,
            _ => {
                self.labels.insert(key.to_string(), value.to_string());
                true
            }
        }
    }

    /// True once deletion has been requested.
    pub fn is_terminating(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }
}

/// Reference to the object that owns this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,
}
