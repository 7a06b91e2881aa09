//! The InstanceSet resource: spec and derived status.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;
use crate::service::ServicePort;
use crate::template::{InstanceOverride, InstanceTemplate};

/// A replicated, role-aware stateful workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSet {
    pub meta: ObjectMeta,

    pub spec: InstanceSetSpec,

    #[serde(default)]
    pub status: InstanceSetStatus,
}

/// Desired state. Immutable within a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSetSpec {
    /// Total desired instance count, named overrides included.
    #[serde(default = "default_replicas")]
    pub replicas: u32,

    pub template: InstanceTemplate,

    /// Named override templates, each claiming part of `replicas`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<InstanceOverride>,

    /// Declared roles, ordered. Drives member-status ordering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<ReplicaRole>,

    #[serde(default)]
    pub management_policy: ManagementPolicy,

    /// Seconds the Ready condition must hold before an instance counts as
    /// available.
    #[serde(default)]
    pub min_ready_seconds: i64,

    /// Consumed by rollout machinery outside this pipeline; round-trips
    /// untouched.
    #[serde(default)]
    pub update_strategy: UpdateStrategy,

    /// Revisions retained beyond the ones still referenced.
    #[serde(default = "default_history_limit")]
    pub revision_history_limit: usize,

    /// Ports exposed by the headless discovery service.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_ports: Vec<ServicePort>,
}

fn default_replicas() -> u32 {
    1
}

fn default_history_limit() -> usize {
    10
}

/// Ordering policy for instance creation and deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagementPolicy {
    /// Sequential, readiness-gated creation; descending deletion.
    #[default]
    OrderedReady,
    /// No ordering constraint.
    Parallel,
}

/// Update strategy carried for the owning resource. Not interpreted here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateStrategy {
    #[default]
    RollingUpdate,
    OnDelete,
}

/// One declared role of the workload.
///
/// `serviceable` roles accept client traffic, `writable` roles accept
/// writes, `votable` roles take part in consensus without necessarily
/// serving.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaRole {
    pub name: String,

    #[serde(default)]
    pub serviceable: bool,

    #[serde(default)]
    pub writable: bool,

    #[serde(default)]
    pub votable: bool,
}

impl ReplicaRole {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Status entry for one currently-Ready member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberStatus {
    pub instance_name: String,

    /// The role as currently observed, resolved against the declared list.
    pub role: ReplicaRole,
}

/// Derived output, fully recomputed each pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSetStatus {
    #[serde(default)]
    pub replicas: u32,

    #[serde(default)]
    pub ready_replicas: u32,

    #[serde(default)]
    pub available_replicas: u32,

    #[serde(default)]
    pub updated_replicas: u32,

    #[serde(default)]
    pub current_replicas: u32,

    /// Instance name -> revision, for revisions present in tracked history.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub current_revisions: BTreeMap<String, String>,

    /// Instance name -> desired revision. May be stored aggregated under a
    /// single sentinel key when large.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub update_revisions: BTreeMap<String, String>,

    /// Currently-Ready members, descending role priority.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_status: Vec<MemberStatus>,

    /// Generation whose templates have been snapshotted into revisions.
    #[serde(default)]
    pub current_generation: i64,

    /// Generation observed by the most recent status pass.
    #[serde(default)]
    pub observed_generation: i64,
}

impl InstanceSet {
    /// Look up a declared role by name, case-insensitive.
    pub fn declared_role(&self, name: &str) -> Option<&ReplicaRole> {
        self.spec
            .roles
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }
}
