//! Instance objects: one running replica unit of an InstanceSet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meta::{ObjectMeta, REVISION_LABEL, ROLE_LABEL};
use crate::template::InstanceTemplate;

/// One running unit (compute + attached storage) of an InstanceSet.
///
/// Created and deleted exclusively by the alignment stage; status is
/// reported asynchronously by the node running the instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub meta: ObjectMeta,

    /// The rendered template this instance was created from.
    pub spec: InstanceTemplate,

    #[serde(default)]
    pub status: InstanceStatus,
}

/// Lifecycle phase of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstancePhase {
    /// Scheduled but not yet running.
    Pending,
    /// Running on a node.
    Running,
    /// Stopped without error.
    Stopped,
    /// Exited with an error.
    Failed,
}

impl InstancePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

/// Observed instance state.
///
/// `phase` stays `None` until the node first reports the instance, so a
/// freshly staged creation is not yet counted as a created replica.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<InstancePhase>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Condition kinds reported for an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionKind {
    Ready,
}

/// One observed condition with its last transition time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub kind: ConditionKind,

    pub status: bool,

    /// When `status` last flipped.
    pub last_transition: DateTime<Utc>,
}

impl Instance {
    /// True once the node has reported this instance at all.
    pub fn is_created(&self) -> bool {
        self.status.phase.is_some()
    }

    pub fn is_terminating(&self) -> bool {
        self.meta.is_terminating()
    }

    pub fn ready_condition(&self) -> Option<&Condition> {
        self.status
            .conditions
            .iter()
            .find(|c| c.kind == ConditionKind::Ready)
    }

    /// Readiness condition currently true.
    pub fn is_ready(&self) -> bool {
        self.ready_condition().is_some_and(|c| c.status)
    }

    /// Ready, and the condition has held for at least `min_ready_seconds`.
    pub fn is_available(&self, min_ready_seconds: i64, now: DateTime<Utc>) -> bool {
        self.ready_condition().is_some_and(|c| {
            c.status && (now - c.last_transition).num_seconds() >= min_ready_seconds
        })
    }

    /// Revision label stamped at creation, updated on rollout.
    pub fn revision(&self) -> Option<&str> {
        self.meta.label(REVISION_LABEL)
    }

    /// Role the instance currently reports, if any.
    pub fn role(&self) -> Option<&str> {
        self.meta.label(ROLE_LABEL)
    }

    /// Record a condition, moving the transition time only when the value
    /// flips.
    pub fn set_condition(&mut self, kind: ConditionKind, status: bool, at: DateTime<Utc>) {
        match self
            .status
            .conditions
            .iter_mut()
            .find(|c| c.kind == kind)
        {
            Some(existing) => {
                if existing.status != status {
                    existing.status = status;
                    existing.last_transition = at;
                }
            }
            None => self.status.conditions.push(Condition {
                kind,
                status,
                last_transition: at,
            }),
        }
    }
}
