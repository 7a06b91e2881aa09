//! Instance templates: the body an instance is stamped from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Compute resources requested by one instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    #[serde(default)]
    pub cpu_millis: u32,

    #[serde(default)]
    pub memory_bytes: u64,
}

/// Template for one storage volume attached to an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeClaimTemplate {
    pub name: String,

    pub storage_bytes: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

/// The default instance template of an InstanceSet.
///
/// Revision hashing covers this body in full; any field change produces a
/// new revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceTemplate {
    pub image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub resources: Resources,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_claims: Vec<VolumeClaimTemplate>,
}

/// A named override template.
///
/// Each override carves `replicas` instances (default 1) out of the set's
/// total and may replace parts of the default template for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceOverride {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_claims: Option<Vec<VolumeClaimTemplate>>,
}

impl InstanceOverride {
    /// Number of instances this override claims.
    pub fn replicas(&self) -> u32 {
        self.replicas.unwrap_or(1)
    }

    /// Render the effective template: the base with this override applied.
    pub fn render(&self, base: &InstanceTemplate) -> InstanceTemplate {
        let mut template = base.clone();
        if let Some(image) = &self.image {
            template.image = image.clone();
        }
        if let Some(resources) = &self.resources {
            template.resources = resources.clone();
        }
        if let Some(claims) = &self.volume_claims {
            template.volume_claims = claims.clone();
        }
        template
    }
}
