//! Volume claims attached to instances.

use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

/// Storage attached to a single instance, stamped from a
/// [`crate::VolumeClaimTemplate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeClaim {
    pub meta: ObjectMeta,

    pub spec: VolumeClaimSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeClaimSpec {
    pub storage_bytes: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}
