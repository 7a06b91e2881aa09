//! The object sum type and its keys.

use std::fmt;

use iset_api::{HeadlessService, Instance, InstanceSet, ObjectMeta, Revision, VolumeClaim};
use serde::{Deserialize, Serialize};

/// Kind discriminant for store keys and tree indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    InstanceSet,
    Instance,
    Revision,
    Service,
    VolumeClaim,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InstanceSet => "InstanceSet",
            Self::Instance => "Instance",
            Self::Revision => "Revision",
            Self::Service => "Service",
            Self::VolumeClaim => "VolumeClaim",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "InstanceSet" => Some(Self::InstanceSet),
            "Instance" => Some(Self::Instance),
            "Revision" => Some(Self::Revision),
            "Service" => Some(Self::Service),
            "VolumeClaim" => Some(Self::VolumeClaim),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store key: kind + namespace + name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub namespace: String,
    pub name: String,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, namespace: &str, name: &str) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// Any object the orchestrator reads or writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Object {
    InstanceSet(InstanceSet),
    Instance(Instance),
    Revision(Revision),
    Service(HeadlessService),
    VolumeClaim(VolumeClaim),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::InstanceSet(_) => ObjectKind::InstanceSet,
            Self::Instance(_) => ObjectKind::Instance,
            Self::Revision(_) => ObjectKind::Revision,
            Self::Service(_) => ObjectKind::Service,
            Self::VolumeClaim(_) => ObjectKind::VolumeClaim,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Self::InstanceSet(o) => &o.meta,
            Self::Instance(o) => &o.meta,
            Self::Revision(o) => &o.meta,
            Self::Service(o) => &o.meta,
            Self::VolumeClaim(o) => &o.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::InstanceSet(o) => &mut o.meta,
            Self::Instance(o) => &mut o.meta,
            Self::Revision(o) => &mut o.meta,
            Self::Service(o) => &mut o.meta,
            Self::VolumeClaim(o) => &mut o.meta,
        }
    }

    pub fn object_ref(&self) -> ObjectRef {
        let meta = self.meta();
        ObjectRef::new(self.kind(), &meta.namespace, &meta.name)
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Self::Instance(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_revision(&self) -> Option<&Revision> {
        match self {
            Self::Revision(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_service(&self) -> Option<&HeadlessService> {
        match self {
            Self::Service(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_volume_claim(&self) -> Option<&VolumeClaim> {
        match self {
            Self::VolumeClaim(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_instance_set(&self) -> Option<&InstanceSet> {
        match self {
            Self::InstanceSet(o) => Some(o),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iset_api::{InstanceStatus, InstanceTemplate};

    #[test]
    fn test_kind_string_roundtrip() {
        for kind in [
            ObjectKind::InstanceSet,
            ObjectKind::Instance,
            ObjectKind::Revision,
            ObjectKind::Service,
            ObjectKind::VolumeClaim,
        ] {
            assert_eq!(ObjectKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ObjectKind::from_str("Pod"), None);
    }

    #[test]
    fn test_object_is_tagged_by_kind() {
        let object = Object::Instance(Instance {
            meta: ObjectMeta::named("default", "pg-0"),
            spec: InstanceTemplate::default(),
            status: InstanceStatus::default(),
        });

        let json = serde_json::to_value(&object).unwrap();
        assert_eq!(json["kind"], "Instance");

        let back: Object = serde_json::from_value(json).unwrap();
        assert_eq!(back.object_ref(), object.object_ref());
    }
}
