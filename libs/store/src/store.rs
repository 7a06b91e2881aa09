//! The `ObjectStore` trait and the in-memory implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::object::{Object, ObjectKind, ObjectRef};

/// The external object store.
///
/// Writes carry optimistic-concurrency semantics: `update` fails with
/// [`StoreError::Conflict`] when the given object's resource version is
/// stale. `patch` applies a JSON merge patch server-side and does not
/// version-check.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &ObjectRef) -> Result<Object, StoreError>;

    /// List objects of one kind, filtered by namespace (empty = all) and a
    /// label selector (subset match). Results are name-ordered.
    async fn list(
        &self,
        kind: ObjectKind,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Object>, StoreError>;

    async fn create(&self, object: Object) -> Result<Object, StoreError>;

    async fn update(&self, object: Object) -> Result<Object, StoreError>;

    async fn delete(&self, key: &ObjectRef) -> Result<(), StoreError>;

    async fn patch(&self, key: &ObjectRef, patch: serde_json::Value)
        -> Result<Object, StoreError>;
}

/// In-memory object store for tests and local runs.
pub struct MemStore {
    objects: RwLock<BTreeMap<ObjectRef, Object>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored objects, all kinds.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

fn spec_changed(old: &Object, new: &Object) -> bool {
    match (old, new) {
        (Object::InstanceSet(a), Object::InstanceSet(b)) => a.spec != b.spec,
        (Object::Instance(a), Object::Instance(b)) => a.spec != b.spec,
        (Object::Service(a), Object::Service(b)) => {
            a.selector != b.selector || a.ports != b.ports
        }
        (Object::VolumeClaim(a), Object::VolumeClaim(b)) => a.spec != b.spec,
        (Object::Revision(a), Object::Revision(b)) => a.data != b.data,
        _ => false,
    }
}

/// RFC 7386 merge patch over JSON values.
fn merge_patch(target: &mut serde_json::Value, patch: &serde_json::Value) {
    let serde_json::Value::Object(entries) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = serde_json::Value::Object(serde_json::Map::new());
    }
    let Some(map) = target.as_object_mut() else {
        return;
    };
    for (key, value) in entries {
        if value.is_null() {
            map.remove(key);
        } else {
            merge_patch(
                map.entry(key.clone()).or_insert(serde_json::Value::Null),
                value,
            );
        }
    }
}

#[async_trait]
impl ObjectStore for MemStore {
    async fn get(&self, key: &ObjectRef) -> Result<Object, StoreError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn list(
        &self,
        kind: ObjectKind,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Object>, StoreError> {
        let objects = self.objects.read().await;
        Ok(objects
            .values()
            .filter(|o| o.kind() == kind)
            .filter(|o| namespace.is_empty() || o.meta().namespace == namespace)
            .filter(|o| {
                selector
                    .iter()
                    .all(|(k, v)| o.meta().label(k) == Some(v.as_str()))
            })
            .cloned()
            .collect())
    }

    async fn create(&self, mut object: Object) -> Result<Object, StoreError> {
        let key = object.object_ref();
        let mut objects = self.objects.write().await;
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }

        let meta = object.meta_mut();
        meta.uid.get_or_insert_with(Uuid::new_v4);
        meta.resource_version = 1;
        meta.generation = 1;
        meta.created_at.get_or_insert_with(Utc::now);

        objects.insert(key, object.clone());
        Ok(object)
    }

    async fn update(&self, mut object: Object) -> Result<Object, StoreError> {
        let key = object.object_ref();
        let mut objects = self.objects.write().await;
        let current = objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let given = object.meta().resource_version;
        let stored = current.meta().resource_version;
        if given != stored {
            return Err(StoreError::Conflict {
                key: key.to_string(),
                given,
                current: stored,
            });
        }

        let generation = if spec_changed(current, &object) {
            current.meta().generation + 1
        } else {
            current.meta().generation
        };
        let meta = object.meta_mut();
        meta.resource_version = stored + 1;
        meta.generation = generation;

        objects.insert(key, object.clone());
        Ok(object)
    }

    async fn delete(&self, key: &ObjectRef) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn patch(
        &self,
        key: &ObjectRef,
        patch: serde_json::Value,
    ) -> Result<Object, StoreError> {
        let mut objects = self.objects.write().await;
        let current = objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let stored_version = current.meta().resource_version;
        let mut value = serde_json::to_value(current)?;
        merge_patch(&mut value, &patch);

        let mut patched: Object = serde_json::from_value(value)?;
        patched.meta_mut().resource_version = stored_version + 1;

        objects.insert(key.clone(), patched.clone());
        Ok(patched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iset_api::{
        Instance, InstanceSet, InstanceSetSpec, InstanceStatus, InstanceTemplate, ObjectMeta,
        NAME_LABEL,
    };

    fn instance(name: &str, set: &str) -> Object {
        let mut meta = ObjectMeta::named("default", name);
        meta.set_label(NAME_LABEL, set);
        Object::Instance(Instance {
            meta,
            spec: InstanceTemplate::default(),
            status: InstanceStatus::default(),
        })
    }

    fn instance_set(name: &str) -> Object {
        let spec: InstanceSetSpec = serde_json::from_str(r#"{"template":{"image":"pg:16"}}"#)
            .expect("minimal spec parses");
        Object::InstanceSet(InstanceSet {
            meta: ObjectMeta::named("default", name),
            spec,
            status: Default::default(),
        })
    }

    #[tokio::test]
    async fn test_create_assigns_identity() {
        let store = MemStore::new();
        let created = store.create(instance("pg-0", "pg")).await.unwrap();

        assert!(created.meta().uid.is_some());
        assert_eq!(created.meta().resource_version, 1);
        assert_eq!(created.meta().generation, 1);
        assert!(created.meta().created_at.is_some());

        let err = store.create(instance("pg-0", "pg")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_update_rejects_stale_version() {
        let store = MemStore::new();
        let created = store.create(instance("pg-0", "pg")).await.unwrap();

        // First writer wins
        let updated = store.update(created.clone()).await.unwrap();
        assert_eq!(updated.meta().resource_version, 2);

        // Second writer holds the old version
        let err = store.update(created).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { given: 1, current: 2, .. }));
    }

    #[tokio::test]
    async fn test_update_bumps_generation_on_spec_change() {
        let store = MemStore::new();
        let created = store.create(instance_set("pg")).await.unwrap();

        // Status-only update keeps the generation
        let same = store.update(created.clone()).await.unwrap();
        assert_eq!(same.meta().generation, 1);

        let mut changed = same;
        if let Object::InstanceSet(set) = &mut changed {
            set.spec.replicas = 5;
        }
        let updated = store.update(changed).await.unwrap();
        assert_eq!(updated.meta().generation, 2);
    }

    #[tokio::test]
    async fn test_list_filters_by_namespace_and_selector() {
        let store = MemStore::new();
        store.create(instance("pg-0", "pg")).await.unwrap();
        store.create(instance("pg-1", "pg")).await.unwrap();
        store.create(instance("redis-0", "redis")).await.unwrap();

        let selector = BTreeMap::from([(NAME_LABEL.to_string(), "pg".to_string())]);
        let listed = store
            .list(ObjectKind::Instance, "default", &selector)
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].meta().name, "pg-0");
        assert_eq!(listed[1].meta().name, "pg-1");

        let none = store
            .list(ObjectKind::Instance, "other", &selector)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_patch_merges_labels() {
        let store = MemStore::new();
        store.create(instance("pg-0", "pg")).await.unwrap();

        let key = ObjectRef::new(ObjectKind::Instance, "default", "pg-0");
        let patched = store
            .patch(
                &key,
                serde_json::json!({"meta": {"labels": {"iset.dev/role": "leader"}}}),
            )
            .await
            .unwrap();

        assert_eq!(patched.meta().label("iset.dev/role"), Some("leader"));
        assert_eq!(patched.meta().label(NAME_LABEL), Some("pg"));
        assert_eq!(patched.meta().resource_version, 2);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let store = MemStore::new();
        store.create(instance("pg-0", "pg")).await.unwrap();

        let key = ObjectRef::new(ObjectKind::Instance, "default", "pg-0");
        store.delete(&key).await.unwrap();

        assert!(matches!(
            store.get(&key).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            store.delete(&key).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
