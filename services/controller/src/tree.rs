//! Per-pass snapshot of desired-vs-observed state.
//!
//! The tree owns clones of everything it read; nothing in a pass touches
//! live store objects. Reconcilers stage mutations through
//! [`ObjectTree::add`]/[`ObjectTree::update`]/[`ObjectTree::delete`], which
//! also keep the indexed object map in sync so later stages observe the
//! staged end-state. The caller diff-applies the collapsed mutation log to
//! the store after the pass.

use std::collections::BTreeMap;

use iset_api::{Instance, InstanceSet, Revision};
use iset_store::{Object, ObjectKind, ObjectRef};
use thiserror::Error;

/// Errors from staging tree mutations.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("object already in tree: {0}")]
    AlreadyExists(ObjectRef),

    #[error("object not in tree: {0}")]
    NotFound(ObjectRef),
}

/// One staged mutation, in staging order.
///
/// The log is collapsed as it is built: updating a staged creation folds
/// into the creation, deleting a staged creation cancels both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create(ObjectRef),
    Update(ObjectRef),
    Delete(ObjectRef),
}

impl Mutation {
    pub fn object_ref(&self) -> &ObjectRef {
        match self {
            Self::Create(r) | Self::Update(r) | Self::Delete(r) => r,
        }
    }
}

/// Owned, indexed snapshot of one InstanceSet and its dependents.
#[derive(Debug, Default)]
pub struct ObjectTree {
    root: Option<InstanceSet>,
    root_dirty: bool,
    objects: BTreeMap<ObjectRef, Object>,
    mutations: Vec<Mutation>,
}

impl ObjectTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root specification resource.
    pub fn set_root(&mut self, root: InstanceSet) {
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<&InstanceSet> {
        self.root.as_ref()
    }

    /// Mutable root access. Marks the root for write-back.
    pub fn root_mut(&mut self) -> Option<&mut InstanceSet> {
        self.root_dirty = self.root.is_some();
        self.root.as_mut()
    }

    /// True once any stage changed the root.
    pub fn root_dirty(&self) -> bool {
        self.root_dirty
    }

    /// Load an observed object without staging a mutation.
    pub fn observe(&mut self, object: Object) {
        self.objects.insert(object.object_ref(), object);
    }

    pub fn get(&self, key: &ObjectRef) -> Option<&Object> {
        self.objects.get(key)
    }

    /// All objects of one kind, name-ordered.
    pub fn list(&self, kind: ObjectKind) -> Vec<&Object> {
        self.objects.values().filter(|o| o.kind() == kind).collect()
    }

    pub fn instances(&self) -> Vec<&Instance> {
        self.objects.values().filter_map(Object::as_instance).collect()
    }

    pub fn revisions(&self) -> Vec<&Revision> {
        self.objects.values().filter_map(Object::as_revision).collect()
    }

    /// Stage a creation.
    pub fn add(&mut self, object: Object) -> Result<(), TreeError> {
        let key = object.object_ref();
        if self.objects.contains_key(&key) {
            return Err(TreeError::AlreadyExists(key));
        }
        self.objects.insert(key.clone(), object);
        self.mutations.push(Mutation::Create(key));
        Ok(())
    }

    /// Stage an update of an object already in the tree.
    pub fn update(&mut self, object: Object) -> Result<(), TreeError> {
        let key = object.object_ref();
        if !self.objects.contains_key(&key) {
            return Err(TreeError::NotFound(key));
        }
        self.objects.insert(key.clone(), object);

        // A staged creation already carries the latest body; a pending
        // update stays single.
        let already_staged = self.mutations.iter().any(|m| {
            matches!(m, Mutation::Create(r) | Mutation::Update(r) if *r == key)
        });
        if !already_staged {
            self.mutations.push(Mutation::Update(key));
        }
        Ok(())
    }

    /// Stage a deletion, removing the object from the tree.
    pub fn delete(&mut self, key: &ObjectRef) -> Result<(), TreeError> {
        if self.objects.remove(key).is_none() {
            return Err(TreeError::NotFound(key.clone()));
        }

        let was_staged_create = self
            .mutations
            .iter()
            .any(|m| matches!(m, Mutation::Create(r) if r == key));
        self.mutations.retain(|m| m.object_ref() != key);
        if !was_staged_create {
            self.mutations.push(Mutation::Delete(key.clone()));
        }
        Ok(())
    }

    /// The collapsed mutation log, in staging order.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iset_api::{InstanceStatus, InstanceTemplate, ObjectMeta};

    fn instance(name: &str) -> Object {
        Object::Instance(Instance {
            meta: ObjectMeta::named("default", name),
            spec: InstanceTemplate::default(),
            status: InstanceStatus::default(),
        })
    }

    fn key(name: &str) -> ObjectRef {
        ObjectRef::new(ObjectKind::Instance, "default", name)
    }

    #[test]
    fn test_observe_does_not_stage() {
        let mut tree = ObjectTree::new();
        tree.observe(instance("pg-0"));
        assert!(tree.mutations().is_empty());
        assert_eq!(tree.instances().len(), 1);
    }

    #[test]
    fn test_add_stages_create_and_indexes() {
        let mut tree = ObjectTree::new();
        tree.add(instance("pg-0")).unwrap();

        assert_eq!(tree.mutations(), &[Mutation::Create(key("pg-0"))]);
        assert!(tree.get(&key("pg-0")).is_some());
        assert!(matches!(
            tree.add(instance("pg-0")),
            Err(TreeError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_update_of_staged_create_folds_in() {
        let mut tree = ObjectTree::new();
        tree.add(instance("pg-0")).unwrap();

        let mut updated = instance("pg-0");
        updated.meta_mut().set_label("iset.dev/role", "leader");
        tree.update(updated).unwrap();

        assert_eq!(tree.mutations(), &[Mutation::Create(key("pg-0"))]);
        let stored = tree.get(&key("pg-0")).unwrap();
        assert_eq!(stored.meta().label("iset.dev/role"), Some("leader"));
    }

    #[test]
    fn test_delete_of_staged_create_cancels_both() {
        let mut tree = ObjectTree::new();
        tree.add(instance("pg-0")).unwrap();
        tree.delete(&key("pg-0")).unwrap();

        assert!(tree.mutations().is_empty());
        assert!(tree.get(&key("pg-0")).is_none());
    }

    #[test]
    fn test_delete_of_observed_object_stages_delete() {
        let mut tree = ObjectTree::new();
        tree.observe(instance("pg-0"));
        tree.delete(&key("pg-0")).unwrap();

        assert_eq!(tree.mutations(), &[Mutation::Delete(key("pg-0"))]);
        assert!(matches!(
            tree.delete(&key("pg-0")),
            Err(TreeError::NotFound(_))
        ));
    }

    #[test]
    fn test_repeated_updates_stage_once() {
        let mut tree = ObjectTree::new();
        tree.observe(instance("pg-0"));
        tree.update(instance("pg-0")).unwrap();
        tree.update(instance("pg-0")).unwrap();

        assert_eq!(tree.mutations(), &[Mutation::Update(key("pg-0"))]);
    }

    #[test]
    fn test_root_mut_marks_dirty() {
        let mut tree = ObjectTree::new();
        assert!(!tree.root_dirty());

        let set: InstanceSet = serde_json::from_str(
            r#"{"meta":{"name":"pg","namespace":"default"},"spec":{"template":{"image":"pg:16"}}}"#,
        )
        .unwrap();
        tree.set_root(set);
        assert!(!tree.root_dirty());

        tree.root_mut().unwrap().status.replicas = 3;
        assert!(tree.root_dirty());
    }
}
