//! Revision-update stage: content hashing and the revision history log.

use std::collections::{BTreeMap, BTreeSet};

use iset_api::{ObjectMeta, OwnerRef, Revision, NAME_LABEL};
use iset_store::{Object, ObjectKind, ObjectRef};
use tracing::debug;

use crate::error::{ControllerError, ControllerResult};
use crate::naming;
use crate::pipeline::{root_active, PreCondition, Reconciler};
use crate::revision::{pack_revision_map, revision_name, RevisionHash};
use crate::tree::ObjectTree;

/// Maintains the append-only, garbage-collected history of immutable
/// template snapshots and resolves the desired revision for every
/// instance name.
pub struct RevisionUpdateReconciler;

impl Reconciler for RevisionUpdateReconciler {
    fn name(&self) -> &'static str {
        "revision-update"
    }

    fn pre_condition(&self, tree: &ObjectTree) -> PreCondition {
        root_active(tree)
    }

    fn reconcile(&self, tree: &mut ObjectTree) -> ControllerResult<()> {
        let Some(root) = tree.root().cloned() else {
            return Ok(());
        };

        let desired = naming::desired_instances(&root)?;

        let mut by_hash: BTreeMap<String, String> = tree
            .revisions()
            .iter()
            .map(|r| (r.hash.clone(), r.meta.name.clone()))
            .collect();
        let mut next_sequence = tree
            .revisions()
            .iter()
            .map(|r| r.sequence)
            .max()
            .unwrap_or(0)
            + 1;

        // Resolve (and snapshot where missing) the revision for each
        // desired instance.
        let mut update_revisions = BTreeMap::new();
        for instance in &desired {
            let hash = RevisionHash::of_template(&instance.template)?;
            let resolved = match by_hash.get(hash.as_str()) {
                Some(existing) => existing.clone(),
                None => {
                    let name = revision_name(&root.meta.name, &hash);
                    let data = serde_json::to_value(&instance.template)
                        .map_err(|e| ControllerError::Internal(e.to_string()))?;

                    let mut meta = ObjectMeta::named(&root.meta.namespace, &name);
                    meta.set_label(NAME_LABEL, &root.meta.name);
                    meta.owner = Some(OwnerRef {
                        kind: ObjectKind::InstanceSet.as_str().to_string(),
                        name: root.meta.name.clone(),
                        uid: root.meta.uid,
                    });

                    debug!(revision = %name, hash = %hash, "Snapshotting new revision");
                    tree.add(Object::Revision(Revision {
                        meta,
                        data,
                        hash: hash.as_str().to_string(),
                        sequence: next_sequence,
                        generation: root.meta.generation,
                    }))?;
                    next_sequence += 1;
                    by_hash.insert(hash.as_str().to_string(), name.clone());
                    name
                }
            };
            update_revisions.insert(instance.name.clone(), resolved);
        }

        self.truncate_history(tree, root.spec.revision_history_limit, &update_revisions)?;

        let packed = pack_revision_map(update_revisions);
        let generation = root.meta.generation;
        if root.status.update_revisions != packed || root.status.current_generation != generation
        {
            if let Some(root) = tree.root_mut() {
                root.status.update_revisions = packed;
                root.status.current_generation = generation;
            }
        }
        Ok(())
    }
}

impl RevisionUpdateReconciler {
    /// Drop the oldest unreferenced revisions once history exceeds the
    /// retained limit. A revision stays while any live instance runs it or
    /// the update map points at it.
    fn truncate_history(
        &self,
        tree: &mut ObjectTree,
        limit: usize,
        update_revisions: &BTreeMap<String, String>,
    ) -> ControllerResult<()> {
        let mut referenced: BTreeSet<String> = update_revisions.values().cloned().collect();
        for instance in tree.instances() {
            if let Some(revision) = instance.revision() {
                referenced.insert(revision.to_string());
            }
        }

        let mut history: Vec<(i64, ObjectRef, String)> = tree
            .revisions()
            .iter()
            .map(|r| {
                (
                    r.sequence,
                    ObjectRef::new(ObjectKind::Revision, &r.meta.namespace, &r.meta.name),
                    r.meta.name.clone(),
                )
            })
            .collect();
        history.sort_by_key(|(sequence, _, _)| *sequence);

        let mut remaining = history.len();
        for (_, key, name) in history {
            if remaining <= limit {
                break;
            }
            if referenced.contains(&name) {
                continue;
            }
            debug!(revision = %name, "Truncating revision history");
            tree.delete(&key)?;
            remaining -= 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::parse_revision_map;
    use iset_api::InstanceSet;

    fn root(replicas: u32, image: &str) -> InstanceSet {
        let mut set: InstanceSet = serde_json::from_str(
            r#"{"meta":{"name":"pg","namespace":"default"},"spec":{"template":{"image":"pg:16"}}}"#,
        )
        .unwrap();
        set.meta.generation = 1;
        set.spec.replicas = replicas;
        set.spec.template.image = image.to_string();
        set
    }

    fn run(tree: &mut ObjectTree) {
        RevisionUpdateReconciler.reconcile(tree).unwrap();
    }

    #[test]
    fn test_first_pass_snapshots_one_revision() {
        let mut tree = ObjectTree::new();
        tree.set_root(root(3, "pg:16"));
        run(&mut tree);

        let revisions = tree.revisions();
        assert_eq!(revisions.len(), 1);
        assert_eq!(revisions[0].generation, 1);
        assert_eq!(revisions[0].sequence, 1);

        let map = parse_revision_map(&tree.root().unwrap().status.update_revisions).unwrap();
        assert_eq!(map.len(), 3);
        assert!(map.values().all(|r| r == &revisions[0].meta.name));
        assert_eq!(tree.root().unwrap().status.current_generation, 1);
    }

    #[test]
    fn test_unchanged_template_reuses_revision() {
        let mut tree = ObjectTree::new();
        tree.set_root(root(3, "pg:16"));
        run(&mut tree);

        let first = tree.revisions()[0].clone();

        // Second pass over the same observed state
        let mut second = ObjectTree::new();
        second.set_root(tree.root().unwrap().clone());
        second.observe(Object::Revision(first.clone()));
        run(&mut second);

        assert_eq!(second.revisions().len(), 1);
        assert!(second.mutations().is_empty());
    }

    #[test]
    fn test_template_change_appends_to_history() {
        let mut tree = ObjectTree::new();
        tree.set_root(root(3, "pg:16"));
        run(&mut tree);
        let first = tree.revisions()[0].clone();

        let mut updated = root(3, "pg:17");
        updated.meta.generation = 2;
        updated.status = tree.root().unwrap().status.clone();

        let mut second = ObjectTree::new();
        second.set_root(updated);
        second.observe(Object::Revision(first.clone()));
        run(&mut second);

        let mut sequences: Vec<i64> = second.revisions().iter().map(|r| r.sequence).collect();
        sequences.sort();
        assert_eq!(sequences, [1, 2]);
        assert_eq!(second.revisions().len(), 2);

        let map = parse_revision_map(&second.root().unwrap().status.update_revisions).unwrap();
        let new_name = second
            .revisions()
            .iter()
            .find(|r| r.sequence == 2)
            .unwrap()
            .meta
            .name
            .clone();
        assert!(map.values().all(|r| r == &new_name));
        assert_eq!(second.root().unwrap().status.current_generation, 2);
    }

    #[test]
    fn test_history_truncation_spares_referenced_revisions() {
        let mut set = root(1, "pg:16");
        set.spec.revision_history_limit = 2;

        // Build a history of four revisions by rolling the template
        let mut revisions: Vec<Revision> = Vec::new();
        let mut status = set.status.clone();
        for (i, image) in ["pg:14", "pg:15", "pg:16", "pg:17"].iter().enumerate() {
            let mut step = set.clone();
            step.spec.template.image = image.to_string();
            step.meta.generation = i as i64 + 1;
            step.status = status;

            let mut tree = ObjectTree::new();
            tree.set_root(step);
            for r in &revisions {
                tree.observe(Object::Revision(r.clone()));
            }
            run(&mut tree);
            revisions = tree.revisions().into_iter().cloned().collect();
            revisions.sort_by_key(|r| r.sequence);
            status = tree.root().unwrap().status.clone();
        }

        // Limit is 2 and only the newest is referenced, so the two oldest
        // unreferenced snapshots are gone.
        assert_eq!(revisions.len(), 2);
        assert_eq!(
            revisions.iter().map(|r| r.sequence).collect::<Vec<_>>(),
            [3, 4]
        );
    }
}
