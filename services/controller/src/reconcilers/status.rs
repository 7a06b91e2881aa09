//! Status stage: full recomputation of the root's status block.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use iset_api::{Instance, InstanceSet, MemberStatus, ReplicaRole};
use tracing::debug;

use crate::error::ControllerResult;
use crate::pipeline::{root_active, PreCondition, Reconciler};
use crate::revision::parse_revision_map;
use crate::roles::{compose_role_priority_map, sort_members_status};
use crate::tree::ObjectTree;

/// Aggregates observed instance state into the root's status. Never
/// incremental: every counter and the member list are rebuilt from the
/// current tree each pass.
pub struct StatusReconciler;

impl Reconciler for StatusReconciler {
    fn name(&self) -> &'static str {
        "status"
    }

    fn pre_condition(&self, tree: &ObjectTree) -> PreCondition {
        root_active(tree)
    }

    fn reconcile(&self, tree: &mut ObjectTree) -> ControllerResult<()> {
        let Some(root) = tree.root().cloned() else {
            return Ok(());
        };

        let update_revisions = parse_revision_map(&root.status.update_revisions)?;
        let tracked: BTreeSet<&str> = tree
            .revisions()
            .iter()
            .map(|r| r.meta.name.as_str())
            .collect();
        let now = Utc::now();

        let mut replicas = 0;
        let mut ready_replicas = 0;
        let mut available_replicas = 0;
        let mut updated_replicas = 0;
        let mut current_replicas = 0;
        let mut current_revisions = BTreeMap::new();

        for instance in tree.instances() {
            let created = instance.is_created();
            let terminating = instance.is_terminating();
            if created {
                replicas += 1;
            }
            if created && !terminating {
                current_replicas += 1;
                if let Some(revision) = instance.revision() {
                    if update_revisions.get(&instance.meta.name).map(String::as_str)
                        == Some(revision)
                    {
                        updated_replicas += 1;
                    }
                    if tracked.contains(revision) {
                        current_revisions
                            .insert(instance.meta.name.clone(), revision.to_string());
                    }
                }
                if instance.is_ready() {
                    ready_replicas += 1;
                    if instance.is_available(root.spec.min_ready_seconds, now) {
                        available_replicas += 1;
                    }
                }
            }
        }

        let mut updated_root = root.clone();
        updated_root.status.replicas = replicas;
        updated_root.status.ready_replicas = ready_replicas;
        updated_root.status.available_replicas = available_replicas;
        updated_root.status.updated_replicas = updated_replicas;
        updated_root.status.current_replicas = current_replicas;
        updated_root.status.current_revisions = current_revisions;
        updated_root.status.observed_generation = root.meta.generation;

        let instances: Vec<Instance> = tree.instances().into_iter().cloned().collect();
        set_members_status(&mut updated_root, &instances);

        if updated_root.status != root.status {
            debug!(
                replicas,
                ready_replicas,
                available_replicas,
                updated_replicas,
                members = updated_root.status.members_status.len(),
                "Status changed"
            );
            if let Some(target) = tree.root_mut() {
                *target = updated_root;
            }
        }
        Ok(())
    }
}

/// Rebuild the member list from currently-Ready, role-labeled instances.
///
/// Roles come from the instance's currently observed label, resolved
/// against the declared role list; prior entries never survive on their
/// own. The result is ordered by descending role priority, stable among
/// equals.
pub fn set_members_status(set: &mut InstanceSet, instances: &[Instance]) {
    let priority_map = compose_role_priority_map(&set.spec.roles);
    let mut members: Vec<MemberStatus> = instances
        .iter()
        .filter(|i| !i.is_terminating() && i.is_ready())
        .filter_map(|i| {
            i.role().map(|role| MemberStatus {
                instance_name: i.meta.name.clone(),
                role: set
                    .declared_role(role)
                    .cloned()
                    .unwrap_or_else(|| ReplicaRole::named(role)),
            })
        })
        .collect();
    sort_members_status(&mut members, &priority_map);
    set.status.members_status = members;
}
