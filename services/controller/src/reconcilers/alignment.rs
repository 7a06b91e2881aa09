//! Replicas-alignment stage: converge the observed instance set onto the
//! desired named set.

use std::collections::{BTreeMap, BTreeSet};

use iset_api::{
    Instance, InstanceSet, InstanceStatus, ManagementPolicy, ObjectMeta, OwnerRef, VolumeClaim,
    VolumeClaimSpec, INSTANCE_LABEL, NAME_LABEL, REVISION_LABEL,
};
use iset_store::{Object, ObjectKind, ObjectRef};
use tracing::debug;

use crate::error::{ControllerError, ControllerResult};
use crate::naming::{self, compare_names, DesiredInstance};
use crate::pipeline::{root_active, PreCondition, Reconciler};
use crate::revision::parse_revision_map;
use crate::tree::ObjectTree;

/// Creates missing instances and deletes surplus ones, honoring the
/// management policy's ordering constraints.
///
/// Alignment is resumable from any partial state: instances staged before
/// an aborted pass stay, and the next pass picks up the remainder.
pub struct ReplicasAlignmentReconciler;

impl Reconciler for ReplicasAlignmentReconciler {
    fn name(&self) -> &'static str {
        "replicas-alignment"
    }

    fn pre_condition(&self, tree: &ObjectTree) -> PreCondition {
        root_active(tree)
    }

    fn reconcile(&self, tree: &mut ObjectTree) -> ControllerResult<()> {
        let Some(root) = tree.root().cloned() else {
            return Ok(());
        };

        let desired = naming::desired_instances(&root)?;
        let update_revisions = parse_revision_map(&root.status.update_revisions)?;

        let observed: BTreeMap<String, bool> = tree
            .instances()
            .iter()
            .map(|i| (i.meta.name.clone(), i.is_ready()))
            .collect();

        self.create_missing(tree, &root, &desired, &observed, &update_revisions)?;
        self.delete_surplus(tree, &root, &desired, &observed)?;
        Ok(())
    }
}

impl ReplicasAlignmentReconciler {
    fn create_missing(
        &self,
        tree: &mut ObjectTree,
        root: &InstanceSet,
        desired: &[DesiredInstance],
        observed: &BTreeMap<String, bool>,
        update_revisions: &BTreeMap<String, String>,
    ) -> ControllerResult<()> {
        match root.spec.management_policy {
            ManagementPolicy::Parallel => {
                for instance in desired {
                    if !observed.contains_key(&instance.name) {
                        create_instance(tree, root, instance, update_revisions)?;
                    }
                }
            }
            ManagementPolicy::OrderedReady => {
                // Walk the creation order; a missing instance is only
                // created once its immediate predecessor is observed Ready.
                let mut predecessor_ready = true;
                for instance in desired {
                    match observed.get(&instance.name) {
                        Some(ready) => predecessor_ready = *ready,
                        None => {
                            if predecessor_ready {
                                create_instance(tree, root, instance, update_revisions)?;
                            } else {
                                debug!(
                                    instance = %instance.name,
                                    "Holding creation until predecessor is ready"
                                );
                            }
                            predecessor_ready = false;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn delete_surplus(
        &self,
        tree: &mut ObjectTree,
        root: &InstanceSet,
        desired: &[DesiredInstance],
        observed: &BTreeMap<String, bool>,
    ) -> ControllerResult<()> {
        let desired_names: BTreeSet<&str> = desired.iter().map(|d| d.name.as_str()).collect();
        let mut surplus: Vec<&String> = observed
            .keys()
            .filter(|name| !desired_names.contains(name.as_str()))
            .collect();
        surplus.sort_by(|a, b| compare_names(a, b));
        if root.spec.management_policy == ManagementPolicy::OrderedReady {
            surplus.reverse();
        }

        for name in surplus {
            delete_instance(tree, &root.meta.namespace, name)?;
        }
        Ok(())
    }
}

fn create_instance(
    tree: &mut ObjectTree,
    root: &InstanceSet,
    desired: &DesiredInstance,
    update_revisions: &BTreeMap<String, String>,
) -> ControllerResult<()> {
    let revision = update_revisions
        .get(&desired.name)
        .ok_or_else(|| ControllerError::MissingRevision(desired.name.clone()))?;

    let mut meta = ObjectMeta::named(&root.meta.namespace, &desired.name);
    meta.set_label(NAME_LABEL, &root.meta.name);
    meta.set_label(REVISION_LABEL, revision);
    meta.owner = Some(OwnerRef {
        kind: ObjectKind::InstanceSet.as_str().to_string(),
        name: root.meta.name.clone(),
        uid: root.meta.uid,
    });

    debug!(instance = %desired.name, revision = %revision, "Creating instance");
    tree.add(Object::Instance(Instance {
        meta,
        spec: desired.template.clone(),
        status: InstanceStatus::default(),
    }))?;

    for claim_template in &desired.template.volume_claims {
        let claim_name = format!("{}-{}", claim_template.name, desired.name);
        let mut claim_meta = ObjectMeta::named(&root.meta.namespace, &claim_name);
        claim_meta.set_label(NAME_LABEL, &root.meta.name);
        claim_meta.set_label(INSTANCE_LABEL, &desired.name);
        claim_meta.owner = Some(OwnerRef {
            kind: ObjectKind::Instance.as_str().to_string(),
            name: desired.name.clone(),
            uid: None,
        });

        tree.add(Object::VolumeClaim(VolumeClaim {
            meta: claim_meta,
            spec: VolumeClaimSpec {
                storage_bytes: claim_template.storage_bytes,
                storage_class: claim_template.storage_class.clone(),
            },
        }))?;
    }
    Ok(())
}

fn delete_instance(tree: &mut ObjectTree, namespace: &str, name: &str) -> ControllerResult<()> {
    debug!(instance = %name, "Deleting surplus instance");
    tree.delete(&ObjectRef::new(ObjectKind::Instance, namespace, name))?;

    let claims: Vec<ObjectRef> = tree
        .list(ObjectKind::VolumeClaim)
        .iter()
        .filter(|o| o.meta().label(INSTANCE_LABEL) == Some(name))
        .map(|o| o.object_ref())
        .collect();
    for claim in claims {
        tree.delete(&claim)?;
    }
    Ok(())
}
