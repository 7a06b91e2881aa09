//! Assistant-object stage: the headless discovery service.

use std::collections::BTreeMap;

use iset_api::{HeadlessService, ObjectMeta, OwnerRef, NAME_LABEL};
use iset_store::{Object, ObjectKind, ObjectRef};
use tracing::debug;

use crate::error::ControllerResult;
use crate::pipeline::{root_active, PreCondition, Reconciler};
use crate::tree::ObjectTree;

/// Ensures the `{name}-headless` discovery service exists and matches the
/// declared ports.
pub struct AssistantObjectReconciler;

impl Reconciler for AssistantObjectReconciler {
    fn name(&self) -> &'static str {
        "assistant-object"
    }

    fn pre_condition(&self, tree: &ObjectTree) -> PreCondition {
        root_active(tree)
    }

    fn reconcile(&self, tree: &mut ObjectTree) -> ControllerResult<()> {
        let Some(root) = tree.root().cloned() else {
            return Ok(());
        };

        let service_name = format!("{}-headless", root.meta.name);
        let selector =
            BTreeMap::from([(NAME_LABEL.to_string(), root.meta.name.clone())]);
        let key = ObjectRef::new(ObjectKind::Service, &root.meta.namespace, &service_name);

        match tree.get(&key).cloned() {
            None => {
                let mut meta = ObjectMeta::named(&root.meta.namespace, &service_name);
                meta.set_label(NAME_LABEL, &root.meta.name);
                meta.owner = Some(OwnerRef {
                    kind: ObjectKind::InstanceSet.as_str().to_string(),
                    name: root.meta.name.clone(),
                    uid: root.meta.uid,
                });

                debug!(service = %service_name, "Creating discovery service");
                tree.add(Object::Service(HeadlessService {
                    meta,
                    selector,
                    ports: root.spec.service_ports.clone(),
                }))?;
            }
            Some(Object::Service(existing))
                if existing.selector != selector || existing.ports != root.spec.service_ports =>
            {
                let mut desired = existing;
                desired.selector = selector;
                desired.ports = root.spec.service_ports.clone();

                debug!(service = %service_name, "Updating drifted discovery service");
                tree.update(Object::Service(desired))?;
            }
            Some(_) => {}
        }
        Ok(())
    }
}
