//! Meta-fix stage: normalize root metadata before anything else runs.

use iset_api::{FINALIZER, MANAGED_BY_LABEL, MANAGER, NAME_LABEL};

use crate::error::ControllerResult;
use crate::pipeline::{root_active, PreCondition, Reconciler};
use crate::tree::ObjectTree;

/// Stamps the identifying labels and the finalizer onto the root so every
/// downstream stage sees consistent metadata.
pub struct MetaFixReconciler;

impl Reconciler for MetaFixReconciler {
    fn name(&self) -> &'static str {
        "meta-fix"
    }

    fn pre_condition(&self, tree: &ObjectTree) -> PreCondition {
        root_active(tree)
    }

    fn reconcile(&self, tree: &mut ObjectTree) -> ControllerResult<()> {
        let Some(root) = tree.root() else {
            return Ok(());
        };

        let name = root.meta.name.clone();
        let needs_name = root.meta.label(NAME_LABEL) != Some(name.as_str());
        let needs_manager = root.meta.label(MANAGED_BY_LABEL) != Some(MANAGER);
        let needs_finalizer = !root.meta.has_finalizer(FINALIZER);
        if !needs_name && !needs_manager && !needs_finalizer {
            return Ok(());
        }

        let Some(root) = tree.root_mut() else {
            return Ok(());
        };
        root.meta.set_label(NAME_LABEL, &name);
        root.meta.set_label(MANAGED_BY_LABEL, MANAGER);
        if needs_finalizer {
            root.meta.finalizers.push(FINALIZER.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iset_api::InstanceSet;

    fn tree() -> ObjectTree {
        let root: InstanceSet = serde_json::from_str(
            r#"{"meta":{"name":"pg","namespace":"default"},"spec":{"template":{"image":"pg:16"}}}"#,
        )
        .unwrap();
        let mut tree = ObjectTree::new();
        tree.set_root(root);
        tree
    }

    #[test]
    fn test_stamps_labels_and_finalizer() {
        let mut tree = tree();
        MetaFixReconciler.reconcile(&mut tree).unwrap();

        let root = tree.root().unwrap();
        assert_eq!(root.meta.label(NAME_LABEL), Some("pg"));
        assert_eq!(root.meta.label(MANAGED_BY_LABEL), Some(MANAGER));
        assert!(root.meta.has_finalizer(FINALIZER));
        assert!(tree.root_dirty());
    }

    #[test]
    fn test_idempotent_once_fixed() {
        let mut tree = tree();
        MetaFixReconciler.reconcile(&mut tree).unwrap();

        let fixed = tree.root().unwrap().clone();
        let mut second = ObjectTree::new();
        second.set_root(fixed.clone());
        MetaFixReconciler.reconcile(&mut second).unwrap();

        assert_eq!(second.root().unwrap(), &fixed);
        assert!(!second.root_dirty());
    }
}
