//! The reconciler abstraction and the fixed pipeline.

use tracing::{debug, error};

use crate::error::ControllerResult;
use crate::reconcilers::{
    AssistantObjectReconciler, MetaFixReconciler, ReplicasAlignmentReconciler,
    RevisionUpdateReconciler, StatusReconciler,
};
use crate::tree::ObjectTree;

/// Outcome of a stage's precondition check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreCondition {
    Satisfied,
    /// Skip the stage without error.
    Unsatisfied(&'static str),
}

/// One stage of the pipeline: an idempotent transform over the tree.
///
/// Stages never talk to the store; they stage mutations on the tree and
/// the caller applies them. A returned error aborts the remaining stages
/// but mutations staged so far are still applied — recovery is idempotent
/// re-execution, not rollback.
pub trait Reconciler: Send + Sync {
    fn name(&self) -> &'static str;

    fn pre_condition(&self, tree: &ObjectTree) -> PreCondition;

    fn reconcile(&self, tree: &mut ObjectTree) -> ControllerResult<()>;
}

/// The fixed, ordered reconciler sequence.
pub struct Pipeline {
    stages: Vec<Box<dyn Reconciler>>,
}

impl Pipeline {
    /// The standard five-stage pipeline, in its one valid order.
    pub fn standard() -> Self {
        Self {
            stages: vec![
                Box::new(MetaFixReconciler),
                Box::new(RevisionUpdateReconciler),
                Box::new(AssistantObjectReconciler),
                Box::new(ReplicasAlignmentReconciler),
                Box::new(StatusReconciler),
            ],
        }
    }

    /// Run all stages in order. Unsatisfied preconditions skip silently;
    /// the first stage error aborts the rest of the pass.
    pub fn run(&self, tree: &mut ObjectTree) -> ControllerResult<()> {
        for stage in &self.stages {
            match stage.pre_condition(tree) {
                PreCondition::Unsatisfied(reason) => {
                    debug!(stage = stage.name(), reason, "Skipping stage");
                    continue;
                }
                PreCondition::Satisfied => {}
            }

            if let Err(e) = stage.reconcile(tree) {
                error!(stage = stage.name(), error = %e, "Stage failed, aborting pass");
                return Err(e);
            }
            debug!(stage = stage.name(), "Stage complete");
        }
        Ok(())
    }
}

/// Shared precondition: a root that exists and is not being deleted.
pub(crate) fn root_active(tree: &ObjectTree) -> PreCondition {
    match tree.root() {
        None => PreCondition::Unsatisfied("no root"),
        Some(root) if root.meta.is_terminating() => {
            PreCondition::Unsatisfied("root is terminating")
        }
        Some(_) => PreCondition::Satisfied,
    }
}
