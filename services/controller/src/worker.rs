//! Background worker driving reconciliation passes.
//!
//! Each pass rebuilds the object tree for one InstanceSet from the store,
//! runs the pipeline, then diff-applies the staged mutations. Distinct
//! InstanceSets reconcile concurrently and share nothing but the store
//! handle; any store error aborts that set's pass and the next tick
//! retries it from scratch.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use iset_api::{InstanceSet, NAME_LABEL};
use iset_store::{Object, ObjectKind, ObjectStore};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{ControllerError, ControllerResult};
use crate::pipeline::Pipeline;
use crate::tree::{Mutation, ObjectTree};

/// Dependent kinds listed into the tree each pass.
const DEPENDENT_KINDS: [ObjectKind; 4] = [
    ObjectKind::Instance,
    ObjectKind::Revision,
    ObjectKind::Service,
    ObjectKind::VolumeClaim,
];

/// Statistics from one reconciliation sweep over all sets.
#[derive(Debug, Default, Clone)]
pub struct ReconcileStats {
    pub sets_processed: i32,
    pub sets_failed: i32,
    pub objects_created: i32,
    pub objects_updated: i32,
    pub objects_deleted: i32,
}

/// Outcome of one pass over a single set.
#[derive(Debug, Default, Clone)]
pub struct PassOutcome {
    pub created: i32,
    pub updated: i32,
    pub deleted: i32,
}

/// Worker that reconciles every InstanceSet on a periodic interval.
pub struct Worker {
    store: Arc<dyn ObjectStore>,
    namespace: String,
    interval: Duration,
}

impl Worker {
    pub fn new(store: Arc<dyn ObjectStore>, namespace: String, interval: Duration) -> Self {
        Self {
            store,
            namespace,
            interval,
        }
    }

    /// Run until shutdown is signaled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            namespace = %self.namespace,
            "Starting reconciliation worker"
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.reconcile_all().await {
                        Ok(stats) => {
                            if stats.objects_created > 0
                                || stats.objects_updated > 0
                                || stats.objects_deleted > 0
                            {
                                info!(
                                    sets_processed = stats.sets_processed,
                                    sets_failed = stats.sets_failed,
                                    objects_created = stats.objects_created,
                                    objects_updated = stats.objects_updated,
                                    objects_deleted = stats.objects_deleted,
                                    "Reconciliation sweep complete"
                                );
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Reconciliation sweep failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Reconciliation worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One sweep: reconcile every InstanceSet, concurrently.
    pub async fn reconcile_all(&self) -> ControllerResult<ReconcileStats> {
        let roots = self
            .store
            .list(ObjectKind::InstanceSet, &self.namespace, &BTreeMap::new())
            .await?;
        debug!(set_count = roots.len(), "Found sets to reconcile");

        let mut tasks = JoinSet::new();
        for object in roots {
            let Object::InstanceSet(root) = object else {
                continue;
            };
            let store = Arc::clone(&self.store);
            tasks.spawn(async move {
                let name = root.meta.name.clone();
                (name, reconcile_set(store, root).await)
            });
        }

        let mut stats = ReconcileStats::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => {
                    stats.sets_processed += 1;
                    stats.objects_created += outcome.created;
                    stats.objects_updated += outcome.updated;
                    stats.objects_deleted += outcome.deleted;
                }
                Ok((name, Err(e))) => {
                    stats.sets_failed += 1;
                    warn!(
                        set = %name,
                        error = %e,
                        transient = e.is_transient(),
                        "Failed to reconcile set"
                    );
                }
                Err(e) => {
                    stats.sets_failed += 1;
                    error!(error = %e, "Reconcile task panicked");
                }
            }
        }
        Ok(stats)
    }
}

/// Run one full pass for a single set: build the tree, run the pipeline,
/// apply staged mutations.
///
/// Mutations staged before a stage failure are still applied; the error
/// then surfaces so the caller re-runs the whole pass.
pub async fn reconcile_set(
    store: Arc<dyn ObjectStore>,
    root: InstanceSet,
) -> ControllerResult<PassOutcome> {
    let namespace = root.meta.namespace.clone();
    let selector = BTreeMap::from([(NAME_LABEL.to_string(), root.meta.name.clone())]);

    let mut tree = ObjectTree::new();
    tree.set_root(root);
    for kind in DEPENDENT_KINDS {
        for object in store.list(kind, &namespace, &selector).await? {
            tree.observe(object);
        }
    }

    let pass_result = Pipeline::standard().run(&mut tree);
    let outcome = apply_tree(store.as_ref(), &tree).await?;
    pass_result?;
    Ok(outcome)
}

/// Diff-apply the tree's staged mutations, then the root, to the store.
/// Applies sequentially in staging order and aborts on the first error,
/// leaving earlier mutations in place.
async fn apply_tree(store: &dyn ObjectStore, tree: &ObjectTree) -> ControllerResult<PassOutcome> {
    let mut outcome = PassOutcome::default();
    for mutation in tree.mutations() {
        match mutation {
            Mutation::Create(key) => {
                let object = tree.get(key).cloned().ok_or_else(|| {
                    ControllerError::Internal(format!("staged create lost its object: {key}"))
                })?;
                store.create(object).await?;
                outcome.created += 1;
            }
            Mutation::Update(key) => {
                let object = tree.get(key).cloned().ok_or_else(|| {
                    ControllerError::Internal(format!("staged update lost its object: {key}"))
                })?;
                store.update(object).await?;
                outcome.updated += 1;
            }
            Mutation::Delete(key) => {
                store.delete(key).await?;
                outcome.deleted += 1;
            }
        }
    }

    if tree.root_dirty() {
        if let Some(root) = tree.root() {
            store.update(Object::InstanceSet(root.clone())).await?;
            outcome.updated += 1;
        }
    }
    Ok(outcome)
}
