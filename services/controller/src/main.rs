//! iset controller
//!
//! Reconciles InstanceSets — replicated, role-aware stateful workloads —
//! against their declared specification. Each pass snapshots desired and
//! observed state into an object tree, runs the fixed reconciler pipeline
//! over it, and writes the resulting mutations and status back to the
//! object store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use iset_controller::config::Config;
use iset_controller::worker::Worker;
use iset_store::MemStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting iset controller");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        reconcile_interval_secs = config.reconcile_interval_secs,
        namespace = %config.namespace,
        "Configuration loaded"
    );

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create the store (in-memory until the platform API client lands)
    let store = Arc::new(MemStore::new());

    // Start the reconciliation worker
    let worker = Worker::new(
        store,
        config.namespace.clone(),
        Duration::from_secs(config.reconcile_interval_secs),
    );
    let worker_handle = tokio::spawn(async move {
        worker.run(shutdown_rx).await;
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = worker_handle => {
            info!("Worker exited");
        }
    }

    // Signal shutdown to all workers
    let _ = shutdown_tx.send(true);

    info!("Controller shutdown complete");
    Ok(())
}
