//! Reconciliation pipeline for InstanceSets.
//!
//! Each pass builds an owned [`tree::ObjectTree`] snapshot from the root
//! specification and its observed dependents, threads it through a fixed
//! sequence of reconcilers, and diff-applies the staged mutations back to
//! the object store. Passes keep no state between invocations; correctness
//! under crash/restart comes from full idempotent recomputation.

pub mod config;
pub mod error;
pub mod naming;
pub mod pipeline;
pub mod reconcilers;
pub mod revision;
pub mod roles;
pub mod tree;
pub mod worker;
