//! # iset-store
//!
//! The external object-store contract the reconciliation pipeline runs
//! against: a namespaced key/value store of typed objects with
//! optimistic-concurrency version tokens on write.
//!
//! In production the store is the orchestration platform's API; tests and
//! local runs use [`MemStore`].

mod error;
mod object;
mod store;

pub use error::StoreError;
pub use object::{Object, ObjectKind, ObjectRef};
pub use store::{MemStore, ObjectStore};
