//! # iset-api
//!
//! Resource types for the iset orchestrator: the `InstanceSet`
//! specification/status pair and the dependent objects the controller
//! manages (instances, revisions, the discovery service, volume claims).
//!
//! ## Design Principles
//!
//! - Types mirror the wire contract one-to-one; every field round-trips
//!   through serde unchanged, including fields the controller never touches
//! - Spec is input, status is derived output; nothing here mutates either
//! - Label keys and the finalizer are the only coupling between objects

mod instance;
mod meta;
mod revision;
mod service;
mod set;
mod template;
mod volume;

pub use instance::*;
pub use meta::*;
pub use revision::*;
pub use service::*;
pub use set::*;
pub use template::*;
pub use volume::*;
