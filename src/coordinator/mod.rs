// src/coordinator/mod.rs
//! HTTP-facing coordination
//!
//! - `worker`: exposes the local search engine and registers with a master
//! - `master`: fans searches out to workers and collects the first solution
//! - `registry`: worker health bookkeeping used by the master

/// Worker registry with sticky dead state
pub mod registry;

/// Worker process endpoints and self-registration
pub mod worker;

/// Master process endpoints, fan-out and health polling
pub mod master;

pub use master::MasterCoordinator;
pub use registry::{HealthUpdate, WorkerRecord, WorkerRegistry};
pub use worker::WorkerCoordinator;
