//! Workload storage module.
//!
//! This module provides the API seam the reconciler reads and writes
//! `StatefulSet` objects through, plus in-memory and local file backends.

mod api;
mod local;
mod memory;

pub use api::{WorkloadApi, WorkloadKey};
#[cfg(test)]
pub use api::MockWorkloadApi;
pub use local::{LocalWorkloadStore, DEFAULT_STORE_DIR};
pub use memory::InMemoryWorkloadApi;
