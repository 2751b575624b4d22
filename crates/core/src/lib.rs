//! # Retarget Core
//!
//! Core types and interfaces shared across the Retarget workspace.
//!
//! - **Types**: workloads, container selectors, env entries, rollout status
//! - **Patches**: position-addressed env changes rendered as JSON Patch
//! - **Stores**: the typed read/patch and restart/status interfaces
//! - **Memory**: an in-memory cluster implementing both interfaces
//!
//! ## Error Handling
//!
//! All fallible store operations return [`Result<T>`] with a typed
//! [`StoreError`]. No unwraps, no panics.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

mod error;
pub mod memory;
pub mod patch;
mod result;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use memory::InMemoryCluster;
pub use patch::{restart_patch, EnvPatch, CONTAINERS_PATH, RESTARTED_AT_ANNOTATION};
pub use result::{Result, ResultExt};
pub use store::{EnvStore, RolloutControl};
pub use types::{ContainerSelector, ContainerSpec, EnvEntry, RolloutStatus, WorkloadKind, WorkloadRef};
