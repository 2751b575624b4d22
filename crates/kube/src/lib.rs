//! # Retarget Kube
//!
//! [`KubeCluster`] implements the env store and rollout control interfaces
//! against a live API server. Env changes are sent as RFC 6902 JSON Patches
//! addressed by position; restarts stamp the pod template with a merge patch.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

mod client;
pub mod rollout;

pub use client::KubeCluster;
