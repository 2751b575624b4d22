#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # Retarget
//!
//! Points the telemetry exporters of Kubernetes workloads at a collector by
//! reconciling container environment variables, then restarts what changed.
//!
//! The binary is a thin layer over [`driver::Driver`], which runs the
//! per-variable reconciler from `retarget-reconciler` against any store.

pub mod cli;
pub mod commands;
pub mod config;
pub mod driver;
pub mod error;

pub use retarget_core;
pub use retarget_reconciler;
