//! # Lamina Compute
//!
//! Compute backend abstraction for the Lamina framework. This crate
//! provides a [`ComputeBackend`](backend::ComputeBackend) trait that isolates
//! the electromagnetic code from how work is scheduled on the machine.
//!
//! Two hot paths go through a backend:
//!
//! - filling dense interaction matrices, one independent element per task;
//! - running independent (frequency, scan) analysis points of a sweep.
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Status |
//! |---------|-------------|--------|
//! | CPU (Rayon) | `cpu` (default) | Implemented |

pub mod backend;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use backend::{ComputeBackend, ComputeError, DeviceInfo, SerialBackend};

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;
