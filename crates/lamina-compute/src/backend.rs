//! Compute backend trait and device description.
//!
//! The [`ComputeBackend`] trait abstracts over execution environments so that
//! the physics code in `lamina-core` stays independent of the threading model.

use ndarray::Array2;
use num_complex::Complex64;
use thiserror::Error;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Backend not available: {0}")]
    Unavailable(String),

    #[error("Device error: {0}")]
    DeviceError(String),
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub compute_units: Option<usize>,
}

/// Abstraction over compute backends.
///
/// Implementations must be shareable across threads: a single backend is
/// handed to every analysis point of a sweep.
pub trait ComputeBackend: Send + Sync {
    /// Return information about the device.
    fn device_info(&self) -> DeviceInfo;

    /// Fill a dense complex matrix element by element.
    ///
    /// This is the entry point for the interaction-matrix assembly: each
    /// `(i, j)` element is a spectral sum that does not depend on any other
    /// element.
    fn parallel_matrix_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &(dyn Fn(usize, usize) -> Complex64 + Send + Sync),
    ) -> Result<Array2<Complex64>, ComputeError>;

    /// Run `count` independent tasks, passing each its task index.
    ///
    /// No ordering between tasks is guaranteed. Tasks that need to publish
    /// results must synchronise on their own.
    fn for_each_task(&self, count: usize, task: &(dyn Fn(usize) + Send + Sync));
}

/// Sequential fallback used when no backend is supplied.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialBackend;

impl ComputeBackend for SerialBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Serial".into(),
            compute_units: Some(1),
        }
    }

    fn parallel_matrix_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &(dyn Fn(usize, usize) -> Complex64 + Send + Sync),
    ) -> Result<Array2<Complex64>, ComputeError> {
        Ok(Array2::from_shape_fn((rows, cols), |(i, j)| fill_fn(i, j)))
    }

    fn for_each_task(&self, count: usize, task: &(dyn Fn(usize) + Send + Sync)) {
        (0..count).for_each(task);
    }
}
