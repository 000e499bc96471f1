//! Sheet solver abstraction and implementations.
//!
//! A [`SheetSolver`] turns one placed sheet, together with the modes of the
//! two layers it separates, into the GSM of that junction. The method of
//! moments ([`mom::MomSolver`]) is the production implementation; tests
//! substitute their own solvers through the same trait.

pub mod direct;
pub mod mom;

use lamina_compute::ComputeError;
use thiserror::Error;

use crate::gsm::Gsm;
use crate::modes::JunctionModes;
use crate::types::Sheet;

/// Errors that can occur while solving a sheet or cascading GSMs.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Singular {dim}x{dim} matrix (pivot ratio {pivot_ratio:.2e})")]
    Singular { dim: usize, pivot_ratio: f64 },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Compute backend error: {0}")]
    Compute(#[from] ComputeError),
}

/// Produces the GSM of a junction carrying a sheet.
pub trait SheetSolver: Send + Sync {
    /// GSM of `sheet` shifted laterally by `offset` (m), embedded between the
    /// layers described by `modes`. Port 1 is the left layer with
    /// `modes.n_left` modes, port 2 the right layer with `modes.n_right`.
    fn junction_gsm(
        &self,
        sheet: &Sheet,
        offset: [f64; 2],
        modes: &JunctionModes<'_>,
    ) -> Result<Gsm, SolverError>;

    /// Human-readable name of the solver method.
    fn method_name(&self) -> &str;
}
