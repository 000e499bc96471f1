//! Dense direct solves via `faer` partial-pivot LU.
//!
//! A factorisation is computed once and reused for any number of
//! right-hand sides: the interaction matrix of a sheet is factored once per
//! analysis point and solved against one column per incident mode, and the
//! cascade's multiple-reflection term is solved the same way.

use faer::complex_native::c64;
use faer::linalg::solvers::{PartialPivLu, SpSolver};
use faer::Mat;
use ndarray::Array2;
use num_complex::Complex64;

use super::SolverError;

/// Smallest accepted ratio between the smallest and largest LU pivot.
const PIVOT_RATIO_MIN: f64 = 1e-13;

/// A factored square matrix.
pub struct LuFactor {
    lu: PartialPivLu<c64>,
    dim: usize,
}

impl LuFactor {
    /// Factor `matrix`, rejecting non-finite entries and (numerically)
    /// singular matrices.
    pub fn new(matrix: &Array2<Complex64>) -> Result<Self, SolverError> {
        let dim = matrix.nrows();
        if dim != matrix.ncols() {
            return Err(SolverError::DimensionMismatch(format!(
                "cannot factor a {}x{} matrix",
                dim,
                matrix.ncols()
            )));
        }
        if matrix.iter().any(|z| !z.is_finite()) {
            return Err(SolverError::Singular {
                dim,
                pivot_ratio: f64::NAN,
            });
        }

        let faer_mat = Mat::<c64>::from_fn(dim, dim, |i, j| {
            let c = matrix[[i, j]];
            c64::new(c.re, c.im)
        });
        let lu = faer_mat.partial_piv_lu();

        if dim > 0 {
            let u = lu.compute_u();
            let (mut smallest, mut largest) = (f64::INFINITY, 0.0_f64);
            for i in 0..dim {
                let p = u.read(i, i);
                let mag = p.re.hypot(p.im);
                smallest = smallest.min(mag);
                largest = largest.max(mag);
            }
            let pivot_ratio = if largest > 0.0 { smallest / largest } else { 0.0 };
            if !(pivot_ratio > PIVOT_RATIO_MIN) {
                return Err(SolverError::Singular { dim, pivot_ratio });
            }
        }

        Ok(Self { lu, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Solve $\mathbf{A}\mathbf{X} = \mathbf{B}$ for every column of `rhs`.
    pub fn solve(&self, rhs: &Array2<Complex64>) -> Result<Array2<Complex64>, SolverError> {
        if rhs.nrows() != self.dim {
            return Err(SolverError::DimensionMismatch(format!(
                "right-hand side has {} rows, matrix has dimension {}",
                rhs.nrows(),
                self.dim
            )));
        }
        if self.dim == 0 || rhs.ncols() == 0 {
            return Ok(Array2::zeros(rhs.dim()));
        }

        let faer_rhs = Mat::<c64>::from_fn(self.dim, rhs.ncols(), |i, j| {
            let c = rhs[[i, j]];
            c64::new(c.re, c.im)
        });
        let faer_sol = self.lu.solve(&faer_rhs);

        let solution = Array2::from_shape_fn(rhs.dim(), |(i, j)| {
            let c = faer_sol.read(i, j);
            Complex64::new(c.re, c.im)
        });
        if solution.iter().any(|z| !z.is_finite()) {
            return Err(SolverError::Singular {
                dim: self.dim,
                pivot_ratio: 0.0,
            });
        }
        Ok(solution)
    }
}
