//! Interaction matrix assembly.
//!
//! With modal projections $t_{ip} = \hat{\mathbf{e}}_p\cdot\mathbf{F}_i(\boldsymbol\beta_p)/\sqrt{A}$
//! the Galerkin matrix of a sheet is
//!
//! $$
//! Z_{ij} = \sum_p w_p\,\tilde{G}_p\,t_{ip}\,t_{jp}^{*}
//! $$
//!
//! summed over every mode carried by either bounding layer.

use lamina_compute::ComputeBackend;
use lamina_geometry::RwgFunction;
use ndarray::Array2;
use num_complex::Complex64;

use crate::modes::{mode_vector, ModeKind};
use crate::solver::SolverError;

use super::transform::TransformCache;

/// Modal projections $t_{ip}$, shape `(basis, modes)`.
///
/// `betas[h]` is the wavevector of harmonic `h`; the lateral `offset` (m) of
/// the sheet multiplies each projection by $e^{-j\boldsymbol\beta_p\cdot\mathbf{d}}$.
pub fn modal_projections(
    cache: &mut TransformCache<'_>,
    betas: &[[f64; 2]],
    modes: usize,
    cell_area: f64,
    offset: [f64; 2],
    basis_len: usize,
) -> Array2<Complex64> {
    let norm = cell_area.sqrt().recip();
    let mut t = Array2::<Complex64>::zeros((basis_len, modes));
    for p in 0..modes {
        let beta = betas[p / 2];
        let e = mode_vector(beta, ModeKind::of(p));
        let shift = Complex64::new(0.0, -(beta[0] * offset[0] + beta[1] * offset[1])).exp() * norm;
        let transforms = cache.get(beta);
        for (i, f) in transforms.iter().enumerate() {
            t[[i, p]] = (f[0] * e[0] + f[1] * e[1]) * shift;
        }
    }
    t
}

/// Fill $Z_{ij} = \sum_p k_p t_{ip} t_{jp}^*$, where `kernel[p]` already
/// folds the taper weight into the modal factor.
pub fn assemble_interaction_matrix(
    backend: &dyn ComputeBackend,
    projections: &Array2<Complex64>,
    kernel: &[Complex64],
) -> Result<Array2<Complex64>, SolverError> {
    let n = projections.nrows();
    let fill = |i: usize, j: usize| -> Complex64 {
        let ti = projections.row(i);
        let tj = projections.row(j);
        kernel
            .iter()
            .zip(ti.iter().zip(tj.iter()))
            .map(|(k, (a, b))| k * a * b.conj())
            .sum()
    };
    Ok(backend.parallel_matrix_fill(n, n, &fill)?)
}

/// Gram matrix $\int \mathbf{f}_i\cdot\mathbf{f}_j\,d\boldsymbol\rho$ of the basis.
pub fn gram_matrix(basis: &[RwgFunction]) -> Array2<f64> {
    Array2::from_shape_fn((basis.len(), basis.len()), |(i, j)| basis[i].overlap(&basis[j]))
}
