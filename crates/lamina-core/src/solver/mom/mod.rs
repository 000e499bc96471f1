//! Spectral-domain method of moments for periodic sheets.
//!
//! The unknown on the sheet (electric current on conducting patches, or the
//! tangential field in apertures of a conducting screen) is expanded in RWG
//! functions $\mathbf{f}_i$ and tested with the same functions. Every Floquet
//! mode carried by either bounding layer enters the interaction matrix
//! through its projections $t_{ip}$ (see [`assembly`]).
//!
//! # Excitation and scattering
//!
//! The sheet is solved on top of a baseline GSM: the bare dielectric junction
//! for impedance-type sheets and a perfectly conducting screen for
//! admittance-type sheets. For incident mode $q$ the baseline fixes the
//! tangential field (impedance type) or magnetic field (admittance type) at
//! the sheet plane,
//!
//! $$
//! c^{J}_q = \frac{1 + S^{b}_{qq}}{\sqrt{Y_q}}, \qquad
//! c^{M}_q = \sqrt{Y_q}\,(1 - S^{b}_{qq})
//! $$
//!
//! giving the right-hand side $e_i = c_q\,t_{iq}$. The interaction matrix is
//! factored once and solved for every incident mode of both ports. The
//! solved coefficients $a_j$ radiate into observation mode $p$ through
//! $V_p = \sum_j t_{jp}^{*} a_j$:
//!
//! $$
//! \Delta S^{J}_{pq} = -\frac{\sqrt{Y^{s}_p}\,V_p}{Y^{L}_p + Y^{R}_p}, \qquad
//! \Delta S^{M}_{pq} = +\sqrt{Y^{s}_p}\,V_p
//! $$
//!
//! where $s$ is the side of the observation port.

pub mod assembly;
pub mod greens;
pub mod transform;

use std::sync::Arc;

use lamina_compute::{ComputeBackend, SerialBackend};
use log::debug;
use ndarray::Array2;
use num_complex::Complex64;

use super::direct::LuFactor;
use super::{SheetSolver, SolverError};
use crate::gsm::Gsm;
use crate::modes::JunctionModes;
use crate::types::{AnalysisParams, Sheet, SheetClass, ETA0};

use transform::TransformCache;

/// The method-of-moments sheet solver.
pub struct MomSolver {
    /// Taper width as a fraction of the shortest reciprocal vector.
    pub smoothing_fraction: f64,
    /// Relative tolerance for sharing spectral transforms.
    pub transform_tolerance: f64,
    backend: Arc<dyn ComputeBackend>,
}

impl Default for MomSolver {
    fn default() -> Self {
        Self::new(&AnalysisParams::default())
    }
}

impl MomSolver {
    pub fn new(params: &AnalysisParams) -> Self {
        Self {
            smoothing_fraction: params.smoothing_fraction,
            transform_tolerance: params.transform_tolerance,
            backend: Arc::new(SerialBackend),
        }
    }

    /// Fill interaction matrices on `backend` instead of the calling thread.
    pub fn with_backend(mut self, backend: Arc<dyn ComputeBackend>) -> Self {
        self.backend = backend;
        self
    }
}

impl SheetSolver for MomSolver {
    fn junction_gsm(
        &self,
        sheet: &Sheet,
        offset: [f64; 2],
        modes: &JunctionModes<'_>,
    ) -> Result<Gsm, SolverError> {
        let (n_left, n_right) = (modes.n_left, modes.n_right);
        let yl = &modes.left.admittance;
        let yr = &modes.right.admittance;
        let blind = Gsm::junction(yl, yr, n_left, n_right);

        let mut gsm = match sheet.class {
            SheetClass::Inert => return Ok(blind),
            SheetClass::Impedance => blind.clone(),
            SheetClass::Admittance => Gsm::short(n_left, n_right),
        };

        let basis = sheet.basis();
        if basis.is_empty() {
            return Err(SolverError::DimensionMismatch(format!(
                "sheet '{}' has no basis functions",
                sheet.name
            )));
        }
        let lattice = &sheet.lattice;
        let n_modes = n_left.max(n_right);
        let b_min = lattice.min_reciprocal_length();

        let mut cache = TransformCache::new(basis, self.transform_tolerance * b_min);
        let t = assembly::modal_projections(
            &mut cache,
            modes.betas,
            n_modes,
            lattice.area(),
            offset,
            basis.len(),
        );
        debug!(
            "Sheet '{}': {} basis functions, {} modes, {} distinct transforms",
            sheet.name,
            basis.len(),
            n_modes,
            cache.len()
        );

        let weights = greens::smoothing_weights(
            modes.harmonics,
            n_modes / 2,
            self.smoothing_fraction * b_min,
        );
        let kernel: Vec<Complex64> = (0..n_modes)
            .map(|p| weights[p / 2] * greens::modal_factor(sheet.class, yl[p], yr[p]))
            .collect();

        let mut z = assembly::assemble_interaction_matrix(self.backend.as_ref(), &t, &kernel)?;
        if sheet.class == SheetClass::Impedance && sheet.surface_resistance != 0.0 {
            let gram = assembly::gram_matrix(basis);
            let rs = sheet.surface_resistance / ETA0;
            z.zip_mut_with(&gram, |zij, g| *zij += rs * g);
        }
        let lu = LuFactor::new(&z)?;

        // One right-hand side per incident mode: port 1 first, then port 2.
        let coefficient = |q: usize, left: bool| -> Complex64 {
            let (y, s) = if left {
                (yl[q], gsm.s11[[q, q]])
            } else {
                (yr[q], gsm.s22[[q, q]])
            };
            match sheet.class {
                SheetClass::Admittance => y.sqrt() * (1.0 - s),
                _ => (1.0 + s) / y.sqrt(),
            }
        };
        let columns: Vec<(usize, bool)> = (0..n_left)
            .map(|q| (q, true))
            .chain((0..n_right).map(|q| (q, false)))
            .collect();
        let rhs = Array2::from_shape_fn((basis.len(), columns.len()), |(i, c)| {
            let (q, left) = columns[c];
            coefficient(q, left) * t[[i, q]]
        });
        let currents = lu.solve(&rhs)?;

        // V = T^H A
        let v = t.t().mapv(|z| z.conj()).dot(&currents);

        for (c, &(q, left)) in columns.iter().enumerate() {
            for p in 0..n_modes {
                let vp = v[[p, c]];
                let delta = |y_side: Complex64| match sheet.class {
                    SheetClass::Admittance => y_side.sqrt() * vp,
                    _ => -y_side.sqrt() * vp / (yl[p] + yr[p]),
                };
                if p < n_left {
                    let d = delta(yl[p]);
                    if left {
                        gsm.s11[[p, q]] += d;
                    } else {
                        gsm.s12[[p, q]] += d;
                    }
                }
                if p < n_right {
                    let d = delta(yr[p]);
                    if left {
                        gsm.s21[[p, q]] += d;
                    } else {
                        gsm.s22[[p, q]] += d;
                    }
                }
            }
        }

        Ok(gsm)
    }

    fn method_name(&self) -> &str {
        "Spectral method of moments (RWG)"
    }
}
