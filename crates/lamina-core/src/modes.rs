//! Floquet mode enumeration and per-layer truncation.
//!
//! Harmonic $(m, n)$ carries the transverse wavevector
//! $\boldsymbol\beta_{mn} = \boldsymbol\beta_{00} + m\mathbf{b}_1 + n\mathbf{b}_2$
//! and two modes: TE (index $2h$) and TM (index $2h+1$). Harmonics are put in
//! a single global order by their unscanned radius $|m\mathbf{b}_1 + n\mathbf{b}_2|$,
//! and every layer carries a prefix of that order made of whole shells of
//! equal radius. Mode `p` therefore means the same field pattern in every
//! layer, which is what lets junction and propagation GSMs be diagonal.
//!
//! A layer keeps every harmonic whose attenuation over the relevant distance
//! $d$ does not yet reach `dbmin`:
//!
//! $$
//! \rho_{att} = \sqrt{\alpha_{max}^2 + (k_0\,\Re\sqrt{\varepsilon_r\mu_r})^2},
//! \qquad \alpha_{max} = \frac{\text{dbmin}}{8.686\,d}
//! $$
//!
//! Layers touching a sheet additionally resolve the mesh:
//! $\rho_{sheet} = f\,\pi/\ell_{min}$.

use log::{info, warn};
use num_complex::Complex64;

use crate::types::{AnalysisParams, Lattice, Medium, Structure};

/// Nepers to decibels.
const DB_PER_NEPER: f64 = 8.686;

/// Relative tolerance for treating two harmonic radii as the same shell.
const SHELL_TOLERANCE: f64 = 1e-9;

/// Floor on $|\gamma|$ relative to $k_0$, keeping grazing modes finite.
const GAMMA_FLOOR: f64 = 1e-9;

/// Mode polarisation within a harmonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Te,
    Tm,
}

impl ModeKind {
    pub fn of(mode: usize) -> Self {
        if mode % 2 == 0 {
            ModeKind::Te
        } else {
            ModeKind::Tm
        }
    }
}

/// One lattice harmonic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Harmonic {
    pub m: i32,
    pub n: i32,
    /// Unscanned radius $|m\mathbf{b}_1 + n\mathbf{b}_2|$ (rad/m).
    pub radius: f64,
    /// Shell index in the global order; harmonics of equal radius share it.
    pub shell: usize,
}

/// All harmonics with unscanned radius up to `limit`, in global order.
pub fn harmonic_order(lattice: &Lattice, limit: f64) -> Vec<Harmonic> {
    let (b1, b2) = lattice.reciprocal();
    let two_pi = 2.0 * std::f64::consts::PI;
    // m = (m b1 + n b2)·s1 / 2π, so |m| ≤ limit |s1| / 2π.
    let m_max = (limit * lattice.s1[0].hypot(lattice.s1[1]) / two_pi).floor() as i32;
    let n_max = (limit * lattice.s2[0].hypot(lattice.s2[1]) / two_pi).floor() as i32;
    let slack = limit * (1.0 + SHELL_TOLERANCE);

    let mut harmonics = Vec::new();
    for m in -m_max..=m_max {
        for n in -n_max..=n_max {
            let x = m as f64 * b1[0] + n as f64 * b2[0];
            let y = m as f64 * b1[1] + n as f64 * b2[1];
            let radius = x.hypot(y);
            if radius <= slack {
                harmonics.push(Harmonic { m, n, radius, shell: 0 });
            }
        }
    }
    harmonics.sort_by(|a, b| a.radius.total_cmp(&b.radius));

    let gap = SHELL_TOLERANCE * limit;
    let mut shell = 0;
    let mut shell_radius = 0.0;
    for h in harmonics.iter_mut() {
        if h.radius - shell_radius > gap {
            shell += 1;
            shell_radius = h.radius;
        }
        h.shell = shell;
    }
    harmonics.sort_by(|a, b| (a.shell, a.m, a.n).cmp(&(b.shell, b.m, b.n)));
    harmonics
}

/// Radius whose disk holds more than `cap` harmonics on any lattice.
///
/// The reciprocal cells anchored at harmonics tile the plane, so a disk of
/// `cap + 1` cells grown by one cell diameter contains at least `cap + 1`
/// anchors. Enumerating beyond it cannot change which shells survive the cap.
fn cap_radius(lattice: &Lattice, cap: usize) -> f64 {
    let (b1, b2) = lattice.reciprocal();
    let cell = 4.0 * std::f64::consts::PI * std::f64::consts::PI / lattice.area();
    let diameter = (b1[0] + b2[0]).hypot(b1[1] + b2[1]).max((b1[0] - b2[0]).hypot(b1[1] - b2[1]));
    ((cap + 1) as f64 * cell / std::f64::consts::PI).sqrt() + diameter
}

/// Mode content of a whole stack, chosen once for the sweep.
#[derive(Debug, Clone)]
pub struct ModeSpectrum {
    harmonics: Vec<Harmonic>,
    layer_harmonics: Vec<usize>,
}

impl ModeSpectrum {
    /// Choose the mode count of every layer at free-space wavenumber `k0_max`.
    pub fn select(structure: &Structure, k0_max: f64, params: &AnalysisParams) -> Self {
        let layers = structure.layers();
        let Some(lattice) = structure.lattice() else {
            info!("Stack has no sheets: every layer carries the two dominant modes");
            return Self {
                harmonics: vec![Harmonic { m: 0, n: 0, radius: 0.0, shell: 0 }],
                layer_harmonics: vec![1; layers.len()],
            };
        };

        let last = layers.len() - 1;
        let radii: Vec<f64> = (0..layers.len())
            .map(|i| {
                let d = if i == 0 {
                    if last > 1 { layers[1].width } else { 0.0 }
                } else if i == last {
                    if last > 1 { layers[last - 1].width } else { 0.0 }
                } else {
                    layers[i].width
                };
                let re_k = layers[i].medium.wavenumber(k0_max).re;
                let rho_att = if d > 0.0 {
                    let alpha = params.dbmin / (DB_PER_NEPER * d);
                    alpha.hypot(re_k)
                } else {
                    re_k
                };

                let mut rho_sheet: f64 = 0.0;
                for j in [i.checked_sub(1), (i < last).then_some(i)].into_iter().flatten() {
                    if let Some(placement) = structure.junctions()[j] {
                        let sheet = structure.sheet(placement.sheet);
                        if let (false, Some(l_min)) = (sheet.is_inert(), sheet.min_edge_length()) {
                            rho_sheet = rho_sheet.max(params.sheet_mode_factor * std::f64::consts::PI / l_min);
                        }
                    }
                }
                rho_att.max(rho_sheet)
            })
            .collect();

        let cap = (params.max_modes / 2).max(1);
        let limit = radii
            .iter()
            .copied()
            .fold(0.0, f64::max)
            .min(cap_radius(lattice, cap));
        let mut harmonics = harmonic_order(lattice, limit);

        if harmonics.len() > cap {
            // Keep whole shells only.
            let cut_shell = harmonics[cap].shell;
            let keep = harmonics.iter().take_while(|h| h.shell < cut_shell).count().max(1);
            warn!(
                "Mode limit {} reached: truncating from {} to {} harmonics",
                params.max_modes,
                harmonics.len(),
                keep
            );
            harmonics.truncate(keep);
        }

        let layer_harmonics: Vec<usize> = radii
            .iter()
            .map(|&rho| {
                let slack = rho * (1.0 + SHELL_TOLERANCE);
                harmonics.iter().take_while(|h| h.radius <= slack).count().max(1)
            })
            .collect();

        for (i, count) in layer_harmonics.iter().enumerate() {
            info!("Layer {i}: {} modes ({} harmonics)", 2 * count, count);
        }

        Self {
            harmonics,
            layer_harmonics,
        }
    }

    pub fn harmonics(&self) -> &[Harmonic] {
        &self.harmonics
    }

    /// Number of modes carried by layer `i`.
    pub fn layer_modes(&self, i: usize) -> usize {
        2 * self.layer_harmonics[i]
    }

    /// Modes carried by every layer, in stack order.
    pub fn mode_counts(&self) -> Vec<usize> {
        self.layer_harmonics.iter().map(|h| 2 * h).collect()
    }

    /// Largest mode count in the stack.
    pub fn total_modes(&self) -> usize {
        2 * self.harmonics.len()
    }

    /// Scanned transverse wavevector of every harmonic.
    pub fn transverse_wavevectors(&self, lattice: Option<&Lattice>, beta00: [f64; 2]) -> Vec<[f64; 2]> {
        let Some(lattice) = lattice else {
            return vec![beta00];
        };
        let (b1, b2) = lattice.reciprocal();
        self.harmonics
            .iter()
            .map(|h| {
                let (m, n) = (h.m as f64, h.n as f64);
                [
                    beta00[0] + m * b1[0] + n * b2[0],
                    beta00[1] + m * b1[1] + n * b2[1],
                ]
            })
            .collect()
    }
}

/// Transverse unit vector of a mode. TM modes point along $\hat{\boldsymbol\beta}$,
/// TE modes along $\hat{\mathbf{z}}\times\hat{\boldsymbol\beta}$; $\hat{\boldsymbol\beta} = \hat{\mathbf{x}}$
/// when $\boldsymbol\beta = 0$.
pub fn mode_vector(beta: [f64; 2], kind: ModeKind) -> [f64; 2] {
    let norm = beta[0].hypot(beta[1]);
    let unit = if norm > 0.0 {
        [beta[0] / norm, beta[1] / norm]
    } else {
        [1.0, 0.0]
    };
    match kind {
        ModeKind::Tm => unit,
        ModeKind::Te => [-unit[1], unit[0]],
    }
}

/// Propagation constants and admittances of every mode in one layer.
#[derive(Debug, Clone)]
pub struct LayerModes {
    /// $\gamma_p = \sqrt{|\boldsymbol\beta_p|^2 - k^2}$, principal branch.
    pub gamma: Vec<Complex64>,
    /// Normalised modal admittance.
    pub admittance: Vec<Complex64>,
}

impl LayerModes {
    /// Evaluate all modes of `betas` (one wavevector per harmonic) in `medium`.
    pub fn new(medium: &Medium, k0: f64, betas: &[[f64; 2]]) -> Self {
        let k2 = medium.epsilon * medium.mu * (k0 * k0);
        let floor = GAMMA_FLOOR * k0;
        let mut gamma = Vec::with_capacity(2 * betas.len());
        let mut admittance = Vec::with_capacity(2 * betas.len());
        for beta in betas {
            let b2 = beta[0] * beta[0] + beta[1] * beta[1];
            let mut g = (Complex64::new(b2, 0.0) - k2).sqrt();
            if g.norm() < floor {
                g = Complex64::new(floor, 0.0);
            }
            let j_k0 = Complex64::new(0.0, k0);
            // TE then TM.
            gamma.push(g);
            admittance.push(g / (j_k0 * medium.mu));
            gamma.push(g);
            admittance.push(j_k0 * medium.epsilon / g);
        }
        Self { gamma, admittance }
    }

    /// Whether the dominant harmonic propagates ($|\boldsymbol\beta_{00}| < \Re k$).
    pub fn dominant_propagates(medium: &Medium, k0: f64, beta00: [f64; 2]) -> bool {
        beta00[0].hypot(beta00[1]) < medium.wavenumber(k0).re
    }
}

/// Mode data at one junction, as handed to a sheet solver.
#[derive(Debug, Clone, Copy)]
pub struct JunctionModes<'a> {
    pub k0: f64,
    /// Scanned wavevector of every harmonic in the spectrum.
    pub betas: &'a [[f64; 2]],
    /// Harmonic table, aligned with `betas`.
    pub harmonics: &'a [Harmonic],
    pub left: &'a LayerModes,
    pub right: &'a LayerModes,
    pub n_left: usize,
    pub n_right: usize,
}
