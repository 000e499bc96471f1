//! Derived quantities of a [`PointResult`].
//!
//! Entries are addressed by a (observation port, source port) pair, 1-based
//! as in $S_{21}$, and a (row, column) pair of [`ModeAddr`]s. A raw address
//! reads the GSM directly; a polarisation tag applies the basis change of
//! the dominant modes on that side only, so mixed addressing such as
//! $S_{21}(\text{TE}, R)$ is allowed.

use num_complex::Complex64;
use thiserror::Error;

use crate::polarization::{Polarization, PolarizationBasis, Region, Role};
use crate::types::PointResult;

/// Errors raised by the query surface and the output catalog.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Port {0} does not exist (expected 1 or 2)")]
    PortOutOfRange(usize),

    #[error("Mode {index} is not carried at port {port} ({available} modes)")]
    ModeOutOfRange {
        port: usize,
        index: usize,
        available: usize,
    },

    #[error("Unknown output '{0}'")]
    UnknownOutput(String),

    #[error("Malformed output '{name}': {reason}")]
    Malformed { name: String, reason: String },
}

/// A mode address: a raw 0-based mode index or a physical polarisation of
/// the dominant harmonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeAddr {
    Raw(usize),
    H,
    V,
    R,
    L,
}

impl ModeAddr {
    pub const TE: ModeAddr = ModeAddr::Raw(0);
    pub const TM: ModeAddr = ModeAddr::Raw(1);

    /// Weighted modes this address touches at a port carrying `available`
    /// modes. `basis` supplies the dominant-mode weights of a polarisation.
    fn weights(
        self,
        port: usize,
        available: usize,
        basis: impl FnOnce(Polarization) -> [Complex64; 2],
    ) -> Result<Vec<(usize, Complex64)>, ExtractError> {
        let pol = match self {
            ModeAddr::Raw(index) => {
                if index >= available {
                    return Err(ExtractError::ModeOutOfRange { port, index, available });
                }
                return Ok(vec![(index, Complex64::new(1.0, 0.0))]);
            }
            ModeAddr::H => Polarization::Horizontal,
            ModeAddr::V => Polarization::Vertical,
            ModeAddr::R => Polarization::RightCircular,
            ModeAddr::L => Polarization::LeftCircular,
        };
        if available < 2 {
            return Err(ExtractError::ModeOutOfRange { port, index: 1, available });
        }
        let w = basis(pol);
        Ok(vec![(0, w[0]), (1, w[1])])
    }
}

/// Scalar view of a complex entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Magnitude,
    /// $20\log_{10}|s|$.
    Db,
    /// Phase in degrees.
    Phase,
    Re,
    Im,
}

impl Quantity {
    pub fn apply(self, z: Complex64) -> f64 {
        match self {
            Quantity::Magnitude => z.norm(),
            Quantity::Db => 20.0 * z.norm().log10(),
            Quantity::Phase => z.arg().to_degrees(),
            Quantity::Re => z.re,
            Quantity::Im => z.im,
        }
    }
}

fn region(port: usize) -> Result<Region, ExtractError> {
    Region::from_port(port).ok_or(ExtractError::PortOutOfRange(port))
}

/// Complex GSM entry $S_{ij}(\text{row}, \text{col})$.
pub fn s_param(
    result: &PointResult,
    i: usize,
    j: usize,
    row: ModeAddr,
    col: ModeAddr,
) -> Result<Complex64, ExtractError> {
    let obs_region = region(i)?;
    let src_region = region(j)?;
    let block = result
        .gsm
        .block(i, j)
        .ok_or(ExtractError::PortOutOfRange(i.max(j)))?;
    let rows = row.weights(i, block.nrows(), |pol| {
        PolarizationBasis::new(result, obs_region, Role::Observation).row(pol)
    })?;
    let cols = col.weights(j, block.ncols(), |pol| {
        PolarizationBasis::new(result, src_region, Role::Source).column(pol)
    })?;

    Ok(rows
        .iter()
        .flat_map(|&(p, wp)| cols.iter().map(move |&(q, wq)| wp * block[[p, q]] * wq))
        .sum())
}

/// A scalar view of $S_{ij}(\text{row}, \text{col})$.
pub fn quantity(
    result: &PointResult,
    i: usize,
    j: usize,
    row: ModeAddr,
    col: ModeAddr,
    q: Quantity,
) -> Result<f64, ExtractError> {
    Ok(q.apply(s_param(result, i, j, row, col)?))
}

/// Differential insertion loss (dB) between the co-polar entries of `a`
/// and `b`: $20\log_{10}|S_{ij}(a,a)| - 20\log_{10}|S_{ij}(b,b)|$.
pub fn differential_db(
    result: &PointResult,
    i: usize,
    j: usize,
    a: ModeAddr,
    b: ModeAddr,
) -> Result<f64, ExtractError> {
    let sa = s_param(result, i, j, a, a)?;
    let sb = s_param(result, i, j, b, b)?;
    Ok(Quantity::Db.apply(sa) - Quantity::Db.apply(sb))
}

/// Differential insertion phase (degrees): $\arg(S_{ij}(a,a)/S_{ij}(b,b))$.
pub fn differential_phase(
    result: &PointResult,
    i: usize,
    j: usize,
    a: ModeAddr,
    b: ModeAddr,
) -> Result<f64, ExtractError> {
    let sa = s_param(result, i, j, a, a)?;
    let sb = s_param(result, i, j, b, b)?;
    Ok((sa / sb).arg().to_degrees())
}

/// Axial ratio (dB) of the wave scattered into port `i` when port `j` is
/// driven with polarisation `pol`.
///
/// From the linear components $E_H, E_V$ the modified ratio gives
/// $a = E_H + jE_V$, $b = E_H - jE_V$ and
/// $AR = (|a| + |b|)/\big||a| - |b|\big|$. A linearly polarised wave has
/// infinite axial ratio.
pub fn axial_ratio_db(
    result: &PointResult,
    i: usize,
    j: usize,
    pol: ModeAddr,
) -> Result<f64, ExtractError> {
    let eh = s_param(result, i, j, ModeAddr::H, pol)?;
    let ev = s_param(result, i, j, ModeAddr::V, pol)?;
    let jv = Complex64::new(0.0, 1.0) * ev;
    let a = (eh + jv).norm();
    let b = (eh - jv).norm();
    let den = (a - b).abs();
    if den == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(20.0 * ((a + b) / den).log10())
}

/// Elevation angle (degrees) of the incident wave in region 1, or NaN for
/// phase-shift scans beyond the visible region.
pub fn theta_deg(result: &PointResult) -> f64 {
    let kn = result.k0() * result.region1.medium.real_index();
    let bt = result.beta00[0].hypot(result.beta00[1]);
    (bt / kn).asin().to_degrees()
}

/// Azimuth (degrees) of the dominant transverse wavevector.
pub fn phi_deg(result: &PointResult) -> f64 {
    let b = result.beta00;
    if b[0] == 0.0 && b[1] == 0.0 {
        return 0.0;
    }
    b[1].atan2(b[0]).to_degrees()
}

/// Inter-element phase shifts $\psi_i = \boldsymbol\beta_{00}\cdot\mathbf{s}_i$
/// (degrees), NaN for a structure without a lattice.
pub fn phase_shifts_deg(result: &PointResult) -> [f64; 2] {
    match result.lattice {
        Some(l) => {
            let b = result.beta00;
            [
                (b[0] * l.s1[0] + b[1] * l.s1[1]).to_degrees(),
                (b[0] * l.s2[0] + b[1] * l.s2[1]).to_degrees(),
            ]
        }
        None => [f64::NAN; 2],
    }
}
