//! Modal (TE/TM) to physical (H/V, R/L) polarisation bases.
//!
//! The dominant TE and TM modes of a half-space are the 3-D unit vectors
//!
//! $$
//! \hat{\mathbf{e}}_{TE} = \hat{\mathbf{z}}\times\hat{\boldsymbol\beta}, \qquad
//! \hat{\mathbf{e}}_{TM} = \cos\theta\,\hat{\boldsymbol\beta} - s\sin\theta\,\hat{\mathbf{z}}
//! $$
//!
//! for a wave travelling along $s\hat{\mathbf{z}}$ ($s = \pm 1$) at elevation
//! $\theta$. The physical basis follows Ludwig's third definition,
//!
//! $$
//! \hat{\mathbf{h}} = \cos\phi\,\hat{\mathbf{e}}_{TM} - \sin\phi\,\hat{\mathbf{e}}_{TE}, \qquad
//! \hat{\mathbf{v}} = \sin\phi\,\hat{\mathbf{e}}_{TM} + \cos\phi\,\hat{\mathbf{e}}_{TE}
//! $$
//!
//! with circular vectors $\hat{\mathbf{r}}, \hat{\mathbf{l}} = (\hat{\mathbf{h}} \mp js\,\hat{\mathbf{v}})/\sqrt{2}$.
//! At normal incidence $\phi = 0$ and $\hat{\mathbf{h}} = \hat{\mathbf{x}}$.
//!
//! The change of basis $P_{k,m} = \hat{\mathbf{u}}_k^{*}\cdot\hat{\mathbf{e}}_m$ is
//! unitary, so incident physical amplitudes map back to modal ones through
//! $\mathbf{P}^H$.

use num_complex::Complex64;

use crate::types::PointResult;

/// Physical polarisation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarization {
    Horizontal,
    Vertical,
    RightCircular,
    LeftCircular,
}

/// Which half-space a wave lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Region 1, port 1 of the stack.
    First,
    /// Region N, port 2 of the stack.
    Last,
}

/// Whether a wave is incident on the stack or scattered by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Source,
    Observation,
}

impl Region {
    /// Region for a 1-based port number.
    pub fn from_port(port: usize) -> Option<Self> {
        match port {
            1 => Some(Region::First),
            2 => Some(Region::Last),
            _ => None,
        }
    }

    /// Direction of travel along z: sources in region 1 and scattered waves
    /// in region N move towards +z.
    fn direction(self, role: Role) -> f64 {
        match (self, role) {
            (Region::First, Role::Source) | (Region::Last, Role::Observation) => 1.0,
            (Region::First, Role::Observation) | (Region::Last, Role::Source) => -1.0,
        }
    }
}

type Vec3 = [Complex64; 3];

fn real3(v: [f64; 3]) -> Vec3 {
    v.map(|x| Complex64::new(x, 0.0))
}

fn comb(a: Complex64, u: &Vec3, b: Complex64, w: &Vec3) -> Vec3 {
    [a * u[0] + b * w[0], a * u[1] + b * w[1], a * u[2] + b * w[2]]
}

/// Conjugated dot product $\mathbf{u}^{*}\cdot\mathbf{w}$.
fn cdot(u: &Vec3, w: &Vec3) -> Complex64 {
    u.iter().zip(w.iter()).map(|(a, b)| a.conj() * b).sum()
}

/// Change of basis from [TE, TM] to a physical pair for one wave.
#[derive(Debug, Clone, Copy)]
pub struct PolarizationBasis {
    te: Vec3,
    tm: Vec3,
    h: Vec3,
    v: Vec3,
    r: Vec3,
    l: Vec3,
}

impl PolarizationBasis {
    /// Basis of the dominant wave in `region` with role `role`.
    pub fn new(result: &PointResult, region: Region, role: Role) -> Self {
        let medium = match region {
            Region::First => &result.region1.medium,
            Region::Last => &result.region_n.medium,
        };
        let beta = result.beta00;
        let bt = beta[0].hypot(beta[1]);
        let kn = result.k0() * medium.real_index();
        let sin_t = if kn > 0.0 { (bt / kn).min(1.0) } else { 0.0 };
        let cos_t = (1.0 - sin_t * sin_t).sqrt();
        let phi = if bt > 0.0 { beta[1].atan2(beta[0]) } else { 0.0 };
        Self::from_angles(sin_t, cos_t, phi, region.direction(role))
    }

    fn from_angles(sin_t: f64, cos_t: f64, phi: f64, s: f64) -> Self {
        let (sin_p, cos_p) = phi.sin_cos();
        let te = real3([-sin_p, cos_p, 0.0]);
        let tm = real3([cos_t * cos_p, cos_t * sin_p, -s * sin_t]);
        let one = Complex64::new(1.0, 0.0);
        let h = comb(cos_p * one, &tm, -sin_p * one, &te);
        let v = comb(sin_p * one, &tm, cos_p * one, &te);
        let k = std::f64::consts::FRAC_1_SQRT_2;
        let r = comb(k * one, &h, Complex64::new(0.0, -s * k), &v);
        let l = comb(k * one, &h, Complex64::new(0.0, s * k), &v);
        Self { te, tm, h, v, r, l }
    }

    fn vector(&self, pol: Polarization) -> &Vec3 {
        match pol {
            Polarization::Horizontal => &self.h,
            Polarization::Vertical => &self.v,
            Polarization::RightCircular => &self.r,
            Polarization::LeftCircular => &self.l,
        }
    }

    /// Row of $\mathbf{P}$ for `pol`: the physical amplitude is
    /// `row[0] * a_TE + row[1] * a_TM`.
    pub fn row(&self, pol: Polarization) -> [Complex64; 2] {
        let u = self.vector(pol);
        [cdot(u, &self.te), cdot(u, &self.tm)]
    }

    /// Modal amplitudes [TE, TM] of a unit wave of polarisation `pol`
    /// (a column of $\mathbf{P}^H$).
    pub fn column(&self, pol: Polarization) -> [Complex64; 2] {
        let row = self.row(pol);
        [row[0].conj(), row[1].conj()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    type Mat2 = [[Complex64; 2]; 2];

    fn matrix(basis: &PolarizationBasis, circular: bool) -> Mat2 {
        if circular {
            [basis.row(Polarization::RightCircular), basis.row(Polarization::LeftCircular)]
        } else {
            [basis.row(Polarization::Horizontal), basis.row(Polarization::Vertical)]
        }
    }

    fn mul(a: &Mat2, b: &Mat2) -> Mat2 {
        let mut out = [[Complex64::new(0.0, 0.0); 2]; 2];
        for i in 0..2 {
            for j in 0..2 {
                out[i][j] = a[i][0] * b[0][j] + a[i][1] * b[1][j];
            }
        }
        out
    }

    fn adjoint(a: &Mat2) -> Mat2 {
        [
            [a[0][0].conj(), a[1][0].conj()],
            [a[0][1].conj(), a[1][1].conj()],
        ]
    }

    fn assert_unitary(p: &Mat2) {
        let id = mul(p, &adjoint(p));
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(id[i][j].re, expected, epsilon = 1e-12);
                assert_abs_diff_eq!(id[i][j].im, 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_normal_incidence_reference_direction() {
        let basis = PolarizationBasis::from_angles(0.0, 1.0, 0.0, 1.0);
        // H is x̂, which is the TM direction at normal incidence.
        let h = basis.row(Polarization::Horizontal);
        assert_abs_diff_eq!(h[0].norm(), 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(h[1].re, 1.0, epsilon = 1e-15);
        let v = basis.row(Polarization::Vertical);
        assert_abs_diff_eq!(v[0].re, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_bases_are_unitary_at_oblique_incidence() {
        let (sin_t, cos_t) = 0.6_f64.sin_cos();
        for s in [1.0, -1.0] {
            let basis = PolarizationBasis::from_angles(sin_t, cos_t, 0.9, s);
            assert_unitary(&matrix(&basis, false));
            assert_unitary(&matrix(&basis, true));
        }
    }

    #[test]
    fn test_column_undoes_row() {
        let (sin_t, cos_t) = 0.3_f64.sin_cos();
        let basis = PolarizationBasis::from_angles(sin_t, cos_t, -2.1, -1.0);
        for pair in [
            [Polarization::Horizontal, Polarization::Vertical],
            [Polarization::RightCircular, Polarization::LeftCircular],
        ] {
            for a in pair {
                for b in pair {
                    let (row, col) = (basis.row(a), basis.column(b));
                    let z = row[0] * col[0] + row[1] * col[1];
                    let expected = if a == b { 1.0 } else { 0.0 };
                    assert_abs_diff_eq!((z - expected).norm(), 0.0, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_circular_handedness_flips_with_direction() {
        let forward = PolarizationBasis::from_angles(0.0, 1.0, 0.0, 1.0);
        let backward = PolarizationBasis::from_angles(0.0, 1.0, 0.0, -1.0);
        let rf = forward.row(Polarization::RightCircular);
        let lb = backward.row(Polarization::LeftCircular);
        assert_abs_diff_eq!((rf[0] - lb[0]).norm(), 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!((rf[1] - lb[1]).norm(), 0.0, epsilon = 1e-15);
    }
}
