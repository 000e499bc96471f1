//! Spectral Green's function of a sheet junction.
//!
//! In the Floquet basis the junction Green's function is diagonal: mode `p`
//! couples a surface current to the transverse electric field through the
//! parallel admittance of the two half-spaces seen from the sheet,
//!
//! $$
//! \tilde{G}^{J}_p = \frac{1}{Y^{L}_p + Y^{R}_p}, \qquad
//! \tilde{G}^{M}_p = Y^{L}_p + Y^{R}_p
//! $$
//!
//! for electric currents on conducting patches ($J$) and for aperture
//! fields in a conducting screen ($M$) respectively. The truncated series is
//! accelerated with a raised-cosine taper over its outermost band.

use num_complex::Complex64;

use crate::modes::Harmonic;
use crate::types::SheetClass;

/// Modal Green's function factor $\tilde G_p$ for a sheet of class `class`.
pub fn modal_factor(class: SheetClass, y_left: Complex64, y_right: Complex64) -> Complex64 {
    let y = y_left + y_right;
    match class {
        SheetClass::Admittance => y,
        SheetClass::Impedance | SheetClass::Inert => y.inv(),
    }
}

/// Raised-cosine weights for the first `count` harmonics.
///
/// `taper_width` is the width $\eta$ of the roll-off band. Harmonics with
/// unscanned radius at most $\rho_{max} - \eta$ get weight one, the band up
/// to $\rho_{max}$ rolls off to zero, and the (0,0) harmonic is never
/// tapered.
pub fn smoothing_weights(harmonics: &[Harmonic], count: usize, taper_width: f64) -> Vec<f64> {
    let used = &harmonics[..count.min(harmonics.len())];
    let rho_max = used.iter().map(|h| h.radius).fold(0.0, f64::max);
    let knee = rho_max - taper_width;
    used.iter()
        .map(|h| {
            if (h.m == 0 && h.n == 0) || taper_width <= 0.0 || h.radius <= knee {
                1.0
            } else {
                let x = ((h.radius - knee) / taper_width).min(1.0);
                0.5 * (1.0 + (std::f64::consts::PI * x).cos())
            }
        })
        .collect()
}
