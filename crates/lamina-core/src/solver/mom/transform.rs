//! Memo table for basis-function spectral transforms.
//!
//! Within one sheet solve the same transverse wavevector is needed for the
//! TE and TM modes of a harmonic, and for both bounding regions (which share
//! the Floquet wavevectors). Transforms are cached per wavevector with
//! approximate equality: two wavevectors closer than the tolerance share one
//! entry. The table lives for a single solve and is never shared.

use std::collections::HashMap;

use lamina_geometry::RwgFunction;
use num_complex::Complex64;

/// Cached $\mathbf{F}_i(\boldsymbol\beta)$ for every basis function.
pub struct TransformCache<'a> {
    basis: &'a [RwgFunction],
    tolerance: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
    keys: Vec<[f64; 2]>,
    values: Vec<Vec<[Complex64; 2]>>,
    hits: usize,
}

impl<'a> TransformCache<'a> {
    /// `tolerance` is the absolute wavevector distance (rad/m) below which two
    /// wavevectors are treated as equal.
    pub fn new(basis: &'a [RwgFunction], tolerance: f64) -> Self {
        Self {
            basis,
            tolerance,
            cells: HashMap::new(),
            keys: Vec::new(),
            values: Vec::new(),
            hits: 0,
        }
    }

    fn cell(&self, beta: [f64; 2]) -> (i64, i64) {
        if self.tolerance > 0.0 {
            (
                (beta[0] / self.tolerance).round() as i64,
                (beta[1] / self.tolerance).round() as i64,
            )
        } else {
            (beta[0].to_bits() as i64, beta[1].to_bits() as i64)
        }
    }

    fn find(&self, beta: [f64; 2]) -> Option<usize> {
        let (cx, cy) = self.cell(beta);
        let reach: i64 = if self.tolerance > 0.0 { 1 } else { 0 };
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                let Some(entries) = self.cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &idx in entries {
                    let k = self.keys[idx];
                    if (k[0] - beta[0]).hypot(k[1] - beta[1]) <= self.tolerance {
                        return Some(idx);
                    }
                }
            }
        }
        None
    }

    /// Transforms of every basis function at `beta`, computing them on a miss.
    pub fn get(&mut self, beta: [f64; 2]) -> &[[Complex64; 2]] {
        let idx = match self.find(beta) {
            Some(idx) => {
                self.hits += 1;
                idx
            }
            None => {
                let values = self.basis.iter().map(|f| f.spectral_transform(beta)).collect();
                let cell = self.cell(beta);
                self.keys.push(beta);
                self.values.push(values);
                let idx = self.keys.len() - 1;
                self.cells.entry(cell).or_default().push(idx);
                idx
            }
        };
        &self.values[idx]
    }

    /// Number of distinct wavevectors transformed so far.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of lookups served from the table.
    pub fn hits(&self) -> usize {
        self.hits
    }
}
