//! Rao–Wilton–Glisson (RWG) basis functions.
//!
//! Each interior edge $e$ of a unit-cell mesh, shared by triangles $T^+$ and
//! $T^-$, carries one basis function
//!
//! $$
//! \mathbf{f}(\boldsymbol\rho) =
//! \begin{cases}
//! \dfrac{\ell}{2A^+}(\boldsymbol\rho - \mathbf{p}^+) & \boldsymbol\rho \in T^+ \\[4pt]
//! \dfrac{\ell}{2A^-}(\mathbf{p}^- - \boldsymbol\rho) & \boldsymbol\rho \in T^-
//! \end{cases}
//! $$
//!
//! where $\ell$ is the edge length and $\mathbf{p}^\pm$ the free vertices.
//! The normal component across $e$ is continuous and equal to one, so the
//! expansion is free of line charges on interior edges. Boundary edges carry
//! no function, which enforces zero normal current at the element rim.

use num_complex::Complex64;

use crate::mesh::UnitCellMesh;

/// 7-point Dunavant rule (degree 5): barycentric coordinates and weights.
const DUNAVANT7: [([f64; 3], f64); 7] = [
    ([1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0], 0.225),
    ([0.059_715_871_789_770, 0.470_142_064_105_115, 0.470_142_064_105_115], 0.132_394_152_788_506),
    ([0.470_142_064_105_115, 0.059_715_871_789_770, 0.470_142_064_105_115], 0.132_394_152_788_506),
    ([0.470_142_064_105_115, 0.470_142_064_105_115, 0.059_715_871_789_770], 0.132_394_152_788_506),
    ([0.797_426_985_353_087, 0.101_286_507_323_456, 0.101_286_507_323_456], 0.125_939_180_544_827),
    ([0.101_286_507_323_456, 0.797_426_985_353_087, 0.101_286_507_323_456], 0.125_939_180_544_827),
    ([0.101_286_507_323_456, 0.101_286_507_323_456, 0.797_426_985_353_087], 0.125_939_180_544_827),
];

/// Largest phase excursion (radians) of the spectral kernel across one
/// quadrature sub-triangle before it is split further.
const MAX_PHASE_PER_CELL: f64 = 1.0;

/// One triangle of an RWG function.
#[derive(Debug, Clone)]
pub struct RwgHalf {
    /// Index of the triangle in the parent mesh.
    pub triangle: usize,
    /// Triangle vertices (m).
    pub vertices: [[f64; 2]; 3],
    /// Vertex opposite the shared edge (m).
    pub free_vertex: [f64; 2],
    /// Triangle area (m²).
    pub area: f64,
    /// +1 on $T^+$, −1 on $T^-$.
    pub sign: f64,
}

impl RwgHalf {
    fn coefficient(&self, length: f64) -> f64 {
        self.sign * length / (2.0 * self.area)
    }

    fn diameter(&self) -> f64 {
        let [a, b, c] = self.vertices;
        let d = |p: [f64; 2], q: [f64; 2]| (p[0] - q[0]).hypot(p[1] - q[1]);
        d(a, b).max(d(b, c)).max(d(c, a))
    }
}

/// An RWG basis function attached to one interior mesh edge.
#[derive(Debug, Clone)]
pub struct RwgFunction {
    /// Node indices of the shared edge.
    pub edge: [usize; 2],
    /// Edge length (m).
    pub length: f64,
    /// $T^+$ then $T^-$.
    pub halves: [RwgHalf; 2],
}

/// Build one RWG function per interior edge of `mesh`, in edge order.
pub fn build_rwg(mesh: &UnitCellMesh) -> Vec<RwgFunction> {
    mesh.edges()
        .into_iter()
        .filter(|e| e.triangles.len() == 2)
        .map(|e| {
            let half = |t: usize, sign: f64| {
                let tri = mesh.triangles()[t];
                let free = tri
                    .iter()
                    .copied()
                    .find(|n| !e.nodes.contains(n))
                    .unwrap_or(tri[0]);
                RwgHalf {
                    triangle: t,
                    vertices: mesh.triangle_vertices(t),
                    free_vertex: mesh.nodes()[free],
                    area: mesh.triangle_area(t),
                    sign,
                }
            };
            RwgFunction {
                edge: e.nodes,
                length: mesh.edge_length(e.nodes),
                halves: [half(e.triangles[0], 1.0), half(e.triangles[1], -1.0)],
            }
        })
        .collect()
}

impl RwgFunction {
    /// Evaluate the vector function at `point`, taken to lie in half `half`
    /// (0 for $T^+$, 1 for $T^-$).
    pub fn value_in_half(&self, half: usize, point: [f64; 2]) -> [f64; 2] {
        let h = &self.halves[half];
        let c = h.coefficient(self.length);
        [c * (point[0] - h.free_vertex[0]), c * (point[1] - h.free_vertex[1])]
    }

    /// Spectral transform $\mathbf{F}(\boldsymbol\beta) = \int \mathbf{f}(\boldsymbol\rho)\,
    /// e^{-j\boldsymbol\beta\cdot\boldsymbol\rho}\,d\boldsymbol\rho$.
    ///
    /// Each triangle is split into sub-triangles small enough that the kernel
    /// phase varies by at most [`MAX_PHASE_PER_CELL`] over one of them.
    pub fn spectral_transform(&self, beta: [f64; 2]) -> [Complex64; 2] {
        let beta_mag = beta[0].hypot(beta[1]);
        let mut out = [Complex64::new(0.0, 0.0); 2];
        for h in &self.halves {
            let c = h.coefficient(self.length);
            let splits = ((beta_mag * h.diameter() / MAX_PHASE_PER_CELL).ceil() as usize).max(1);
            for_each_quadrature_point(&h.vertices, h.area, splits, |p, w| {
                let phase = Complex64::new(0.0, -(beta[0] * p[0] + beta[1] * p[1])).exp();
                let wc = w * c;
                out[0] += phase * (wc * (p[0] - h.free_vertex[0]));
                out[1] += phase * (wc * (p[1] - h.free_vertex[1]));
            });
        }
        out
    }

    /// Overlap integral $\int \mathbf{f}_a \cdot \mathbf{f}_b\, d\boldsymbol\rho$.
    pub fn overlap(&self, other: &RwgFunction) -> f64 {
        let mut total = 0.0;
        for ha in &self.halves {
            for hb in other.halves.iter().filter(|hb| hb.triangle == ha.triangle) {
                let ca = ha.coefficient(self.length);
                let cb = hb.coefficient(other.length);
                for_each_quadrature_point(&ha.vertices, ha.area, 1, |p, w| {
                    let fa = [p[0] - ha.free_vertex[0], p[1] - ha.free_vertex[1]];
                    let fb = [p[0] - hb.free_vertex[0], p[1] - hb.free_vertex[1]];
                    total += w * ca * cb * (fa[0] * fb[0] + fa[1] * fb[1]);
                });
            }
        }
        total
    }
}

/// Visit quadrature points of a triangle split into `n²` congruent
/// sub-triangles. The callback receives the point and its absolute weight.
fn for_each_quadrature_point(
    vertices: &[[f64; 2]; 3],
    area: f64,
    n: usize,
    mut visit: impl FnMut([f64; 2], f64),
) {
    let [v0, v1, v2] = *vertices;
    let e1 = [v1[0] - v0[0], v1[1] - v0[1]];
    let e2 = [v2[0] - v0[0], v2[1] - v0[1]];
    let nf = n as f64;
    let grid = |i: usize, j: usize| {
        let (a, b) = (i as f64 / nf, j as f64 / nf);
        [v0[0] + a * e1[0] + b * e2[0], v0[1] + a * e1[1] + b * e2[1]]
    };
    let sub_area = area / (nf * nf);

    let mut cell = |a: [f64; 2], b: [f64; 2], c: [f64; 2]| {
        for (bary, w) in DUNAVANT7.iter() {
            let p = [
                bary[0] * a[0] + bary[1] * b[0] + bary[2] * c[0],
                bary[0] * a[1] + bary[1] * b[1] + bary[2] * c[1],
            ];
            visit(p, w * sub_area);
        }
    };

    for i in 0..n {
        for j in 0..n - i {
            cell(grid(i, j), grid(i + 1, j), grid(i, j + 1));
            if i + j + 2 <= n {
                cell(grid(i + 1, j), grid(i + 1, j + 1), grid(i, j + 1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square_mesh() -> UnitCellMesh {
        UnitCellMesh::new(
            vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn test_one_function_per_interior_edge() {
        let rwg = build_rwg(&square_mesh());
        assert_eq!(rwg.len(), 1);
        assert_eq!(rwg[0].edge, [0, 2]);
        assert_abs_diff_eq!(rwg[0].length, 8.0_f64.sqrt(), epsilon = 1e-14);
    }

    #[test]
    fn test_normal_component_continuous_across_edge() {
        let f = &build_rwg(&square_mesh())[0];
        let mid = [1.0, 1.0];
        // Unit normal to the diagonal, pointing from T+ (below) to T- (above).
        let n = [-1.0 / 2.0_f64.sqrt(), 1.0 / 2.0_f64.sqrt()];
        let plus = f.value_in_half(0, mid);
        let minus = f.value_in_half(1, mid);
        let fn_plus = plus[0] * n[0] + plus[1] * n[1];
        let fn_minus = minus[0] * n[0] + minus[1] * n[1];
        assert_abs_diff_eq!(fn_plus, fn_minus, epsilon = 1e-12);
        assert_abs_diff_eq!(fn_plus.abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_at_zero_is_centroid_moment() {
        let f = &build_rwg(&square_mesh())[0];
        let t = f.spectral_transform([0.0, 0.0]);
        let mut expected = [0.0; 2];
        for h in &f.halves {
            let c = [
                (h.vertices[0][0] + h.vertices[1][0] + h.vertices[2][0]) / 3.0,
                (h.vertices[0][1] + h.vertices[1][1] + h.vertices[2][1]) / 3.0,
            ];
            let k = h.sign * f.length / 2.0;
            expected[0] += k * (c[0] - h.free_vertex[0]);
            expected[1] += k * (c[1] - h.free_vertex[1]);
        }
        assert_abs_diff_eq!(t[0].re, expected[0], epsilon = 1e-12);
        assert_abs_diff_eq!(t[1].re, expected[1], epsilon = 1e-12);
        assert_abs_diff_eq!(t[0].im, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_conjugate_symmetry() {
        // f is real, so F(-β) = conj(F(β)).
        let f = &build_rwg(&square_mesh())[0];
        let beta = [1.3, -0.7];
        let a = f.spectral_transform(beta);
        let b = f.spectral_transform([-beta[0], -beta[1]]);
        for k in 0..2 {
            assert_abs_diff_eq!(a[k].re, b[k].re, epsilon = 1e-12);
            assert_abs_diff_eq!(a[k].im, -b[k].im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_subdivided_quadrature_converges() {
        let f = &build_rwg(&square_mesh())[0];
        let beta = [4.0, 2.5];
        let coarse = f.spectral_transform(beta);
        // Brute force with a much finer split.
        let mut fine = [Complex64::new(0.0, 0.0); 2];
        for h in &f.halves {
            let c = h.coefficient(f.length);
            for_each_quadrature_point(&h.vertices, h.area, 40, |p, w| {
                let phase = Complex64::new(0.0, -(beta[0] * p[0] + beta[1] * p[1])).exp();
                fine[0] += phase * (w * c * (p[0] - h.free_vertex[0]));
                fine[1] += phase * (w * c * (p[1] - h.free_vertex[1]));
            });
        }
        for k in 0..2 {
            assert!((coarse[k] - fine[k]).norm() < 1e-3, "component {k}: {:?} vs {:?}", coarse[k], fine[k]);
        }
    }

    #[test]
    fn test_overlap_is_symmetric_and_positive() {
        let mesh = UnitCellMesh::new(
            vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [2.0, 0.0], [2.0, 1.0]],
            vec![[0, 1, 2], [0, 2, 3], [1, 4, 5], [1, 5, 2]],
        )
        .unwrap();
        let rwg = build_rwg(&mesh);
        assert_eq!(rwg.len(), 3);
        for a in &rwg {
            assert!(a.overlap(a) > 0.0);
            for b in &rwg {
                assert_abs_diff_eq!(a.overlap(b), b.overlap(a), epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_subtriangles_tile_area() {
        let verts = [[0.0, 0.0], [3.0, 0.0], [0.0, 2.0]];
        for n in 1..6 {
            let mut total = 0.0;
            for_each_quadrature_point(&verts, 3.0, n, |_, w| total += w);
            assert_abs_diff_eq!(total, 3.0, epsilon = 1e-12);
        }
    }
}
