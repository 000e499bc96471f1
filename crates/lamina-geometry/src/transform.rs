//! Planar affine transformations for unit-cell geometry.
//!
//! Used by the job configuration to rotate, scale and position an element
//! within its unit cell before the RWG basis is built.

use nalgebra::{Matrix2, Rotation2, Vector2};

use crate::mesh::{GeometryError, UnitCellMesh};

/// An affine map of the plane: linear part + translation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform2 {
    pub matrix: Matrix2<f64>,
    /// Translation in metres.
    pub translation: Vector2<f64>,
}

impl Default for Transform2 {
    fn default() -> Self {
        Self {
            matrix: Matrix2::identity(),
            translation: Vector2::zeros(),
        }
    }
}

impl Transform2 {
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            matrix: Matrix2::identity(),
            translation: Vector2::new(dx, dy),
        }
    }

    /// Counter-clockwise rotation about the origin.
    pub fn rotation_deg(angle: f64) -> Self {
        Self {
            matrix: *Rotation2::new(angle.to_radians()).matrix(),
            translation: Vector2::zeros(),
        }
    }

    pub fn uniform_scale(factor: f64) -> Self {
        Self::scale(factor, factor)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            matrix: Matrix2::from_diagonal(&Vector2::new(sx, sy)),
            translation: Vector2::zeros(),
        }
    }

    pub fn apply(&self, point: &[f64; 2]) -> [f64; 2] {
        let v = self.matrix * Vector2::new(point[0], point[1]) + self.translation;
        [v.x, v.y]
    }

    /// Compose two transforms: self followed by other.
    pub fn then(&self, other: &Transform2) -> Transform2 {
        Transform2 {
            matrix: other.matrix * self.matrix,
            translation: other.matrix * self.translation + other.translation,
        }
    }

    /// Map every node of a mesh. Reflections flip triangle orientation, which
    /// the mesh does not care about; singular maps are rejected by mesh
    /// validation as degenerate triangles.
    pub fn apply_to_mesh(&self, mesh: &UnitCellMesh) -> Result<UnitCellMesh, GeometryError> {
        let nodes = mesh.nodes().iter().map(|p| self.apply(p)).collect();
        UnitCellMesh::new(nodes, mesh.triangles().to_vec())
    }
}
