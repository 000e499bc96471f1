//! Parametric sheet element shapes.
//!
//! Each shape defines a closed region of the unit cell that can be meshed by
//! the [`discretise`](crate::discretise) module. Shapes are fully described
//! by their TOML parameters. Lengths share the unit of the mesh they produce.

use serde::{Deserialize, Serialize};

/// A planar element shape that can be discretised into triangles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Rectangle(Rectangle),
    Cross(Cross),
    Disk(Disk),
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rectangle {
    #[serde(default)]
    pub centre: [f64; 2],
    /// Extent along x.
    pub lx: f64,
    /// Extent along y.
    pub ly: f64,
}

/// A symmetric cross made of two orthogonal arms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cross {
    #[serde(default)]
    pub centre: [f64; 2],
    /// Tip-to-tip length of each arm.
    pub arm_length: f64,
    /// Width of each arm.
    pub arm_width: f64,
}

/// A circular disk (meshed as a staircase approximation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disk {
    #[serde(default)]
    pub centre: [f64; 2],
    pub radius: f64,
}

impl Shape {
    /// Check whether a point lies inside this shape.
    pub fn contains(&self, point: &[f64; 2]) -> bool {
        match self {
            Shape::Rectangle(r) => {
                (point[0] - r.centre[0]).abs() <= 0.5 * r.lx
                    && (point[1] - r.centre[1]).abs() <= 0.5 * r.ly
            }
            Shape::Cross(c) => {
                let dx = (point[0] - c.centre[0]).abs();
                let dy = (point[1] - c.centre[1]).abs();
                let (half_len, half_w) = (0.5 * c.arm_length, 0.5 * c.arm_width);
                (dx <= half_len && dy <= half_w) || (dx <= half_w && dy <= half_len)
            }
            Shape::Disk(d) => {
                let dx = point[0] - d.centre[0];
                let dy = point[1] - d.centre[1];
                dx * dx + dy * dy <= d.radius * d.radius
            }
        }
    }

    /// Axis-aligned bounding box: returns (min_corner, max_corner).
    pub fn bounding_box(&self) -> ([f64; 2], [f64; 2]) {
        let (centre, hx, hy) = match self {
            Shape::Rectangle(r) => (r.centre, 0.5 * r.lx, 0.5 * r.ly),
            Shape::Cross(c) => (c.centre, 0.5 * c.arm_length, 0.5 * c.arm_length),
            Shape::Disk(d) => (d.centre, d.radius, d.radius),
        };
        (
            [centre[0] - hx, centre[1] - hy],
            [centre[0] + hx, centre[1] + hy],
        )
    }

    /// Whether all size parameters are strictly positive and consistent.
    pub fn is_valid(&self) -> bool {
        match self {
            Shape::Rectangle(r) => r.lx > 0.0 && r.ly > 0.0,
            Shape::Cross(c) => c.arm_width > 0.0 && c.arm_length >= c.arm_width,
            Shape::Disk(d) => d.radius > 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_contains_arms_not_corners() {
        let cross = Shape::Cross(Cross {
            centre: [0.0, 0.0],
            arm_length: 10.0,
            arm_width: 2.0,
        });
        assert!(cross.contains(&[4.5, 0.5]));
        assert!(cross.contains(&[-0.5, -4.5]));
        assert!(!cross.contains(&[3.0, 3.0]));
        assert!(cross.is_valid());
    }

    #[test]
    fn test_disk_bounding_box() {
        let disk = Shape::Disk(Disk {
            centre: [1.0, -1.0],
            radius: 0.5,
        });
        let (lo, hi) = disk.bounding_box();
        assert_eq!(lo, [0.5, -1.5]);
        assert_eq!(hi, [1.5, -0.5]);
        assert!(disk.contains(&[1.0, -0.6]));
        assert!(!disk.contains(&[1.45, -0.55]));
    }
}
