//! Triangulated unit cells.
//!
//! A [`UnitCellMesh`] describes the metallisation (impedance-type sheets) or
//! the apertures (admittance-type sheets) inside one period of a sheet. Node
//! coordinates are in metres, relative to the unit-cell origin.

use std::collections::BTreeMap;

use thiserror::Error;

/// Errors raised while building or transforming sheet geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Triangle {triangle} references node {node}, but the mesh has {count} nodes")]
    NodeOutOfRange {
        triangle: usize,
        node: usize,
        count: usize,
    },

    #[error("Triangle {0} is degenerate (zero area)")]
    DegenerateTriangle(usize),

    #[error("Edge {0:?} is shared by more than two triangles")]
    NonManifoldEdge([usize; 2]),

    #[error("Mesh has no triangles")]
    Empty,

    #[error("Invalid shape: {0}")]
    InvalidShape(String),
}

/// An edge of the mesh together with the triangles that share it.
#[derive(Debug, Clone)]
pub struct MeshEdge {
    /// Node indices, smaller index first.
    pub nodes: [usize; 2],
    /// Indices of the one or two triangles bordering this edge.
    pub triangles: Vec<usize>,
}

/// A validated triangle mesh of a sheet's unit cell.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCellMesh {
    nodes: Vec<[f64; 2]>,
    triangles: Vec<[usize; 3]>,
}

impl UnitCellMesh {
    /// Build a mesh, rejecting dangling node references, zero-area triangles
    /// and edges shared by more than two triangles.
    pub fn new(nodes: Vec<[f64; 2]>, triangles: Vec<[usize; 3]>) -> Result<Self, GeometryError> {
        if triangles.is_empty() {
            return Err(GeometryError::Empty);
        }
        for (t, tri) in triangles.iter().enumerate() {
            for &node in tri {
                if node >= nodes.len() {
                    return Err(GeometryError::NodeOutOfRange {
                        triangle: t,
                        node,
                        count: nodes.len(),
                    });
                }
            }
        }

        let mesh = Self { nodes, triangles };
        let scale = mesh.max_edge_length();
        for t in 0..mesh.triangles.len() {
            if mesh.triangle_area(t) <= 1e-12 * scale * scale {
                return Err(GeometryError::DegenerateTriangle(t));
            }
        }
        for edge in mesh.edges() {
            if edge.triangles.len() > 2 {
                return Err(GeometryError::NonManifoldEdge(edge.nodes));
            }
        }
        Ok(mesh)
    }

    pub fn nodes(&self) -> &[[f64; 2]] {
        &self.nodes
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Vertex coordinates of triangle `t`.
    pub fn triangle_vertices(&self, t: usize) -> [[f64; 2]; 3] {
        let [a, b, c] = self.triangles[t];
        [self.nodes[a], self.nodes[b], self.nodes[c]]
    }

    /// Unsigned area of triangle `t` (m²).
    pub fn triangle_area(&self, t: usize) -> f64 {
        let [a, b, c] = self.triangle_vertices(t);
        0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])).abs()
    }

    /// Total meshed area (m²).
    pub fn area(&self) -> f64 {
        (0..self.triangles.len()).map(|t| self.triangle_area(t)).sum()
    }

    /// All edges, in ascending node-pair order.
    pub fn edges(&self) -> Vec<MeshEdge> {
        let mut map: BTreeMap<[usize; 2], Vec<usize>> = BTreeMap::new();
        for (t, tri) in self.triangles.iter().enumerate() {
            for k in 0..3 {
                let a = tri[k];
                let b = tri[(k + 1) % 3];
                let key = if a < b { [a, b] } else { [b, a] };
                map.entry(key).or_default().push(t);
            }
        }
        map.into_iter()
            .map(|(nodes, triangles)| MeshEdge { nodes, triangles })
            .collect()
    }

    /// Length of the edge between two nodes.
    pub fn edge_length(&self, nodes: [usize; 2]) -> f64 {
        let a = self.nodes[nodes[0]];
        let b = self.nodes[nodes[1]];
        (b[0] - a[0]).hypot(b[1] - a[1])
    }

    /// Shortest edge in the mesh. Drives the spectral resolution needed to
    /// represent currents on this mesh.
    pub fn min_edge_length(&self) -> f64 {
        self.edges()
            .iter()
            .map(|e| self.edge_length(e.nodes))
            .fold(f64::INFINITY, f64::min)
    }

    fn max_edge_length(&self) -> f64 {
        self.edges()
            .iter()
            .map(|e| self.edge_length(e.nodes))
            .fold(0.0, f64::max)
    }
}
