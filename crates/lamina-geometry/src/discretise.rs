//! Discretisation of element shapes into triangulated unit cells.
//!
//! The shape's bounding box is covered by a regular grid of
//! `cells_x` x `cells_y` rectangles. Every cell whose centre lies inside the
//! shape contributes two triangles; neighbouring cells share nodes, so
//! the interior edges between them carry RWG basis functions.

use std::collections::HashMap;

use crate::mesh::{GeometryError, UnitCellMesh};
use crate::primitives::Shape;

/// Discretise a shape into a staircase triangle mesh.
pub fn discretise_shape(
    shape: &Shape,
    cells_x: usize,
    cells_y: usize,
) -> Result<UnitCellMesh, GeometryError> {
    if !shape.is_valid() {
        return Err(GeometryError::InvalidShape(format!("{shape:?}")));
    }
    if cells_x == 0 || cells_y == 0 {
        return Err(GeometryError::InvalidShape(
            "grid must have at least one cell in each direction".to_string(),
        ));
    }

    let (min, max) = shape.bounding_box();
    let dx = (max[0] - min[0]) / cells_x as f64;
    let dy = (max[1] - min[1]) / cells_y as f64;

    let mut index: HashMap<(usize, usize), usize> = HashMap::new();
    let mut nodes: Vec<[f64; 2]> = Vec::new();
    let mut triangles: Vec<[usize; 3]> = Vec::new();

    let mut node_at = |i: usize, j: usize, nodes: &mut Vec<[f64; 2]>| -> usize {
        *index.entry((i, j)).or_insert_with(|| {
            nodes.push([min[0] + i as f64 * dx, min[1] + j as f64 * dy]);
            nodes.len() - 1
        })
    };

    for j in 0..cells_y {
        for i in 0..cells_x {
            let centre = [min[0] + (i as f64 + 0.5) * dx, min[1] + (j as f64 + 0.5) * dy];
            if !shape.contains(&centre) {
                continue;
            }
            let a = node_at(i, j, &mut nodes);
            let b = node_at(i + 1, j, &mut nodes);
            let c = node_at(i + 1, j + 1, &mut nodes);
            let d = node_at(i, j + 1, &mut nodes);
            triangles.push([a, b, c]);
            triangles.push([a, c, d]);
        }
    }

    UnitCellMesh::new(nodes, triangles)
}
