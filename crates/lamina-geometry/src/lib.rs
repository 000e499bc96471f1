//! # Lamina Geometry
//!
//! Sheet geometry handling for the Lamina framework. This crate provides:
//!
//! - **Unit-cell meshes** ([`mesh`]): validated triangulations of one period
//!   of a patterned sheet.
//! - **RWG basis functions** ([`rwg`]): divergence-conforming edge functions
//!   on interior mesh edges, with spectral (Fourier) transforms and overlaps.
//! - **Parametric shapes** ([`primitives`]): rectangles, crosses and disks
//!   described by a handful of parameters.
//! - **Discretisation** ([`discretise`]): converts shapes into grid-based
//!   triangle meshes.
//! - **Transformations** ([`transform`]): scale, rotate and translate meshes.

pub mod discretise;
pub mod mesh;
pub mod primitives;
pub mod rwg;
pub mod transform;

pub use mesh::{GeometryError, UnitCellMesh};
pub use rwg::RwgFunction;
pub use discretise::discretise_shape;
pub use primitives::Shape;
pub use transform::Transform2;
