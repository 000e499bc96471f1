//! # Lamina Core
//!
//! The numerical engine of the Lamina framework. This crate computes the
//! generalized scattering matrix (GSM) of planar, doubly periodic multilayer
//! structures: dielectric layers separated by junctions that may carry a
//! thin patterned conducting sheet (a frequency-selective surface).
//!
//! ## Architecture
//!
//! A [`types::Structure`] is built once and validated before any numerical
//! work. An [`analysis::Analysis`] fixes the Floquet mode content at the
//! highest frequency of interest, splits the stack into blocks holding at
//! most one sheet, and analyses (frequency, scan) points independently.
//! Sheets are solved through the [`solver::SheetSolver`] trait; the provided
//! implementation is the spectral method of moments with RWG basis
//! functions ([`solver::mom::MomSolver`]).
//!
//! ## Modules
//!
//! - [`types`]: Media, layers, lattices, sheets, structures, scan points, results.
//! - [`modes`]: Floquet harmonic ordering, mode selection, modal constants.
//! - [`gsm`]: GSM container, junctions, propagation, cascade.
//! - [`solver`]: Sheet solver trait, dense LU, method of moments.
//! - [`blocks`]: Block partition and interchangeable-block keys.
//! - [`analysis`]: Per-point analysis of a whole stack.
//! - [`polarization`]: TE/TM to H/V and R/L bases.
//! - [`extract`]: Derived quantities (S-parameters, axial ratio, angles).
//! - [`outputs`]: Named output catalog.
//! - [`sweep`]: Sweep plans and the parallel sweep driver.
//! - [`archive`]: Result archive keyed by serial index.

pub mod analysis;
pub mod archive;
pub mod blocks;
pub mod extract;
pub mod gsm;
pub mod modes;
pub mod outputs;
pub mod polarization;
pub mod solver;
pub mod sweep;
pub mod types;

pub use analysis::{Analysis, AnalysisError};
pub use archive::{ArchiveError, ResultArchive};
pub use gsm::Gsm;
pub use sweep::{run_sweep, ScanSpec, SteeringOrder, SweepPlan, SweepSummary};
pub use types::{
    AnalysisParams, ConfigError, Layer, Lattice, Medium, PointResult, ScanPoint, Sheet,
    SheetClass, SheetId, Structure, StructureBuilder,
};
