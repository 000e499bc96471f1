//! Core types shared across the Lamina engine.
//!
//! This module defines the structure description (media, layers, lattice,
//! sheets and their placements), the scan condition of an analysis point,
//! the numerical parameters, and the per-point result container.

use std::fmt;
use std::str::FromStr;

use lamina_geometry::rwg::build_rwg;
use lamina_geometry::{RwgFunction, UnitCellMesh};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gsm::Gsm;

/// Free-space wave impedance (Ω).
pub const ETA0: f64 = 376.730_313_668;

/// Speed of light in vacuum (m/s).
pub const C0: f64 = 299_792_458.0;

/// Configuration errors, raised before any numerical work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Malformed stack: {0}")]
    MalformedStack(String),

    #[error("A stack needs at least two layers, found {0}")]
    TooFewLayers(usize),

    #[error("Interior layer {layer} has non-positive width {width} m")]
    NonPositiveWidth { layer: usize, width: f64 },

    #[error("Lattice vectors {s1:?} and {s2:?} are collinear or degenerate")]
    DegenerateLattice { s1: [f64; 2], s2: [f64; 2] },

    #[error("Sheet '{0}' does not share the lattice of the other sheets in the stack")]
    InconsistentLattice(String),

    #[error("Sheet '{0}' has no basis functions (its mesh has no interior edge)")]
    EmptyBasis(String),

    #[error("Illegal sheet class '{0}' (expected impedance, admittance or inert)")]
    IllegalSheetClass(String),

    #[error("Unknown sheet handle {0}")]
    UnknownSheet(usize),

    #[error("Phase-shift scanning needs a periodic structure, but the stack has no sheets")]
    PhaseScanWithoutSheets,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// A homogeneous, isotropic medium described by its complex relative
/// permittivity and permeability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Medium {
    pub epsilon: Complex64,
    pub mu: Complex64,
}

impl Default for Medium {
    fn default() -> Self {
        Self::vacuum()
    }
}

impl Medium {
    pub fn vacuum() -> Self {
        Self {
            epsilon: Complex64::new(1.0, 0.0),
            mu: Complex64::new(1.0, 0.0),
        }
    }

    /// A non-magnetic dielectric with loss tangent `tan_delta`:
    /// $\varepsilon = \varepsilon'(1 - j\tan\delta)$.
    pub fn dielectric(eps_r: f64, tan_delta: f64) -> Self {
        Self {
            epsilon: Complex64::new(eps_r, -eps_r * tan_delta),
            mu: Complex64::new(1.0, 0.0),
        }
    }

    /// Wavenumber in the medium, $k = k_0\sqrt{\varepsilon_r\mu_r}$.
    pub fn wavenumber(&self, k0: f64) -> Complex64 {
        k0 * (self.epsilon * self.mu).sqrt()
    }

    /// Real refractive index used for Snell's law, $\sqrt{\Re\varepsilon\,\Re\mu}$.
    pub fn real_index(&self) -> f64 {
        (self.epsilon.re * self.mu.re).max(0.0).sqrt()
    }
}

/// A dielectric slab. The first and last layers of a stack are the
/// semi-infinite ambient half-spaces; their width is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub medium: Medium,
    /// Physical thickness (m).
    pub width: f64,
}

impl Layer {
    pub fn new(medium: Medium, width: f64) -> Self {
        Self { medium, width }
    }

    /// A semi-infinite half-space.
    pub fn ambient(medium: Medium) -> Self {
        Self { medium, width: 0.0 }
    }
}

/// Two-dimensional periodicity of the sheets, shared by the whole stack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// First periodicity vector (m).
    pub s1: [f64; 2],
    /// Second periodicity vector (m).
    pub s2: [f64; 2],
}

impl Lattice {
    pub fn new(s1: [f64; 2], s2: [f64; 2]) -> Result<Self, ConfigError> {
        let lattice = Self { s1, s2 };
        let scale = s1[0].hypot(s1[1]) * s2[0].hypot(s2[1]);
        if !(lattice.signed_area().abs() > 1e-9 * scale) {
            return Err(ConfigError::DegenerateLattice { s1, s2 });
        }
        Ok(lattice)
    }

    /// A rectangular lattice with periods `dx` and `dy`.
    pub fn rectangular(dx: f64, dy: f64) -> Result<Self, ConfigError> {
        Self::new([dx, 0.0], [0.0, dy])
    }

    fn signed_area(&self) -> f64 {
        self.s1[0] * self.s2[1] - self.s1[1] * self.s2[0]
    }

    /// Unit-cell area (m²).
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Reciprocal vectors $\mathbf{b}_1, \mathbf{b}_2$ with
    /// $\mathbf{s}_i\cdot\mathbf{b}_j = 2\pi\delta_{ij}$.
    pub fn reciprocal(&self) -> ([f64; 2], [f64; 2]) {
        let scale = 2.0 * std::f64::consts::PI / self.signed_area();
        (
            [scale * self.s2[1], -scale * self.s2[0]],
            [-scale * self.s1[1], scale * self.s1[0]],
        )
    }

    /// Length of the shorter reciprocal vector.
    pub fn min_reciprocal_length(&self) -> f64 {
        let (b1, b2) = self.reciprocal();
        b1[0].hypot(b1[1]).min(b2[0].hypot(b2[1]))
    }

    fn approx_eq(&self, other: &Lattice) -> bool {
        let tol = 1e-9 * self.s1[0].hypot(self.s1[1]).max(self.s2[0].hypot(self.s2[1]));
        let close = |a: [f64; 2], b: [f64; 2]| (a[0] - b[0]).hypot(a[1] - b[1]) <= tol;
        close(self.s1, other.s1) && close(self.s2, other.s2)
    }
}

/// Electromagnetic class of a patterned sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SheetClass {
    /// Conducting patches; the unknown is the induced electric current.
    Impedance,
    /// Apertures in a conducting screen; the unknown is the aperture field.
    Admittance,
    /// Transparent placeholder: the junction is a bare dielectric interface.
    Inert,
}

impl FromStr for SheetClass {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "impedance" | "j" => Ok(Self::Impedance),
            "admittance" | "e" => Ok(Self::Admittance),
            "inert" => Ok(Self::Inert),
            _ => Err(ConfigError::IllegalSheetClass(s.to_string())),
        }
    }
}

/// A periodic patterned sheet: a triangulated unit cell carrying RWG basis
/// functions.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub class: SheetClass,
    pub lattice: Lattice,
    /// Surface resistance (Ω/sq), used by impedance-type sheets.
    pub surface_resistance: f64,
    mesh: Option<UnitCellMesh>,
    basis: Vec<RwgFunction>,
}

impl Sheet {
    /// Build a sheet from a unit-cell mesh. The RWG basis is constructed
    /// immediately; an empty basis is reported when the sheet is placed in
    /// a stack.
    pub fn new(name: impl Into<String>, class: SheetClass, lattice: Lattice, mesh: UnitCellMesh) -> Self {
        let basis = build_rwg(&mesh);
        Self {
            name: name.into(),
            class,
            lattice,
            surface_resistance: 0.0,
            mesh: Some(mesh),
            basis,
        }
    }

    /// A transparent placeholder sheet with no geometry.
    pub fn inert(name: impl Into<String>, lattice: Lattice) -> Self {
        Self {
            name: name.into(),
            class: SheetClass::Inert,
            lattice,
            surface_resistance: 0.0,
            mesh: None,
            basis: Vec::new(),
        }
    }

    pub fn with_surface_resistance(mut self, rs: f64) -> Self {
        self.surface_resistance = rs;
        self
    }

    pub fn basis(&self) -> &[RwgFunction] {
        &self.basis
    }

    pub fn mesh(&self) -> Option<&UnitCellMesh> {
        self.mesh.as_ref()
    }

    pub fn is_inert(&self) -> bool {
        self.class == SheetClass::Inert
    }

    /// Shortest mesh edge (m), if the sheet has geometry.
    pub fn min_edge_length(&self) -> Option<f64> {
        self.mesh.as_ref().map(|m| m.min_edge_length())
    }
}

/// Handle of a sheet registered with a [`StructureBuilder`]. Two placements
/// with the same handle share one physical sheet definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SheetId(pub usize);

/// A sheet placed at one junction, with its lateral offset (m).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub sheet: SheetId,
    pub offset: [f64; 2],
}

#[derive(Debug, Clone)]
enum StackItem {
    Layer(Layer),
    Sheet(Placement),
}

/// Incrementally describes a stack: register sheets, then push layers and
/// sheet placements from region 1 to region N.
#[derive(Debug, Default)]
pub struct StructureBuilder {
    sheets: Vec<Sheet>,
    items: Vec<StackItem>,
}

impl StructureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sheet definition and return its handle.
    pub fn add_sheet(&mut self, sheet: Sheet) -> SheetId {
        self.sheets.push(sheet);
        SheetId(self.sheets.len() - 1)
    }

    pub fn push_layer(&mut self, layer: Layer) -> &mut Self {
        self.items.push(StackItem::Layer(layer));
        self
    }

    /// Place a registered sheet at the interface following the last pushed
    /// layer.
    pub fn push_sheet(&mut self, sheet: SheetId, offset: [f64; 2]) -> &mut Self {
        self.items.push(StackItem::Sheet(Placement { sheet, offset }));
        self
    }

    /// Validate the stack and freeze it.
    pub fn build(self) -> Result<Structure, ConfigError> {
        let mut layers: Vec<Layer> = Vec::new();
        let mut junctions: Vec<Option<Placement>> = Vec::new();
        let mut pending: Option<Placement> = None;

        for (pos, item) in self.items.into_iter().enumerate() {
            match item {
                StackItem::Layer(layer) => {
                    if !layers.is_empty() {
                        junctions.push(pending.take());
                    }
                    layers.push(layer);
                }
                StackItem::Sheet(placement) => {
                    if layers.is_empty() {
                        return Err(ConfigError::MalformedStack(
                            "the stack must start with a layer".into(),
                        ));
                    }
                    if pending.is_some() {
                        return Err(ConfigError::MalformedStack(format!(
                            "two sheets without a layer between them (item {pos})"
                        )));
                    }
                    if placement.sheet.0 >= self.sheets.len() {
                        return Err(ConfigError::UnknownSheet(placement.sheet.0));
                    }
                    pending = Some(placement);
                }
            }
        }
        if pending.is_some() {
            return Err(ConfigError::MalformedStack(
                "the stack must end with a layer".into(),
            ));
        }
        if layers.len() < 2 {
            return Err(ConfigError::TooFewLayers(layers.len()));
        }

        let last = layers.len() - 1;
        for (i, layer) in layers.iter().enumerate().take(last).skip(1) {
            if !(layer.width > 0.0) {
                return Err(ConfigError::NonPositiveWidth {
                    layer: i,
                    width: layer.width,
                });
            }
        }

        let mut lattice: Option<Lattice> = None;
        for placement in junctions.iter().flatten() {
            let sheet = &self.sheets[placement.sheet.0];
            match lattice {
                None => lattice = Some(sheet.lattice),
                Some(ref l) if !l.approx_eq(&sheet.lattice) => {
                    return Err(ConfigError::InconsistentLattice(sheet.name.clone()));
                }
                Some(_) => {}
            }
            if !sheet.is_inert() && sheet.basis().is_empty() {
                return Err(ConfigError::EmptyBasis(sheet.name.clone()));
            }
        }

        Ok(Structure {
            layers,
            junctions,
            sheets: self.sheets,
            lattice,
        })
    }
}

/// A validated stack: `layers.len() - 1` junctions, each either a bare
/// dielectric interface or a placed sheet.
#[derive(Debug, Clone)]
pub struct Structure {
    layers: Vec<Layer>,
    junctions: Vec<Option<Placement>>,
    sheets: Vec<Sheet>,
    lattice: Option<Lattice>,
}

impl Structure {
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Junction `j` lies between layers `j` and `j + 1`.
    pub fn junctions(&self) -> &[Option<Placement>] {
        &self.junctions
    }

    pub fn sheet(&self, id: SheetId) -> &Sheet {
        &self.sheets[id.0]
    }

    /// Lattice shared by all placed sheets; `None` for a purely dielectric stack.
    pub fn lattice(&self) -> Option<&Lattice> {
        self.lattice.as_ref()
    }

    pub fn region1(&self) -> &Medium {
        &self.layers[0].medium
    }

    pub fn region_n(&self) -> &Medium {
        &self.layers[self.layers.len() - 1].medium
    }

    /// Whether junction `j` carries a sheet that takes part in the solve.
    pub fn has_active_sheet(&self, j: usize) -> bool {
        self.junctions[j].is_some_and(|p| !self.sheet(p.sheet).is_inert())
    }
}

/// Scan condition of one analysis point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScanPoint {
    /// Elevation and azimuth of the incident wave in region 1 (degrees).
    Angles { theta_deg: f64, phi_deg: f64 },
    /// Inter-element phase shifts along `s1` and `s2` (radians).
    PhaseShifts { psi1: f64, psi2: f64 },
}

impl fmt::Display for ScanPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanPoint::Angles { theta_deg, phi_deg } => {
                write!(f, "theta = {theta_deg}°, phi = {phi_deg}°")
            }
            ScanPoint::PhaseShifts { psi1, psi2 } => {
                write!(f, "psi1 = {psi1} rad, psi2 = {psi2} rad")
            }
        }
    }
}

impl ScanPoint {
    pub fn normal() -> Self {
        ScanPoint::Angles {
            theta_deg: 0.0,
            phi_deg: 0.0,
        }
    }

    /// Dominant transverse wavevector $\boldsymbol\beta_{00}$ (rad/m).
    ///
    /// Angles are measured in region 1:
    /// $\boldsymbol\beta_{00} = k_0 n_1 \sin\theta(\cos\phi, \sin\phi)$.
    /// Phase shifts satisfy $\boldsymbol\beta_{00}\cdot\mathbf{s}_i = \psi_i$.
    pub fn transverse_wavevector(
        &self,
        k0: f64,
        region1: &Medium,
        lattice: Option<&Lattice>,
    ) -> Result<[f64; 2], ConfigError> {
        match *self {
            ScanPoint::Angles { theta_deg, phi_deg } => {
                let kt = k0 * region1.real_index() * theta_deg.to_radians().sin();
                let phi = phi_deg.to_radians();
                Ok([kt * phi.cos(), kt * phi.sin()])
            }
            ScanPoint::PhaseShifts { psi1, psi2 } => {
                let lattice = lattice.ok_or(ConfigError::PhaseScanWithoutSheets)?;
                let (b1, b2) = lattice.reciprocal();
                let two_pi = 2.0 * std::f64::consts::PI;
                Ok([
                    (psi1 * b1[0] + psi2 * b2[0]) / two_pi,
                    (psi1 * b1[1] + psi2 * b2[1]) / two_pi,
                ])
            }
        }
    }
}

/// Numerical parameters of an analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    /// Suppression (dB) an evanescent mode must reach across the relevant
    /// layer before it is dropped.
    pub dbmin: f64,
    /// Upper bound on the modes carried by any layer.
    pub max_modes: usize,
    /// Multiplier on the mesh-resolution radius $\pi/\ell_{min}$ for layers
    /// touching a sheet.
    pub sheet_mode_factor: f64,
    /// Width of the spectral taper as a fraction of the shortest reciprocal
    /// vector.
    pub smoothing_fraction: f64,
    /// Relative tolerance for reusing basis-function transforms.
    pub transform_tolerance: f64,
    /// Reuse the GSM of interchangeable blocks within a point.
    pub deduplicate: bool,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            dbmin: 30.0,
            max_modes: 1000,
            sheet_mode_factor: 1.0,
            smoothing_fraction: 0.5,
            transform_tolerance: 1e-9,
            deduplicate: true,
        }
    }
}

impl AnalysisParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dbmin > 0.0) {
            return Err(ConfigError::InvalidParameter(format!(
                "dbmin must be positive, got {}",
                self.dbmin
            )));
        }
        if self.max_modes < 2 {
            return Err(ConfigError::InvalidParameter(
                "max_modes must allow the two dominant modes".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing_fraction) {
            return Err(ConfigError::InvalidParameter(format!(
                "smoothing_fraction must lie in [0, 1], got {}",
                self.smoothing_fraction
            )));
        }
        if self.sheet_mode_factor < 0.0 || self.transform_tolerance < 0.0 {
            return Err(ConfigError::InvalidParameter(
                "sheet_mode_factor and transform_tolerance must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Propagation data of an ambient half-space for the dominant harmonic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AmbientParams {
    pub medium: Medium,
    /// Dominant propagation constant $\gamma_{00}$ (1/m).
    pub gamma: Complex64,
    /// Normalised TE and TM admittances of the dominant harmonic.
    pub admittance: [Complex64; 2],
}

/// Immutable snapshot of one analysed (frequency, scan) point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointResult {
    /// Serial index of the point within its sweep.
    pub index: usize,
    pub frequency_hz: f64,
    pub scan: ScanPoint,
    /// Dominant transverse wavevector (rad/m).
    pub beta00: [f64; 2],
    pub lattice: Option<Lattice>,
    pub region1: AmbientParams,
    pub region_n: AmbientParams,
    /// Full-stack GSM; modes 0 and 1 are the dominant TE and TM modes.
    pub gsm: Gsm,
}

impl PointResult {
    /// Free-space wavenumber (rad/m).
    pub fn k0(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.frequency_hz / C0
    }
}
