//! TOML configuration deserialisation for sweep jobs.
//!
//! Lengths in job files are in millimetres and frequencies in GHz; the
//! runner converts them to SI units before building the structure.

use lamina_core::{AnalysisParams, SteeringOrder};
use lamina_geometry::Shape;
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub sheet: Vec<SheetConfig>,
    pub stack: Vec<StackEntry>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Frequencies plus the numerical knobs of the engine.
#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    pub frequencies: FrequencySpec,
    /// Worker threads for the sweep; 0 uses every core.
    #[serde(default)]
    pub threads: usize,
    #[serde(flatten)]
    pub params: AnalysisParams,
}

/// Frequency specification: either a range or an explicit list (GHz).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FrequencySpec {
    Range { range_ghz: [f64; 2], points: usize },
    List { values_ghz: Vec<f64> },
}

impl FrequencySpec {
    /// Frequencies in Hz.
    pub fn to_hz(&self) -> Vec<f64> {
        match self {
            FrequencySpec::Range { range_ghz, points } => {
                let [start, end] = *range_ghz;
                (0..*points)
                    .map(|i| start + (end - start) * i as f64 / (*points - 1).max(1) as f64)
                    .map(|f| f * 1e9)
                    .collect()
            }
            FrequencySpec::List { values_ghz } => values_ghz.iter().map(|f| f * 1e9).collect(),
        }
    }
}

/// Steering lists and their nesting.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScanConfig {
    Angles {
        theta_deg: Vec<f64>,
        #[serde(default = "default_zero_list")]
        phi_deg: Vec<f64>,
        #[serde(default)]
        order: SteeringOrder,
    },
    /// Inter-element phase shifts, given in degrees.
    Phase {
        psi1_deg: Vec<f64>,
        psi2_deg: Vec<f64>,
        #[serde(default)]
        order: SteeringOrder,
    },
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig::Angles {
            theta_deg: vec![0.0],
            phi_deg: vec![0.0],
            order: SteeringOrder::default(),
        }
    }
}

fn default_zero_list() -> Vec<f64> {
    vec![0.0]
}

/// A named sheet definition. Placing the same name twice in the stack
/// places one sheet twice.
#[derive(Debug, Deserialize)]
pub struct SheetConfig {
    pub name: String,
    /// "impedance" (or "J"), "admittance" (or "E"), or "inert".
    pub class: String,
    /// Lattice vectors (mm).
    pub s1_mm: [f64; 2],
    pub s2_mm: [f64; 2],
    /// Element shape in mm; required unless the sheet is inert.
    pub shape: Option<Shape>,
    /// Grid resolution used to mesh the shape.
    #[serde(default = "default_cells")]
    pub cells: [usize; 2],
    /// Rotation of the element about its centre (degrees).
    #[serde(default)]
    pub rotate_deg: f64,
    /// Surface resistance (Ω/sq).
    #[serde(default)]
    pub surface_resistance: f64,
}

fn default_cells() -> [usize; 2] {
    [8, 8]
}

/// One entry of the stack, listed from region 1 to region N.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StackEntry {
    Layer {
        #[serde(default = "default_one")]
        eps_r: f64,
        #[serde(default)]
        tan_delta: f64,
        #[serde(default = "default_one")]
        mu_r: f64,
        /// Thickness (mm); ignored for the two outermost layers.
        #[serde(default)]
        width_mm: f64,
    },
    Sheet {
        name: String,
        #[serde(default)]
        offset_mm: [f64; 2],
    },
}

fn default_one() -> f64 {
    1.0
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Named quantities written to `results.csv`, one column each.
    #[serde(default = "default_quantities")]
    pub quantities: Vec<String>,
    /// Whether to also save the full result archive as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            quantities: default_quantities(),
            save_json: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}

fn default_quantities() -> Vec<String> {
    ["FGHz", "theta", "phi", "s21db(h,h)", "s21db(v,v)", "s11db(h,h)", "s11db(v,v)"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<JobConfig> {
    use anyhow::Context;

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let config: JobConfig =
        toml::from_str(&content).with_context(|| format!("Cannot parse {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const JOB: &str = r#"
        [analysis]
        frequencies = { range_ghz = [8.0, 12.0], points = 5 }
        dbmin = 40.0

        [scan]
        type = "angles"
        theta_deg = [0.0, 30.0]
        order = "second_outer"

        [[sheet]]
        name = "cross"
        class = "impedance"
        s1_mm = [10.0, 0.0]
        s2_mm = [0.0, 10.0]
        shape = { type = "cross", arm_length = 8.0, arm_width = 1.0 }

        [[stack]]
        kind = "layer"

        [[stack]]
        kind = "sheet"
        name = "cross"

        [[stack]]
        kind = "layer"
        eps_r = 2.2
        width_mm = 1.5

        [[stack]]
        kind = "layer"
    "#;

    #[test]
    fn test_parses_job() {
        let job: JobConfig = toml::from_str(JOB).unwrap();
        let f = job.analysis.frequencies.to_hz();
        assert_eq!(f.len(), 5);
        assert_relative_eq!(f[4], 12e9, max_relative = 1e-12);
        assert_eq!(job.analysis.params.dbmin, 40.0);
        assert!(job.analysis.params.deduplicate);
        assert!(matches!(
            job.scan,
            ScanConfig::Angles { ref phi_deg, order: SteeringOrder::SecondOuter, .. } if phi_deg == &vec![0.0]
        ));
        assert_eq!(job.sheet[0].cells, [8, 8]);
        assert_eq!(job.stack.len(), 4);
        assert!(matches!(job.stack[2], StackEntry::Layer { eps_r, .. } if eps_r == 2.2));
        assert_eq!(job.output.directory, "./output");
    }

    #[test]
    fn test_frequency_list() {
        let spec: FrequencySpec = toml::from_str("values_ghz = [1.0, 2.5]").unwrap();
        assert_eq!(spec.to_hz(), vec![1e9, 2.5e9]);
    }
}
