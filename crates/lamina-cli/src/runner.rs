//! Sweep runner: builds the structure from a job, runs it and writes results.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use log::warn;
use num_complex::Complex64;

use lamina_compute::{ComputeBackend, CpuBackend};
use lamina_core::outputs::{parse_outputs, Output};
use lamina_core::solver::mom::MomSolver;
use lamina_core::{
    run_sweep, Analysis, Layer, Lattice, Medium, ResultArchive, ScanSpec, Sheet, SheetClass,
    SheetId, Structure, StructureBuilder, SweepPlan, SweepSummary,
};
use lamina_geometry::{discretise_shape, Transform2, UnitCellMesh};

use crate::config::{JobConfig, ScanConfig, SheetConfig, StackEntry};

const MM: f64 = 1e-3;

/// Results of a sweep run.
pub struct SweepOutput {
    pub summary: SweepSummary,
    pub archive: ResultArchive,
    pub outputs: Vec<Output>,
}

/// Everything needed to run a job, checked before any point is analysed.
pub struct PreparedJob {
    pub analysis: Analysis,
    pub plan: SweepPlan,
    pub outputs: Vec<Output>,
    pub backend: Arc<dyn ComputeBackend>,
}

/// Build and validate the structure, sweep plan and outputs of a job.
pub fn prepare(job: &JobConfig) -> Result<PreparedJob> {
    let structure = build_structure(job)?;
    let plan = build_plan(job)?;
    plan.validate(&structure).context("Invalid sweep")?;
    let outputs = parse_outputs(&job.output.quantities).context("Invalid output list")?;

    let backend = create_backend(job.analysis.threads)?;
    let solver = MomSolver::new(&job.analysis.params).with_backend(Arc::clone(&backend));
    let analysis = Analysis::new(structure, job.analysis.params.clone(), plan.max_frequency())
        .context("Invalid analysis parameters")?
        .with_solver(Box::new(solver));

    Ok(PreparedJob {
        analysis,
        plan,
        outputs,
        backend,
    })
}

/// Run a full sweep from a parsed job configuration.
pub fn run_job(job: &JobConfig) -> Result<SweepOutput> {
    let prepared = prepare(job)?;
    let analysis = &prepared.analysis;

    println!("Device: {}", prepared.backend.device_info().name);
    println!("Solver: {}", analysis.solver_name());
    println!(
        "Blocks: {}, modes per layer: {:?}",
        analysis.blocks().len(),
        analysis.mode_counts()
    );
    println!("Points: {}", prepared.plan.len());

    let archive = Mutex::new(ResultArchive::new());
    let summary = run_sweep(analysis, &prepared.plan, prepared.backend.as_ref(), &archive);
    println!(
        "Completed {} points ({} skipped, {} failed)",
        summary.completed, summary.skipped, summary.failed
    );

    Ok(SweepOutput {
        summary,
        archive: archive.into_inner().unwrap_or_else(PoisonError::into_inner),
        outputs: prepared.outputs,
    })
}

fn build_plan(job: &JobConfig) -> Result<SweepPlan> {
    let frequencies = job.analysis.frequencies.to_hz();
    let (scan, order) = match &job.scan {
        ScanConfig::Angles {
            theta_deg,
            phi_deg,
            order,
        } => (
            ScanSpec::Angles {
                theta_deg: theta_deg.clone(),
                phi_deg: phi_deg.clone(),
            },
            *order,
        ),
        ScanConfig::Phase {
            psi1_deg,
            psi2_deg,
            order,
        } => (
            ScanSpec::PhaseShifts {
                psi1: psi1_deg.iter().map(|p| p.to_radians()).collect(),
                psi2: psi2_deg.iter().map(|p| p.to_radians()).collect(),
            },
            *order,
        ),
    };
    Ok(SweepPlan::new(frequencies, scan, order)?)
}

/// Build the layered structure. Sheets are meshed once per name, however
/// often the stack places them.
pub fn build_structure(job: &JobConfig) -> Result<Structure> {
    let mut builder = StructureBuilder::new();
    let mut ids: HashMap<&str, SheetId> = HashMap::new();

    for entry in &job.stack {
        match entry {
            StackEntry::Layer {
                eps_r,
                tan_delta,
                mu_r,
                width_mm,
            } => {
                let medium = Medium {
                    epsilon: Complex64::new(*eps_r, -eps_r * tan_delta),
                    mu: Complex64::new(*mu_r, 0.0),
                };
                builder.push_layer(Layer::new(medium, width_mm * MM));
            }
            StackEntry::Sheet { name, offset_mm } => {
                let id = match ids.get(name.as_str()) {
                    Some(id) => *id,
                    None => {
                        let config = job
                            .sheet
                            .iter()
                            .find(|s| &s.name == name)
                            .with_context(|| format!("Stack refers to undefined sheet '{name}'"))?;
                        let id = builder.add_sheet(build_sheet(config)?);
                        ids.insert(name.as_str(), id);
                        id
                    }
                };
                builder.push_sheet(id, [offset_mm[0] * MM, offset_mm[1] * MM]);
            }
        }
    }

    Ok(builder.build()?)
}

fn build_sheet(config: &SheetConfig) -> Result<Sheet> {
    let class: SheetClass = config.class.parse()?;
    let lattice = Lattice::new(
        [config.s1_mm[0] * MM, config.s1_mm[1] * MM],
        [config.s2_mm[0] * MM, config.s2_mm[1] * MM],
    )
    .with_context(|| format!("Sheet '{}'", config.name))?;

    if class == SheetClass::Inert {
        return Ok(Sheet::inert(config.name.clone(), lattice));
    }

    let shape = config
        .shape
        .as_ref()
        .with_context(|| format!("Sheet '{}' requires a shape", config.name))?;
    let mesh = discretise_shape(shape, config.cells[0], config.cells[1])
        .with_context(|| format!("Sheet '{}'", config.name))?;
    let (min, max) = shape.bounding_box();
    let centre = [0.5 * (min[0] + max[0]), 0.5 * (min[1] + max[1])];
    let mesh = place_mesh(&mesh, centre, config.rotate_deg)
        .with_context(|| format!("Sheet '{}'", config.name))?;

    println!(
        "  Sheet '{}': {:?}, {} triangles",
        config.name,
        class,
        mesh.triangles().len()
    );

    Ok(Sheet::new(config.name.clone(), class, lattice, mesh)
        .with_surface_resistance(config.surface_resistance))
}

/// Rotate a millimetre mesh about `centre` and convert it to metres.
fn place_mesh(mesh: &UnitCellMesh, centre: [f64; 2], rotate_deg: f64) -> Result<UnitCellMesh> {
    let transform = Transform2::translation(-centre[0], -centre[1])
        .then(&Transform2::rotation_deg(rotate_deg))
        .then(&Transform2::translation(centre[0], centre[1]))
        .then(&Transform2::uniform_scale(MM));
    Ok(transform.apply_to_mesh(mesh)?)
}

/// Create the sweep backend; `threads == 0` uses the global Rayon pool.
pub fn create_backend(threads: usize) -> Result<Arc<dyn ComputeBackend>> {
    if threads == 0 {
        Ok(Arc::new(CpuBackend::new()))
    } else {
        Ok(Arc::new(CpuBackend::with_threads(threads)?))
    }
}

/// Write the named outputs of every archived point to a CSV file with a
/// metadata header.
pub fn write_results_csv(output: &SweepOutput, path: &Path, job: &JobConfig) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Cannot create {}", path.display()))?;

    writeln!(file, "# Lamina FSS Solver - Sweep Results")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# dbmin: {}", job.analysis.params.dbmin)?;
    for sheet in &job.sheet {
        writeln!(file, "# sheet '{}': class={}", sheet.name, sheet.class)?;
    }
    writeln!(
        file,
        "# completed={} skipped={} failed={}",
        output.summary.completed, output.summary.skipped, output.summary.failed
    )?;

    let labels: Vec<&str> = output.outputs.iter().map(|o| o.label.as_str()).collect();
    writeln!(file, "index,{}", labels.join(","))?;

    for result in output.archive.iter() {
        let values: Vec<String> = output
            .outputs
            .iter()
            .map(|o| match o.evaluate(result) {
                Ok(v) => format!("{v:.8e}"),
                Err(e) => {
                    warn!("Point {}: {}: {e}", result.index, o.label);
                    "NaN".to_string()
                }
            })
            .collect();
        writeln!(file, "{},{}", result.index, values.join(","))?;
    }

    println!("Results written to {}", path.display());
    Ok(())
}

/// Save the full result archive as JSON.
pub fn write_results_json(archive: &ResultArchive, path: &Path) -> Result<()> {
    archive
        .save(path)
        .with_context(|| format!("Cannot write {}", path.display()))?;
    println!("Archive written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn job(text: &str) -> JobConfig {
        toml::from_str(text).unwrap()
    }

    const SLAB: &str = r#"
        [analysis]
        frequencies = { values_ghz = [10.0, 12.0] }
        threads = 1

        [[stack]]
        kind = "layer"

        [[stack]]
        kind = "layer"
        eps_r = 4.0
        width_mm = 5.0

        [[stack]]
        kind = "layer"

        [output]
        quantities = ["FGHz", "s21mag(te,te)", "s21mag(3,1)"]
    "#;

    #[test]
    fn test_slab_job_runs_and_writes_csv() {
        let job = job(SLAB);
        let output = run_job(&job).unwrap();
        assert_eq!(output.summary.completed, 2);
        assert_eq!(output.archive.len(), 2);

        let dir = std::env::temp_dir().join(format!("lamina-cli-{}", std::process::id()));
        let path = dir.join("results.csv");
        write_results_csv(&output, &path, &job).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        let rows: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(rows[0], "index,FGHz,s21mag(te,te),s21mag(3,1)");
        assert_eq!(rows.len(), 3);
        let first: Vec<&str> = rows[1].split(',').collect();
        assert_eq!(first[0], "0");
        assert_abs_diff_eq!(first[1].parse::<f64>().unwrap(), 10.0, epsilon = 1e-9);
        // A dielectric stack carries only the two dominant modes.
        assert_eq!(first[3], "NaN");
    }

    #[test]
    fn test_sheet_reuse_and_units() {
        let job = job(r#"
            [analysis]
            frequencies = { values_ghz = [10.0] }

            [[sheet]]
            name = "patch"
            class = "J"
            s1_mm = [10.0, 0.0]
            s2_mm = [0.0, 10.0]
            shape = { type = "rectangle", centre = [5.0, 5.0], lx = 4.0, ly = 4.0 }
            cells = [2, 2]
            rotate_deg = 90.0

            [[stack]]
            kind = "layer"

            [[stack]]
            kind = "sheet"
            name = "patch"

            [[stack]]
            kind = "layer"
            width_mm = 2.0

            [[stack]]
            kind = "sheet"
            name = "patch"
            offset_mm = [1.0, 0.0]

            [[stack]]
            kind = "layer"
        "#);
        let structure = build_structure(&job).unwrap();
        let placements: Vec<_> = structure.junctions().iter().flatten().collect();
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].sheet, placements[1].sheet);
        assert_abs_diff_eq!(placements[1].offset[0], 0.001, epsilon = 1e-15);
        let mesh = structure.sheet(placements[0].sheet).mesh().unwrap();
        for node in mesh.nodes() {
            assert!(node[0] > 0.0029 && node[0] < 0.0071, "{node:?}");
            assert!(node[1] > 0.0029 && node[1] < 0.0071, "{node:?}");
        }
    }

    #[test]
    fn test_undefined_sheet_is_rejected() {
        let job = job(r#"
            [analysis]
            frequencies = { values_ghz = [10.0] }

            [[stack]]
            kind = "layer"

            [[stack]]
            kind = "sheet"
            name = "missing"

            [[stack]]
            kind = "layer"
        "#);
        assert!(build_structure(&job).is_err());
    }
}
