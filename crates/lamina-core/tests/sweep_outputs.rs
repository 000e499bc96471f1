//! Integration tests: sweeps, the result archive, and derived outputs.

use std::sync::Mutex;

use approx::assert_abs_diff_eq;

use lamina_compute::CpuBackend;
use lamina_core::extract::{s_param, ModeAddr};
use lamina_core::modes::JunctionModes;
use lamina_core::outputs::{parse_output, parse_outputs};
use lamina_core::solver::{SheetSolver, SolverError};
use lamina_core::types::{Layer, Lattice, Medium, PointResult, Sheet, SheetClass, C0};
use lamina_core::{
    run_sweep, Analysis, AnalysisError, AnalysisParams, Gsm, ResultArchive, ScanPoint, ScanSpec,
    SteeringOrder, Structure, StructureBuilder, SweepPlan, SweepSummary,
};
use num_complex::Complex64;
use lamina_geometry::primitives::Cross;
use lamina_geometry::{discretise_shape, Shape};

fn slab(region1: Medium) -> Structure {
    let mut b = StructureBuilder::new();
    b.push_layer(Layer::ambient(region1))
        .push_layer(Layer::new(Medium::dielectric(3.0, 0.0), 0.004))
        .push_layer(Layer::ambient(Medium::vacuum()));
    b.build().unwrap()
}

fn analyse(structure: Structure, f: f64, scan: ScanPoint) -> PointResult {
    let analysis = Analysis::new(structure, AnalysisParams::default(), f).unwrap();
    analysis.analyze_point(0, f, &scan).unwrap()
}

#[test]
fn test_sweep_skips_cutoff_points_and_keeps_order() {
    let structure = slab(Medium::dielectric(4.0, 0.0));
    let plan = SweepPlan::new(
        vec![8e9, 10e9],
        ScanSpec::Angles {
            theta_deg: vec![0.0, 60.0],
            phi_deg: vec![0.0],
        },
        SteeringOrder::FirstOuter,
    )
    .unwrap();
    plan.validate(&structure).unwrap();
    let analysis = Analysis::new(structure, AnalysisParams::default(), plan.max_frequency()).unwrap();
    let backend = CpuBackend::with_threads(2).unwrap();
    let archive = Mutex::new(ResultArchive::new());

    let summary = run_sweep(&analysis, &plan, &backend, &archive);
    assert_eq!(
        summary,
        SweepSummary {
            completed: 2,
            skipped: 2,
            failed: 0
        }
    );

    let archive = archive.into_inner().unwrap();
    let restored = ResultArchive::from_json(&archive.to_json().unwrap()).unwrap();
    let entries: Vec<(usize, f64)> = restored.iter().map(|r| (r.index, r.frequency_hz)).collect();
    assert_eq!(entries, vec![(0, 8e9), (1, 10e9)]);
    let (a, b) = (&restored.get(1).unwrap().gsm, &archive.get(1).unwrap().gsm);
    assert_abs_diff_eq!((a.s21[[0, 0]] - b.s21[[0, 0]]).norm(), 0.0, epsilon = 1e-12);
}

#[test]
fn test_archive_survives_a_file_round_trip() {
    let plan = SweepPlan::new(
        vec![6e9, 7e9, 9e9],
        ScanSpec::Angles {
            theta_deg: vec![10.0],
            phi_deg: vec![0.0, 45.0],
        },
        SteeringOrder::SecondOuter,
    )
    .unwrap();
    let analysis =
        Analysis::new(slab(Medium::vacuum()), AnalysisParams::default(), plan.max_frequency()).unwrap();
    let archive = Mutex::new(ResultArchive::new());
    let summary = run_sweep(&analysis, &plan, &CpuBackend::new(), &archive);
    assert_eq!(summary.completed, 6);

    let path = std::env::temp_dir().join(format!("lamina-archive-{}.json", std::process::id()));
    archive.into_inner().unwrap().save(&path).unwrap();
    let loaded = ResultArchive::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let indices: Vec<usize> = loaded.iter().map(|r| r.index).collect();
    assert_eq!(indices, (0..6).collect::<Vec<_>>());
    assert_eq!(
        loaded.get(3).unwrap().scan,
        ScanPoint::Angles {
            theta_deg: 10.0,
            phi_deg: 45.0
        }
    );
}

#[test]
fn test_linear_and_circular_bases_carry_the_same_power() {
    let scan = ScanPoint::Angles {
        theta_deg: 30.0,
        phi_deg: 30.0,
    };
    let result = analyse(slab(Medium::vacuum()), 10e9, scan);
    for (i, j) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
        for src in [ModeAddr::H, ModeAddr::V, ModeAddr::R] {
            let linear: f64 = [ModeAddr::H, ModeAddr::V]
                .iter()
                .map(|&o| s_param(&result, i, j, o, src).unwrap().norm_sqr())
                .sum();
            let circular: f64 = [ModeAddr::R, ModeAddr::L]
                .iter()
                .map(|&o| s_param(&result, i, j, o, src).unwrap().norm_sqr())
                .sum();
            let modal: f64 = [ModeAddr::TE, ModeAddr::TM]
                .iter()
                .map(|&o| s_param(&result, i, j, o, src).unwrap().norm_sqr())
                .sum();
            assert_abs_diff_eq!(linear, circular, epsilon = 1e-12);
            assert_abs_diff_eq!(linear, modal, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_reflection_reverses_handedness() {
    let result = analyse(slab(Medium::vacuum()), 10e9, ScanPoint::normal());
    let gamma = result.gsm.s11[[0, 0]].norm();
    assert!(gamma > 1e-3);
    let co = s_param(&result, 1, 1, ModeAddr::R, ModeAddr::R).unwrap();
    let cross = s_param(&result, 1, 1, ModeAddr::L, ModeAddr::R).unwrap();
    assert_abs_diff_eq!(co.norm(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(cross.norm(), gamma, epsilon = 1e-12);

    // Transmission keeps it.
    let t = result.gsm.s21[[0, 0]].norm();
    assert_abs_diff_eq!(s_param(&result, 2, 1, ModeAddr::R, ModeAddr::R).unwrap().norm(), t, epsilon = 1e-12);
    assert_abs_diff_eq!(s_param(&result, 2, 1, ModeAddr::L, ModeAddr::R).unwrap().norm(), 0.0, epsilon = 1e-12);
}

#[test]
fn test_named_outputs_evaluate_against_a_result() {
    let scan = ScanPoint::Angles {
        theta_deg: 30.0,
        phi_deg: 30.0,
    };
    let result = analyse(slab(Medium::vacuum()), 10e9, scan);
    let eval = |name: &str| parse_output(name).unwrap().evaluate(&result).unwrap();

    assert_abs_diff_eq!(eval("FGHz"), 10.0, epsilon = 1e-12);
    assert_abs_diff_eq!(eval("FMHz"), 1e4, epsilon = 1e-9);
    assert_abs_diff_eq!(eval("theta"), 30.0, epsilon = 1e-9);
    assert_abs_diff_eq!(eval("phi"), 30.0, epsilon = 1e-9);
    assert!(eval("psi1").is_nan());

    let s21 = result.gsm.s21[[0, 0]];
    assert_abs_diff_eq!(eval("s21mag(te,te)"), s21.norm(), epsilon = 1e-12);
    assert_abs_diff_eq!(eval("s21mag(1,1)"), s21.norm(), epsilon = 1e-12);
    assert_abs_diff_eq!(eval("s21db(te,te)"), 20.0 * s21.norm().log10(), epsilon = 1e-12);
    assert_abs_diff_eq!(eval("s21re(te,te)"), s21.re, epsilon = 1e-12);
    assert_abs_diff_eq!(eval("s21im(te,te)"), s21.im, epsilon = 1e-12);
    assert_abs_diff_eq!(eval("s21ang(te,te)"), s21.arg().to_degrees(), epsilon = 1e-9);

    let tm = result.gsm.s21[[1, 1]];
    assert_abs_diff_eq!(eval("ddb21(te,tm)"), 20.0 * (s21.norm() / tm.norm()).log10(), epsilon = 1e-9);
    assert_abs_diff_eq!(eval("dang21(te,tm)"), (s21 / tm).arg().to_degrees(), epsilon = 1e-9);

    // The slab does not couple TE and TM, so a TE input stays linear.
    assert!(eval("ar21db(te)") > 100.0);

    let outputs = parse_outputs(&["FGHz", "s11db(h,h)", "s21mag(r,r)"]).unwrap();
    let labels: Vec<&str> = outputs.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["FGHz", "s11db(h,h)", "s21mag(r,r)"]);
    assert!(parse_outputs(&["FGHz", "s21mag(3,1)"]).unwrap()[1].evaluate(&result).is_err());
}

#[test]
fn test_phase_shift_scan_reports_equivalent_angles() {
    let period = 0.012;
    let lattice = Lattice::rectangular(period, period).unwrap();
    let cross = Shape::Cross(Cross {
        centre: [0.006, 0.006],
        arm_length: 0.009,
        arm_width: 0.003,
    });
    let mesh = discretise_shape(&cross, 3, 3).unwrap();
    let mut b = StructureBuilder::new();
    let s = b.add_sheet(Sheet::new("cross", SheetClass::Admittance, lattice, mesh));
    b.push_layer(Layer::ambient(Medium::vacuum()))
        .push_sheet(s, [0.0, 0.0])
        .push_layer(Layer::ambient(Medium::vacuum()));

    let f = 10e9;
    let psi1 = 0.5;
    let result = analyse(b.build().unwrap(), f, ScanPoint::PhaseShifts { psi1, psi2: 0.0 });
    let eval = |name: &str| parse_output(name).unwrap().evaluate(&result).unwrap();

    let k0 = 2.0 * std::f64::consts::PI * f / C0;
    let theta = (psi1 / (period * k0)).asin().to_degrees();
    assert_abs_diff_eq!(eval("theta"), theta, epsilon = 1e-9);
    assert_abs_diff_eq!(eval("phi"), 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(eval("psi1"), psi1.to_degrees(), epsilon = 1e-9);
    assert_abs_diff_eq!(eval("psi2"), 0.0, epsilon = 1e-9);
    assert!(eval("s21db(h,h)").is_finite());
}

/// Stands in for a sheet solver whose interaction matrix cannot be factored.
struct SingularSolver;

impl SheetSolver for SingularSolver {
    fn junction_gsm(
        &self,
        _sheet: &Sheet,
        _offset: [f64; 2],
        modes: &JunctionModes<'_>,
    ) -> Result<Gsm, SolverError> {
        Err(SolverError::Singular {
            dim: modes.n_left,
            pivot_ratio: 0.0,
        })
    }

    fn method_name(&self) -> &str {
        "singular"
    }
}

/// Returns a junction whose transmission has overflowed.
struct OverflowSolver;

impl SheetSolver for OverflowSolver {
    fn junction_gsm(
        &self,
        _sheet: &Sheet,
        _offset: [f64; 2],
        modes: &JunctionModes<'_>,
    ) -> Result<Gsm, SolverError> {
        let mut gsm = Gsm::zeros(modes.n_left, modes.n_right);
        gsm.s21[[0, 0]] = Complex64::new(f64::INFINITY, 0.0);
        Ok(gsm)
    }

    fn method_name(&self) -> &str {
        "overflow"
    }
}

fn patch_screen() -> Structure {
    let mesh = discretise_shape(
        &Shape::Cross(Cross {
            centre: [0.005, 0.005],
            arm_length: 0.008,
            arm_width: 0.002,
        }),
        4,
        4,
    )
    .unwrap();
    let mut b = StructureBuilder::new();
    let s = b.add_sheet(Sheet::new(
        "dup",
        SheetClass::Impedance,
        Lattice::rectangular(0.01, 0.01).unwrap(),
        mesh,
    ));
    b.push_layer(Layer::ambient(Medium::vacuum()))
        .push_sheet(s, [0.0, 0.0])
        .push_layer(Layer::ambient(Medium::vacuum()));
    b.build().unwrap()
}

fn two_point_plan() -> SweepPlan {
    SweepPlan::new(
        vec![9e9, 10e9],
        ScanSpec::Angles {
            theta_deg: vec![0.0],
            phi_deg: vec![0.0],
        },
        SteeringOrder::FirstOuter,
    )
    .unwrap()
}

#[test]
fn test_singular_sheet_fails_only_its_points() {
    let plan = two_point_plan();
    let analysis = Analysis::new(patch_screen(), AnalysisParams::default(), plan.max_frequency())
        .unwrap()
        .with_solver(Box::new(SingularSolver));

    let err = analysis
        .analyze_point(0, 10e9, &ScanPoint::normal())
        .unwrap_err();
    assert!(!err.is_skip());
    assert!(matches!(
        err,
        AnalysisError::Sheet { ref sheet, frequency_hz, .. } if sheet == "dup" && frequency_hz == 10e9
    ));
    let message = err.to_string();
    assert!(message.contains("'dup'"), "{message}");
    assert!(message.contains("1.000000e10 Hz"), "{message}");

    let archive = Mutex::new(ResultArchive::new());
    let summary = run_sweep(&analysis, &plan, &CpuBackend::new(), &archive);
    assert_eq!(
        summary,
        SweepSummary {
            completed: 0,
            skipped: 0,
            failed: 2
        }
    );
    assert!(archive.into_inner().unwrap().is_empty());
}

#[test]
fn test_non_finite_result_is_a_failure() {
    let plan = two_point_plan();
    let analysis = Analysis::new(patch_screen(), AnalysisParams::default(), plan.max_frequency())
        .unwrap()
        .with_solver(Box::new(OverflowSolver));

    let err = analysis
        .analyze_point(0, 9e9, &ScanPoint::normal())
        .unwrap_err();
    assert!(!err.is_skip());
    assert!(matches!(err, AnalysisError::NonFinite { .. }));

    let archive = Mutex::new(ResultArchive::new());
    let summary = run_sweep(&analysis, &plan, &CpuBackend::new(), &archive);
    assert_eq!(summary.failed, 2);
    assert!(archive.into_inner().unwrap().is_empty());
}
