//! Integration tests: stacks containing patterned sheets solved by the
//! method of moments.
//!
//! The unit cell is 10 mm square and the analyses run at 10 GHz, so only the
//! (0, 0) harmonic propagates and power balance can be checked on the two
//! dominant modes alone.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_abs_diff_eq;

use lamina_core::analysis::Analysis;
use lamina_core::extract::{s_param, ModeAddr};
use lamina_core::gsm::Gsm;
use lamina_core::modes::JunctionModes;
use lamina_core::solver::mom::MomSolver;
use lamina_core::solver::{SheetSolver, SolverError};
use lamina_core::types::{
    AnalysisParams, Layer, Lattice, Medium, PointResult, ScanPoint, Sheet, SheetClass,
    Structure, StructureBuilder,
};
use lamina_geometry::primitives::Rectangle;
use lamina_geometry::{discretise_shape, Shape};

const PERIOD: f64 = 0.01;
const FREQ: f64 = 10e9;

fn lattice() -> Lattice {
    Lattice::rectangular(PERIOD, PERIOD).unwrap()
}

fn patch(name: &str, class: SheetClass) -> Sheet {
    let shape = Shape::Rectangle(Rectangle {
        centre: [0.005, 0.005],
        lx: 0.005,
        ly: 0.005,
    });
    let mesh = discretise_shape(&shape, 4, 4).unwrap();
    Sheet::new(name, class, lattice(), mesh)
}

/// Forwards to the MoM solver and counts the calls.
struct CountingSolver {
    inner: MomSolver,
    calls: Arc<AtomicUsize>,
}

impl SheetSolver for CountingSolver {
    fn junction_gsm(
        &self,
        sheet: &Sheet,
        offset: [f64; 2],
        modes: &JunctionModes<'_>,
    ) -> Result<Gsm, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.junction_gsm(sheet, offset, modes)
    }

    fn method_name(&self) -> &str {
        "counting"
    }
}

fn counted(structure: Structure, params: AnalysisParams) -> (Analysis, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let solver = CountingSolver {
        inner: MomSolver::new(&params),
        calls: Arc::clone(&calls),
    };
    let analysis = Analysis::new(structure, params, FREQ)
        .unwrap()
        .with_solver(Box::new(solver));
    (analysis, calls)
}

fn single_sheet(class: SheetClass) -> Structure {
    let mut b = StructureBuilder::new();
    let s = b.add_sheet(patch("patch", class));
    b.push_layer(Layer::ambient(Medium::vacuum()))
        .push_sheet(s, [0.0, 0.0])
        .push_layer(Layer::ambient(Medium::vacuum()));
    b.build().unwrap()
}

fn solve(structure: Structure, scan: ScanPoint) -> PointResult {
    let analysis = Analysis::new(structure, AnalysisParams::default(), FREQ).unwrap();
    analysis.analyze_point(0, FREQ, &scan).unwrap()
}

fn assert_dominant_power_balance(gsm: &Gsm) {
    for q in 0..2 {
        let mut power = 0.0;
        for p in 0..2 {
            power += gsm.s11[[p, q]].norm_sqr() + gsm.s21[[p, q]].norm_sqr();
        }
        assert_abs_diff_eq!(power, 1.0, epsilon = 1e-8);
    }
}

#[test]
fn test_lossless_patch_conserves_power() {
    let result = solve(single_sheet(SheetClass::Impedance), ScanPoint::normal());
    assert_dominant_power_balance(&result.gsm);
    // The patch must actually scatter.
    assert!(result.gsm.s11[[0, 0]].norm() > 1e-3);
}

#[test]
fn test_lossless_aperture_conserves_power() {
    let result = solve(single_sheet(SheetClass::Admittance), ScanPoint::normal());
    assert_dominant_power_balance(&result.gsm);
    assert!(result.gsm.s21[[0, 0]].norm() > 1e-3);
}

#[test]
fn test_resistive_patch_absorbs() {
    let mut b = StructureBuilder::new();
    let s = b.add_sheet(patch("lossy", SheetClass::Impedance).with_surface_resistance(50.0));
    b.push_layer(Layer::ambient(Medium::vacuum()))
        .push_sheet(s, [0.0, 0.0])
        .push_layer(Layer::ambient(Medium::vacuum()));
    let result = solve(b.build().unwrap(), ScanPoint::normal());
    let gsm = &result.gsm;
    let power = gsm.s11[[0, 0]].norm_sqr()
        + gsm.s11[[1, 0]].norm_sqr()
        + gsm.s21[[0, 0]].norm_sqr()
        + gsm.s21[[1, 0]].norm_sqr();
    assert!(power < 1.0 - 1e-6, "power {power}");
}

#[test]
fn test_mirror_symmetric_patch_treats_h_and_v_alike() {
    // The staircase mesh is symmetric about the line x = y, which swaps the
    // H and V polarisations at normal incidence.
    let result = solve(single_sheet(SheetClass::Impedance), ScanPoint::normal());
    for (i, j) in [(1, 1), (2, 1)] {
        let hh = s_param(&result, i, j, ModeAddr::H, ModeAddr::H).unwrap();
        let vv = s_param(&result, i, j, ModeAddr::V, ModeAddr::V).unwrap();
        assert_abs_diff_eq!((hh - vv).norm(), 0.0, epsilon = 1e-8);
    }
}

#[test]
fn test_sheet_on_substrate_is_reciprocal_at_normal_incidence() {
    let mut b = StructureBuilder::new();
    let s = b.add_sheet(patch("patch", SheetClass::Impedance));
    b.push_layer(Layer::ambient(Medium::vacuum()))
        .push_sheet(s, [0.001, 0.0])
        .push_layer(Layer::new(Medium::dielectric(3.0, 0.0), 0.002))
        .push_layer(Layer::ambient(Medium::vacuum()));
    let result = solve(b.build().unwrap(), ScanPoint::normal());
    let gsm = &result.gsm;
    for p in 0..2 {
        for q in 0..2 {
            assert_abs_diff_eq!((gsm.s21[[p, q]] - gsm.s12[[q, p]]).norm(), 0.0, epsilon = 1e-8);
        }
    }
    assert_dominant_power_balance(gsm);
}

#[test]
fn test_reversed_oblique_incidence_is_reciprocal() {
    let mut b = StructureBuilder::new();
    let s = b.add_sheet(patch("patch", SheetClass::Impedance));
    b.push_layer(Layer::ambient(Medium::vacuum()))
        .push_sheet(s, [0.001, 0.0])
        .push_layer(Layer::new(Medium::dielectric(3.0, 0.0), 0.002))
        .push_layer(Layer::ambient(Medium::vacuum()));
    let on_substrate = b.build().unwrap();

    let forward = ScanPoint::Angles {
        theta_deg: 35.0,
        phi_deg: 20.0,
    };
    let reversed = ScanPoint::Angles {
        theta_deg: 35.0,
        phi_deg: 200.0,
    };
    for structure in [
        single_sheet(SheetClass::Impedance),
        single_sheet(SheetClass::Admittance),
        on_substrate,
    ] {
        let a = solve(structure.clone(), forward);
        let b = solve(structure, reversed);
        // Reversing β flips both dominant mode vectors, so the signs cancel.
        for p in 0..2 {
            for q in 0..2 {
                let s21 = a.gsm.s21[[p, q]].norm();
                let s12 = b.gsm.s12[[q, p]].norm();
                assert_abs_diff_eq!(s21, s12, epsilon = 1e-8);
            }
        }
        assert!(a.gsm.s21[[0, 0]].norm() > 1e-3);
    }
}

#[test]
fn test_inert_sheet_is_never_solved() {
    let mut b = StructureBuilder::new();
    let blank = b.add_sheet(Sheet::inert("blank", lattice()));
    let slab = Layer::new(Medium::dielectric(2.2, 0.0), 0.002);
    b.push_layer(Layer::ambient(Medium::vacuum()))
        .push_sheet(blank, [0.0, 0.0])
        .push_layer(slab.clone())
        .push_layer(Layer::ambient(Medium::vacuum()));
    let with_blank = b.build().unwrap();

    let mut b = StructureBuilder::new();
    b.push_layer(Layer::ambient(Medium::vacuum()))
        .push_layer(slab)
        .push_layer(Layer::ambient(Medium::vacuum()));
    let bare = b.build().unwrap();

    let (analysis, calls) = counted(with_blank, AnalysisParams::default());
    let scan = ScanPoint::Angles {
        theta_deg: 20.0,
        phi_deg: 45.0,
    };
    let blanked = analysis.analyze_point(0, FREQ, &scan).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let reference = solve(bare, scan);
    let a = blanked.gsm.dominant();
    let b = reference.gsm.dominant();
    for (x, y) in a.s21.iter().zip(b.s21.iter()) {
        assert_abs_diff_eq!((x - y).norm(), 0.0, epsilon = 1e-12);
    }
    for (x, y) in a.s11.iter().zip(b.s11.iter()) {
        assert_abs_diff_eq!((x - y).norm(), 0.0, epsilon = 1e-12);
    }
}

fn four_sheet_stack() -> Structure {
    let mut b = StructureBuilder::new();
    let s = b.add_sheet(patch("patch", SheetClass::Impedance));
    let gap = Layer::new(Medium::dielectric(2.2, 0.0), 0.003);
    b.push_layer(Layer::ambient(Medium::vacuum()))
        .push_sheet(s, [0.0, 0.0])
        .push_layer(gap.clone())
        .push_sheet(s, [0.0, 0.0])
        .push_layer(gap.clone())
        .push_sheet(s, [0.002, 0.001])
        .push_layer(gap)
        .push_sheet(s, [0.0, 0.0])
        .push_layer(Layer::ambient(Medium::vacuum()));
    b.build().unwrap()
}

#[test]
fn test_block_reuse_matches_full_recomputation() {
    let scan = ScanPoint::Angles {
        theta_deg: 25.0,
        phi_deg: 10.0,
    };

    let (dedup, dedup_calls) = counted(four_sheet_stack(), AnalysisParams::default());
    let full_params = AnalysisParams {
        deduplicate: false,
        ..AnalysisParams::default()
    };
    let (full, full_calls) = counted(four_sheet_stack(), full_params);
    assert_eq!(dedup.blocks().len(), 4);

    let reused = dedup.analyze_point(0, FREQ, &scan).unwrap();
    let recomputed = full.analyze_point(0, FREQ, &scan).unwrap();
    // The two middle blocks are interchangeable.
    assert_eq!(dedup_calls.load(Ordering::SeqCst), 3);
    assert_eq!(full_calls.load(Ordering::SeqCst), 4);

    for (a, b) in [
        (&reused.gsm.s11, &recomputed.gsm.s11),
        (&reused.gsm.s12, &recomputed.gsm.s12),
        (&reused.gsm.s21, &recomputed.gsm.s21),
        (&reused.gsm.s22, &recomputed.gsm.s22),
    ] {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!((x - y).norm(), 0.0, epsilon = 1e-8 * (1.0 + y.norm()));
        }
    }
}

#[test]
fn test_block_gsms_expose_each_block() {
    let analysis = Analysis::new(four_sheet_stack(), AnalysisParams::default(), FREQ).unwrap();
    let blocks = analysis
        .block_gsms(FREQ, &ScanPoint::normal())
        .unwrap();
    let counts = analysis.mode_counts();
    assert_eq!(blocks.len(), 4);
    for (gsm, block) in blocks.iter().zip(analysis.blocks()) {
        assert_eq!(gsm.n1(), counts[block.start]);
        assert_eq!(gsm.n2(), counts[block.end]);
    }
    assert_eq!(analysis.solver_name(), "Spectral method of moments (RWG)");
}
