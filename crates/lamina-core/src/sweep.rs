//! Frequency and scan sweeps.
//!
//! A [`SweepPlan`] enumerates analysis points as steering-outer ×
//! steering-inner × frequency and gives each a serial index. [`run_sweep`]
//! then analyses the points as independent tasks on a compute backend and
//! appends every completed point to a shared [`ResultArchive`] under its
//! serial index, so the archive order never depends on scheduling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use lamina_compute::ComputeBackend;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::Analysis;
use crate::archive::ResultArchive;
use crate::types::{ConfigError, ScanPoint, Structure};

/// Steering values of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScanSpec {
    /// Elevation and azimuth lists (degrees).
    Angles { theta_deg: Vec<f64>, phi_deg: Vec<f64> },
    /// Phase shift lists along `s1` and `s2` (radians).
    PhaseShifts { psi1: Vec<f64>, psi2: Vec<f64> },
}

impl ScanSpec {
    fn lists(&self) -> (&[f64], &[f64]) {
        match self {
            ScanSpec::Angles { theta_deg, phi_deg } => (theta_deg, phi_deg),
            ScanSpec::PhaseShifts { psi1, psi2 } => (psi1, psi2),
        }
    }

    fn point(&self, first: f64, second: f64) -> ScanPoint {
        match self {
            ScanSpec::Angles { .. } => ScanPoint::Angles {
                theta_deg: first,
                phi_deg: second,
            },
            ScanSpec::PhaseShifts { .. } => ScanPoint::PhaseShifts {
                psi1: first,
                psi2: second,
            },
        }
    }
}

/// Which steering list forms the outer loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteeringOrder {
    /// θ (or ψ1) outer, φ (or ψ2) inner.
    #[default]
    FirstOuter,
    /// φ (or ψ2) outer, θ (or ψ1) inner.
    SecondOuter,
}

/// One point of a sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPoint {
    pub index: usize,
    pub frequency_hz: f64,
    pub scan: ScanPoint,
}

#[derive(Debug, Clone)]
pub struct SweepPlan {
    frequencies_hz: Vec<f64>,
    scan: ScanSpec,
    order: SteeringOrder,
}

impl SweepPlan {
    pub fn new(
        frequencies_hz: Vec<f64>,
        scan: ScanSpec,
        order: SteeringOrder,
    ) -> Result<Self, ConfigError> {
        if frequencies_hz.is_empty() {
            return Err(ConfigError::InvalidParameter("no analysis frequencies".into()));
        }
        if let Some(f) = frequencies_hz.iter().find(|f| !(f.is_finite() && **f > 0.0)) {
            return Err(ConfigError::InvalidParameter(format!(
                "frequencies must be positive, got {f}"
            )));
        }
        let (first, second) = scan.lists();
        if first.is_empty() || second.is_empty() {
            return Err(ConfigError::InvalidParameter("empty steering list".into()));
        }
        if first.iter().chain(second).any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidParameter("non-finite steering value".into()));
        }
        Ok(Self {
            frequencies_hz,
            scan,
            order,
        })
    }

    pub fn scan(&self) -> &ScanSpec {
        &self.scan
    }

    pub fn frequencies_hz(&self) -> &[f64] {
        &self.frequencies_hz
    }

    /// Highest frequency of the sweep, which fixes the mode content.
    pub fn max_frequency(&self) -> f64 {
        self.frequencies_hz.iter().copied().fold(0.0, f64::max)
    }

    pub fn len(&self) -> usize {
        let (first, second) = self.scan.lists();
        first.len() * second.len() * self.frequencies_hz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check the plan against a structure before any numerical work.
    pub fn validate(&self, structure: &Structure) -> Result<(), ConfigError> {
        if matches!(self.scan, ScanSpec::PhaseShifts { .. }) && structure.lattice().is_none() {
            return Err(ConfigError::PhaseScanWithoutSheets);
        }
        if let ScanSpec::Angles { theta_deg, .. } = &self.scan {
            if let Some(t) = theta_deg.iter().find(|t| !(0.0..90.0).contains(*t)) {
                return Err(ConfigError::InvalidParameter(format!(
                    "elevation must lie in [0, 90) degrees, got {t}"
                )));
            }
        }
        Ok(())
    }

    /// Every point in serial order.
    pub fn points(&self) -> Vec<SweepPoint> {
        let (first, second) = self.scan.lists();
        let (outer, inner) = match self.order {
            SteeringOrder::FirstOuter => (first, second),
            SteeringOrder::SecondOuter => (second, first),
        };
        let mut points = Vec::with_capacity(self.len());
        for &o in outer {
            for &i in inner {
                let scan = match self.order {
                    SteeringOrder::FirstOuter => self.scan.point(o, i),
                    SteeringOrder::SecondOuter => self.scan.point(i, o),
                };
                for &frequency_hz in &self.frequencies_hz {
                    points.push(SweepPoint {
                        index: points.len(),
                        frequency_hz,
                        scan,
                    });
                }
            }
        }
        points
    }
}

/// Outcome counts of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub completed: usize,
    /// Points skipped because a dominant mode was below cutoff.
    pub skipped: usize,
    pub failed: usize,
}

/// Analyse every point of `plan`, appending results to `archive`.
///
/// Failures stay confined to their own point: a cutoff is logged as a skip,
/// any other error as a failure, and the sweep carries on.
pub fn run_sweep(
    analysis: &Analysis,
    plan: &SweepPlan,
    backend: &dyn ComputeBackend,
    archive: &Mutex<ResultArchive>,
) -> SweepSummary {
    let points = plan.points();
    let completed = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    backend.for_each_task(points.len(), &|k| {
        let point = &points[k];
        match analysis.analyze_point(point.index, point.frequency_hz, &point.scan) {
            Ok(result) => {
                let appended = archive
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .append(result);
                match appended {
                    Ok(()) => {
                        debug!("Point {} done", point.index);
                        completed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        error!("Point {}: {e}", point.index);
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            Err(e) if e.is_skip() => {
                warn!("Skipping point {}: {e}", point.index);
                skipped.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!("Point {} failed: {e}", point.index);
                failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    });

    SweepSummary {
        completed: completed.into_inner(),
        skipped: skipped.into_inner(),
        failed: failed.into_inner(),
    }
}
