//! Full-stack analysis of one (frequency, scan) point.
//!
//! An [`Analysis`] fixes the structure, the numerical parameters and the mode
//! content (chosen once at the highest frequency of the sweep). Each call to
//! [`Analysis::analyze_point`] then:
//!
//! 1. converts the scan condition into the Floquet wavevectors,
//! 2. evaluates every layer's modal constants,
//! 3. builds each block's GSM left to right, solving each distinct sheet
//!    block once and reusing it for interchangeable blocks,
//! 4. cascades the blocks, propagating through the layers they share.
//!
//! Caches live inside one call, so points can be analysed concurrently.

use log::debug;
use thiserror::Error;

use crate::blocks::{partition, Block, BlockKey};
use crate::gsm::Gsm;
use crate::modes::{JunctionModes, LayerModes, ModeSpectrum};
use crate::solver::mom::MomSolver;
use crate::solver::{SheetSolver, SolverError};
use crate::types::{
    AmbientParams, AnalysisParams, ConfigError, PointResult, ScanPoint, Structure, C0,
};

/// Per-point failures. A cutoff is a skip; everything else is a hard
/// failure of that point only.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Dominant mode is below cutoff in {region} at {frequency_hz:.6e} Hz ({scan})")]
    Cutoff {
        frequency_hz: f64,
        scan: ScanPoint,
        region: &'static str,
    },

    #[error("Sheet '{sheet}' failed at {frequency_hz:.6e} Hz ({scan}): {source}")]
    Sheet {
        frequency_hz: f64,
        scan: ScanPoint,
        sheet: String,
        #[source]
        source: SolverError,
    },

    #[error("Cascade failed at {frequency_hz:.6e} Hz ({scan}): {source}")]
    Cascade {
        frequency_hz: f64,
        scan: ScanPoint,
        #[source]
        source: SolverError,
    },

    #[error("Non-finite scattering parameters at {frequency_hz:.6e} Hz ({scan})")]
    NonFinite { frequency_hz: f64, scan: ScanPoint },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AnalysisError {
    /// Whether the point should be skipped rather than reported as failed.
    pub fn is_skip(&self) -> bool {
        matches!(self, AnalysisError::Cutoff { .. })
    }
}

/// Modal state of the whole stack at one point.
struct PointModes {
    k0: f64,
    beta00: [f64; 2],
    betas: Vec<[f64; 2]>,
    layers: Vec<LayerModes>,
}

/// A structure prepared for analysis.
pub struct Analysis {
    structure: Structure,
    params: AnalysisParams,
    spectrum: ModeSpectrum,
    blocks: Vec<Block>,
    solver: Box<dyn SheetSolver>,
}

impl Analysis {
    /// Validate the parameters and choose the mode content for frequencies
    /// up to `max_frequency_hz`.
    pub fn new(
        structure: Structure,
        params: AnalysisParams,
        max_frequency_hz: f64,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        if !(max_frequency_hz > 0.0) {
            return Err(ConfigError::InvalidParameter(format!(
                "maximum frequency must be positive, got {max_frequency_hz}"
            )));
        }
        let k0_max = 2.0 * std::f64::consts::PI * max_frequency_hz / C0;
        let spectrum = ModeSpectrum::select(&structure, k0_max, &params);
        let blocks = partition(&structure);
        debug!("Stack split into {} blocks: {:?}", blocks.len(), blocks);
        let solver = Box::new(MomSolver::new(&params));
        Ok(Self {
            structure,
            params,
            spectrum,
            blocks,
            solver,
        })
    }

    /// Replace the sheet solver.
    pub fn with_solver(mut self, solver: Box<dyn SheetSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Modes carried by each layer.
    pub fn mode_counts(&self) -> Vec<usize> {
        self.spectrum.mode_counts()
    }

    pub fn solver_name(&self) -> &str {
        self.solver.method_name()
    }

    fn point_modes(&self, frequency_hz: f64, scan: &ScanPoint) -> Result<PointModes, AnalysisError> {
        if !(frequency_hz > 0.0) {
            return Err(ConfigError::InvalidParameter(format!(
                "frequency must be positive, got {frequency_hz}"
            ))
            .into());
        }
        let k0 = 2.0 * std::f64::consts::PI * frequency_hz / C0;
        let lattice = self.structure.lattice();
        let beta00 = scan.transverse_wavevector(k0, self.structure.region1(), lattice)?;

        for (region, medium) in [
            ("region 1", self.structure.region1()),
            ("region N", self.structure.region_n()),
        ] {
            if !LayerModes::dominant_propagates(medium, k0, beta00) {
                return Err(AnalysisError::Cutoff {
                    frequency_hz,
                    scan: *scan,
                    region,
                });
            }
        }

        let betas = self.spectrum.transverse_wavevectors(lattice, beta00);
        let layers = self
            .structure
            .layers()
            .iter()
            .map(|l| LayerModes::new(&l.medium, k0, &betas))
            .collect();
        Ok(PointModes {
            k0,
            beta00,
            betas,
            layers,
        })
    }

    fn junction_gsm(
        &self,
        pm: &PointModes,
        j: usize,
        use_native_offset: bool,
        frequency_hz: f64,
        scan: &ScanPoint,
    ) -> Result<Gsm, AnalysisError> {
        let n_left = self.spectrum.layer_modes(j);
        let n_right = self.spectrum.layer_modes(j + 1);
        let (left, right) = (&pm.layers[j], &pm.layers[j + 1]);

        match self.structure.junctions()[j] {
            Some(placement) if self.structure.has_active_sheet(j) => {
                let sheet = self.structure.sheet(placement.sheet);
                let modes = JunctionModes {
                    k0: pm.k0,
                    betas: &pm.betas,
                    harmonics: self.spectrum.harmonics(),
                    left,
                    right,
                    n_left,
                    n_right,
                };
                let offset = if use_native_offset {
                    placement.offset
                } else {
                    [0.0, 0.0]
                };
                self.solver
                    .junction_gsm(sheet, offset, &modes)
                    .map_err(|source| AnalysisError::Sheet {
                        frequency_hz,
                        scan: *scan,
                        sheet: sheet.name.clone(),
                        source,
                    })
            }
            _ => Ok(Gsm::junction(
                &left.admittance,
                &right.admittance,
                n_left,
                n_right,
            )),
        }
    }

    fn block_gsm(
        &self,
        pm: &PointModes,
        block: &Block,
        use_native_offset: bool,
        frequency_hz: f64,
        scan: &ScanPoint,
    ) -> Result<Gsm, AnalysisError> {
        let cascade_err = |source| AnalysisError::Cascade {
            frequency_hz,
            scan: *scan,
            source,
        };
        let mut gsm = self.junction_gsm(pm, block.start, use_native_offset, frequency_hz, scan)?;
        for layer in block.start + 1..block.end {
            gsm.propagate(&pm.layers[layer].gamma, self.structure.layers()[layer].width);
            let next = self.junction_gsm(pm, layer, use_native_offset, frequency_hz, scan)?;
            gsm = gsm.cascade(&next).map_err(cascade_err)?;
        }
        Ok(gsm)
    }

    fn compute_block_gsms(
        &self,
        pm: &PointModes,
        frequency_hz: f64,
        scan: &ScanPoint,
    ) -> Result<Vec<Gsm>, AnalysisError> {
        let mode_counts = self.spectrum.mode_counts();
        let mode_betas: Vec<[f64; 2]> = (0..self.spectrum.total_modes())
            .map(|p| pm.betas[p / 2])
            .collect();
        let mut cache: Vec<(BlockKey, Gsm)> = Vec::new();
        let mut out = Vec::with_capacity(self.blocks.len());

        for (k, block) in self.blocks.iter().enumerate() {
            let key = if self.params.deduplicate {
                BlockKey::new(&self.structure, block, &mode_counts)
            } else {
                None
            };
            let Some(key) = key else {
                out.push(self.block_gsm(pm, block, true, frequency_hz, scan)?);
                continue;
            };

            let offset = block
                .sheet_junction
                .and_then(|j| self.structure.junctions()[j])
                .map_or([0.0, 0.0], |p| p.offset);

            let cached = cache.iter().find(|(k2, _)| *k2 == key).map(|(_, g)| g);
            let gsm = match cached {
                Some(representative) => {
                    debug!("Block {k} reuses an interchangeable block's GSM");
                    representative.translate(&mode_betas, offset)
                }
                None => {
                    let representative = self.block_gsm(pm, block, false, frequency_hz, scan)?;
                    let gsm = representative.translate(&mode_betas, offset);
                    cache.push((key, representative));
                    gsm
                }
            };
            out.push(gsm);
        }
        Ok(out)
    }

    /// GSM of every block at one point, for diagnostics.
    pub fn block_gsms(&self, frequency_hz: f64, scan: &ScanPoint) -> Result<Vec<Gsm>, AnalysisError> {
        let pm = self.point_modes(frequency_hz, scan)?;
        self.compute_block_gsms(&pm, frequency_hz, scan)
    }

    /// Analyse one (frequency, scan) point.
    pub fn analyze_point(
        &self,
        index: usize,
        frequency_hz: f64,
        scan: &ScanPoint,
    ) -> Result<PointResult, AnalysisError> {
        let pm = self.point_modes(frequency_hz, scan)?;
        let blocks = self.compute_block_gsms(&pm, frequency_hz, scan)?;

        let mut blocks_iter = self.blocks.iter().zip(blocks);
        let Some((_, mut total)) = blocks_iter.next() else {
            return Err(ConfigError::MalformedStack("stack has no blocks".into()).into());
        };
        for (block, gsm) in blocks_iter {
            total.propagate(&pm.layers[block.start].gamma, self.structure.layers()[block.start].width);
            total = total.cascade(&gsm).map_err(|source| AnalysisError::Cascade {
                frequency_hz,
                scan: *scan,
                source,
            })?;
        }

        let finite = [&total.s11, &total.s12, &total.s21, &total.s22]
            .iter()
            .all(|b| b.iter().all(|z| z.is_finite()));
        if !finite {
            return Err(AnalysisError::NonFinite {
                frequency_hz,
                scan: *scan,
            });
        }

        let last = self.structure.layers().len() - 1;
        let ambient = |i: usize| AmbientParams {
            medium: self.structure.layers()[i].medium,
            gamma: pm.layers[i].gamma[0],
            admittance: [pm.layers[i].admittance[0], pm.layers[i].admittance[1]],
        };

        Ok(PointResult {
            index,
            frequency_hz,
            scan: *scan,
            beta00: pm.beta00,
            lattice: self.structure.lattice().copied(),
            region1: ambient(0),
            region_n: ambient(last),
            gsm: total,
        })
    }
}
