//! Shared analysis pipeline used by the CLI subcommands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! bead search -> crop per bead -> Z / YX / ZYX fits -> summary
//!
//! The per-bead step is pure and runs on the rayon pool. A bead whose fit
//! fails is reported as failed; it never aborts the batch.

use std::time::{Duration, Instant};

use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::beads::BeadFinder;
use crate::domain::{AnalysisConfig, Bead, BeadSearch};
use crate::error::{AppError, PsfError};
use crate::fit::{FitterKind, YXFitRecord, YXFitter, ZFitRecord, ZFitter, ZYXFitRecord, ZYXFitter};
use crate::image::{CalibratedImage3D, crop_bead};
use crate::math::SolverOptions;
use crate::report::{PsfSummary, summarize};

/// All fit results for one bead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsfRecord {
    pub bead: Bead,
    /// Volume voxel index of the crop's first voxel.
    pub origin: [usize; 3],
    /// ZYX fit centre in volume voxel coordinates.
    pub centroid: [f64; 3],
    pub z: ZFitRecord,
    pub yx: YXFitRecord,
    pub zyx: ZYXFitRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BeadOutcome {
    Fitted(PsfRecord),
    Failed {
        fitter: Option<FitterKind>,
        reason: String,
        seeds: Vec<f64>,
    },
}

impl BeadOutcome {
    fn from_error(err: PsfError) -> Self {
        let reason = err.to_string();
        match err {
            PsfError::ConvergenceFailure { fitter, seeds, .. } => BeadOutcome::Failed {
                fitter: Some(fitter),
                reason,
                seeds,
            },
            PsfError::Timeout { fitter, .. } => BeadOutcome::Failed {
                fitter: Some(fitter),
                reason,
                seeds: Vec::new(),
            },
            PsfError::InvalidInput(_) => BeadOutcome::Failed {
                fitter: None,
                reason,
                seeds: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeadReport {
    pub bead: Bead,
    pub outcome: BeadOutcome,
}

impl BeadReport {
    pub fn record(&self) -> Option<&PsfRecord> {
        match &self.outcome {
            BeadOutcome::Fitted(record) => Some(record),
            BeadOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.record().is_none()
    }
}

/// All computed outputs of a single `psf analyze` run.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub search: BeadSearch,
    pub box_voxels: [usize; 3],
    pub reports: Vec<BeadReport>,
    pub summary: PsfSummary,
    pub elapsed: Duration,
}

/// Crop around `bead` and run the three fits.
pub fn analyze_bead(
    volume: &CalibratedImage3D,
    bead: Bead,
    box_voxels: [usize; 3],
    solver: &SolverOptions,
) -> Result<PsfRecord, PsfError> {
    let crop = crop_bead(volume, bead, box_voxels)?;

    let z = ZFitter::centred_on(&crop.image, crop.center)?
        .with_bead(bead)
        .with_options(solver.clone())
        .fit()?;
    let yx = YXFitter::centred_on(&crop.image, crop.center)?
        .with_bead(bead)
        .with_options(solver.clone())
        .fit()?;
    let zyx = ZYXFitter::centred_on(&crop.image, crop.center)?
        .with_bead(bead)
        .with_options(solver.clone())
        .fit()?;

    let centroid = crop.to_volume_voxels([zyx.zyx_z_mu, zyx.zyx_y_mu, zyx.zyx_x_mu]);
    Ok(PsfRecord {
        bead,
        origin: crop.origin,
        centroid,
        z,
        yx,
        zyx,
    })
}

/// Analyse every bead in parallel. The output order follows `beads`.
pub fn analyze_beads(
    volume: &CalibratedImage3D,
    beads: &[Bead],
    box_voxels: [usize; 3],
    solver: &SolverOptions,
) -> Vec<BeadReport> {
    beads
        .par_iter()
        .map(|&bead| {
            let outcome = match analyze_bead(volume, bead, box_voxels, solver) {
                Ok(record) => BeadOutcome::Fitted(record),
                Err(err) => BeadOutcome::from_error(err.with_bead(bead)),
            };
            BeadReport { bead, outcome }
        })
        .collect()
}

/// Execute the full pipeline on `volume`.
///
/// Beads come from `config.points` when set, otherwise from the finder.
pub fn run_analysis(volume: &CalibratedImage3D, config: &AnalysisConfig) -> Result<AnalysisOutput, AppError> {
    let start = Instant::now();
    let finder = BeadFinder::new(volume, config.bounding_box)?.with_options(config.finder);

    let search = match &config.points {
        Some(path) => {
            let accepted = crate::io::read_beads_csv(path)?;
            info!("using {} beads from {}", accepted.len(), path.display());
            BeadSearch {
                accepted,
                discarded: Vec::new(),
            }
        }
        None => finder.find_beads(),
    };

    let box_voxels = finder.bounding_box_voxels();
    let reports = analyze_beads(volume, &search.accepted, box_voxels, &config.solver);
    let summary = summarize(&reports);
    if summary.failed > 0 {
        warn!("{} of {} bead fits failed", summary.failed, reports.len());
    }

    let elapsed = start.elapsed();
    info!(
        "analysed {} beads in {:.2} s ({} fitted)",
        reports.len(),
        elapsed.as_secs_f64(),
        summary.fitted
    );
    Ok(AnalysisOutput {
        search,
        box_voxels,
        reports,
        summary,
        elapsed,
    })
}
