//! Reporting utilities: run summaries, intensity statistics and formatted
//! terminal output.

pub mod format;
pub mod intensity;

pub use format::*;
pub use intensity::*;

use serde::{Deserialize, Serialize};

use crate::app::pipeline::BeadReport;
use crate::math::mean_std;

/// Mean and sample standard deviation of one quantity across beads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub mean: f64,
    pub std: f64,
}

/// Aggregate over all ZYX fits of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PsfSummary {
    pub fitted: usize,
    pub failed: usize,
    pub z_fwhm: Option<Spread>,
    pub y_fwhm: Option<Spread>,
    pub x_fwhm: Option<Spread>,
    pub pc1_fwhm: Option<Spread>,
    pub pc2_fwhm: Option<Spread>,
    pub pc3_fwhm: Option<Spread>,
}

pub fn summarize(reports: &[BeadReport]) -> PsfSummary {
    let records: Vec<_> = reports.iter().filter_map(|r| r.record()).collect();
    let spread = |get: fn(&crate::fit::ZYXFitRecord) -> f64| {
        let values: Vec<f64> = records.iter().map(|r| get(&r.zyx)).collect();
        mean_std(&values).map(|(mean, std)| Spread { mean, std })
    };

    PsfSummary {
        fitted: records.len(),
        failed: reports.len() - records.len(),
        z_fwhm: spread(|r| r.zyx_z_fwhm),
        y_fwhm: spread(|r| r.zyx_y_fwhm),
        x_fwhm: spread(|r| r.zyx_x_fwhm),
        pc1_fwhm: spread(|r| r.zyx_pc1_fwhm),
        pc2_fwhm: spread(|r| r.zyx_pc2_fwhm),
        pc3_fwhm: spread(|r| r.zyx_pc3_fwhm),
    }
}
