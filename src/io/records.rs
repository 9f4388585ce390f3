//! Read/write analysis results as JSON.
//!
//! The JSON file is the portable representation of a run: calibration, crop
//! size, summary and every bead report, stamped with the generation time.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::pipeline::BeadReport;
use crate::error::AppError;
use crate::report::PsfSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordsFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    /// Voxel spacing (z, y, x).
    pub spacing: [f64; 3],
    /// Physical crop size (z, y, x).
    pub bounding_box: [f64; 3],
    pub summary: PsfSummary,
    pub reports: Vec<BeadReport>,
}

impl RecordsFile {
    pub fn new(spacing: [f64; 3], bounding_box: [f64; 3], summary: PsfSummary, reports: Vec<BeadReport>) -> Self {
        Self {
            tool: "psf".to_string(),
            generated_at: Utc::now(),
            spacing,
            bounding_box,
            summary,
            reports,
        }
    }
}

pub fn write_records_json(path: &Path, records: &RecordsFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create results JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, records)
        .map_err(|e| AppError::new(2, format!("Failed to write results JSON: {e}")))?;
    Ok(())
}

pub fn read_records_json(path: &Path) -> Result<RecordsFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open results JSON '{}': {e}", path.display())))?;
    let records: RecordsFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid results JSON: {e}")))?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::BeadOutcome;
    use crate::domain::Bead;
    use crate::fit::FitterKind;

    #[test]
    fn failed_reports_survive_a_json_round_trip() {
        let reports = vec![BeadReport {
            bead: Bead::new(4, 5, 6),
            outcome: BeadOutcome::Failed {
                fitter: Some(FitterKind::Yx),
                reason: "YX fit timed out after 10 ms".to_string(),
                seeds: vec![],
            },
        }];
        let file = RecordsFile::new([200.0, 100.0, 100.0], [3200.0, 1600.0, 1600.0], PsfSummary::default(), reports);
        let path = std::env::temp_dir().join(format!("psf-records-{}.json", std::process::id()));

        write_records_json(&path, &file).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"status\": \"failed\""), "{text}");
        assert!(text.contains("\"fitter\": \"yx\""), "{text}");

        let back = read_records_json(&path).unwrap();
        assert_eq!(back, file);
        let _ = std::fs::remove_file(path);
    }
}
