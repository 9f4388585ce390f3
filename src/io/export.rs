//! CSV exports: per-bead fit results, bead lists and intensity statistics.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream
//! scripts. Column names of the fit records come from their `fields()`.

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::app::pipeline::{BeadOutcome, BeadReport};
use crate::domain::BeadSearch;
use crate::error::AppError;
use crate::fit::{YXFitRecord, ZFitRecord, ZYXFitRecord};
use crate::report::IntensityStats;

fn create(path: &Path, what: &str) -> Result<Writer<File>, AppError> {
    Writer::from_path(path).map_err(|e| AppError::new(2, format!("Failed to create {what} '{}': {e}", path.display())))
}

fn write_err(e: csv::Error) -> AppError {
    AppError::new(2, format!("Failed to write export CSV: {e}"))
}

fn record_columns() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = Vec::new();
    names.extend(ZFitRecord::default().fields().iter().map(|(n, _)| *n));
    names.extend(YXFitRecord::default().fields().iter().map(|(n, _)| *n));
    names.extend(ZYXFitRecord::default().fields().iter().map(|(n, _)| *n));
    names
}

/// Write one row per bead: coordinates, status, then every fit field.
///
/// Failed beads leave the fit columns empty and carry the failure reason.
pub fn write_records_csv(path: &Path, reports: &[BeadReport]) -> Result<(), AppError> {
    let mut wtr = create(path, "export CSV")?;
    let columns = record_columns();

    let mut header = vec!["z", "y", "x", "status", "fitter", "reason", "centroid_z", "centroid_y", "centroid_x"];
    header.extend(&columns);
    wtr.write_record(&header).map_err(write_err)?;

    for report in reports {
        let b = report.bead;
        let mut row = vec![b.z.to_string(), b.y.to_string(), b.x.to_string()];
        match &report.outcome {
            BeadOutcome::Fitted(record) => {
                row.extend(["fitted".to_string(), String::new(), String::new()]);
                row.extend(record.centroid.iter().map(|c| format!("{c:.4}")));
                row.extend(
                    record
                        .z
                        .fields()
                        .into_iter()
                        .chain(record.yx.fields())
                        .chain(record.zyx.fields())
                        .map(|(_, v)| format!("{v:.6}")),
                );
            }
            BeadOutcome::Failed { fitter, reason, .. } => {
                row.push("failed".to_string());
                row.push(fitter.map(|f| f.to_string()).unwrap_or_default());
                row.push(reason.clone());
                row.resize(row.len() + 3 + columns.len(), String::new());
            }
        }
        wtr.write_record(&row).map_err(write_err)?;
    }
    wtr.flush().map_err(|e| AppError::new(2, format!("Failed to write export CSV: {e}")))
}

/// Write accepted and discarded beads with their status.
pub fn write_beads_csv(path: &Path, search: &BeadSearch) -> Result<(), AppError> {
    let mut wtr = create(path, "bead CSV")?;
    wtr.write_record(["z", "y", "x", "status", "reason"]).map_err(write_err)?;
    for b in &search.accepted {
        wtr.write_record([b.z.to_string(), b.y.to_string(), b.x.to_string(), "accepted".to_string(), String::new()])
            .map_err(write_err)?;
    }
    for d in &search.discarded {
        let b = d.bead;
        wtr.write_record([
            b.z.to_string(),
            b.y.to_string(),
            b.x.to_string(),
            "discarded".to_string(),
            d.reason.label().to_string(),
        ])
        .map_err(write_err)?;
    }
    wtr.flush().map_err(|e| AppError::new(2, format!("Failed to write bead CSV: {e}")))
}

/// Write the "Intensity Range,Percentage" table.
pub fn write_intensity_csv(path: &Path, stats: &IntensityStats) -> Result<(), AppError> {
    let mut wtr = create(path, "statistics CSV")?;
    wtr.write_record(["Intensity Range", "Percentage"]).map_err(write_err)?;
    for (range, pct) in stats.rows() {
        wtr.write_record([range, pct]).map_err(write_err)?;
    }
    wtr.flush().map_err(|e| AppError::new(2, format!("Failed to write statistics CSV: {e}")))
}
