//! Failure bundle writer for inspecting beads whose fits failed.
//!
//! The bundle is a markdown file with the run settings and one table row per
//! failed bead: which fitter gave up, why, and the seed vector it started
//! from. Seeds are usually enough to tell a bad crop (two beads, clipped
//! edge) from a solver budget that is too tight.

use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::app::pipeline::{BeadOutcome, BeadReport};
use crate::domain::AnalysisConfig;
use crate::error::AppError;

/// Write the bundle into `dir`. Returns `None` when no bead failed.
pub fn write_failure_bundle(
    dir: &Path,
    reports: &[BeadReport],
    config: &AnalysisConfig,
) -> Result<Option<PathBuf>, AppError> {
    let failed: Vec<&BeadReport> = reports.iter().filter(|r| r.is_failed()).collect();
    if failed.is_empty() {
        return Ok(None);
    }

    create_dir_all(dir).map_err(|e| AppError::new(2, format!("Failed to create debug dir: {e}")))?;
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("psf_failures_seed{}_{ts}.md", config.volume.seed));
    let file = File::create(&path).map_err(|e| AppError::new(2, format!("Failed to create debug file: {e}")))?;
    let mut file = BufWriter::new(file);

    write_bundle(&mut file, &failed, reports.len(), config)
        .map_err(|e| AppError::new(2, format!("Failed to write debug bundle: {e}")))?;
    Ok(Some(path))
}

fn write_bundle(
    out: &mut impl Write,
    failed: &[&BeadReport],
    total: usize,
    config: &AnalysisConfig,
) -> std::io::Result<()> {
    let volume = &config.volume;
    writeln!(out, "# psf failure bundle")?;
    writeln!(out, "- generated: {}", Local::now().to_rfc3339())?;
    writeln!(out, "- volume: {:?} voxels, spacing {:?}", volume.shape, volume.spacing)?;
    writeln!(
        out,
        "- synthetic: {} beads, background {}, noise sigma {}, seed {}",
        volume.beads.len(),
        volume.background,
        volume.noise_sigma,
        volume.seed
    )?;
    writeln!(out, "- bounding box: {:?}", config.bounding_box)?;
    writeln!(
        out,
        "- solver: max_iterations={}, timeout={}",
        config.solver.max_iterations,
        config
            .solver
            .timeout
            .map(|t| format!("{} ms", t.as_millis()))
            .unwrap_or_else(|| "none".to_string())
    )?;
    writeln!(out, "- failed: {} of {total}", failed.len())?;

    writeln!(out, "\n## Failed beads")?;
    writeln!(out, "| bead | fitter | reason | seeds |")?;
    writeln!(out, "| - | - | - | - |")?;
    for report in failed {
        if let BeadOutcome::Failed { fitter, reason, seeds } = &report.outcome {
            writeln!(
                out,
                "| {} | {} | {} | {} |",
                report.bead,
                fitter.map(|f| f.to_string()).unwrap_or_else(|| "-".to_string()),
                reason.replace('|', "/"),
                fmt_vec(seeds)
            )?;
        }
    }
    Ok(())
}

fn fmt_vec(values: &[f64]) -> String {
    if values.is_empty() {
        return "-".to_string();
    }
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.3}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::VolumeSpec;
    use crate::domain::{Bead, BeadFinderOptions};
    use crate::fit::FitterKind;
    use crate::math::SolverOptions;

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            volume: VolumeSpec {
                shape: [32, 64, 64],
                spacing: [200.0, 100.0, 100.0],
                background: 100.0,
                beads: Vec::new(),
                noise_sigma: 0.0,
                seed: 9,
            },
            bounding_box: [3200.0, 1600.0, 1600.0],
            finder: BeadFinderOptions::default(),
            solver: SolverOptions::default(),
            points: None,
            export_results: None,
            export_json: None,
            export_beads: None,
            debug_dir: None,
        }
    }

    #[test]
    fn bundle_lists_failed_beads_with_seeds() {
        let reports = vec![BeadReport {
            bead: Bead::new(3, 4, 5),
            outcome: BeadOutcome::Failed {
                fitter: Some(FitterKind::Zyx),
                reason: "ZYX fit did not converge".to_string(),
                seeds: vec![100.0, 5000.0],
            },
        }];
        let mut buf = Vec::new();
        let failed: Vec<&BeadReport> = reports.iter().collect();
        write_bundle(&mut buf, &failed, 1, &config()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("| (3, 4, 5) | ZYX | ZYX fit did not converge | [100.000, 5000.000] |"), "{text}");
        assert!(text.contains("- failed: 1 of 1"));
    }

    #[test]
    fn nothing_is_written_without_failures() {
        let dir = std::env::temp_dir().join(format!("psf-debug-{}", std::process::id()));
        let written = write_failure_bundle(&dir, &[], &config()).unwrap();
        assert!(written.is_none());
    }
}
