//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::{AnalysisOutput, BeadOutcome, BeadReport};
use crate::domain::{AnalysisConfig, BeadSearch, DiscardReason};
use crate::io::RecordsFile;
use crate::report::{IntensityStats, PsfSummary, Spread};

/// Format the full run summary (volume, finder outcome, FWHM statistics).
pub fn format_run_summary(output: &AnalysisOutput, config: &AnalysisConfig) -> String {
    let mut out = String::new();
    let volume = &config.volume;

    out.push_str("=== psf - Bead PSF Analysis ===\n");
    out.push_str(&format!(
        "Volume: {}x{}x{} voxels | spacing (z, y, x) = ({}, {}, {})\n",
        volume.shape[0], volume.shape[1], volume.shape[2], volume.spacing[0], volume.spacing[1], volume.spacing[2],
    ));
    out.push_str(&format!(
        "Crop: {}x{}x{} voxels ({} x {} x {})\n",
        output.box_voxels[0],
        output.box_voxels[1],
        output.box_voxels[2],
        config.bounding_box[0],
        config.bounding_box[1],
        config.bounding_box[2],
    ));
    out.push_str(&format!(
        "Beads: accepted={} discarded={} | fitted={} failed={} | {:.2}s\n",
        output.search.accepted.len(),
        output.search.discarded.len(),
        output.summary.fitted,
        output.summary.failed,
        output.elapsed.as_secs_f64(),
    ));

    out.push_str("\nZYX FWHM (mean ± std):\n");
    out.push_str(&format_summary(&output.summary));
    out.push('\n');
    out
}

fn format_summary(summary: &PsfSummary) -> String {
    let rows = [
        ("z", summary.z_fwhm),
        ("y", summary.y_fwhm),
        ("x", summary.x_fwhm),
        ("pc1", summary.pc1_fwhm),
        ("pc2", summary.pc2_fwhm),
        ("pc3", summary.pc3_fwhm),
    ];
    let mut out = String::new();
    for (name, spread) in rows {
        out.push_str(&format!("- {name:<4}{}\n", fmt_spread(spread)));
    }
    out
}

fn fmt_spread(spread: Option<Spread>) -> String {
    match spread {
        Some(s) => format!("{:>10.1} ± {:.1}", s.mean, s.std),
        None => format!("{:>10}", "n/a"),
    }
}

/// Header, summary and bead table of a saved run.
pub fn format_records(records: &RecordsFile) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "=== {} results ({}) ===\n",
        records.tool,
        records.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!(
        "spacing (z, y, x) = ({}, {}, {}) | crop ({} x {} x {})\n",
        records.spacing[0],
        records.spacing[1],
        records.spacing[2],
        records.bounding_box[0],
        records.bounding_box[1],
        records.bounding_box[2],
    ));
    out.push_str(&format!(
        "fitted={} failed={}\n\nZYX FWHM (mean ± std):\n",
        records.summary.fitted, records.summary.failed
    ));
    out.push_str(&format_summary(&records.summary));
    out.push('\n');
    out.push_str(&format_bead_table(&records.reports));
    out
}

/// One row per bead: ZYX FWHMs and centroid, or the failure reason.
pub fn format_bead_table(reports: &[BeadReport]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<16} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:<26}\n",
            "bead", "z_fwhm", "y_fwhm", "x_fwhm", "pc1", "pc2", "pc3", "centroid"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<16} {:-<9} {:-<9} {:-<9} {:-<9} {:-<9} {:-<9} {:-<26}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for report in reports {
        let bead = report.bead.to_string();
        let line = match &report.outcome {
            BeadOutcome::Fitted(record) => {
                let f = &record.zyx;
                let c = record.centroid;
                format!(
                    "{:<16} {:>9.1} {:>9.1} {:>9.1} {:>9.1} {:>9.1} {:>9.1} ({:.2}, {:.2}, {:.2})",
                    bead,
                    f.zyx_z_fwhm,
                    f.zyx_y_fwhm,
                    f.zyx_x_fwhm,
                    f.zyx_pc1_fwhm,
                    f.zyx_pc2_fwhm,
                    f.zyx_pc3_fwhm,
                    c[0],
                    c[1],
                    c[2],
                )
            }
            BeadOutcome::Failed { reason, .. } => format!("{bead:<16} FAILED {}", truncate(reason, 80)),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Accepted beads followed by the discarded ones with their reason.
pub fn format_bead_search(search: &BeadSearch) -> String {
    let mut out = String::new();
    out.push_str(&format!("Accepted beads ({}):\n", search.accepted.len()));
    for bead in &search.accepted {
        out.push_str(&format!("  {bead}\n"));
    }

    out.push_str(&format!(
        "Discarded beads ({}: {} xy border, {} z border, {} neighbour distance):\n",
        search.discarded.len(),
        search.count_discarded(DiscardReason::XyBorder),
        search.count_discarded(DiscardReason::ZBorder),
        search.count_discarded(DiscardReason::NeighborDistance),
    ));
    for d in &search.discarded {
        out.push_str(&format!("  {:<16} {}\n", d.bead.to_string(), d.reason.label()));
    }
    out
}

/// Intensity histogram as a two-column table.
pub fn format_intensity(stats: &IntensityStats) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<24} {:>10}\n", "Intensity Range", "Percentage"));
    out.push_str(&format!("{:-<24} {:-<10}\n", "", ""));
    for (range, pct) in stats.rows() {
        out.push_str(&format!("{range:<24} {pct:>10}\n"));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
