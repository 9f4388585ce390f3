//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - renders the synthetic bead volume
//! - runs the bead search and the per-bead fits
//! - prints reports
//! - writes optional exports

use std::time::Duration;

use clap::Parser;
use log::info;

use crate::beads::BeadFinder;
use crate::cli::{AnalyzeArgs, Command, FindArgs, FinderArgs, ShowArgs, SolverArgs, StatsArgs, VolumeArgs};
use crate::data::{BeadField, VolumeSpec, random_bead_field, render_volume};
use crate::domain::{AnalysisConfig, BeadFinderOptions};
use crate::error::AppError;
use crate::math::SolverOptions;

pub mod pipeline;

/// Synthetic beads keep this many voxels beyond the finder border.
const PLACEMENT_SLACK: usize = 3;
/// Minimum centre distance (voxels) between synthetic beads.
const PLACEMENT_SEPARATION: f64 = 8.0;

/// Entry point for the `psf` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Find(args) => handle_find(args),
        Command::Analyze(args) => handle_analyze(args),
        Command::Stats(args) => handle_stats(args),
        Command::Show(args) => handle_show(args),
    }
}

fn handle_find(args: FindArgs) -> Result<(), AppError> {
    let finder_options = finder_options_from_args(&args.finder);
    let spec = volume_spec_from_args(&args.volume, finder_options.border)?;
    let bounding_box = triple(&args.bbox, "--bbox")?;
    let volume = render_volume(&spec)?;

    let search = BeadFinder::new(&volume, bounding_box)?
        .with_options(finder_options)
        .find_beads();
    println!("{}", crate::report::format_bead_search(&search));

    if let Some(path) = &args.export_beads {
        crate::io::write_beads_csv(path, &search)?;
        info!("wrote bead list to {}", path.display());
    }
    Ok(())
}

fn handle_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let config = analysis_config_from_args(&args)?;
    let volume = render_volume(&config.volume)?;
    let output = pipeline::run_analysis(&volume, &config)?;

    println!("{}", crate::report::format_run_summary(&output, &config));
    println!("{}", crate::report::format_bead_table(&output.reports));

    // Optional exports.
    if let Some(path) = &config.export_results {
        crate::io::write_records_csv(path, &output.reports)?;
        info!("wrote fit results to {}", path.display());
    }
    if let Some(path) = &config.export_json {
        let records = crate::io::RecordsFile::new(
            volume.spacing(),
            config.bounding_box,
            output.summary.clone(),
            output.reports.clone(),
        );
        crate::io::write_records_json(path, &records)?;
        info!("wrote results JSON to {}", path.display());
    }
    if let Some(path) = &config.export_beads {
        crate::io::write_beads_csv(path, &output.search)?;
        info!("wrote bead list to {}", path.display());
    }
    if let Some(dir) = &config.debug_dir {
        if let Some(path) = crate::debug::write_failure_bundle(dir, &output.reports, &config)? {
            info!("wrote failure bundle to {}", path.display());
        }
    }

    Ok(())
}

fn handle_stats(args: StatsArgs) -> Result<(), AppError> {
    let spec = volume_spec_from_args(&args.volume, BeadFinderOptions::default().border)?;
    let volume = render_volume(&spec)?;
    let stats = crate::report::analyze_intensity(volume.data(), args.bins, args.saturation)?;

    println!("{}", crate::report::format_intensity(&stats));
    if let Some(path) = &args.export {
        crate::io::write_intensity_csv(path, &stats)?;
        info!("wrote intensity statistics to {}", path.display());
    }
    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let records = crate::io::read_records_json(&args.results)?;
    println!("{}", crate::report::format_records(&records));
    Ok(())
}

pub fn analysis_config_from_args(args: &AnalyzeArgs) -> Result<AnalysisConfig, AppError> {
    let finder = finder_options_from_args(&args.finder);
    Ok(AnalysisConfig {
        volume: volume_spec_from_args(&args.volume, finder.border)?,
        bounding_box: triple(&args.bbox, "--bbox")?,
        finder,
        solver: solver_options_from_args(&args.solver),
        points: args.points.clone(),
        export_results: args.export.clone(),
        export_json: args.export_json.clone(),
        export_beads: args.export_beads.clone(),
        debug_dir: args.debug_dir.clone(),
    })
}

pub fn finder_options_from_args(args: &FinderArgs) -> BeadFinderOptions {
    BeadFinderOptions {
        threshold_abs: args.threshold,
        min_peak_distance: args.min_peak_distance,
        border: args.border,
        min_neighbor_distance: args.min_neighbor_distance,
        projection_median_size: args.projection_median,
        profile_median_size: args.profile_median,
    }
}

pub fn solver_options_from_args(args: &SolverArgs) -> SolverOptions {
    SolverOptions {
        max_iterations: args.max_iterations,
        timeout: args.timeout_ms.map(Duration::from_millis),
        ..SolverOptions::default()
    }
}

/// Place `args.beads` random beads clear of the finder border.
pub fn volume_spec_from_args(args: &VolumeArgs, border: usize) -> Result<VolumeSpec, AppError> {
    let shape = triple(&args.shape, "--shape")?;
    let sigmas = triple(&args.sigma, "--sigma")?;
    let field = BeadField {
        count: args.beads,
        margin: border + PLACEMENT_SLACK,
        min_separation: PLACEMENT_SEPARATION,
        amplitude: args.amplitude,
        sigmas,
    };
    let beads = random_bead_field(shape, &field, args.seed);
    if beads.len() < args.beads {
        info!("placed {} of {} requested beads", beads.len(), args.beads);
    }

    Ok(VolumeSpec {
        shape,
        spacing: triple(&args.spacing, "--spacing")?,
        background: args.background,
        beads,
        noise_sigma: args.noise,
        seed: args.seed,
    })
}

fn triple<T: Copy>(values: &[T], flag: &str) -> Result<[T; 3], AppError> {
    <[T; 3]>::try_from(values)
        .map_err(|_| AppError::new(2, format!("{flag} expects 3 values (Z Y X), got {}", values.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn analyze_args(argv: &[&str]) -> AnalyzeArgs {
        let mut full = vec!["psf", "analyze"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::Analyze(args) => args,
            other => panic!("expected analyze, got {other:?}"),
        }
    }

    #[test]
    fn config_carries_flags_through() {
        let args = analyze_args(&["--threshold", "1500", "--timeout-ms", "250", "--beads", "3", "--seed", "7"]);
        let config = analysis_config_from_args(&args).unwrap();
        assert_eq!(config.finder.threshold_abs, 1500.0);
        assert_eq!(config.finder.border, 5);
        assert_eq!(config.solver.timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.solver.max_iterations, 200);
        assert_eq!(config.volume.seed, 7);
        assert_eq!(config.volume.beads.len(), 3);
        assert_eq!(config.bounding_box, [3200.0, 1600.0, 1600.0]);
    }

    #[test]
    fn synthetic_beads_stay_clear_of_the_border() {
        let args = analyze_args(&["--beads", "6"]);
        let config = analysis_config_from_args(&args).unwrap();
        let margin = (config.finder.border + PLACEMENT_SLACK) as f64;
        for bead in &config.volume.beads {
            for axis in 0..3 {
                let c = bead.center[axis];
                assert!(c >= margin && c < config.volume.shape[axis] as f64 - margin, "{c}");
            }
        }
    }

    #[test]
    fn default_single_bead_run_is_found_and_fitted() {
        let args = analyze_args(&["--beads", "1", "--noise", "0"]);
        let config = analysis_config_from_args(&args).unwrap();
        let volume = render_volume(&config.volume).unwrap();
        let output = pipeline::run_analysis(&volume, &config).unwrap();

        let center = config.volume.beads[0].center;
        let expected = crate::domain::Bead::new(center[0] as usize, center[1] as usize, center[2] as usize);
        assert_eq!(output.search.accepted, vec![expected]);
        assert_eq!((output.summary.fitted, output.summary.failed), (1, 0));
    }

    #[test]
    fn triple_rejects_wrong_lengths() {
        assert_eq!(triple(&[1, 2, 3], "--shape").unwrap(), [1, 2, 3]);
        let err = triple(&[1.0, 2.0], "--spacing").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("--spacing"));
    }
}
