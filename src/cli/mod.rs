//! Command-line parsing for the bead PSF analyser.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the finder and fitting code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "psf", version, about = "Bead PSF finder and Gaussian fitter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Locate beads in the volume and list accepted and discarded positions.
    Find(FindArgs),
    /// Find beads, fit Z / YX / ZYX Gaussians per bead and summarise the PSF.
    Analyze(AnalyzeArgs),
    /// Print the intensity histogram of the volume.
    Stats(StatsArgs),
    /// Print a previously exported results JSON.
    Show(ShowArgs),
}

/// Synthetic volume description.
#[derive(Debug, Args, Clone)]
pub struct VolumeArgs {
    /// Volume shape in voxels (Z Y X).
    #[arg(long, num_args = 3, value_names = ["Z", "Y", "X"], default_values_t = [32usize, 64, 64])]
    pub shape: Vec<usize>,

    /// Voxel spacing (Z Y X), e.g. nanometres.
    #[arg(long, num_args = 3, value_names = ["Z", "Y", "X"], default_values_t = [200.0, 100.0, 100.0])]
    pub spacing: Vec<f64>,

    /// Number of beads to place.
    #[arg(long, default_value_t = 5)]
    pub beads: usize,

    /// Random seed for bead placement and noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Constant background level.
    #[arg(long, default_value_t = 100.0)]
    pub background: f64,

    /// Bead peak amplitude above background.
    #[arg(long, default_value_t = 5000.0)]
    pub amplitude: f64,

    /// Bead sigma in voxels (Z Y X).
    #[arg(long, num_args = 3, value_names = ["Z", "Y", "X"], default_values_t = [1.0, 1.2, 1.2])]
    pub sigma: Vec<f64>,

    /// Standard deviation of additive Gaussian noise (0 disables noise).
    #[arg(long, default_value_t = 10.0)]
    pub noise: f64,
}

/// Bead finder tunables.
#[derive(Debug, Args, Clone)]
pub struct FinderArgs {
    /// Absolute intensity a projected maximum must exceed.
    #[arg(long, default_value_t = 3000.0)]
    pub threshold: f64,

    /// Minimum distance between projected maxima (pixels).
    #[arg(long, default_value_t = 2)]
    pub min_peak_distance: usize,

    /// Border margin in voxels (X, Y and Z).
    #[arg(long, default_value_t = 5)]
    pub border: usize,

    /// Discard beads whose nearest neighbour is at or below this distance (voxels).
    #[arg(long, default_value_t = 5.0)]
    pub min_neighbor_distance: f64,

    /// Median window of the Z max projection.
    #[arg(long, default_value_t = 3)]
    pub projection_median: usize,

    /// Median window of each Z profile.
    #[arg(long, default_value_t = 2)]
    pub profile_median: usize,
}

/// Least-squares solver limits.
#[derive(Debug, Args, Clone)]
pub struct SolverArgs {
    /// Maximum Levenberg-Marquardt iterations per fit.
    #[arg(long, default_value_t = 200)]
    pub max_iterations: usize,

    /// Wall-clock budget per fit in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Parser, Clone)]
pub struct FindArgs {
    #[command(flatten)]
    pub volume: VolumeArgs,

    #[command(flatten)]
    pub finder: FinderArgs,

    /// Physical crop size around each bead (Z Y X, spacing units).
    #[arg(long, num_args = 3, value_names = ["Z", "Y", "X"], default_values_t = [3200.0, 1600.0, 1600.0])]
    pub bbox: Vec<f64>,

    /// Export accepted and discarded beads to CSV.
    #[arg(long = "export-beads")]
    pub export_beads: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub volume: VolumeArgs,

    #[command(flatten)]
    pub finder: FinderArgs,

    #[command(flatten)]
    pub solver: SolverArgs,

    /// Physical crop size around each bead (Z Y X, spacing units).
    #[arg(long, num_args = 3, value_names = ["Z", "Y", "X"], default_values_t = [3200.0, 1600.0, 1600.0])]
    pub bbox: Vec<f64>,

    /// Read bead positions from this CSV instead of searching.
    #[arg(long, value_name = "CSV")]
    pub points: Option<PathBuf>,

    /// Export per-bead fit results to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the run (summary and every bead report) to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,

    /// Export accepted and discarded beads to CSV.
    #[arg(long = "export-beads")]
    pub export_beads: Option<PathBuf>,

    /// Write a markdown failure bundle here when any fit fails.
    #[arg(long = "debug-dir")]
    pub debug_dir: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct StatsArgs {
    #[command(flatten)]
    pub volume: VolumeArgs,

    /// Number of histogram bins.
    #[arg(long, default_value_t = 10)]
    pub bins: usize,

    /// Saturation value (defaults to the volume maximum).
    #[arg(long)]
    pub saturation: Option<f64>,

    /// Export the histogram to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// Options for showing a saved run.
#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Results JSON produced by `psf analyze --export-json`.
    #[arg(long, value_name = "JSON")]
    pub results: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn analyze_defaults_match_the_calibrated_setup() {
        let cli = Cli::parse_from(["psf", "analyze"]);
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.volume.shape, vec![32, 64, 64]);
        assert_eq!(args.volume.spacing, vec![200.0, 100.0, 100.0]);
        assert_eq!(args.bbox, vec![3200.0, 1600.0, 1600.0]);
        assert_eq!(args.finder.border, 5);
        assert_eq!(args.solver.max_iterations, 200);
        assert!(args.solver.timeout_ms.is_none());
    }

    #[test]
    fn triples_are_parsed_per_axis() {
        let cli = Cli::parse_from(["psf", "find", "--shape", "16", "32", "48", "--bbox", "800", "400", "400"]);
        let Command::Find(args) = cli.command else {
            panic!("expected find");
        };
        assert_eq!(args.volume.shape, vec![16, 32, 48]);
        assert_eq!(args.bbox, vec![800.0, 400.0, 400.0]);
    }
}
