//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between the finder, the crop step and the fitters
//! - exported to JSON/CSV
//! - reloaded later for reporting

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data::VolumeSpec;
use crate::math::SolverOptions;

/// A bead position in voxel index space, axis order Z, Y, X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bead {
    pub z: usize,
    pub y: usize,
    pub x: usize,
}

impl Bead {
    pub fn new(z: usize, y: usize, x: usize) -> Self {
        Self { z, y, x }
    }

    pub fn as_array(self) -> [usize; 3] {
        [self.z, self.y, self.x]
    }

    /// Euclidean distance to `other`, in voxels.
    pub fn distance(self, other: Bead) -> f64 {
        let dz = self.z as f64 - other.z as f64;
        let dy = self.y as f64 - other.y as f64;
        let dx = self.x as f64 - other.x as f64;
        (dz * dz + dy * dy + dx * dx).sqrt()
    }
}

impl fmt::Display for Bead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.z, self.y, self.x)
    }
}

/// Which finder rule rejected a bead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// The XY maximum lies within the border margin of the frame.
    XyBorder,
    /// The Z position lies within the border margin of the stack.
    ZBorder,
    /// Another accepted bead is at or below the neighbour distance.
    NeighborDistance,
}

impl DiscardReason {
    pub fn label(self) -> &'static str {
        match self {
            DiscardReason::XyBorder => "xy_border",
            DiscardReason::ZBorder => "z_border",
            DiscardReason::NeighborDistance => "neighbor_distance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardedBead {
    pub bead: Bead,
    pub reason: DiscardReason,
}

/// Result of a bead search over a whole volume.
///
/// Discarded beads are a normal outcome, not an error: they are reported next
/// to the accepted ones so a viewer can show both sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeadSearch {
    pub accepted: Vec<Bead>,
    pub discarded: Vec<DiscardedBead>,
}

impl BeadSearch {
    pub fn discarded_beads(&self) -> Vec<Bead> {
        self.discarded.iter().map(|d| d.bead).collect()
    }

    pub fn count_discarded(&self, reason: DiscardReason) -> usize {
        self.discarded.iter().filter(|d| d.reason == reason).count()
    }

    /// Split into the plain `(accepted, discarded)` coordinate lists.
    pub fn into_lists(self) -> (Vec<Bead>, Vec<Bead>) {
        let discarded = self.discarded.iter().map(|d| d.bead).collect();
        (self.accepted, discarded)
    }
}

/// Tunables of the bead finder.
///
/// The defaults are the constants the detection was calibrated with; the
/// intensity threshold in particular depends on camera gain and bead
/// brightness and is usually the first thing to adjust.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeadFinderOptions {
    /// Absolute intensity a projected maximum must exceed.
    pub threshold_abs: f64,
    /// Minimum distance between two local maxima (pixels, Chebyshev).
    pub min_peak_distance: usize,
    /// Border margin (voxels) in X, Y and Z.
    pub border: usize,
    /// Beads whose nearest accepted neighbour is at or below this distance
    /// (voxels) are discarded.
    pub min_neighbor_distance: f64,
    /// Median window applied to the Z max projection.
    pub projection_median_size: usize,
    /// Median window applied to each Z profile.
    pub profile_median_size: usize,
}

impl Default for BeadFinderOptions {
    fn default() -> Self {
        Self {
            threshold_abs: 3000.0,
            min_peak_distance: 2,
            border: 5,
            min_neighbor_distance: 5.0,
            projection_median_size: 3,
            profile_median_size: 2,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Synthetic volume the run operates on.
    pub volume: VolumeSpec,
    /// Physical crop size around each bead (same units as the spacing).
    pub bounding_box: [f64; 3],
    pub finder: BeadFinderOptions,
    pub solver: SolverOptions,

    /// Use these beads instead of running the finder.
    pub points: Option<PathBuf>,

    pub export_results: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
    pub export_beads: Option<PathBuf>,
    /// Directory for the failure bundle (written only when a fit fails).
    pub debug_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bead_distance_is_euclidean_in_voxels() {
        let a = Bead::new(0, 0, 0);
        let b = Bead::new(0, 3, 4);
        assert!((a.distance(b) - 5.0).abs() < 1e-12);
        assert!((b.distance(a) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn bead_search_splits_into_lists() {
        let search = BeadSearch {
            accepted: vec![Bead::new(10, 10, 10)],
            discarded: vec![
                DiscardedBead {
                    bead: Bead::new(1, 2, 3),
                    reason: DiscardReason::ZBorder,
                },
                DiscardedBead {
                    bead: Bead::new(4, 5, 6),
                    reason: DiscardReason::XyBorder,
                },
            ],
        };
        assert_eq!(search.count_discarded(DiscardReason::ZBorder), 1);
        assert_eq!(search.count_discarded(DiscardReason::NeighborDistance), 0);

        let (accepted, discarded) = search.into_lists();
        assert_eq!(accepted, vec![Bead::new(10, 10, 10)]);
        assert_eq!(discarded, vec![Bead::new(1, 2, 3), Bead::new(4, 5, 6)]);
    }
}
