//! Bead detection in a 3D volume.
//!
//! Steps:
//!
//! 1. maximum intensity projection along Z
//! 2. median filter on the projection (suppresses hot pixels)
//! 3. local maxima above an absolute threshold give YX candidates
//! 4. candidates too close to the XY frame edge are set aside
//! 5. each candidate's Z position is the argmax of its median-filtered Z
//!    profile; beads too close to the top or bottom of the stack are set aside
//! 6. beads whose nearest neighbour is too close are set aside
//!
//! Set-aside beads are returned with the rule that rejected them.

use log::{debug, info};
use ndarray::s;

use crate::domain::{Bead, BeadFinderOptions, BeadSearch, DiscardReason, DiscardedBead};
use crate::error::PsfError;
use crate::image::{CalibratedImage3D, bounding_box_to_voxels};
use crate::math::{max_projection, median_filter_1d, median_filter_2d, peak_local_max};

#[derive(Debug, Clone)]
pub struct BeadFinder<'a> {
    volume: &'a CalibratedImage3D,
    options: BeadFinderOptions,
    bounding_box_voxels: [usize; 3],
    max_bead_distance: f64,
}

impl<'a> BeadFinder<'a> {
    /// `bounding_box` is the physical crop size, in the units of the spacing.
    pub fn new(volume: &'a CalibratedImage3D, bounding_box: [f64; 3]) -> Result<Self, PsfError> {
        let bounding_box_voxels = bounding_box_to_voxels(bounding_box, volume.spacing())?;
        let max_bead_distance = bounding_box.iter().map(|v| v * v).sum::<f64>().sqrt();
        debug!("max bead distance: {max_bead_distance}");
        Ok(Self {
            volume,
            options: BeadFinderOptions::default(),
            bounding_box_voxels,
            max_bead_distance,
        })
    }

    pub fn with_options(mut self, options: BeadFinderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &BeadFinderOptions {
        &self.options
    }

    /// Crop size in voxels.
    pub fn bounding_box_voxels(&self) -> [usize; 3] {
        self.bounding_box_voxels
    }

    /// Diagonal of the physical bounding box.
    pub fn max_bead_distance(&self) -> f64 {
        self.max_bead_distance
    }

    pub fn find_beads(&self) -> BeadSearch {
        let opts = &self.options;
        let shape = self.volume.shape();
        let (ny, nx) = (shape[1], shape[2]);
        let border = opts.border;

        let projection = max_projection(self.volume.data());
        let projection = median_filter_2d(projection.view(), opts.projection_median_size);
        let maxima = peak_local_max(projection.view(), opts.min_peak_distance, opts.threshold_abs);

        let inside = |v: usize, n: usize| v > border && v + border < n;
        let (xy_inside, xy_border): (Vec<_>, Vec<_>) =
            maxima.into_iter().partition(|&(y, x)| inside(y, ny) && inside(x, nx));

        let mut discarded = Vec::new();
        let mut candidates = Vec::with_capacity(xy_inside.len());
        for (y, x) in xy_inside {
            let bead = Bead::new(self.z_position(y, x), y, x);
            if inside(bead.z, shape[0]) {
                candidates.push(bead);
            } else {
                discarded.push(DiscardedBead {
                    bead,
                    reason: DiscardReason::ZBorder,
                });
            }
        }
        for (y, x) in xy_border {
            discarded.push(DiscardedBead {
                bead: Bead::new(self.z_position(y, x), y, x),
                reason: DiscardReason::XyBorder,
            });
        }

        let (accepted, crowded) = filter_by_neighbor_distance(&candidates, opts.min_neighbor_distance);
        discarded.extend(crowded.into_iter().map(|bead| DiscardedBead {
            bead,
            reason: DiscardReason::NeighborDistance,
        }));

        info!(
            "found {} beads ({} discarded: {} xy border, {} z border, {} neighbour distance)",
            accepted.len(),
            discarded.len(),
            count(&discarded, DiscardReason::XyBorder),
            count(&discarded, DiscardReason::ZBorder),
            count(&discarded, DiscardReason::NeighborDistance),
        );
        BeadSearch { accepted, discarded }
    }

    /// Z index of the brightest point of the median-filtered profile at
    /// `(y, x)`, first occurrence on ties.
    fn z_position(&self, y: usize, x: usize) -> usize {
        let data = self.volume.data();
        let profile = median_filter_1d(data.slice(s![.., y, x]), self.options.profile_median_size);
        let mut best = 0;
        for (z, &v) in profile.iter().enumerate() {
            if v > profile[best] {
                best = z;
            }
        }
        best
    }
}

fn count(discarded: &[DiscardedBead], reason: DiscardReason) -> usize {
    discarded.iter().filter(|d| d.reason == reason).count()
}

/// Split `beads` into those whose nearest other bead is farther than
/// `min_distance` (voxels) and those at or below it.
///
/// Distances are taken against the whole input list, so two beads that are
/// too close discard each other.
pub fn filter_by_neighbor_distance(beads: &[Bead], min_distance: f64) -> (Vec<Bead>, Vec<Bead>) {
    let mut kept = Vec::with_capacity(beads.len());
    let mut crowded = Vec::new();
    for (i, &bead) in beads.iter().enumerate() {
        let nearest = beads
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .map(|(_, &other)| bead.distance(other))
            .fold(f64::INFINITY, f64::min);
        if nearest > min_distance {
            kept.push(bead);
        } else {
            crowded.push(bead);
        }
    }
    (kept, crowded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticBead, VolumeSpec, render_volume};

    const BBOX: [f64; 3] = [3200.0, 1600.0, 1600.0];

    fn volume_with(beads: &[[f64; 3]]) -> CalibratedImage3D {
        let spec = VolumeSpec {
            shape: [32, 64, 64],
            spacing: [200.0, 100.0, 100.0],
            background: 100.0,
            beads: beads
                .iter()
                .map(|&c| SyntheticBead::axis_aligned(c, 5000.0, [1.0, 1.2, 1.2]))
                .collect(),
            noise_sigma: 0.0,
            seed: 0,
        };
        render_volume(&spec).unwrap()
    }

    #[test]
    fn finds_single_centred_bead() {
        let volume = volume_with(&[[16.0, 32.0, 32.0]]);
        let finder = BeadFinder::new(&volume, BBOX).unwrap();
        assert_eq!(finder.bounding_box_voxels(), [16, 16, 16]);
        assert!((finder.max_bead_distance() - (3200f64.powi(2) + 2.0 * 1600f64.powi(2)).sqrt()).abs() < 1e-9);

        let search = finder.find_beads();
        assert_eq!(search.accepted, vec![Bead::new(16, 32, 32)]);
        assert!(search.discarded.is_empty());
    }

    #[test]
    fn find_beads_is_idempotent() {
        let volume = volume_with(&[[16.0, 20.0, 20.0], [12.0, 40.0, 45.0], [20.0, 3.0, 30.0]]);
        let finder = BeadFinder::new(&volume, BBOX).unwrap();
        assert_eq!(finder.find_beads(), finder.find_beads());
    }

    #[test]
    fn xy_border_is_exclusive() {
        // border 5 on a 64 pixel frame: 4 and 59 are out, 6 and 57 are in.
        let volume = volume_with(&[
            [16.0, 4.0, 30.0],
            [16.0, 20.0, 6.0],
            [16.0, 59.0, 40.0],
            [16.0, 45.0, 57.0],
        ]);
        let search = BeadFinder::new(&volume, BBOX).unwrap().find_beads();

        let mut accepted = search.accepted.clone();
        accepted.sort();
        assert_eq!(accepted, vec![Bead::new(16, 20, 6), Bead::new(16, 45, 57)]);
        let mut rejected = search.discarded_beads();
        rejected.sort();
        assert_eq!(rejected, vec![Bead::new(16, 4, 30), Bead::new(16, 59, 40)]);
        assert_eq!(search.count_discarded(DiscardReason::XyBorder), 2);
    }

    #[test]
    fn z_border_is_exclusive() {
        let volume = volume_with(&[[4.0, 20.0, 20.0], [6.0, 40.0, 40.0], [27.0, 20.0, 44.0]]);
        let search = BeadFinder::new(&volume, BBOX).unwrap().find_beads();
        assert_eq!(search.accepted, vec![Bead::new(6, 40, 40)]);
        assert_eq!(search.count_discarded(DiscardReason::ZBorder), 2);
    }

    #[test]
    fn neighbour_filter_boundary() {
        let (kept, crowded) = filter_by_neighbor_distance(&[Bead::new(10, 10, 10), Bead::new(10, 10, 15)], 5.0);
        assert!(kept.is_empty());
        assert_eq!(crowded.len(), 2);

        // sqrt(26) ≈ 5.099 apart
        let (kept, crowded) = filter_by_neighbor_distance(&[Bead::new(10, 10, 10), Bead::new(10, 11, 15)], 5.0);
        assert_eq!(kept.len(), 2);
        assert!(crowded.is_empty());

        let (kept, _) = filter_by_neighbor_distance(&[Bead::new(1, 2, 3)], 5.0);
        assert_eq!(kept, vec![Bead::new(1, 2, 3)]);
    }

    #[test]
    fn close_beads_in_a_volume_discard_each_other() {
        let volume = volume_with(&[[16.0, 30.0, 20.0], [16.0, 30.0, 24.0], [16.0, 30.0, 45.0]]);
        let search = BeadFinder::new(&volume, BBOX).unwrap().find_beads();
        assert_eq!(search.accepted, vec![Bead::new(16, 30, 45)]);
        assert_eq!(search.count_discarded(DiscardReason::NeighborDistance), 2);
    }

    #[test]
    fn empty_volume_yields_no_beads() {
        let volume = volume_with(&[]);
        let search = BeadFinder::new(&volume, BBOX).unwrap().find_beads();
        assert!(search.accepted.is_empty());
        assert!(search.discarded.is_empty());
    }

    #[test]
    fn threshold_is_configurable() {
        let volume = volume_with(&[[16.0, 32.0, 32.0]]);
        let options = BeadFinderOptions {
            threshold_abs: 4000.0,
            ..BeadFinderOptions::default()
        };
        let search = BeadFinder::new(&volume, BBOX).unwrap().with_options(options).find_beads();
        // The median-filtered peak is about 3633 counts.
        assert!(search.accepted.is_empty());
    }
}
