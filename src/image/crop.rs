//! Cropping a fixed-size neighbourhood around a bead.
//!
//! The fitters work on crop-relative physical coordinates (voxel index within
//! the crop × spacing). `BeadCrop` keeps the crop origin so fitted centroids can
//! be mapped back into the volume.

use ndarray::s;

use crate::domain::Bead;
use crate::error::PsfError;
use crate::image::CalibratedImage3D;

#[derive(Debug, Clone)]
pub struct BeadCrop {
    pub bead: Bead,
    /// Volume voxel index of the crop's first voxel.
    pub origin: [usize; 3],
    /// Crop-relative voxel index of the bead. Equals `shape / 2` unless the
    /// crop was clipped at a volume edge.
    pub center: [usize; 3],
    pub image: CalibratedImage3D,
}

impl BeadCrop {
    /// Map a crop-relative physical position to volume voxel coordinates.
    pub fn to_volume_voxels(&self, position: [f64; 3]) -> [f64; 3] {
        let spacing = self.image.spacing();
        let mut out = [0.0; 3];
        for axis in 0..3 {
            out[axis] = self.origin[axis] as f64 + position[axis] / spacing[axis];
        }
        out
    }

    /// Map a crop-relative physical position to volume physical coordinates.
    pub fn to_volume_physical(&self, position: [f64; 3]) -> [f64; 3] {
        let spacing = self.image.spacing();
        let mut out = [0.0; 3];
        for axis in 0..3 {
            out[axis] = self.origin[axis] as f64 * spacing[axis] + position[axis];
        }
        out
    }
}

/// Convert a physical box size into whole voxels (at least one per axis).
pub fn bounding_box_to_voxels(bounding_box: [f64; 3], spacing: [f64; 3]) -> Result<[usize; 3], PsfError> {
    let mut out = [0usize; 3];
    for axis in 0..3 {
        let size = bounding_box[axis];
        if !(size.is_finite() && size > 0.0) {
            return Err(PsfError::invalid(format!(
                "bounding box must be finite and > 0, got {size} on axis {axis}"
            )));
        }
        out[axis] = ((size / spacing[axis]).round() as usize).max(1);
    }
    Ok(out)
}

/// Crop `box_voxels` voxels centred on `bead`, clipped to the volume.
///
/// For an unclipped crop the bead sits at index `box_voxels / 2` on every
/// axis; `BeadCrop::center` holds its actual index either way.
pub fn crop_bead(volume: &CalibratedImage3D, bead: Bead, box_voxels: [usize; 3]) -> Result<BeadCrop, PsfError> {
    let shape = volume.shape();
    let center = bead.as_array();

    let mut start = [0usize; 3];
    let mut end = [0usize; 3];
    for axis in 0..3 {
        if center[axis] >= shape[axis] {
            return Err(PsfError::invalid(format!(
                "bead {bead} lies outside the volume of shape {shape:?}"
            )));
        }
        let half = box_voxels[axis] / 2;
        start[axis] = center[axis].saturating_sub(half);
        end[axis] = (center[axis] + (box_voxels[axis] - half)).min(shape[axis]);
    }

    let data = volume
        .data()
        .slice(s![start[0]..end[0], start[1]..end[1], start[2]..end[2]])
        .to_owned();
    let image = CalibratedImage3D::new(data, volume.spacing())?;

    Ok(BeadCrop {
        bead,
        origin: start,
        center: [center[0] - start[0], center[1] - start[1], center[2] - start[2]],
        image,
    })
}
