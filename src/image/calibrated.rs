//! Intensity arrays paired with their physical voxel spacing.
//!
//! The rank of the array and the length of the spacing tuple are tied together
//! by the type (`CalibratedImage<Ix3, 3>` and friends), so a 2D slice can never
//! carry a 3D spacing. Construction validates the data once; afterwards the
//! image is read-only.

use ndarray::{Array, ArrayView, Dimension, Ix1, Ix2, Ix3};

use crate::error::PsfError;

#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedImage<D: Dimension, const N: usize> {
    data: Array<f64, D>,
    spacing: [f64; N],
}

pub type CalibratedImage1D = CalibratedImage<Ix1, 1>;
pub type CalibratedImage2D = CalibratedImage<Ix2, 2>;
pub type CalibratedImage3D = CalibratedImage<Ix3, 3>;

impl<D: Dimension, const N: usize> CalibratedImage<D, N> {
    /// Wrap `data` with `spacing` (length per voxel along each axis).
    ///
    /// Fails on empty arrays, non-finite intensities and non-positive spacing.
    pub fn new(data: Array<f64, D>, spacing: [f64; N]) -> Result<Self, PsfError> {
        if data.ndim() != N {
            return Err(PsfError::invalid(format!(
                "spacing has {N} entries but the image has rank {}",
                data.ndim()
            )));
        }
        if data.is_empty() {
            return Err(PsfError::invalid(format!(
                "image is empty (shape {:?})",
                data.shape()
            )));
        }
        if let Some(idx) = data.iter().position(|v| !v.is_finite()) {
            return Err(PsfError::invalid(format!(
                "image contains a non-finite value at flat index {idx}"
            )));
        }
        if let Some(s) = spacing.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(PsfError::invalid(format!(
                "voxel spacing must be finite and > 0, got {s}"
            )));
        }
        Ok(Self { data, spacing })
    }

    pub fn data(&self) -> ArrayView<'_, f64, D> {
        self.data.view()
    }

    pub fn spacing(&self) -> [f64; N] {
        self.spacing
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn max_value(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min_value(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

impl CalibratedImage3D {
    /// Build a volume from raw camera counts.
    pub fn from_counts(data: Array<u16, Ix3>, spacing: [f64; 3]) -> Result<Self, PsfError> {
        Self::new(data.mapv(f64::from), spacing)
    }
}
