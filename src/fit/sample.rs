//! Fit samples: a calibrated image viewed as a list of `(position, value)`.
//!
//! Positions are physical (voxel index × spacing), in C order, which is the
//! independent-variable grid handed to the solver.

use ndarray::{Dimension, IntoDimension, Ix1, Ix2, Ix3};

use crate::image::CalibratedImage;

#[derive(Debug, Clone, PartialEq)]
pub struct Sample<D: Dimension, const N: usize> {
    image: CalibratedImage<D, N>,
}

pub type ZSample = Sample<Ix1, 1>;
pub type YXSample = Sample<Ix2, 2>;
pub type ZYXSample = Sample<Ix3, 3>;

impl<D: Dimension, const N: usize> Sample<D, N> {
    pub fn new(image: CalibratedImage<D, N>) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &CalibratedImage<D, N> {
        &self.image
    }

    pub fn len(&self) -> usize {
        self.image.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }

    /// Physical coordinates along `axis`.
    pub fn coordinates(&self, axis: usize) -> Vec<f64> {
        let step = self.image.spacing()[axis];
        (0..self.image.shape()[axis]).map(|i| i as f64 * step).collect()
    }

    pub fn ravelled_coordinates(&self) -> Vec<[f64; N]> {
        let spacing = self.image.spacing();
        self.image
            .data()
            .indexed_iter()
            .map(|(index, _)| {
                let index = index.into_dimension();
                let mut point = [0.0; N];
                for (axis, &i) in index.slice().iter().enumerate() {
                    point[axis] = i as f64 * spacing[axis];
                }
                point
            })
            .collect()
    }

    pub fn ravelled_values(&self) -> Vec<f64> {
        self.image.data().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{CalibratedImage1D, CalibratedImage2D};
    use ndarray::{Array1, array};

    #[test]
    fn coordinates_scale_indices_by_spacing() {
        let image = CalibratedImage1D::new(Array1::from(vec![1.0, 2.0, 3.0]), [200.0]).unwrap();
        let sample = ZSample::new(image);
        assert_eq!(sample.coordinates(0), vec![0.0, 200.0, 400.0]);
        assert_eq!(sample.ravelled_coordinates(), vec![[0.0], [200.0], [400.0]]);
    }

    #[test]
    fn ravelled_grid_is_c_order() {
        let image = CalibratedImage2D::new(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]], [10.0, 1.0]).unwrap();
        let sample = YXSample::new(image);
        assert_eq!(
            sample.ravelled_coordinates(),
            vec![[0.0, 0.0], [0.0, 1.0], [0.0, 2.0], [10.0, 0.0], [10.0, 1.0], [10.0, 2.0]]
        );
        assert_eq!(sample.ravelled_values(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(sample.len(), 6);
    }
}
