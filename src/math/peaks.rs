//! Local maxima detection on 2D images.

use ndarray::ArrayView2;

use crate::math::maximum_filter_2d;

/// Find local maxima in `image`, returned as `(row, col)`.
///
/// A pixel is a candidate when it equals the maximum of its
/// `(2·min_distance + 1)²` neighbourhood and is strictly above
/// `threshold_abs`. Candidates are visited brightest first (ties keep raster
/// order) and any candidate within `min_distance` (Chebyshev) of an already
/// kept peak is dropped. A constant image has no peaks.
pub fn peak_local_max(image: ArrayView2<f64>, min_distance: usize, threshold_abs: f64) -> Vec<(usize, usize)> {
    let Some(&first) = image.iter().next() else {
        return Vec::new();
    };
    if image.iter().all(|&v| v == first) {
        return Vec::new();
    }

    let size = 2 * min_distance.max(1) + 1;
    let local_max = maximum_filter_2d(image, size);

    let mut candidates: Vec<(usize, usize, f64)> = image
        .indexed_iter()
        .filter(|&((r, c), &v)| v == local_max[[r, c]] && v > threshold_abs)
        .map(|((r, c), &v)| (r, c, v))
        .collect();
    // Stable sort: equal intensities stay in raster order.
    candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept: Vec<(usize, usize)> = Vec::new();
    for (r, c, _) in candidates {
        let crowded = kept
            .iter()
            .any(|&(kr, kc)| r.abs_diff(kr).max(c.abs_diff(kc)) <= min_distance);
        if !crowded {
            kept.push((r, c));
        }
    }
    kept
}
