//! Rank filters and projections on image arrays.
//!
//! Boundary handling follows the SciPy `ndimage` conventions the detection
//! thresholds were tuned against:
//!
//! - median filters use `reflect` (`d c b a | a b c d | d c b a`)
//! - the maximum filter uses `nearest` (`a a a a | a b c d | d d d d`)
//!
//! A window of size `s` covers offsets `-(s/2) ..= s - 1 - s/2`, so even
//! windows lean towards lower indices. The median of an even window is the
//! upper of the two middle values.

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayView3, Axis};

/// Maximum intensity projection along Z (axis 0).
pub fn max_projection(volume: ArrayView3<f64>) -> Array2<f64> {
    volume.fold_axis(Axis(0), f64::NEG_INFINITY, |&acc, &v| acc.max(v))
}

fn reflect_index(i: isize, n: usize) -> usize {
    let n = n as isize;
    let mut i = i;
    while i < 0 || i >= n {
        if i < 0 {
            i = -i - 1;
        } else {
            i = 2 * n - i - 1;
        }
    }
    i as usize
}

fn nearest_index(i: isize, n: usize) -> usize {
    i.clamp(0, n as isize - 1) as usize
}

fn window_offsets(size: usize) -> std::ops::RangeInclusive<isize> {
    let size = size.max(1) as isize;
    let lo = -(size / 2);
    lo..=(lo + size - 1)
}

fn rank_median(window: &mut [f64]) -> f64 {
    window.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    window[window.len() / 2]
}

/// Median filter over a 1D profile.
pub fn median_filter_1d(values: ArrayView1<f64>, size: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let offsets = window_offsets(size);
    let mut window = Vec::with_capacity(size.max(1));
    (0..n)
        .map(|i| {
            window.clear();
            for d in offsets.clone() {
                window.push(values[reflect_index(i as isize + d, n)]);
            }
            rank_median(&mut window)
        })
        .collect()
}

/// Median filter with a square `size × size` window.
pub fn median_filter_2d(image: ArrayView2<f64>, size: usize) -> Array2<f64> {
    let (rows, cols) = image.dim();
    let offsets = window_offsets(size);
    let mut window = Vec::with_capacity(size.max(1) * size.max(1));
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        window.clear();
        for dr in offsets.clone() {
            let rr = reflect_index(r as isize + dr, rows);
            for dc in offsets.clone() {
                let cc = reflect_index(c as isize + dc, cols);
                window.push(image[[rr, cc]]);
            }
        }
        rank_median(&mut window)
    })
}

/// Maximum filter with a square `size × size` window.
pub fn maximum_filter_2d(image: ArrayView2<f64>, size: usize) -> Array2<f64> {
    let (rows, cols) = image.dim();
    let offsets = window_offsets(size);
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let mut best = f64::NEG_INFINITY;
        for dr in offsets.clone() {
            let rr = nearest_index(r as isize + dr, rows);
            for dc in offsets.clone() {
                let cc = nearest_index(c as isize + dc, cols);
                best = best.max(image[[rr, cc]]);
            }
        }
        best
    })
}
