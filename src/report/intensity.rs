//! Intensity distribution of an image.
//!
//! Counts how much of the image is empty (exactly zero), saturated (at the
//! saturation value) and how the remaining values spread over equal-width
//! bins between the two. Percentages are relative to the full voxel count, so
//! the three parts add up to 100.

use ndarray::{ArrayView, Dimension};
use serde::{Deserialize, Serialize};

use crate::error::PsfError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityBin {
    pub lo: f64,
    pub hi: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityStats {
    pub total: usize,
    pub saturation: f64,
    pub zero_percent: f64,
    pub saturated_percent: f64,
    pub bins: Vec<IntensityBin>,
}

impl IntensityStats {
    /// `(range label, percentage)` rows, minimum first and saturation last.
    pub fn rows(&self) -> Vec<(String, String)> {
        let first_edge = self.bins.first().map(|b| b.hi).unwrap_or(self.saturation);
        let mut rows = vec![(format!("0-{first_edge:.1} (min)"), format!("{:.2}%", self.zero_percent))];
        for bin in &self.bins {
            rows.push((format!("{:.1}-{:.1}", bin.lo, bin.hi), format!("{:.2}%", bin.percent)));
        }
        rows.push((
            format!("{:.1} (max)", self.saturation),
            format!("{:.2}%", self.saturated_percent),
        ));
        rows
    }
}

/// Histogram `data` into `num_bins` bins over `[0, saturation]`.
///
/// `saturation` defaults to the data maximum; pass the camera's full-scale
/// value (e.g. 65535) to measure clipping.
pub fn analyze_intensity<D: Dimension>(
    data: ArrayView<'_, f64, D>,
    num_bins: usize,
    saturation: Option<f64>,
) -> Result<IntensityStats, PsfError> {
    let total = data.len();
    if total == 0 {
        return Err(PsfError::invalid("image contains no voxels to analyse"));
    }
    if num_bins == 0 {
        return Err(PsfError::invalid("histogram needs at least one bin"));
    }
    let saturation = saturation.unwrap_or_else(|| data.iter().copied().fold(f64::NEG_INFINITY, f64::max));
    if !(saturation.is_finite() && saturation > 0.0) {
        return Err(PsfError::invalid(format!(
            "saturation value must be finite and > 0, got {saturation}"
        )));
    }

    let width = saturation / num_bins as f64;
    let mut counts = vec![0usize; num_bins];
    let mut zeros = 0usize;
    let mut saturated = 0usize;
    for &v in data.iter() {
        if v == 0.0 {
            zeros += 1;
        } else if v == saturation {
            saturated += 1;
        } else if v > 0.0 && v < saturation {
            let bin = ((v / width) as usize).min(num_bins - 1);
            counts[bin] += 1;
        }
    }

    let percent = |n: usize| n as f64 / total as f64 * 100.0;
    let bins = counts
        .iter()
        .enumerate()
        .map(|(i, &n)| IntensityBin {
            lo: i as f64 * width,
            hi: (i + 1) as f64 * width,
            percent: percent(n),
        })
        .collect();

    Ok(IntensityStats {
        total,
        saturation,
        zero_percent: percent(zeros),
        saturated_percent: percent(saturated),
        bins,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn splits_zero_saturated_and_binned_voxels() {
        let data = array![[0.0, 0.0, 10.0, 30.0], [55.0, 99.0, 100.0, 100.0]];
        let stats = analyze_intensity(data.view(), 4, Some(100.0)).unwrap();

        assert_eq!(stats.total, 8);
        assert_eq!(stats.zero_percent, 25.0);
        assert_eq!(stats.saturated_percent, 25.0);
        let percents: Vec<f64> = stats.bins.iter().map(|b| b.percent).collect();
        assert_eq!(percents, vec![12.5, 12.5, 12.5, 12.5]);

        let rows = stats.rows();
        assert_eq!(rows[0], ("0-25.0 (min)".to_string(), "25.00%".to_string()));
        assert_eq!(rows[1], ("0.0-25.0".to_string(), "12.50%".to_string()));
        assert_eq!(rows[5], ("100.0 (max)".to_string(), "25.00%".to_string()));
    }

    #[test]
    fn saturation_defaults_to_data_maximum() {
        let data = array![1.0, 2.0, 4.0];
        let stats = analyze_intensity(data.view(), 2, None).unwrap();
        assert_eq!(stats.saturation, 4.0);
        assert!((stats.saturated_percent - 100.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_degenerate_input() {
        let zeros = array![0.0, 0.0];
        assert!(analyze_intensity(zeros.view(), 4, None).is_err());
        let data = array![1.0];
        assert!(analyze_intensity(data.view(), 0, None).is_err());
    }
}
