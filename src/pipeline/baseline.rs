//! Baseline subtraction variants.

use std::collections::HashMap;

use crate::error::PipelineError;
use crate::kernels::linear_regression;

pub fn subtract_mean(data: &[f64]) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    data.iter().map(|v| v - mean).collect()
}

pub fn subtract_median(data: &[f64]) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };
    data.iter().map(|v| v - median).collect()
}

/// Rounds every sample to `decimals` digits and subtracts the statistical
/// mode of the rounded values. Ties broken by the
/// smallest rounded value, for determinism.
pub fn subtract_mode(data: &[f64], decimals: i32) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let scale = 10f64.powi(decimals);
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for &v in data {
        let key = (v * scale).round() as i64;
        *counts.entry(key).or_insert(0) += 1;
    }
    let mode_key = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(k, _)| k)
        .unwrap_or(0);
    let mode_value = mode_key as f64 / scale;
    data.iter().map(|v| v - mode_value).collect()
}

/// Subtracts the best-fit line through `(index, value)` pairs (detrend).
/// Returns the input unchanged if fewer than two samples are present.
pub fn subtract_linear_trend(data: &[f64]) -> Vec<f64> {
    if data.len() < 2 {
        return data.to_vec();
    }
    let x: Vec<f64> = (0..data.len()).map(|i| i as f64).collect();
    match linear_regression(&x, data) {
        Some(fit) => x
            .iter()
            .zip(data.iter())
            .map(|(&xi, &yi)| yi - (fit.slope * xi + fit.intercept))
            .collect(),
        None => data.to_vec(),
    }
}

/// Subtracts the mean of the samples falling within `[t_start, t_end]` of
/// `time`. Fails if the window is empty or outside the trace.
pub fn subtract_window_mean(
    data: &[f64],
    time: &[f64],
    t_start: f64,
    t_end: f64,
) -> Result<Vec<f64>, PipelineError> {
    if t_start >= t_end {
        return Err(PipelineError::InvalidParams {
            step: "baseline:window".to_string(),
            message: format!("t_start ({t_start}) must be < t_end ({t_end})"),
        });
    }
    let windowed: Vec<f64> = time
        .iter()
        .zip(data.iter())
        .filter(|(&t, _)| t >= t_start && t <= t_end)
        .map(|(_, &v)| v)
        .collect();
    if windowed.is_empty() {
        return Err(PipelineError::InvalidParams {
            step: "baseline:window".to_string(),
            message: format!("window [{t_start}, {t_end}] contains no samples"),
        });
    }
    let mean = windowed.iter().sum::<f64>() / windowed.len() as f64;
    Ok(data.iter().map(|v| v - mean).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_subtraction_is_idempotent() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let once = subtract_mean(&data);
        let twice = subtract_mean(&once);
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn median_subtraction_centers_data() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 100.0];
        let out = subtract_median(&data);
        assert!((out[2]).abs() < 1e-9);
    }

    #[test]
    fn mode_subtraction_picks_most_common_rounded_value() {
        let data = vec![1.01, 1.02, 1.00, 5.0];
        let out = subtract_mode(&data, 1);
        assert!(out[0].abs() < 1e-9);
    }

    #[test]
    fn linear_detrend_flattens_ramp() {
        let data: Vec<f64> = (0..100).map(|i| i as f64 * 2.0 + 10.0).collect();
        let out = subtract_linear_trend(&data);
        for v in out {
            assert!(v.abs() < 1e-6);
        }
    }

    #[test]
    fn window_mean_requires_nonempty_overlap() {
        let data = vec![0.0; 10];
        let time: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
        assert!(subtract_window_mean(&data, &time, 5.0, 6.0).is_err());
    }
}
