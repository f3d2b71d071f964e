//! Threshold-based spike detection with per-spike feature extraction,
//! shared by the `spikes`, `burst`, `excitability`, `spike_train_dynamics`
//! and `phase_plane` analyses so the detection algorithm itself has a
//! single implementation.

use super::common::{derivative, interpolate_index, mean};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeFeatures {
    pub peak_index: usize,
    pub peak_time: f64,
    pub peak_voltage: f64,
    pub onset_index: usize,
    pub onset_voltage: f64,
    pub amplitude: f64,
    pub half_width: f64,
    pub rise_time_10_90: f64,
    pub decay_time_90_10: f64,
    pub ahp_depth: f64,
    pub ahp_half_duration: f64,
    pub adp_amplitude: f64,
    pub max_dvdt: f64,
    pub min_dvdt: f64,
}

pub struct SpikeDetectParams {
    pub threshold: f64,
    pub refractory_period: f64,
    pub peak_search_window: f64,
    pub dvdt_threshold_v_per_s: f64,
    pub ahp_window: f64,
    pub onset_lookback: f64,
}

/// Detects spikes on `data`/`time` at `sampling_rate` and extracts
/// per-spike features. Step order: upward threshold crossings, refractory
/// enforcement between *crossings*, peak search per crossing, then
/// feature extraction per peak.
pub fn detect_spikes(data: &[f64], time: &[f64], sampling_rate: f64, p: &SpikeDetectParams) -> Vec<SpikeFeatures> {
    if data.len() < 3 || sampling_rate <= 0.0 {
        return Vec::new();
    }

    let crossings = upward_crossings(data, p.threshold);
    let refractory_samples = (p.refractory_period * sampling_rate).round() as usize;
    let crossings = enforce_refractory(crossings, refractory_samples);

    let peak_search_samples = (p.peak_search_window * sampling_rate).round().max(1.0) as usize;
    let dvdt = derivative(data, sampling_rate);
    let dvdt_threshold_mv_per_s = p.dvdt_threshold_v_per_s * 1000.0;
    let onset_lookback_samples = (p.onset_lookback * sampling_rate).round().max(1.0) as usize;
    let ahp_window_samples = (p.ahp_window * sampling_rate).round().max(1.0) as usize;

    let mut out = Vec::new();
    for crossing in crossings {
        let search_end = (crossing + peak_search_samples).min(data.len() - 1);
        if search_end <= crossing {
            continue;
        }
        let peak_index = (crossing..=search_end)
            .max_by(|&a, &b| data[a].partial_cmp(&data[b]).unwrap())
            .unwrap();

        let onset_index = find_onset(&dvdt, peak_index, onset_lookback_samples, dvdt_threshold_mv_per_s)
            .unwrap_or(crossing);
        let onset_voltage = data[onset_index];
        let peak_voltage = data[peak_index];
        let amplitude = peak_voltage - onset_voltage;

        let half_width = half_width_at(data, onset_index, peak_index, onset_voltage, amplitude, sampling_rate);
        let rise_time_10_90 = rise_time(data, onset_index, peak_index, onset_voltage, amplitude, sampling_rate);
        let decay_time_90_10 =
            decay_time(data, peak_index, onset_voltage, amplitude, sampling_rate, ahp_window_samples);

        let ahp_end = (peak_index + ahp_window_samples).min(data.len() - 1);
        let (ahp_depth, ahp_min_index) = if ahp_end > peak_index {
            let (min_idx, min_val) = (peak_index..=ahp_end)
                .map(|i| (i, data[i]))
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
                .unwrap();
            (onset_voltage - min_val, min_idx)
        } else {
            (f64::NAN, peak_index)
        };

        let ahp_half_duration = ahp_half_duration_at(data, peak_index, ahp_end, ahp_min_index, onset_voltage, ahp_depth, sampling_rate);
        let adp_amplitude = adp_amplitude_at(data, ahp_min_index, ahp_end);

        let dvdt_window_end = (peak_index + (0.005 * sampling_rate).round() as usize).min(data.len() - 1);
        let (max_dvdt, min_dvdt) = if dvdt_window_end > onset_index {
            let slice = &dvdt[onset_index..=dvdt_window_end];
            (
                slice.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                slice.iter().cloned().fold(f64::INFINITY, f64::min),
            )
        } else {
            (f64::NAN, f64::NAN)
        };

        out.push(SpikeFeatures {
            peak_index,
            peak_time: time.get(peak_index).copied().unwrap_or(f64::NAN),
            peak_voltage,
            onset_index,
            onset_voltage,
            amplitude,
            half_width,
            rise_time_10_90,
            decay_time_90_10,
            ahp_depth,
            ahp_half_duration,
            adp_amplitude,
            max_dvdt,
            min_dvdt,
        });
    }
    out
}

fn upward_crossings(data: &[f64], threshold: f64) -> Vec<usize> {
    data.windows(2)
        .enumerate()
        .filter_map(|(i, w)| (w[0] < threshold && w[1] >= threshold).then_some(i + 1))
        .collect()
}

/// Keeps the first crossing of any pair closer than `refractory_samples`.
fn enforce_refractory(crossings: Vec<usize>, refractory_samples: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(crossings.len());
    let mut last: Option<usize> = None;
    for c in crossings {
        if let Some(l) = last {
            if c - l < refractory_samples {
                continue;
            }
        }
        out.push(c);
        last = Some(c);
    }
    out
}

fn find_onset(dvdt: &[f64], peak_index: usize, lookback_samples: usize, dvdt_threshold: f64) -> Option<usize> {
    let start = peak_index.saturating_sub(lookback_samples);
    (start..=peak_index).find(|&i| dvdt[i] >= dvdt_threshold)
}

fn half_width_at(
    data: &[f64],
    onset_index: usize,
    peak_index: usize,
    onset_voltage: f64,
    amplitude: f64,
    sampling_rate: f64,
) -> f64 {
    if amplitude.abs() < f64::EPSILON || peak_index <= onset_index {
        return f64::NAN;
    }
    let target = onset_voltage + amplitude / 2.0;
    let rising = (onset_index..peak_index).find(|&i| data[i] < target && data[i + 1] >= target);
    let end_search = (peak_index + (peak_index - onset_index)).min(data.len() - 1);
    let falling = (peak_index..end_search).find(|&i| data[i] >= target && data[i + 1] < target);
    match (rising, falling) {
        (Some(r), Some(f)) => {
            let t_rise = interpolate_index(data, r, r + 1, target);
            let t_fall = interpolate_index(data, f, f + 1, target);
            (t_fall - t_rise) / sampling_rate
        }
        _ => f64::NAN,
    }
}

fn rise_time(
    data: &[f64],
    onset_index: usize,
    peak_index: usize,
    onset_voltage: f64,
    amplitude: f64,
    sampling_rate: f64,
) -> f64 {
    if amplitude.abs() < f64::EPSILON || peak_index <= onset_index {
        return f64::NAN;
    }
    let lo_target = onset_voltage + 0.1 * amplitude;
    let hi_target = onset_voltage + 0.9 * amplitude;
    let lo = (onset_index..peak_index).find(|&i| data[i] < lo_target && data[i + 1] >= lo_target);
    let hi = (onset_index..peak_index).find(|&i| data[i] < hi_target && data[i + 1] >= hi_target);
    match (lo, hi) {
        (Some(l), Some(h)) => {
            let t_lo = interpolate_index(data, l, l + 1, lo_target);
            let t_hi = interpolate_index(data, h, h + 1, hi_target);
            (t_hi - t_lo) / sampling_rate
        }
        _ => f64::NAN,
    }
}

fn decay_time(
    data: &[f64],
    peak_index: usize,
    onset_voltage: f64,
    amplitude: f64,
    sampling_rate: f64,
    search_samples: usize,
) -> f64 {
    if amplitude.abs() < f64::EPSILON {
        return f64::NAN;
    }
    let hi_target = onset_voltage + 0.9 * amplitude;
    let lo_target = onset_voltage + 0.1 * amplitude;
    let end = (peak_index + search_samples.max(1)).min(data.len() - 2);
    let hi = (peak_index..end).find(|&i| data[i] >= hi_target && data[i + 1] < hi_target);
    let lo = (peak_index..end).find(|&i| data[i] >= lo_target && data[i + 1] < lo_target);
    match (hi, lo) {
        (Some(h), Some(l)) if l >= h => {
            let t_hi = interpolate_index(data, h, h + 1, hi_target);
            let t_lo = interpolate_index(data, l, l + 1, lo_target);
            (t_lo - t_hi) / sampling_rate
        }
        _ => f64::NAN,
    }
}

fn ahp_half_duration_at(
    data: &[f64],
    peak_index: usize,
    ahp_end: usize,
    ahp_min_index: usize,
    onset_voltage: f64,
    ahp_depth: f64,
    sampling_rate: f64,
) -> f64 {
    if ahp_depth.is_nan() || ahp_depth.abs() < f64::EPSILON {
        return f64::NAN;
    }
    let half_level = onset_voltage - ahp_depth / 2.0;
    let recovery = (ahp_min_index..ahp_end).find(|&i| data[i] <= half_level && data[i + 1] > half_level);
    match recovery {
        Some(r) => {
            let t_recover = interpolate_index(data, r, r + 1, half_level);
            (t_recover - peak_index as f64) / sampling_rate
        }
        None => f64::NAN,
    }
}

/// ADP amplitude: a secondary depolarizing bump between the AHP trough and
/// the end of the AHP window. NaN when recovery is monotonic (no bump).
fn adp_amplitude_at(data: &[f64], ahp_min_index: usize, ahp_end: usize) -> f64 {
    if ahp_end <= ahp_min_index + 1 {
        return f64::NAN;
    }
    let tail = &data[ahp_min_index..=ahp_end];
    let local_max = tail.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let is_monotonic = tail.windows(2).all(|w| w[1] >= w[0]) || tail.windows(2).all(|w| w[1] <= w[0]);
    if is_monotonic {
        f64::NAN
    } else {
        local_max - data[ahp_min_index]
    }
}

pub fn mean_feature<F: Fn(&SpikeFeatures) -> f64>(spikes: &[SpikeFeatures], f: F) -> (f64, f64) {
    let values: Vec<f64> = spikes.iter().map(f).filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let m = mean(&values);
    let sd = if values.len() < 2 {
        0.0
    } else {
        (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
    };
    (m, sd)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangular_spike_trace() -> (Vec<f64>, Vec<f64>, f64) {
        let rate = 20_000.0;
        let n = 20_000;
        let mut data = vec![-70.0; n];
        for &center_t in &[0.2, 0.4, 0.6, 0.8] {
            let center = (center_t * rate) as usize;
            let half_width_samples = (0.0005 * rate) as usize;
            for k in 0..=half_width_samples {
                let frac = k as f64 / half_width_samples as f64;
                let v = -70.0 + frac * 100.0;
                if center >= k {
                    data[center - k] = v;
                }
                if center + k < n {
                    data[center + k] = v;
                }
            }
        }
        let time: Vec<f64> = (0..n).map(|i| i as f64 / rate).collect();
        (data, time, rate)
    }

    #[test]
    fn detects_four_triangular_spikes() {
        let (data, time, rate) = triangular_spike_trace();
        let params = SpikeDetectParams {
            threshold: -20.0,
            refractory_period: 0.002,
            peak_search_window: 0.002,
            dvdt_threshold_v_per_s: 5.0,
            ahp_window: 0.01,
            onset_lookback: 0.002,
        };
        let spikes = detect_spikes(&data, &time, rate, &params);
        assert_eq!(spikes.len(), 4);
        for (s, &expected) in spikes.iter().zip([0.2, 0.4, 0.6, 0.8].iter()) {
            assert!((s.peak_time - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn refractory_period_is_respected() {
        let (data, time, rate) = triangular_spike_trace();
        let params = SpikeDetectParams {
            threshold: -20.0,
            refractory_period: 0.5, // longer than spike spacing
            peak_search_window: 0.002,
            dvdt_threshold_v_per_s: 5.0,
            ahp_window: 0.01,
            onset_lookback: 0.002,
        };
        let spikes = detect_spikes(&data, &time, rate, &params);
        for w in spikes.windows(2) {
            assert!(w[1].peak_index - w[0].peak_index >= (0.5 * rate) as usize);
        }
    }

    #[test]
    fn empty_trace_yields_no_spikes() {
        let params = SpikeDetectParams {
            threshold: -20.0,
            refractory_period: 0.002,
            peak_search_window: 0.002,
            dvdt_threshold_v_per_s: 5.0,
            ahp_window: 0.01,
            onset_lookback: 0.002,
        };
        assert!(detect_spikes(&[], &[], 20_000.0, &params).is_empty());
    }
}
