//! Adaptive-threshold event detection (mEPSC/mIPSC-style): noise floor via
//! MAD, minimum prominence scaled to the noise, with optional artifact
//! rejection by gradient thresholding and dilation.

use crate::kernels::{find_peaks, mad, PeakParams};
use crate::registry::{AnalysisDescriptor, AnalysisInput, ClampMode, DispatchOutcome, Param, ParamMap, PlotHint, ResultMap};

pub struct EventThresholdParams {
    pub threshold: f64,
    pub direction: Direction,
    pub refractory_period: f64,
    pub reject_artifacts: bool,
    pub artifact_slope_threshold: f64,
    pub artifact_padding_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
}

pub struct DetectedEvent {
    pub index: usize,
    pub time: f64,
    pub amplitude: f64,
}

pub(super) fn params_from(params: &ParamMap) -> EventThresholdParams {
    EventThresholdParams {
        threshold: params.get_f64_or("threshold", 5.0),
        direction: if params.get_str_or("direction", "negative") == "positive" { Direction::Positive } else { Direction::Negative },
        refractory_period: params.get_f64_or("refractory_period", 0.005),
        reject_artifacts: params.get_bool_or("reject_artifacts", false),
        artifact_slope_threshold: params.get_f64_or("artifact_slope_threshold", 50.0),
        artifact_padding_ms: params.get_f64_or("artifact_padding_ms", 2.0),
    }
}

/// Rectifies `data` per `direction`, estimates noise via MAD, derives a
/// minimum peak prominence, and finds peaks with refractory-period spacing.
/// Optionally masks out samples near a fast-slope artifact.
pub fn detect(data: &[f64], time: &[f64], sampling_rate: f64, p: &EventThresholdParams) -> Vec<DetectedEvent> {
    if data.len() < 3 || sampling_rate <= 0.0 {
        return Vec::new();
    }

    let rectified: Vec<f64> = match p.direction {
        Direction::Positive => data.to_vec(),
        Direction::Negative => data.iter().map(|&v| -v).collect(),
    };

    let noise_sd = mad(&rectified);
    let min_prominence = p.threshold.abs().max(2.0 * noise_sd);
    let min_distance = (p.refractory_period * sampling_rate).round().max(1.0) as usize;

    let peak_params = PeakParams { min_height: None, min_prominence: Some(min_prominence), min_distance: Some(min_distance), min_width: None };
    let peaks = find_peaks(&rectified, peak_params);

    let artifact_mask = if p.reject_artifacts {
        Some(artifact_mask(data, sampling_rate, p.artifact_slope_threshold, p.artifact_padding_ms))
    } else {
        None
    };

    peaks
        .into_iter()
        .filter(|peak| artifact_mask.as_ref().map_or(true, |m| !m[peak.index]))
        .map(|peak| DetectedEvent {
            index: peak.index,
            time: time.get(peak.index).copied().unwrap_or(f64::NAN),
            amplitude: data[peak.index],
        })
        .collect()
}

pub(super) fn artifact_mask(data: &[f64], sampling_rate: f64, slope_threshold: f64, padding_ms: f64) -> Vec<bool> {
    let n = data.len();
    let mut mask = vec![false; n];
    let gradient: Vec<f64> = (0..n)
        .map(|i| {
            if i == 0 || i == n - 1 {
                0.0
            } else {
                ((data[i + 1] - data[i - 1]) / 2.0 * sampling_rate).abs()
            }
        })
        .collect();
    let padding_samples = (padding_ms / 1000.0 * sampling_rate).round() as usize;
    for (i, &g) in gradient.iter().enumerate() {
        if g > slope_threshold {
            let lo = i.saturating_sub(padding_samples);
            let hi = (i + padding_samples).min(n - 1);
            for slot in mask.iter_mut().take(hi + 1).skip(lo) {
                *slot = true;
            }
        }
    }
    mask
}

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "event_threshold",
        label: "Event Detection (Adaptive Threshold)",
        requires_secondary_channel: None,
        ui_params: vec![
            float_param("threshold", "Threshold (pA/mV)", 5.0),
            Param::Choice {
                name: "direction".into(),
                label: "Direction".into(),
                default: "negative".into(),
                choices: vec!["positive".into(), "negative".into()],
                visible_when: None,
                hidden: false,
            },
            float_param("refractory_period", "Refractory period (s)", 0.005),
            Param::Bool { name: "reject_artifacts".into(), label: "Reject artifacts".into(), default: false, visible_when: None, hidden: false },
            float_param("artifact_slope_threshold", "Artifact slope threshold", 50.0),
            float_param("artifact_padding_ms", "Artifact padding (ms)", 2.0),
        ],
        plots: vec![
            PlotHint::Trace { label: "Current".into() },
            PlotHint::VLines { key: "event_times".into(), label: "Events".into() },
        ],
        clamp_mode: Some(ClampMode::VoltageClamp),
        func: run,
        multi_trial: None,
    }
}

fn float_param(name: &str, label: &str, default: f64) -> Param {
    Param::Float { name: name.to_string(), label: label.to_string(), default, min: None, max: None, decimals: Some(4), visible_when: None, hidden: false }
}

fn run(input: &AnalysisInput) -> DispatchOutcome {
    let mut results = ResultMap::new();
    let p = params_from(input.params);
    let events = detect(input.data, input.time, input.sampling_rate, &p);

    let duration = input.time.last().copied().unwrap_or(0.0) - input.time.first().copied().unwrap_or(0.0);
    let frequency_hz = if duration > 0.0 { events.len() as f64 / duration } else { f64::NAN };

    let amplitudes: Vec<f64> = events.iter().map(|e| e.amplitude).collect();
    let mean_amplitude = if amplitudes.is_empty() { f64::NAN } else { amplitudes.iter().sum::<f64>() / amplitudes.len() as f64 };
    let amplitude_sd = if amplitudes.len() < 2 {
        0.0
    } else {
        (amplitudes.iter().map(|v| (v - mean_amplitude).powi(2)).sum::<f64>() / amplitudes.len() as f64).sqrt()
    };

    results.set("event_count", events.len());
    results.set("frequency_hz", frequency_hz);
    results.set("mean_amplitude", mean_amplitude);
    results.set("amplitude_sd", amplitude_sd);
    results.set("event_indices", events.iter().map(|e| e.index as i64).collect::<Vec<i64>>());
    results.set("event_times", events.iter().map(|e| e.time).collect::<Vec<f64>>());
    results.set("event_amplitudes", amplitudes);
    DispatchOutcome::new(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_negative_going_events() {
        let rate = 10_000.0;
        let n = 10_000;
        let mut data = vec![0.0; n];
        let time: Vec<f64> = (0..n).map(|i| i as f64 / rate).collect();
        for &center_t in &[0.2, 0.5, 0.8] {
            let center = (center_t * rate) as usize;
            for k in 0..20 {
                if center + k < n {
                    data[center + k] -= 10.0 * (-(k as f64) / 5.0).exp();
                }
            }
        }
        let params = EventThresholdParams {
            threshold: 3.0,
            direction: Direction::Negative,
            refractory_period: 0.01,
            reject_artifacts: false,
            artifact_slope_threshold: 50.0,
            artifact_padding_ms: 2.0,
        };
        let events = detect(&data, &time, rate, &params);
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn flat_trace_has_no_events() {
        let data = vec![0.0; 1000];
        let time: Vec<f64> = (0..1000).map(|i| i as f64 / 1000.0).collect();
        let params = EventThresholdParams {
            threshold: 3.0,
            direction: Direction::Negative,
            refractory_period: 0.005,
            reject_artifacts: false,
            artifact_slope_threshold: 50.0,
            artifact_padding_ms: 2.0,
        };
        assert!(detect(&data, &time, 1000.0, &params).is_empty());
    }
}
