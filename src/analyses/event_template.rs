//! Template/matched-filter event detection: builds a biexponential kernel
//! from `tau_rise`/`tau_decay`, cross-correlates by FFT, Z-scores the
//! result against its own median/MAD, and finds peaks on the Z-score trace.

use crate::kernels::{cross_correlate_same, find_peaks, mad, PeakParams};
use crate::registry::{AnalysisDescriptor, AnalysisInput, ClampMode, DispatchOutcome, Param, ParamMap, PlotHint, ResultMap};

use super::event_threshold::Direction;

pub struct EventTemplateParams {
    pub tau_rise_ms: f64,
    pub tau_decay_ms: f64,
    pub threshold_sd: f64,
    pub direction: Direction,
    pub reject_artifacts: bool,
    pub artifact_slope_threshold: f64,
    pub artifact_padding_ms: f64,
}

pub struct DetectedEvent {
    pub index: usize,
    pub time: f64,
    pub amplitude: f64,
}

pub(super) fn params_from(params: &ParamMap) -> EventTemplateParams {
    EventTemplateParams {
        tau_rise_ms: params.get_f64_or("tau_rise_ms", 0.5),
        tau_decay_ms: params.get_f64_or("tau_decay_ms", 5.0),
        threshold_sd: params.get_f64_or("threshold_sd", 4.0),
        direction: if params.get_str_or("direction", "negative") == "positive" { Direction::Positive } else { Direction::Negative },
        reject_artifacts: params.get_bool_or("reject_artifacts", false),
        artifact_slope_threshold: params.get_f64_or("artifact_slope_threshold", 50.0),
        artifact_padding_ms: params.get_f64_or("artifact_padding_ms", 2.0),
    }
}

fn biexponential_kernel(tau_rise_ms: f64, tau_decay_ms: f64, sampling_rate: f64) -> Vec<f64> {
    let tau_rise_s = (tau_rise_ms / 1000.0).max(1e-6);
    let tau_decay_s = (tau_decay_ms / 1000.0).max(1e-6);
    let duration_s = 5.0 * tau_rise_s.max(tau_decay_s);
    let n = ((duration_s * sampling_rate).round() as usize).max(2);

    // The difference-of-exponentials form is identically zero when the two
    // taus coincide, so that case needs the alpha-function limit instead.
    let alpha_tau = if (tau_decay_s - tau_rise_s).abs() < 1e-9 { Some(tau_decay_s) } else { None };

    let mut kernel: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64 / sampling_rate;
            match alpha_tau {
                Some(tau) => t * (-t / tau).exp(),
                None => (-t / tau_decay_s).exp() - (-t / tau_rise_s).exp(),
            }
        })
        .collect();
    let peak = kernel.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if peak.abs() > 1e-12 {
        for v in kernel.iter_mut() {
            *v /= peak;
        }
    }
    kernel
}

pub fn detect(data: &[f64], time: &[f64], sampling_rate: f64, p: &EventTemplateParams) -> Vec<DetectedEvent> {
    if data.len() < 3 || sampling_rate <= 0.0 {
        return Vec::new();
    }

    let rectified: Vec<f64> = match p.direction {
        Direction::Positive => data.to_vec(),
        Direction::Negative => data.iter().map(|&v| -v).collect(),
    };

    let kernel = biexponential_kernel(p.tau_rise_ms, p.tau_decay_ms, sampling_rate);
    let correlation = cross_correlate_same(&rectified, &kernel);

    let mut sorted = correlation.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = if sorted.is_empty() {
        0.0
    } else if sorted.len() % 2 == 0 {
        (sorted[sorted.len() / 2 - 1] + sorted[sorted.len() / 2]) / 2.0
    } else {
        sorted[sorted.len() / 2]
    };
    let noise_sd = mad(&correlation);

    let z_score: Vec<f64> = if noise_sd.abs() > 1e-12 {
        correlation.iter().map(|&v| (v - median) / noise_sd).collect()
    } else {
        vec![0.0; correlation.len()]
    };

    let min_distance = ((p.tau_decay_ms / 1000.0) * sampling_rate).round().max(1.0) as usize;
    let peak_params = PeakParams { min_height: Some(p.threshold_sd), min_prominence: None, min_distance: Some(min_distance), min_width: None };
    let peaks = find_peaks(&z_score, peak_params);

    let artifact_mask = p
        .reject_artifacts
        .then(|| super::event_threshold::artifact_mask(data, sampling_rate, p.artifact_slope_threshold, p.artifact_padding_ms));

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

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "event_template",
        label: "Event Detection (Template Match)",
        requires_secondary_channel: None,
        ui_params: vec![
            float_param("tau_rise_ms", "Rise tau (ms)", 0.5),
            float_param("tau_decay_ms", "Decay tau (ms)", 5.0),
            float_param("threshold_sd", "Threshold (SD)", 4.0),
            Param::Choice {
                name: "direction".into(),
                label: "Direction".into(),
                default: "negative".into(),
                choices: vec!["positive".into(), "negative".into()],
                visible_when: None,
                hidden: false,
            },
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

    results.set("event_count", events.len());
    results.set("tau_rise_ms", p.tau_rise_ms);
    results.set("tau_decay_ms", p.tau_decay_ms);
    results.set("threshold_sd", p.threshold_sd);
    results.set("event_indices", events.iter().map(|e| e.index as i64).collect::<Vec<i64>>());
    results.set("event_times", events.iter().map(|e| e.time).collect::<Vec<f64>>());
    results.set("event_amplitudes", events.iter().map(|e| e.amplitude).collect::<Vec<f64>>());
    DispatchOutcome::new(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_epsc_like_events() {
        let rate = 10_000.0;
        let n = 20_000;
        let mut data = vec![0.0; n];
        let time: Vec<f64> = (0..n).map(|i| i as f64 / rate).collect();
        for &center_t in &[0.3, 0.9, 1.5] {
            let center = (center_t * rate) as usize;
            for k in 0..200 {
                if center + k < n {
                    let t = k as f64 / rate;
                    data[center + k] -= 20.0 * ((-t / 0.005).exp() - (-t / 0.0005).exp());
                }
            }
        }
        let params = EventTemplateParams {
            tau_rise_ms: 0.5,
            tau_decay_ms: 5.0,
            threshold_sd: 3.0,
            direction: Direction::Negative,
            reject_artifacts: false,
            artifact_slope_threshold: 50.0,
            artifact_padding_ms: 2.0,
        };
        let events = detect(&data, &time, rate, &params);
        assert!(events.len() >= 2);
    }

    #[test]
    fn equal_rise_and_decay_tau_still_detects_events() {
        let rate = 10_000.0;
        let n = 20_000;
        let mut data = vec![0.0; n];
        let time: Vec<f64> = (0..n).map(|i| i as f64 / rate).collect();
        for &center_t in &[0.3, 0.9, 1.5] {
            let center = (center_t * rate) as usize;
            for k in 0..200 {
                if center + k < n {
                    let t = k as f64 / rate;
                    data[center + k] -= 20.0 * (t / 0.002) * (-t / 0.002).exp();
                }
            }
        }
        let params = EventTemplateParams {
            tau_rise_ms: 2.0,
            tau_decay_ms: 2.0,
            threshold_sd: 3.0,
            direction: Direction::Negative,
            reject_artifacts: false,
            artifact_slope_threshold: 50.0,
            artifact_padding_ms: 2.0,
        };
        let kernel = biexponential_kernel(params.tau_rise_ms, params.tau_decay_ms, rate);
        assert!(kernel.iter().any(|&v| v.abs() > 1e-9));

        let events = detect(&data, &time, rate, &params);
        assert!(events.len() >= 2);
    }
}
