//! Baseline-peak event detection: a stable baseline (auto-detected via
//! variance minimization, or a supplied window) sets a fixed threshold in
//! SD units above/below it; optional lowpass pre-filter before peak search.

use crate::kernels::{find_peaks, std_dev, PeakParams};
use crate::pipeline::filter;
use crate::registry::{AnalysisDescriptor, AnalysisInput, ClampMode, DispatchOutcome, Param, ParamMap, PlotHint, ResultMap};

use super::common::{mean, window_indices};
use super::event_threshold::Direction;

pub struct BaselinePeakParams {
    pub direction: Direction,
    pub auto_baseline: bool,
    pub baseline_window_start: f64,
    pub baseline_window_end: f64,
    pub baseline_step: f64,
    pub threshold_sd_factor: f64,
    pub min_event_separation_ms: f64,
    pub lowpass_cutoff_hz: Option<f64>,
}

pub(super) fn params_from(params: &ParamMap) -> BaselinePeakParams {
    BaselinePeakParams {
        direction: if params.get_str_or("direction", "negative") == "positive" { Direction::Positive } else { Direction::Negative },
        auto_baseline: params.get_bool_or("auto_baseline", true),
        baseline_window_start: params.get_f64_or("baseline_window_start", 0.0),
        baseline_window_end: params.get_f64_or("baseline_window_end", 0.2),
        baseline_step: params.get_f64_or("baseline_step", 0.05),
        threshold_sd_factor: params.get_f64_or("threshold_sd_factor", 4.0),
        min_event_separation_ms: params.get_f64_or("min_event_separation_ms", 5.0),
        lowpass_cutoff_hz: {
            let c = params.get_f64_or("lowpass_cutoff_hz", 0.0);
            (c > 0.0).then_some(c)
        },
    }
}

/// Slides a window across `data` and returns the index range with the
/// lowest variance (the same technique `rmp`'s `auto_detect` uses).
fn find_quietest_window(data: &[f64], time: &[f64], window_duration: f64, step_duration: f64) -> Option<(usize, usize)> {
    if time.len() < 2 || window_duration <= 0.0 {
        return None;
    }
    let total_duration = time.last()? - time.first()?;
    if window_duration > total_duration {
        return None;
    }
    let mut t = *time.first()?;
    let mut best: Option<(usize, usize, f64)> = None;
    while t + window_duration <= *time.last()? {
        if let Some((s, e)) = window_indices(time, t, t + window_duration) {
            let variance = std_dev(&data[s..=e]).powi(2);
            if best.map_or(true, |(_, _, v)| variance < v) {
                best = Some((s, e, variance));
            }
        }
        t += step_duration;
    }
    best.map(|(s, e, _)| (s, e))
}

pub struct BaselinePeakResult {
    pub event_indices: Vec<usize>,
    pub event_times: Vec<f64>,
    pub event_amplitudes: Vec<f64>,
    pub baseline_mean: f64,
    pub baseline_sd: f64,
    pub threshold_value: f64,
}

pub fn detect(data: &[f64], time: &[f64], sampling_rate: f64, p: &BaselinePeakParams) -> Option<BaselinePeakResult> {
    if data.len() < 3 || sampling_rate <= 0.0 {
        return None;
    }

    let window = if p.auto_baseline {
        find_quietest_window(data, time, p.baseline_window_end - p.baseline_window_start, p.baseline_step)
    } else {
        window_indices(time, p.baseline_window_start, p.baseline_window_end)
    };
    let (bs, be) = window?;

    let baseline_mean = mean(&data[bs..=be]);
    let baseline_sd = std_dev(&data[bs..=be]);

    let filtered;
    let working: &[f64] = if let Some(cutoff) = p.lowpass_cutoff_hz {
        match filter::lowpass(data, sampling_rate, cutoff, 4) {
            Ok(f) => {
                filtered = f;
                &filtered
            }
            Err(_) => data,
        }
    } else {
        data
    };

    let threshold_value = match p.direction {
        Direction::Positive => baseline_mean + p.threshold_sd_factor * baseline_sd,
        Direction::Negative => baseline_mean - p.threshold_sd_factor * baseline_sd,
    };

    let rectified: Vec<f64> = match p.direction {
        Direction::Positive => working.iter().map(|&v| v - baseline_mean).collect(),
        Direction::Negative => working.iter().map(|&v| baseline_mean - v).collect(),
    };
    let height = p.threshold_sd_factor * baseline_sd;
    let min_distance = (p.min_event_separation_ms / 1000.0 * sampling_rate).round().max(1.0) as usize;
    let peak_params = PeakParams { min_height: Some(height), min_prominence: None, min_distance: Some(min_distance), min_width: None };
    let peaks = find_peaks(&rectified, peak_params);

    Some(BaselinePeakResult {
        event_times: peaks.iter().map(|peak| time.get(peak.index).copied().unwrap_or(f64::NAN)).collect(),
        event_amplitudes: peaks.iter().map(|peak| data[peak.index]).collect(),
        event_indices: peaks.iter().map(|peak| peak.index).collect(),
        baseline_mean,
        baseline_sd,
        threshold_value,
    })
}

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "event_baseline_peak",
        label: "Event Detection (Baseline Peak)",
        requires_secondary_channel: None,
        ui_params: vec![
            Param::Choice {
                name: "direction".into(),
                label: "Direction".into(),
                default: "negative".into(),
                choices: vec!["positive".into(), "negative".into()],
                visible_when: None,
                hidden: false,
            },
            Param::Bool { name: "auto_baseline".into(), label: "Auto-detect baseline window".into(), default: true, visible_when: None, hidden: false },
            float_param("baseline_window_start", "Baseline start (s)", 0.0),
            float_param("baseline_window_end", "Baseline end (s)", 0.2),
            float_param("baseline_step", "Auto window step (s)", 0.05),
            float_param("threshold_sd_factor", "Threshold factor (SD)", 4.0),
            float_param("min_event_separation_ms", "Minimum event separation (ms)", 5.0),
            float_param("lowpass_cutoff_hz", "Pre-filter lowpass cutoff (Hz, 0 = off)", 0.0),
        ],
        plots: vec![
            PlotHint::Trace { label: "Signal".into() },
            PlotHint::VLines { key: "event_times".into(), label: "Events".into() },
            PlotHint::HLines { key: "threshold_value".into(), label: "Threshold".into() },
        ],
        clamp_mode: Some(ClampMode::Any),
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

    let Some(r) = detect(input.data, input.time, input.sampling_rate, &p) else {
        results.set_error("event_baseline_peak", "baseline window outside trace or too short");
        return DispatchOutcome::new(results);
    };

    results.set("event_count", r.event_indices.len());
    results.set("event_indices", r.event_indices.iter().map(|&i| i as i64).collect::<Vec<i64>>());
    results.set("event_times", r.event_times);
    results.set("event_amplitudes", r.event_amplitudes);
    results.set("baseline_mean", r.baseline_mean);
    results.set("baseline_sd", r.baseline_sd);
    results.set("threshold_value", r.threshold_value);
    DispatchOutcome::new(results)
}
