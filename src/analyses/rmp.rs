//! Resting membrane potential (baseline) analysis.

use crate::kernels::{linear_regression, std_dev};
use crate::registry::{
    AnalysisDescriptor, AnalysisInput, ClampMode, DispatchOutcome, Param, PlotHint, ResultMap,
};

use super::common::{mean, window_indices};

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "rmp",
        label: "Resting Membrane Potential",
        requires_secondary_channel: None,
        ui_params: vec![
            Param::Float {
                name: "baseline_start".into(),
                label: "Baseline start (s)".into(),
                default: 0.0,
                min: Some(0.0),
                max: None,
                decimals: Some(4),
                visible_when: None,
                hidden: false,
            },
            Param::Float {
                name: "baseline_end".into(),
                label: "Baseline end (s)".into(),
                default: 0.5,
                min: Some(0.0),
                max: None,
                decimals: Some(4),
                visible_when: None,
                hidden: false,
            },
            Param::Bool {
                name: "auto_detect".into(),
                label: "Auto-detect quiet window".into(),
                default: false,
                visible_when: None,
                hidden: false,
            },
            Param::Float {
                name: "window_duration".into(),
                label: "Auto window duration (s)".into(),
                default: 0.2,
                min: Some(0.001),
                max: None,
                decimals: Some(4),
                visible_when: Some(("auto_detect".into(), crate::registry::ParamValue::Bool(true))),
                hidden: false,
            },
            Param::Float {
                name: "step_duration".into(),
                label: "Auto window step (s)".into(),
                default: 0.05,
                min: Some(0.001),
                max: None,
                decimals: Some(4),
                visible_when: Some(("auto_detect".into(), crate::registry::ParamValue::Bool(true))),
                hidden: false,
            },
        ],
        plots: vec![PlotHint::Trace { label: "Voltage".into() }],
        clamp_mode: Some(ClampMode::CurrentClamp),
        func: run,
        multi_trial: None,
    }
}

fn run(input: &AnalysisInput) -> DispatchOutcome {
    let mut results = ResultMap::new();
    let AnalysisInput { data, time, params, .. } = input;

    let auto_detect = params.get_bool_or("auto_detect", false);
    let window = if auto_detect {
        let window_duration = params.get_f64_or("window_duration", 0.2);
        let step_duration = params.get_f64_or("step_duration", 0.05);
        find_quietest_window(data, time, window_duration, step_duration)
    } else {
        let start = params.get_f64_or("baseline_start", 0.0);
        let end = params.get_f64_or("baseline_end", 0.5);
        window_indices(time, start, end)
    };

    let Some((start, end)) = window else {
        results.set_error("rmp", "baseline window outside trace or start >= end");
        return DispatchOutcome::new(results);
    };
    let slice = &data[start..=end];
    if slice.is_empty() {
        results.set_error("rmp", "baseline window contains no samples");
        return DispatchOutcome::new(results);
    }

    let rmp_mv = mean(slice);
    let rmp_std = std_dev(slice);
    let t_slice = &time[start..=end];
    let drift = linear_regression(t_slice, slice).map(|fit| fit.slope).unwrap_or(f64::NAN);

    results.set("rmp_mv", rmp_mv);
    results.set("rmp_std", rmp_std);
    results.set("rmp_drift", drift);
    results.set("rmp_duration", t_slice.last().unwrap() - t_slice.first().unwrap());
    DispatchOutcome::new(results)
}

/// Slides a window across the trace and returns the index range of the
/// lowest-variance window.
fn find_quietest_window(
    data: &[f64],
    time: &[f64],
    window_duration: f64,
    step_duration: f64,
) -> Option<(usize, usize)> {
    if time.len() < 2 {
        return None;
    }
    let total_duration = time.last()? - time.first()?;
    if window_duration <= 0.0 || window_duration > total_duration {
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
