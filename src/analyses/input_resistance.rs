//! Input resistance (Rin), current- or voltage-clamp.

use crate::registry::{AnalysisDescriptor, AnalysisInput, ClampMode, DispatchOutcome, Param, PlotHint, ResultMap};

use super::common::{mean, window_indices};

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "input_resistance",
        label: "Input Resistance",
        requires_secondary_channel: None,
        ui_params: vec![
            Param::Choice {
                name: "mode".into(),
                label: "Clamp mode".into(),
                default: "current_clamp".into(),
                choices: vec!["current_clamp".into(), "voltage_clamp".into()],
                visible_when: None,
                hidden: false,
            },
            float_param("baseline_window_start", "Baseline start (s)", 0.0),
            float_param("baseline_window_end", "Baseline end (s)", 0.2),
            float_param("response_window_start", "Response start (s)", 0.3),
            float_param("response_window_end", "Response end (s)", 0.6),
            float_param("current_amplitude", "Injected current (pA, current-clamp)", -50.0),
            float_param("voltage_step_mv", "Command voltage step (mV, voltage-clamp)", -10.0),
        ],
        plots: vec![PlotHint::Trace { label: "Voltage".into() }],
        clamp_mode: Some(ClampMode::Any),
        func: run,
        multi_trial: None,
    }
}

fn float_param(name: &str, label: &str, default: f64) -> Param {
    Param::Float {
        name: name.to_string(),
        label: label.to_string(),
        default,
        min: None,
        max: None,
        decimals: Some(4),
        visible_when: None,
        hidden: false,
    }
}

/// Shared window-delta computation used by Rin, Tau, sag ratio and
/// capacitance: mean of `data` within `[baseline_start, baseline_end]` and
/// within `[response_start, response_end]`.
pub(super) fn baseline_and_response(
    data: &[f64],
    time: &[f64],
    baseline_start: f64,
    baseline_end: f64,
    response_start: f64,
    response_end: f64,
) -> Option<(f64, f64)> {
    let (bs, be) = window_indices(time, baseline_start, baseline_end)?;
    let (rs, re) = window_indices(time, response_start, response_end)?;
    Some((mean(&data[bs..=be]), mean(&data[rs..=re])))
}

fn run(input: &AnalysisInput) -> DispatchOutcome {
    let mut results = ResultMap::new();
    let AnalysisInput { data, time, params, .. } = input;

    let baseline_start = params.get_f64_or("baseline_window_start", 0.0);
    let baseline_end = params.get_f64_or("baseline_window_end", 0.2);
    let response_start = params.get_f64_or("response_window_start", 0.3);
    let response_end = params.get_f64_or("response_window_end", 0.6);

    let Some((baseline_v, response_v)) =
        baseline_and_response(data, time, baseline_start, baseline_end, response_start, response_end)
    else {
        results.set_error("rin", "baseline or response window outside trace");
        return DispatchOutcome::new(results);
    };

    let mode = params.get_str_or("mode", "current_clamp");

    // In current-clamp, `data` is the voltage trace and the current step is
    // a known stimulus parameter; in voltage-clamp, `data` is the current
    // trace and the voltage step is the known command parameter.
    let (delta_v_mv, delta_i_na, current_injection_pa) = if mode == "voltage_clamp" {
        let voltage_step_mv = params.get_f64_or("voltage_step_mv", -10.0);
        let delta_i_pa = response_v - baseline_v;
        (voltage_step_mv, delta_i_pa / 1000.0, delta_i_pa)
    } else {
        let current_amplitude_pa = params.get_f64_or("current_amplitude", -50.0);
        (response_v - baseline_v, current_amplitude_pa / 1000.0, current_amplitude_pa)
    };

    if delta_i_na.abs() < 1e-12 {
        results.set_error("rin", "current step is indistinguishable from zero");
        return DispatchOutcome::new(results);
    }

    let rin_mohm = (delta_v_mv / delta_i_na).abs();
    let conductance_us = if rin_mohm.abs() > 1e-12 { 1000.0 / rin_mohm } else { f64::NAN };

    results.set("rin_mohm", rin_mohm);
    results.set("conductance_us", conductance_us);
    results.set("voltage_deflection_mv", delta_v_mv);
    results.set("current_injection_pa", current_injection_pa);
    results.set("baseline_voltage_mv", baseline_v);
    results.set("steady_state_voltage_mv", response_v);
    DispatchOutcome::new(results)
}
