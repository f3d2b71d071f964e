//! Membrane time constant (tau), fit from a mono- or bi-exponential decay
//! following a current step.

use crate::kernels::{fit_bi_exponential, fit_mono_exponential, FitOutcome};
use crate::registry::{AnalysisDescriptor, AnalysisInput, ClampMode, DispatchOutcome, Param, PlotHint, ResultMap};

use super::common::window_indices;

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "tau",
        label: "Membrane Time Constant",
        requires_secondary_channel: None,
        ui_params: vec![
            float_param("stim_start_time", "Stimulus onset (s)", 0.2),
            float_param("fit_duration", "Fit window duration (s)", 0.1),
            Param::Choice {
                name: "tau_model".into(),
                label: "Model".into(),
                default: "mono".into(),
                choices: vec!["mono".into(), "bi".into()],
                visible_when: None,
                hidden: false,
            },
            float_param("artifact_blanking", "Artifact blanking (ms)", 0.0),
            float_param("tau_bound_min_ms", "Tau lower bound (ms)", 0.1),
            float_param("tau_bound_max_ms", "Tau upper bound (ms)", 5000.0),
        ],
        plots: vec![PlotHint::Trace { label: "Fitted decay".into() }],
        clamp_mode: Some(ClampMode::CurrentClamp),
        func: run,
        multi_trial: None,
    }
}

fn float_param(name: &str, label: &str, default: f64) -> Param {
    Param::Float { name: name.to_string(), label: label.to_string(), default, min: None, max: None, decimals: Some(4), visible_when: None, hidden: false }
}

fn run(input: &AnalysisInput) -> DispatchOutcome {
    let mut results = ResultMap::new();
    let AnalysisInput { data, time, params, .. } = input;

    let stim_start = params.get_f64_or("stim_start_time", 0.2);
    let fit_duration = params.get_f64_or("fit_duration", 0.1);
    let artifact_blanking_s = params.get_f64_or("artifact_blanking", 0.0) / 1000.0;
    let fit_start = stim_start + artifact_blanking_s;
    let fit_end = stim_start + fit_duration;

    let Some((s, e)) = window_indices(time, fit_start, fit_end) else {
        results.set_error("tau", "fit window outside trace");
        return DispatchOutcome::new(results);
    };

    let t0 = time[s];
    let t_rel: Vec<f64> = time[s..=e].iter().map(|&t| t - t0).collect();
    let y = &data[s..=e];

    let tau_min_s = params.get_f64_or("tau_bound_min_ms", 0.1) / 1000.0;
    let tau_max_s = params.get_f64_or("tau_bound_max_ms", 5000.0) / 1000.0;
    let tau_model = params.get_str_or("tau_model", "mono");

    if tau_model == "bi" {
        match fit_bi_exponential(&t_rel, y, (tau_min_s, tau_min_s.max(tau_max_s / 10.0)), (tau_max_s / 10.0, tau_max_s)) {
            Some((fit, outcome)) if outcome != FitOutcome::NumericalFailure => {
                results.set("tau_fast_ms", fit.tau_fast * 1000.0);
                results.set("tau_slow_ms", fit.tau_slow * 1000.0);
                results.set("amplitude_fast_mv", fit.amplitude_fast);
                results.set("amplitude_slow_mv", fit.amplitude_slow);
                results.set("offset_mv", fit.offset);
                results.set("fit_r_squared", fit.r_squared);
                results.set("fitted_curve", t_rel.iter().map(|&ti| fit.amplitude_fast * (-ti / fit.tau_fast).exp() + fit.amplitude_slow * (-ti / fit.tau_slow).exp() + fit.offset).collect::<Vec<f64>>());
            }
            _ => {
                results.set_error("tau", "fit failed");
            }
        }
    } else {
        match fit_mono_exponential(&t_rel, y, (tau_min_s, tau_max_s)) {
            Some((fit, outcome)) if outcome != FitOutcome::NumericalFailure => {
                results.set("tau_ms", fit.tau * 1000.0);
                results.set("amplitude_mv", fit.amplitude);
                results.set("offset_mv", fit.offset);
                results.set("fit_r_squared", fit.r_squared);
                results.set("fitted_curve", t_rel.iter().map(|&ti| fit.amplitude * (-ti / fit.tau).exp() + fit.offset).collect::<Vec<f64>>());
            }
            _ => {
                results.set_error("tau", "fit failed");
            }
        }
    }

    DispatchOutcome::new(results)
}
