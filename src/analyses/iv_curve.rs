//! Current-clamp I-V curve: input resistance derived from a family of
//! rectangular current-step trials, rather than a single trial's baseline
//! and response window. Needs every trial of the channel at once, so it
//! dispatches through `registry::run_multi_trial` instead of the
//! single-trace `AnalysisFn` path.

use crate::kernels::linear_regression;
use crate::registry::{
    AnalysisDescriptor, ClampMode, DispatchOutcome, Param, ParamMap, PlotHint, ResultMap,
};

use super::common::{mean, window_indices};

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "iv_curve",
        label: "I-V Curve",
        requires_secondary_channel: None,
        ui_params: vec![
            float_param("baseline_start", "Baseline start (s)", 0.0),
            float_param("baseline_end", "Baseline end (s)", 0.15),
            float_param("response_start", "Response start (s)", 0.3),
            float_param("response_end", "Response end (s)", 0.6),
            float_param("first_step_pa", "First trial's current step (pA)", -100.0),
            float_param("step_increment_pa", "Current step increment per trial (pA)", 20.0),
        ],
        plots: vec![PlotHint::Scatter {
            x_key: "current_steps_pa".into(),
            y_key: "delta_vs_mv".into(),
            label: "I-V".into(),
        }],
        clamp_mode: Some(ClampMode::CurrentClamp),
        func: unreachable_single_trace,
        multi_trial: Some(run),
    }
}

fn float_param(name: &str, label: &str, default: f64) -> Param {
    Param::Float { name: name.to_string(), label: label.to_string(), default, min: None, max: None, decimals: Some(4), visible_when: None, hidden: false }
}

/// Never dispatched: `iv_curve` only has a multi-trial entry point. Kept
/// so `AnalysisDescriptor::func` can stay non-`Option` for every analysis.
fn unreachable_single_trace(input: &crate::registry::AnalysisInput) -> DispatchOutcome {
    let mut results = ResultMap::new();
    let _ = input;
    results.set_error("iv_curve", "this analysis requires all trials and must be run through run_multi_trial");
    DispatchOutcome::new(results)
}

fn run(trials: &[Vec<f64>], time: &[f64], _sampling_rate: f64, params: &ParamMap) -> DispatchOutcome {
    let mut results = ResultMap::new();

    let baseline_start = params.get_f64_or("baseline_start", 0.0);
    let baseline_end = params.get_f64_or("baseline_end", 0.15);
    let response_start = params.get_f64_or("response_start", 0.3);
    let response_end = params.get_f64_or("response_end", 0.6);
    let first_step_pa = params.get_f64_or("first_step_pa", -100.0);
    let step_increment_pa = params.get_f64_or("step_increment_pa", 20.0);

    let Some((bs, be)) = window_indices(time, baseline_start, baseline_end) else {
        results.set_error("iv_curve", "baseline window outside trace");
        return DispatchOutcome::new(results);
    };
    let Some((rs, re)) = window_indices(time, response_start, response_end) else {
        results.set_error("iv_curve", "response window outside trace");
        return DispatchOutcome::new(results);
    };

    if trials.is_empty() {
        results.set_error("iv_curve", "no trials available");
        return DispatchOutcome::new(results);
    }

    let mut current_steps = Vec::with_capacity(trials.len());
    let mut delta_vs = Vec::with_capacity(trials.len());

    for (n, trial) in trials.iter().enumerate() {
        if trial.len() <= re {
            continue;
        }
        let baseline_v = mean(&trial[bs..=be]);
        let response_v = mean(&trial[rs..=re]);
        current_steps.push(first_step_pa + n as f64 * step_increment_pa);
        delta_vs.push(response_v - baseline_v);
    }

    if current_steps.len() < 2 {
        results.set_error("iv_curve", "fewer than two usable trials");
        return DispatchOutcome::new(results);
    }

    let fit = linear_regression(&current_steps, &delta_vs);
    let (rin_mohm, intercept, r_squared) = match fit {
        Some(f) => (f.slope * 1000.0, f.intercept, f.r_squared),
        None => (f64::NAN, f64::NAN, f64::NAN),
    };

    results.set("rin_aggregate_mohm", rin_mohm);
    results.set("iv_intercept_mv", intercept);
    results.set("iv_r_squared", r_squared);
    results.set("current_steps_pa", current_steps);
    results.set("delta_vs_mv", delta_vs);
    DispatchOutcome::new(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_known_resistance_across_trials() {
        let rate = 20_000.0;
        let n = (1.0 * rate) as usize;
        let time: Vec<f64> = (0..n).map(|i| i as f64 / rate).collect();
        let rin_mohm = 200.0;
        let mut trials = Vec::new();
        for k in 0..5 {
            let current_pa = -100.0 + k as f64 * 20.0;
            let delta_v_mv = current_pa / 1000.0 * rin_mohm;
            let mut trial = vec![-70.0; n];
            for (i, v) in trial.iter_mut().enumerate() {
                let t = i as f64 / rate;
                if (0.3..0.6).contains(&t) {
                    *v = -70.0 + delta_v_mv;
                }
            }
            trials.push(trial);
        }
        let mut params = ParamMap::new();
        params
            .insert("baseline_start", 0.0)
            .insert("baseline_end", 0.15)
            .insert("response_start", 0.3)
            .insert("response_end", 0.6)
            .insert("first_step_pa", -100.0)
            .insert("step_increment_pa", 20.0);
        let outcome = run(&trials, &time, rate, &params);
        let fitted = outcome.results.get("rin_aggregate_mohm").unwrap().as_f64().unwrap();
        assert!((fitted - rin_mohm).abs() / rin_mohm < 0.02);
    }

    #[test]
    fn single_trial_is_an_error() {
        let time = vec![0.0, 0.1, 0.2];
        let trials = vec![vec![-70.0, -70.0, -70.0]];
        let params = ParamMap::new();
        let outcome = run(&trials, &time, 1000.0, &params);
        assert!(outcome.results.contains_error());
    }
}
