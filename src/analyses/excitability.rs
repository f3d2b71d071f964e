//! Excitability (F-I curve): firing rate as a function of injected current
//! across a family of current-step trials, plus rheobase and per-sweep
//! spike-frequency adaptation. Needs every trial at once, like `iv_curve`.

use crate::kernels::linear_regression;
use crate::registry::{
    AnalysisDescriptor, AnalysisInput, ClampMode, DispatchOutcome, Param, ParamMap, PlotHint, ResultMap,
};

use super::spike_detect::{detect_spikes, SpikeDetectParams};

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "excitability",
        label: "F-I Curve",
        requires_secondary_channel: None,
        ui_params: vec![
            float_param("threshold", "Threshold (mV)", -20.0),
            float_param("refractory_period", "Refractory period (s)", 0.002),
            float_param("stim_start", "Stimulus start (s)", 0.1),
            float_param("stim_end", "Stimulus end (s)", 0.6),
            float_param("first_step_pa", "First trial's current step (pA)", 0.0),
            float_param("step_increment_pa", "Current step increment per trial (pA)", 20.0),
        ],
        plots: vec![PlotHint::Scatter {
            x_key: "current_steps_pa".into(),
            y_key: "firing_rates_hz".into(),
            label: "F-I".into(),
        }],
        clamp_mode: Some(ClampMode::CurrentClamp),
        func: unreachable_single_trace,
        multi_trial: Some(run),
    }
}

fn float_param(name: &str, label: &str, default: f64) -> Param {
    Param::Float { name: name.to_string(), label: label.to_string(), default, min: None, max: None, decimals: Some(4), visible_when: None, hidden: false }
}

fn unreachable_single_trace(_input: &AnalysisInput) -> DispatchOutcome {
    let mut results = ResultMap::new();
    results.set_error("excitability", "this analysis requires all trials and must be run through run_multi_trial");
    DispatchOutcome::new(results)
}

fn run(trials: &[Vec<f64>], time: &[f64], sampling_rate: f64, params: &ParamMap) -> DispatchOutcome {
    let mut results = ResultMap::new();

    let stim_start = params.get_f64_or("stim_start", 0.1);
    let stim_end = params.get_f64_or("stim_end", 0.6);
    let stim_duration = stim_end - stim_start;
    if stim_duration <= 0.0 {
        results.set_error("excitability", "stim_end must be after stim_start");
        return DispatchOutcome::new(results);
    }
    let first_step_pa = params.get_f64_or("first_step_pa", 0.0);
    let step_increment_pa = params.get_f64_or("step_increment_pa", 20.0);

    let spike_params = SpikeDetectParams {
        threshold: params.get_f64_or("threshold", -20.0),
        refractory_period: params.get_f64_or("refractory_period", 0.002),
        peak_search_window: 0.002,
        dvdt_threshold_v_per_s: 10.0,
        ahp_window: 0.05,
        onset_lookback: 0.003,
    };

    if trials.is_empty() {
        results.set_error("excitability", "no trials available");
        return DispatchOutcome::new(results);
    }

    let mut current_steps = Vec::with_capacity(trials.len());
    let mut firing_rates = Vec::with_capacity(trials.len());
    let mut adaptation_ratios = Vec::with_capacity(trials.len());
    let mut rheobase_pa: Option<f64> = None;

    for (n, trial) in trials.iter().enumerate() {
        let current_pa = first_step_pa + n as f64 * step_increment_pa;
        let spikes = detect_spikes(trial, time, sampling_rate, &spike_params);
        let in_window: Vec<f64> = spikes
            .iter()
            .map(|s| s.peak_time)
            .filter(|&t| t >= stim_start && t <= stim_end)
            .collect();

        let rate_hz = in_window.len() as f64 / stim_duration;
        current_steps.push(current_pa);
        firing_rates.push(rate_hz);

        if !in_window.is_empty() && rheobase_pa.is_none() {
            rheobase_pa = Some(current_pa);
        }

        let adaptation = if in_window.len() >= 3 {
            let first_isi = in_window[1] - in_window[0];
            let last_isi = in_window[in_window.len() - 1] - in_window[in_window.len() - 2];
            if first_isi.abs() > 1e-12 { last_isi / first_isi } else { f64::NAN }
        } else {
            f64::NAN
        };
        adaptation_ratios.push(adaptation);
    }

    let fit = linear_regression(&current_steps, &firing_rates);
    let (fi_slope, fi_r_squared) = match fit {
        Some(f) => (f.slope, f.r_squared),
        None => (f64::NAN, f64::NAN),
    };

    results.set("rheobase_pa", rheobase_pa.unwrap_or(f64::NAN));
    results.set("fi_slope_hz_per_pa", fi_slope);
    results.set("fi_r_squared", fi_r_squared);
    results.set("current_steps_pa", current_steps);
    results.set("firing_rates_hz", firing_rates);
    results.set("adaptation_ratios", adaptation_ratios);
    DispatchOutcome::new(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spike_train_trace(times: &[f64], rate: f64, n: usize) -> Vec<f64> {
        let mut data = vec![-70.0; n];
        for &t in times {
            let center = (t * rate) as usize;
            let half_width = (0.0005 * rate) as usize;
            for k in 0..=half_width {
                let frac = k as f64 / half_width as f64;
                let v = -70.0 + frac * 100.0;
                if center >= k {
                    data[center - k] = v;
                }
                if center + k < n {
                    data[center + k] = v;
                }
            }
        }
        data
    }

    #[test]
    fn firing_rate_increases_with_current() {
        let rate = 20_000.0;
        let n = (1.0 * rate) as usize;
        let time: Vec<f64> = (0..n).map(|i| i as f64 / rate).collect();

        let quiet = vec![-70.0; n];
        let few_spikes = spike_train_trace(&[0.2, 0.4], rate, n);
        let many_spikes = spike_train_trace(&[0.15, 0.25, 0.35, 0.45, 0.55], rate, n);
        let trials = vec![quiet, few_spikes, many_spikes];

        let mut params = ParamMap::new();
        params
            .insert("threshold", -20.0)
            .insert("stim_start", 0.1)
            .insert("stim_end", 0.6)
            .insert("first_step_pa", 0.0)
            .insert("step_increment_pa", 50.0);
        let outcome = run(&trials, &time, rate, &params);
        let rates = outcome.results.get("firing_rates_hz").unwrap();
        if let crate::registry::Value::FloatArray(rates) = rates {
            assert!(rates[0] < rates[1]);
            assert!(rates[1] < rates[2]);
        } else {
            panic!("expected FloatArray");
        }
    }
}
