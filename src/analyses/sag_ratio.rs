//! Sag ratio: quantifies the transient hyperpolarization overshoot (Ih
//! sag) during a hyperpolarizing current step, sharing the baseline and
//! response windows used by `input_resistance` and `tau`.

use crate::registry::{AnalysisDescriptor, AnalysisInput, ClampMode, DispatchOutcome, Param, PlotHint, ResultMap};

use super::common::{mean, window_indices};

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "sag_ratio",
        label: "Sag Ratio",
        requires_secondary_channel: None,
        ui_params: vec![
            float_param("baseline_start", "Baseline start (s)", 0.0),
            float_param("baseline_end", "Baseline end (s)", 0.15),
            float_param("peak_start", "Peak search start (s)", 0.2),
            float_param("peak_end", "Peak search end (s)", 0.25),
            float_param("steady_state_start", "Steady-state start (s)", 0.5),
            float_param("steady_state_end", "Steady-state end (s)", 0.7),
        ],
        plots: vec![PlotHint::Trace { label: "Voltage".into() }],
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

    let baseline_start = params.get_f64_or("baseline_start", 0.0);
    let baseline_end = params.get_f64_or("baseline_end", 0.15);
    let peak_start = params.get_f64_or("peak_start", 0.2);
    let peak_end = params.get_f64_or("peak_end", 0.25);
    let ss_start = params.get_f64_or("steady_state_start", 0.5);
    let ss_end = params.get_f64_or("steady_state_end", 0.7);

    let (Some((bs, be)), Some((ps, pe)), Some((ss, se))) = (
        window_indices(time, baseline_start, baseline_end),
        window_indices(time, peak_start, peak_end),
        window_indices(time, ss_start, ss_end),
    ) else {
        results.set_error("sag_ratio", "one of the baseline/peak/steady-state windows lies outside the trace");
        return DispatchOutcome::new(results);
    };

    let baseline_v = mean(&data[bs..=be]);
    let steady_state_v = mean(&data[ss..=se]);

    // The sag peak is the most negative excursion during the
    // hyperpolarizing step, i.e. the minimum over the peak window.
    let peak_v = data[ps..=pe].iter().cloned().fold(f64::INFINITY, f64::min);

    let peak_deflection = peak_v - baseline_v;
    let ss_deflection = steady_state_v - baseline_v;

    if ss_deflection.abs() < 1e-9 {
        results.set_error("sag_ratio", "steady-state deflection is indistinguishable from zero");
        return DispatchOutcome::new(results);
    }

    // Ratio->=1 convention: peak deflection over steady-state deflection.
    let sag_ratio = peak_deflection / ss_deflection;

    results.set("sag_ratio", sag_ratio);
    results.set("sag_peak_mv", peak_v);
    results.set("sag_baseline_mv", baseline_v);
    results.set("sag_steady_state_mv", steady_state_v);
    DispatchOutcome::new(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ParamMap;

    #[test]
    fn recovers_known_sag_ratio() {
        let rate = 20_000.0;
        let n = (1.0 * rate) as usize;
        let time: Vec<f64> = (0..n).map(|i| i as f64 / rate).collect();
        let baseline = -70.0;
        let mut data = vec![baseline; n];
        for (i, v) in data.iter_mut().enumerate() {
            let t = i as f64 / rate;
            if (0.2..0.25).contains(&t) {
                *v = baseline - 20.0;
            } else if (0.25..0.8).contains(&t) {
                *v = baseline - 10.0;
            }
        }
        let mut params = ParamMap::new();
        params
            .insert("baseline_start", 0.0)
            .insert("baseline_end", 0.15)
            .insert("peak_start", 0.2)
            .insert("peak_end", 0.25)
            .insert("steady_state_start", 0.3)
            .insert("steady_state_end", 0.7);
        let input = AnalysisInput { data: &data, time: &time, sampling_rate: rate, params: &params, secondary: None };
        let outcome = run(&input);
        let ratio = outcome.results.get("sag_ratio").unwrap().as_f64().unwrap();
        assert!((ratio - 2.0).abs() / 2.0 < 0.05);
    }
}
