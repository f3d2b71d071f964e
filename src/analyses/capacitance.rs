//! Whole-cell capacitance, current-clamp (from tau and Rin) or
//! voltage-clamp (from the transient charge divided by the command step).

use crate::registry::{AnalysisDescriptor, AnalysisInput, ClampMode, DispatchOutcome, Param, PlotHint, ResultMap};

use super::common::{mean, trapezoidal, window_indices};

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "capacitance",
        label: "Membrane Capacitance",
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
            float_param("tau_ms", "Tau (ms, current-clamp)", 10.0),
            float_param("rin_mohm", "Input resistance (MOhm, current-clamp)", 200.0),
            float_param("baseline_start", "Baseline start (s)", 0.0),
            float_param("baseline_end", "Baseline end (s)", 0.15),
            float_param("transient_start", "Transient integration start (s)", 0.2),
            float_param("transient_end", "Transient integration end (s)", 0.25),
            float_param("voltage_step_mv", "Command voltage step (mV, voltage-clamp)", -10.0),
        ],
        plots: vec![PlotHint::Trace { label: "Current".into() }],
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
    let AnalysisInput { data, time, params, .. } = input;

    let mode = params.get_str_or("mode", "current_clamp");

    if mode == "voltage_clamp" {
        let baseline_start = params.get_f64_or("baseline_start", 0.0);
        let baseline_end = params.get_f64_or("baseline_end", 0.15);
        let transient_start = params.get_f64_or("transient_start", 0.2);
        let transient_end = params.get_f64_or("transient_end", 0.25);
        let voltage_step_mv = params.get_f64_or("voltage_step_mv", -10.0);

        let Some((bs, be)) = window_indices(time, baseline_start, baseline_end) else {
            results.set_error("capacitance", "baseline window outside trace");
            return DispatchOutcome::new(results);
        };
        let Some((ts, te)) = window_indices(time, transient_start, transient_end) else {
            results.set_error("capacitance", "transient window outside trace");
            return DispatchOutcome::new(results);
        };
        if voltage_step_mv.abs() < 1e-9 {
            results.set_error("capacitance", "voltage step is indistinguishable from zero");
            return DispatchOutcome::new(results);
        }

        let baseline_pa = mean(&data[bs..=be]);
        let dt = time.get(ts + 1).map_or(0.0, |t| t - time[ts]);
        let transient: Vec<f64> = data[ts..=te].iter().map(|v| v - baseline_pa).collect();
        // Charge in pA*s == pC; C[pF] = Q[pC] / V[mV] * 1000.
        let charge_pc = trapezoidal(&transient, dt);
        let capacitance_pf = (charge_pc / voltage_step_mv).abs() * 1000.0;

        results.set("capacitance_pf", capacitance_pf);
        results.set("transient_charge_pc", charge_pc);
    } else {
        let tau_ms = params.get_f64_or("tau_ms", 10.0);
        let rin_mohm = params.get_f64_or("rin_mohm", 200.0);
        if rin_mohm.abs() < 1e-9 {
            results.set_error("capacitance", "input resistance is indistinguishable from zero");
            return DispatchOutcome::new(results);
        }
        // C[pF] = tau[ms] / Rin[MOhm].
        let capacitance_pf = tau_ms / rin_mohm;
        results.set("capacitance_pf", capacitance_pf);
    }

    DispatchOutcome::new(results)
}
