//! Threshold-based spike detection with per-spike feature extraction.

use crate::registry::{AnalysisDescriptor, AnalysisInput, ClampMode, DispatchOutcome, Param, PlotHint, ResultMap};

use super::spike_detect::{detect_spikes, mean_feature, SpikeDetectParams, SpikeFeatures};

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "spikes",
        label: "Spike Detection",
        requires_secondary_channel: None,
        ui_params: vec![
            float_param("threshold", "Threshold (mV)", -20.0),
            float_param("refractory_period", "Refractory period (s)", 0.002),
            float_param("peak_search_window", "Peak search window (s)", 0.002),
            float_param("dvdt_threshold", "dV/dt onset threshold (V/s)", 10.0),
            float_param("ahp_window", "AHP search window (s)", 0.05),
            float_param("onset_lookback", "Onset lookback (s)", 0.003),
        ],
        plots: vec![
            PlotHint::Trace { label: "Voltage".into() },
            PlotHint::VLines { key: "spike_times".into(), label: "Spikes".into() },
        ],
        clamp_mode: Some(ClampMode::CurrentClamp),
        func: run,
        multi_trial: None,
    }
}

fn float_param(name: &str, label: &str, default: f64) -> Param {
    Param::Float {
        name: name.to_string(),
        label: label.to_string(),
        default,
        min: Some(0.0),
        max: None,
        decimals: Some(4),
        visible_when: None,
        hidden: false,
    }
}

pub(super) fn params_from(input: &AnalysisInput) -> SpikeDetectParams {
    SpikeDetectParams {
        threshold: input.params.get_f64_or("threshold", -20.0),
        refractory_period: input.params.get_f64_or("refractory_period", 0.002),
        peak_search_window: input.params.get_f64_or("peak_search_window", 0.002),
        dvdt_threshold_v_per_s: input.params.get_f64_or("dvdt_threshold", 10.0),
        ahp_window: input.params.get_f64_or("ahp_window", 0.05),
        onset_lookback: input.params.get_f64_or("onset_lookback", 0.003),
    }
}

fn run(input: &AnalysisInput) -> DispatchOutcome {
    let mut results = ResultMap::new();
    let p = params_from(input);
    let spikes = detect_spikes(input.data, input.time, input.sampling_rate, &p);

    results.set("spike_count", spikes.len());
    let spike_times: Vec<f64> = spikes.iter().map(|s| s.peak_time).collect();
    let spike_indices: Vec<i64> = spikes.iter().map(|s| s.peak_index as i64).collect();

    let duration = input.time.last().copied().unwrap_or(0.0) - input.time.first().copied().unwrap_or(0.0);
    let mean_freq = if duration > 0.0 { spikes.len() as f64 / duration } else { f64::NAN };
    results.set("mean_freq_hz", mean_freq);
    results.set("spike_times", spike_times);
    results.set("spike_indices", spike_indices);

    set_feature_stats(&mut results, "amplitude", &spikes, |s| s.amplitude);
    set_feature_stats(&mut results, "half_width", &spikes, |s| s.half_width);
    set_feature_stats(&mut results, "rise_time_10_90", &spikes, |s| s.rise_time_10_90);
    set_feature_stats(&mut results, "decay_time_90_10", &spikes, |s| s.decay_time_90_10);
    set_feature_stats(&mut results, "ahp_depth", &spikes, |s| s.ahp_depth);
    set_feature_stats(&mut results, "ahp_half_duration", &spikes, |s| s.ahp_half_duration);
    set_feature_stats(&mut results, "adp_amplitude", &spikes, |s| s.adp_amplitude);
    set_feature_stats(&mut results, "max_dvdt", &spikes, |s| s.max_dvdt);
    set_feature_stats(&mut results, "min_dvdt", &spikes, |s| s.min_dvdt);

    DispatchOutcome::with_artifact(results, Box::new(spikes))
}

fn set_feature_stats<F: Fn(&SpikeFeatures) -> f64>(results: &mut ResultMap, key: &str, spikes: &[SpikeFeatures], f: F) {
    let (m, sd) = mean_feature(spikes, f);
    results.set(format!("{key}_mean"), m);
    results.set(format!("{key}_std"), sd);
}
