//! Phase-plane analysis: dV/dt vs V, with a per-spike threshold (first
//! phase-space crossing of `spike_threshold`) and "kink" (the last
//! pre-peak sample whose dV/dt crosses `kink_slope`, searched backward
//! from the peak within `search_window_ms`).

use crate::registry::{AnalysisDescriptor, AnalysisInput, ClampMode, DispatchOutcome, Param, PlotHint, ResultMap};

use super::common::derivative;
use super::spike_detect::{detect_spikes, SpikeDetectParams};

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "phase_plane",
        label: "Phase Plane",
        requires_secondary_channel: None,
        ui_params: vec![
            float_param("sigma_ms", "Smoothing sigma (ms)", 0.1),
            float_param("dvdt_threshold", "dV/dt onset threshold (V/s)", 10.0),
            float_param("spike_threshold", "Spike threshold (mV)", -20.0),
            float_param("kink_slope", "Kink slope (V/s)", 5.0),
            float_param("search_window_ms", "Pre-peak search window (ms)", 3.0),
        ],
        plots: vec![PlotHint::Scatter { x_key: "voltage_mv".into(), y_key: "dvdt_v_per_s".into(), label: "Phase plane".into() }],
        clamp_mode: Some(ClampMode::CurrentClamp),
        func: run,
        multi_trial: None,
    }
}

fn float_param(name: &str, label: &str, default: f64) -> Param {
    Param::Float { name: name.to_string(), label: label.to_string(), default, min: None, max: None, decimals: Some(4), visible_when: None, hidden: false }
}

/// Discrete Gaussian smoothing with sigma expressed in samples. The kernel
/// spans +/-3 sigma and is renormalized at the edges to conserve area.
fn gaussian_smooth(y: &[f64], sigma_samples: f64) -> Vec<f64> {
    if sigma_samples <= 0.0 || y.len() < 2 {
        return y.to_vec();
    }
    let radius = (3.0 * sigma_samples).ceil() as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|k| (-((k * k) as f64) / (2.0 * sigma_samples * sigma_samples)).exp())
        .collect();

    let n = y.len() as isize;
    (0..y.len())
        .map(|i| {
            let i = i as isize;
            let mut acc = 0.0;
            let mut norm = 0.0;
            for (offset, &w) in weights.iter().enumerate() {
                let k = offset as isize - radius;
                let j = i + k;
                if j >= 0 && j < n {
                    acc += w * y[j as usize];
                    norm += w;
                }
            }
            if norm > 0.0 { acc / norm } else { y[i as usize] }
        })
        .collect()
}

fn run(input: &AnalysisInput) -> DispatchOutcome {
    let mut results = ResultMap::new();
    let AnalysisInput { data, time, sampling_rate, params, .. } = input;

    let sigma_ms = params.get_f64_or("sigma_ms", 0.1);
    let dvdt_threshold_v_per_s = params.get_f64_or("dvdt_threshold", 10.0);
    let spike_threshold = params.get_f64_or("spike_threshold", -20.0);
    let kink_slope_v_per_s = params.get_f64_or("kink_slope", 5.0);
    let search_window_ms = params.get_f64_or("search_window_ms", 3.0);

    let sigma_samples = sigma_ms / 1000.0 * sampling_rate;
    let smoothed = gaussian_smooth(data, sigma_samples);
    let dvdt = derivative(&smoothed, *sampling_rate);

    let spike_params = SpikeDetectParams {
        threshold: spike_threshold,
        refractory_period: 0.002,
        peak_search_window: 0.002,
        dvdt_threshold_v_per_s,
        ahp_window: 0.01,
        onset_lookback: 0.003,
    };
    let spikes = detect_spikes(data, time, *sampling_rate, &spike_params);

    let search_window_samples = (search_window_ms / 1000.0 * sampling_rate).round().max(1.0) as usize;
    let kink_slope_mv_per_s = kink_slope_v_per_s * 1000.0;

    let mut per_spike_thresholds = Vec::with_capacity(spikes.len());
    let mut per_spike_max_dvdt = Vec::with_capacity(spikes.len());
    let mut per_spike_kink_mv = Vec::with_capacity(spikes.len());

    for s in &spikes {
        per_spike_thresholds.push(data[s.onset_index]);
        let win_start = s.peak_index.saturating_sub(search_window_samples);
        let max_dvdt = dvdt[win_start..=s.peak_index].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        per_spike_max_dvdt.push(max_dvdt);

        let kink_index = (win_start..s.peak_index).rev().find(|&i| dvdt[i] >= kink_slope_mv_per_s);
        per_spike_kink_mv.push(kink_index.map(|i| data[i]).unwrap_or(f64::NAN));
    }

    results.set("spike_count", spikes.len());
    results.set("voltage_mv", data.to_vec());
    results.set("dvdt_v_per_s", dvdt.iter().map(|v| v / 1000.0).collect::<Vec<f64>>());
    results.set("per_spike_threshold_mv", per_spike_thresholds);
    results.set("per_spike_max_dvdt_v_per_s", per_spike_max_dvdt.iter().map(|v| v / 1000.0).collect::<Vec<f64>>());
    results.set("per_spike_kink_mv", per_spike_kink_mv);
    DispatchOutcome::new(results)
}
