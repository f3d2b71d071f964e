//! Optogenetic stimulus synchronization: aligns a secondary TTL channel's
//! rising edges with events detected on the primary channel, via one of
//! three sub-methods (spikes / adaptive threshold / template match).

use crate::registry::{
    AnalysisDescriptor, AnalysisInput, ClampMode, DispatchOutcome, Param, PlotHint, ResultMap,
    SecondaryChannelRequirement,
};

use super::event_template;
use super::event_threshold;
use super::spike_detect::{detect_spikes, SpikeDetectParams};

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "optogenetics",
        label: "Optogenetic Synchronization",
        requires_secondary_channel: Some(SecondaryChannelRequirement {
            param_name: "ttl_channel".to_string(),
            label: "TTL channel".to_string(),
        }),
        ui_params: vec![
            float_param("ttl_threshold", "TTL threshold (V)", 2.5),
            float_param("response_window_ms", "Response window (ms)", 50.0),
            Param::Choice {
                name: "event_mode".into(),
                label: "Event detection mode".into(),
                default: "spikes".into(),
                choices: vec!["spikes".into(), "event_threshold".into(), "event_template".into()],
                visible_when: None,
                hidden: false,
            },
        ],
        plots: vec![
            PlotHint::Trace { label: "Primary channel".into() },
            PlotHint::VLines { key: "stimulus_onsets".into(), label: "Stimuli".into() },
            PlotHint::VLines { key: "event_times".into(), label: "Events".into() },
        ],
        clamp_mode: Some(ClampMode::Any),
        func: run,
        multi_trial: None,
    }
}

fn float_param(name: &str, label: &str, default: f64) -> Param {
    Param::Float { name: name.to_string(), label: label.to_string(), default, min: None, max: None, decimals: Some(4), visible_when: None, hidden: false }
}

/// Binarizes `ttl` by `threshold` and returns rising-edge times. If that
/// yields fewer than two edges, retries once with the midpoint of the
/// TTL signal's own min/max range — a silent, automatic fallback.
fn edges_at(ttl: &[f64], time: &[f64], thr: f64) -> Vec<f64> {
    let is_high: Vec<bool> = ttl.iter().map(|&v| v >= thr).collect();
    is_high
        .windows(2)
        .enumerate()
        .filter_map(|(i, w)| (!w[0] && w[1]).then_some(time[i + 1]))
        .collect()
}

fn rising_edge_times(ttl: &[f64], time: &[f64], threshold: f64) -> Vec<f64> {
    let edges = edges_at(ttl, time, threshold);
    if !edges.is_empty() {
        return edges;
    }

    tracing::warn!("TTL threshold {threshold} produced no rising edges; falling back to midpoint auto-threshold");
    let (min, max) = ttl.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(mn, mx), &v| (mn.min(v), mx.max(v)));
    if !min.is_finite() || !max.is_finite() || (max - min).abs() < 1e-12 {
        return Vec::new();
    }
    edges_at(ttl, time, (min + max) / 2.0)
}

fn run(input: &AnalysisInput) -> DispatchOutcome {
    let mut results = ResultMap::new();
    let AnalysisInput { data, time, sampling_rate, params, secondary } = input;

    let Some(secondary) = secondary else {
        results.set_error("optogenetics", "secondary TTL channel not provided");
        return DispatchOutcome::new(results);
    };

    let ttl_threshold = params.get_f64_or("ttl_threshold", 2.5);
    let response_window_s = params.get_f64_or("response_window_ms", 50.0) / 1000.0;
    let event_mode = params.get_str_or("event_mode", "spikes");

    let stimulus_onsets = rising_edge_times(secondary.data, secondary.time, ttl_threshold);
    if stimulus_onsets.is_empty() {
        results.set_error("optogenetics", "no TTL rising edges detected, even after auto-threshold fallback");
        return DispatchOutcome::new(results);
    }

    let event_times: Vec<f64> = match event_mode {
        "event_threshold" => {
            let p = event_threshold::params_from(params);
            event_threshold::detect(data, time, *sampling_rate, &p).into_iter().map(|e| e.time).collect()
        }
        "event_template" => {
            let p = event_template::params_from(params);
            event_template::detect(data, time, *sampling_rate, &p).into_iter().map(|e| e.time).collect()
        }
        _ => {
            let p = SpikeDetectParams {
                threshold: params.get_f64_or("threshold", -20.0),
                refractory_period: params.get_f64_or("refractory_period", 0.002),
                peak_search_window: 0.002,
                dvdt_threshold_v_per_s: 10.0,
                ahp_window: 0.05,
                onset_lookback: 0.003,
            };
            detect_spikes(data, time, *sampling_rate, &p).into_iter().map(|s| s.peak_time).collect()
        }
    };

    let mut latencies = Vec::new();
    let mut responsive_count = 0usize;
    for &onset in &stimulus_onsets {
        let window_end = onset + response_window_s;
        if let Some(&first) = event_times.iter().find(|&&t| t >= onset && t <= window_end) {
            latencies.push((first - onset) * 1000.0);
            responsive_count += 1;
        }
    }

    let response_probability = responsive_count as f64 / stimulus_onsets.len() as f64;
    let optical_latency_ms = if latencies.is_empty() { f64::NAN } else { latencies.iter().sum::<f64>() / latencies.len() as f64 };
    let spike_jitter_ms = if latencies.len() < 2 {
        0.0
    } else {
        let m = optical_latency_ms;
        (latencies.iter().map(|v| (v - m).powi(2)).sum::<f64>() / latencies.len() as f64).sqrt()
    };

    results.set("optical_latency_ms", optical_latency_ms);
    results.set("response_probability", response_probability);
    results.set("spike_jitter_ms", spike_jitter_ms);
    results.set("stimulus_count", stimulus_onsets.len());
    results.set("stimulus_onsets", stimulus_onsets);
    results.set("event_count", event_times.len());
    results.set("event_times", event_times);
    DispatchOutcome::new(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ParamMap, SecondaryInput};

    #[test]
    fn aligns_spikes_to_ttl_pulses() {
        let rate = 20_000.0;
        let n = (1.0 * rate) as usize;
        let time: Vec<f64> = (0..n).map(|i| i as f64 / rate).collect();

        let mut ttl = vec![0.0; n];
        let mut data = vec![-70.0; n];
        for &onset in &[0.2, 0.5, 0.8] {
            let onset_idx = (onset * rate) as usize;
            for i in onset_idx..(onset_idx + 100).min(n) {
                ttl[i] = 5.0;
            }
            let spike_idx = onset_idx + 200;
            let half_width = (0.0005 * rate) as usize;
            for k in 0..=half_width {
                let frac = k as f64 / half_width as f64;
                let v = -70.0 + frac * 100.0;
                if spike_idx >= k && spike_idx - k < n {
                    data[spike_idx - k] = v;
                }
                if spike_idx + k < n {
                    data[spike_idx + k] = v;
                }
            }
        }

        let mut params = ParamMap::new();
        params
            .insert("ttl_threshold", 2.5)
            .insert("response_window_ms", 50.0)
            .insert("event_mode", "spikes")
            .insert("threshold", -20.0);
        let secondary = SecondaryInput { data: &ttl, time: &time, sampling_rate: rate };
        let input = AnalysisInput { data: &data, time: &time, sampling_rate: rate, params: &params, secondary: Some(secondary) };
        let outcome = run(&input);
        assert_eq!(outcome.results.get("stimulus_count").unwrap().as_f64().unwrap(), 3.0);
        assert!(outcome.results.get("response_probability").unwrap().as_f64().unwrap() > 0.9);
    }

    #[test]
    fn flat_ttl_yields_error() {
        let data = vec![-70.0; 1000];
        let time: Vec<f64> = (0..1000).map(|i| i as f64 / 1000.0).collect();
        let ttl = vec![0.0; 1000];
        let params = ParamMap::new();
        let secondary = SecondaryInput { data: &ttl, time: &time, sampling_rate: 1000.0 };
        let input = AnalysisInput { data: &data, time: &time, sampling_rate: 1000.0, params: &params, secondary: Some(secondary) };
        let outcome = run(&input);
        assert!(outcome.results.contains_error());
    }
}
