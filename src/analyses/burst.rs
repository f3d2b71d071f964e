//! Burst detection: groups a spike train into bursts using an ISI-based
//! start/end threshold, reusing the same spike detector as `spikes`.

use crate::registry::{AnalysisDescriptor, AnalysisInput, ClampMode, DispatchOutcome, Param, PlotHint, ResultMap};

use super::spike_detect::{detect_spikes, SpikeFeatures};
use super::spikes::params_from;

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "burst",
        label: "Burst Analysis",
        requires_secondary_channel: None,
        ui_params: vec![
            float_param("threshold", "Threshold (mV)", -20.0),
            float_param("max_isi_start", "Max ISI to start a burst (s)", 0.01),
            float_param("max_isi_end", "Max ISI to continue a burst (s)", 0.02),
            int_param("min_spikes", "Minimum spikes per burst", 3),
        ],
        plots: vec![
            PlotHint::Trace { label: "Voltage".into() },
            PlotHint::VLines { key: "burst_start_times".into(), label: "Burst starts".into() },
        ],
        clamp_mode: Some(ClampMode::CurrentClamp),
        func: run,
        multi_trial: None,
    }
}

fn float_param(name: &str, label: &str, default: f64) -> Param {
    Param::Float { name: name.to_string(), label: label.to_string(), default, min: Some(0.0), max: None, decimals: Some(4), visible_when: None, hidden: false }
}

fn int_param(name: &str, label: &str, default: i64) -> Param {
    Param::Int { name: name.to_string(), label: label.to_string(), default, min: Some(1), max: None, visible_when: None, hidden: false }
}

struct Burst {
    start_time: f64,
    end_time: f64,
    spike_count: usize,
}

fn group_bursts(spikes: &[SpikeFeatures], max_isi_start: f64, max_isi_end: f64, min_spikes: usize) -> Vec<Burst> {
    let mut bursts = Vec::new();
    let mut i = 0;
    while i < spikes.len() {
        let mut j = i + 1;
        // Extend the run while consecutive ISIs stay under the continuation
        // threshold; the first ISI of the run must be under the (typically
        // tighter) start threshold.
        if j < spikes.len() && spikes[j].peak_time - spikes[i].peak_time <= max_isi_start {
            while j < spikes.len() && spikes[j].peak_time - spikes[j - 1].peak_time <= max_isi_end {
                j += 1;
            }
            let count = j - i;
            if count >= min_spikes {
                bursts.push(Burst {
                    start_time: spikes[i].peak_time,
                    end_time: spikes[j - 1].peak_time,
                    spike_count: count,
                });
            }
            i = j;
        } else {
            i += 1;
        }
    }
    bursts
}

fn run(input: &AnalysisInput) -> DispatchOutcome {
    let mut results = ResultMap::new();
    let p = params_from(input);
    let spikes = detect_spikes(input.data, input.time, input.sampling_rate, &p);

    let max_isi_start = input.params.get_f64_or("max_isi_start", 0.01);
    let max_isi_end = input.params.get_f64_or("max_isi_end", 0.02);
    let min_spikes = input.params.get_i64_or("min_spikes", 3).max(1) as usize;

    let bursts = group_bursts(&spikes, max_isi_start, max_isi_end, min_spikes);

    results.set("burst_count", bursts.len());
    if bursts.is_empty() {
        results.set("spikes_per_burst_avg", f64::NAN);
        results.set("burst_duration_avg_s", f64::NAN);
        results.set("burst_freq_hz", f64::NAN);
        results.set("burst_start_times", Vec::<f64>::new());
        results.set("burst_end_times", Vec::<f64>::new());
        return DispatchOutcome::new(results);
    }

    let spikes_per_burst_avg = bursts.iter().map(|b| b.spike_count as f64).sum::<f64>() / bursts.len() as f64;
    let durations: Vec<f64> = bursts.iter().map(|b| b.end_time - b.start_time).collect();
    let burst_duration_avg_s = durations.iter().sum::<f64>() / durations.len() as f64;

    let total_duration = input.time.last().copied().unwrap_or(0.0) - input.time.first().copied().unwrap_or(0.0);
    let burst_freq_hz = if total_duration > 0.0 { bursts.len() as f64 / total_duration } else { f64::NAN };

    results.set("spikes_per_burst_avg", spikes_per_burst_avg);
    results.set("burst_duration_avg_s", burst_duration_avg_s);
    results.set("burst_freq_hz", burst_freq_hz);
    results.set("burst_start_times", bursts.iter().map(|b| b.start_time).collect::<Vec<f64>>());
    results.set("burst_end_times", bursts.iter().map(|b| b.end_time).collect::<Vec<f64>>());
    DispatchOutcome::new(results)
}
