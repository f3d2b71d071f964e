//! Spike-train regularity: detects spikes, computes inter-spike intervals,
//! then their CV, CV2 and LV.

use crate::kernels::isi_stats;
use crate::registry::{AnalysisDescriptor, AnalysisInput, ClampMode, DispatchOutcome, PlotHint, ResultMap};

use super::spike_detect::detect_spikes;
use super::spikes::params_from;

pub fn descriptor() -> AnalysisDescriptor {
    AnalysisDescriptor {
        name: "spike_train_dynamics",
        label: "Spike Train Dynamics",
        requires_secondary_channel: None,
        ui_params: super::spikes::descriptor().ui_params,
        plots: vec![PlotHint::Trace { label: "Voltage".into() }],
        clamp_mode: Some(ClampMode::CurrentClamp),
        func: run,
        multi_trial: None,
    }
}

fn run(input: &AnalysisInput) -> DispatchOutcome {
    let mut results = ResultMap::new();
    let p = params_from(input);
    let spikes = detect_spikes(input.data, input.time, input.sampling_rate, &p);
    let spike_times: Vec<f64> = spikes.iter().map(|s| s.peak_time).collect();

    let Some(stats) = isi_stats(&spike_times) else {
        results.set_error("spike_train_dynamics", "fewer than 3 spikes detected");
        results.set("spike_times", spike_times);
        return DispatchOutcome::new(results);
    };

    results.set("spike_times", spike_times);
    results.set("isis", stats.isis.clone());
    results.set("mean_isi_s", stats.mean_isi);
    results.set("cv", stats.cv);
    results.set("cv2", stats.cv2);
    results.set("lv", stats.lv);
    DispatchOutcome::with_artifact(results, Box::new(stats))
}
