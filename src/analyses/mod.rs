//! The analysis catalog: one module per named analysis, plus the shared
//! detection/regression helpers they're built from.
//!
//! Each module exposes a `descriptor()` returning an `AnalysisDescriptor`;
//! `init` registers every one of them into the process-wide registry.
//! Modules also expose standalone `detect`/helper functions beyond their
//! `AnalysisFn`/`MultiTrialAnalysisFn` wrapper, so one analysis can reuse
//! another's detection step directly instead of round-tripping through
//! dispatch (`optogenetics` over `spike_detect`, `event_threshold` and
//! `event_template`; `burst` and `spike_train_dynamics` over `spikes`).

mod common;
mod spike_detect;

pub mod burst;
pub mod capacitance;
pub mod event_baseline_peak;
pub mod event_template;
pub mod event_threshold;
pub mod excitability;
pub mod input_resistance;
pub mod iv_curve;
pub mod optogenetics;
pub mod phase_plane;
pub mod rmp;
pub mod sag_ratio;
pub mod spike_train_dynamics;
pub mod spikes;
pub mod tau;

use crate::registry::init as registry_init;

/// Registers every analysis descriptor into the process-wide registry.
/// Safe to call more than once; only the first call has any effect.
pub fn init() {
    registry_init(|builder| {
        builder.register(rmp::descriptor());
        builder.register(input_resistance::descriptor());
        builder.register(tau::descriptor());
        builder.register(sag_ratio::descriptor());
        builder.register(iv_curve::descriptor());
        builder.register(spikes::descriptor());
        builder.register(burst::descriptor());
        builder.register(excitability::descriptor());
        builder.register(spike_train_dynamics::descriptor());
        builder.register(phase_plane::descriptor());
        builder.register(event_threshold::descriptor());
        builder.register(event_template::descriptor());
        builder.register(event_baseline_peak::descriptor());
        builder.register(optogenetics::descriptor());
        builder.register(capacitance::descriptor());
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_analysis_is_registered() {
        init();
        let names = crate::registry::list();
        for expected in [
            "rmp",
            "input_resistance",
            "tau",
            "sag_ratio",
            "iv_curve",
            "spikes",
            "burst",
            "excitability",
            "spike_train_dynamics",
            "phase_plane",
            "event_threshold",
            "event_template",
            "event_baseline_peak",
            "optogenetics",
            "capacitance",
        ] {
            assert!(names.contains(&expected), "missing analysis: {expected}");
        }
    }
}
