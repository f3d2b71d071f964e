//! Process-wide analysis registry and dispatch. Populated once by
//! `crate::analyses::init` and thereafter read-only: the registry is
//! write-once during init, then treated as immutable global state.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::DispatchError;

use super::descriptor::{AnalysisDescriptor, AnalysisInput, MultiTrialAnalysisFn, SecondaryInput};
use super::params::ParamMap;
use super::value::ResultMap;
use super::descriptor::DispatchOutcome;

pub struct Registry {
    analyses: HashMap<&'static str, AnalysisDescriptor>,
}

impl Registry {
    fn new() -> Self {
        Self { analyses: HashMap::new() }
    }

    fn insert(&mut self, descriptor: AnalysisDescriptor) {
        self.analyses.insert(descriptor.name, descriptor);
    }

    pub fn describe(&self, name: &str) -> Option<&AnalysisDescriptor> {
        self.analyses.get(name)
    }

    /// Analysis names in registration order is not guaranteed by a
    /// `HashMap`; callers needing deterministic batch ordering should sort
    /// this themselves (the batch engine does).
    pub fn list(&self) -> Vec<&'static str> {
        self.analyses.keys().copied().collect()
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Initializes the process-wide registry exactly once. Subsequent calls
/// are no-ops; dispatch before any `init()` call simply sees "unknown
/// analysis" for every name, since the registry starts empty.
pub fn init(build: impl FnOnce(&mut RegistryBuilder)) {
    REGISTRY.get_or_init(|| {
        let mut builder = RegistryBuilder(Registry::new());
        build(&mut builder);
        builder.0
    });
}

/// Write-side handle passed to `init`'s closure; the only way to populate
/// the registry, so insertion can never happen after first read.
pub struct RegistryBuilder(Registry);

impl RegistryBuilder {
    pub fn register(&mut self, descriptor: AnalysisDescriptor) {
        self.0.insert(descriptor);
    }
}

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Looks up a registered analysis by name.
pub fn describe(name: &str) -> Option<&'static AnalysisDescriptor> {
    registry().describe(name)
}

/// All registered analysis names, in unspecified order; callers needing
/// deterministic batch ordering should sort this themselves.
pub fn list() -> Vec<&'static str> {
    registry().list()
}

/// Resolves parameters, validates the secondary-channel requirement and
/// dispatches to a single-trace analysis.
///
/// Unknown analysis names and a missing required secondary channel are
/// programmer errors and propagate as `Err`; everything else an analysis
/// function returns — including its own validation failures — is surfaced
/// inside `DispatchOutcome::results` and never raised here.
pub fn run(
    name: &str,
    data: &[f64],
    time: &[f64],
    sampling_rate: f64,
    params: &ParamMap,
    secondary: Option<SecondaryInput<'_>>,
) -> Result<DispatchOutcome, DispatchError> {
    let descriptor = registry()
        .describe(name)
        .ok_or_else(|| DispatchError::UnknownAnalysis(name.to_string()))?;

    if let Some(req) = &descriptor.requires_secondary_channel {
        if secondary.is_none() {
            return Err(DispatchError::MissingSecondaryChannel {
                analysis: name.to_string(),
                param_name: req.param_name.clone(),
            });
        }
    }

    let mut resolved_params = descriptor.default_params();
    for p in &descriptor.ui_params {
        if let Some(v) = params.get(p.name()) {
            resolved_params.insert(p.name().to_string(), v.clone());
        }
    }

    let input = AnalysisInput {
        data,
        time,
        sampling_rate,
        params: &resolved_params,
        secondary,
    };

    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (descriptor.func)(&input))) {
        Ok(outcome) => Ok(outcome),
        Err(_) => {
            tracing::error!(analysis = %name, "analysis panicked; converting to error result");
            let mut results = ResultMap::new();
            results.set_error(name, "internal error: analysis panicked");
            Ok(DispatchOutcome::new(results))
        }
    }
}

/// Dispatches an analysis that needs every trial of a channel at once
/// (I-V and F-I curves), rather than a single scope-resolved trace.
///
/// Mirrors `run`'s validation and panic-isolation behavior but calls
/// through `AnalysisDescriptor::multi_trial` instead of `func`.
pub fn run_multi_trial(
    name: &str,
    trials: &[Vec<f64>],
    time: &[f64],
    sampling_rate: f64,
    params: &ParamMap,
) -> Result<DispatchOutcome, DispatchError> {
    let descriptor = registry()
        .describe(name)
        .ok_or_else(|| DispatchError::UnknownAnalysis(name.to_string()))?;

    let func: MultiTrialAnalysisFn = descriptor
        .multi_trial
        .ok_or_else(|| DispatchError::UnknownAnalysis(format!("{name} has no multi-trial entry point")))?;

    let mut resolved_params = descriptor.default_params();
    for p in &descriptor.ui_params {
        if let Some(v) = params.get(p.name()) {
            resolved_params.insert(p.name().to_string(), v.clone());
        }
    }

    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        func(trials, time, sampling_rate, &resolved_params)
    })) {
        Ok(outcome) => Ok(outcome),
        Err(_) => {
            tracing::error!(analysis = %name, "multi-trial analysis panicked; converting to error result");
            let mut results = ResultMap::new();
            results.set_error(name, "internal error: analysis panicked");
            Ok(DispatchOutcome::new(results))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::descriptor::{AnalysisDescriptor, DispatchOutcome};

    fn ok_analysis(_input: &AnalysisInput) -> DispatchOutcome {
        let mut r = ResultMap::new();
        r.set("value", 1.0);
        DispatchOutcome::new(r)
    }

    fn build_test_registry() {
        init(|b| {
            b.register(AnalysisDescriptor {
                name: "test_analysis",
                label: "Test",
                requires_secondary_channel: None,
                ui_params: vec![],
                plots: vec![],
                clamp_mode: None,
                func: ok_analysis,
                multi_trial: None,
            });
        });
    }

    #[test]
    fn unknown_analysis_name_is_an_error() {
        build_test_registry();
        let params = ParamMap::new();
        let result = run("does_not_exist", &[], &[], 1000.0, &params, None);
        assert!(matches!(result, Err(DispatchError::UnknownAnalysis(_))));
    }

    #[test]
    fn known_analysis_dispatches() {
        build_test_registry();
        let params = ParamMap::new();
        let outcome = run("test_analysis", &[1.0], &[0.0], 1000.0, &params, None).unwrap();
        assert_eq!(outcome.results.get("value").unwrap().as_f64().unwrap(), 1.0);
    }
}
