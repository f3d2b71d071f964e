//! Batch engine: resolves a list of `(path, scope, channel, trial)` items
//! to traces, runs a shared preprocessing pipeline and a shared list of
//! analysis steps over each, and flattens the results into rows.
//!
//! Failure isolation: a loader error or an unresolvable scope/pipeline
//! failure aborts only the current item, logged and turned into one
//! `error` row; an unknown analysis name or a panicking analysis aborts
//! only that one analysis step's row. The run itself never unwinds.

mod scope;

pub use scope::Scope;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::core_types::Channel;
use crate::error::LoaderError;
use crate::loader::LoaderRegistry;
use crate::pipeline::Pipeline;
use crate::registry::{self, ParamMap, ResultMap, SecondaryInput};

/// One unit of batch work: a file, how to reduce its channel to traces,
/// and (for `Scope::SpecificTrial`) which trial.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub path: String,
    pub scope: Scope,
    /// Ignored when `scope` is `Scope::Recording` (the default channel is
    /// auto-selected instead).
    pub channel_id: String,
    pub trial_index: Option<usize>,
}

/// One analysis to run against every trace an item resolves to, with its
/// parameter overrides (anything not set here falls back to the
/// descriptor's own default).
#[derive(Debug, Clone)]
pub struct AnalysisStep {
    pub name: String,
    pub params: ParamMap,
}

/// A full batch run: items, a shared preprocessing pipeline, and the
/// analyses to run against every resolved trace.
pub struct Batch {
    pub items: Vec<BatchItem>,
    pub pipeline: Pipeline,
    pub analyses: Vec<AnalysisStep>,
}

/// One output row: item-identifying columns plus an analysis's flattened
/// result map. `trial_index` is `None` for an averaged trace or a
/// multi-trial aggregate analysis (I-V / F-I curves).
pub struct ResultRow {
    pub file_name: String,
    pub file_path: String,
    pub channel: String,
    pub analysis: String,
    pub scope: &'static str,
    pub trial_index: Option<usize>,
    pub values: ResultMap,
}

impl ResultRow {
    fn error(path: &str, channel: &str, analysis: &str, scope: &'static str, message: impl Into<String>) -> Self {
        let mut values = ResultMap::new();
        values.set_error("item", message.into());
        Self {
            file_name: file_name_of(path),
            file_path: path.to_string(),
            channel: channel.to_string(),
            analysis: analysis.to_string(),
            scope,
            trial_index: None,
            values,
        }
    }
}

fn file_name_of(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Terminal status of a batch run.
pub enum RunStatus {
    Completed,
    Cancelled { completed_items: usize },
}

pub struct BatchOutcome {
    pub rows: Vec<ResultRow>,
    pub status: RunStatus,
}

/// `(item_index, total_items, stage_label)`, published between items and
/// before each analysis step so a UI can drive a progress bar from a
/// different thread.
pub type ProgressCallback<'a> = dyn Fn(usize, usize, &str) + Send + Sync + 'a;

/// Runs `batch` against recordings loaded through `loaders`, honoring
/// `cancel` (checked between items and before each analysis step) and
/// reporting progress through `on_progress`. Rows are always appended in
/// item x analysis order, matching input order, regardless of whether the
/// `parallel` feature's rayon path below is compiled in.
pub fn run(batch: &Batch, loaders: &LoaderRegistry, cancel: &AtomicBool, on_progress: &ProgressCallback) -> BatchOutcome {
    let total = batch.items.len();
    let mut rows = Vec::new();

    for (index, item) in batch.items.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return BatchOutcome { rows, status: RunStatus::Cancelled { completed_items: index } };
        }
        on_progress(index, total, "loading");
        rows.extend(process_item(item, batch, loaders, cancel, on_progress, index, total));
    }

    BatchOutcome { rows, status: RunStatus::Completed }
}

/// Processes one item into zero or more rows (one `error` row on failure,
/// otherwise one row per `(trace, analysis step)` pair — collapsed to one
/// row per multi-trial analysis step regardless of trace count).
fn process_item(
    item: &BatchItem,
    batch: &Batch,
    loaders: &LoaderRegistry,
    cancel: &AtomicBool,
    on_progress: &ProgressCallback,
    index: usize,
    total: usize,
) -> Vec<ResultRow> {
    let recording = match loaders.load(&item.path) {
        Ok(r) => r,
        Err(err) => {
            tracing::error!(path = %item.path, error = %err, "failed to load recording");
            return vec![ResultRow::error(&item.path, &item.channel_id, "", item.scope.label(), err.to_string())];
        }
    };

    let channel: &Channel = match item.scope {
        Scope::Recording => match scope::preferred_voltage_channel(&recording) {
            Some(c) => c,
            None => {
                return vec![ResultRow::error(&item.path, &item.channel_id, "", item.scope.label(), "recording has no channels")];
            }
        },
        _ => match recording.channels.get(&item.channel_id) {
            Some(c) => c,
            None => {
                return vec![ResultRow::error(
                    &item.path,
                    &item.channel_id,
                    "",
                    item.scope.label(),
                    format!("channel '{}' not found", item.channel_id),
                )];
            }
        },
    };

    let traces = match scope::resolve(channel, item.scope, item.trial_index) {
        Ok(t) => t,
        Err(message) => {
            tracing::error!(path = %item.path, channel = %channel.id, error = %message, "failed to resolve scope");
            return vec![ResultRow::error(&item.path, &channel.id, "", item.scope.label(), message)];
        }
    };

    let mut processed: Vec<(Option<usize>, Vec<f64>, Vec<f64>)> = Vec::with_capacity(traces.len());
    for trace in traces {
        match batch.pipeline.process(&trace.data, channel.sampling_rate, &trace.time) {
            Ok(data) => processed.push((trace.trial_index, data, trace.time)),
            Err(err) => {
                tracing::error!(path = %item.path, channel = %channel.id, error = %err, "preprocessing pipeline failed");
                return vec![ResultRow::error(&item.path, &channel.id, "", item.scope.label(), err.to_string())];
            }
        }
    }

    let mut rows = Vec::new();
    for step in &batch.analyses {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        on_progress(index, total, step.name.as_str());
        rows.extend(run_analysis_step(item, &recording, channel, &processed, step));
    }
    rows
}

fn run_analysis_step(
    item: &BatchItem,
    recording: &crate::core_types::Recording,
    channel: &Channel,
    processed: &[(Option<usize>, Vec<f64>, Vec<f64>)],
    step: &AnalysisStep,
) -> Vec<ResultRow> {
    let Some(descriptor) = registry::describe(&step.name) else {
        return vec![ResultRow::error(
            &item.path,
            &channel.id,
            &step.name,
            item.scope.label(),
            format!("unknown analysis '{}'", step.name),
        )];
    };

    if descriptor.multi_trial.is_some() {
        let trials: Vec<Vec<f64>> = processed.iter().map(|(_, data, _)| data.clone()).collect();
        let time = processed.first().map(|(_, _, t)| t.clone()).unwrap_or_default();
        let outcome = registry::run_multi_trial(&step.name, &trials, &time, channel.sampling_rate, &step.params);
        return vec![row_from_outcome(item, channel, step, None, outcome)];
    }

    let secondary_channel = resolve_secondary(recording, descriptor, step);

    let mut rows = Vec::with_capacity(processed.len());
    for (trial_index, data, time) in processed {
        let secondary_owned = secondary_channel.and_then(|sec| {
            let idx = trial_index.unwrap_or(0).min(sec.num_trials().saturating_sub(1));
            let sec_data = sec.get_data(idx)?.to_vec();
            let sec_time = sec.get_relative_time_vector(idx)?;
            Some((sec_data, sec_time, sec.sampling_rate))
        });
        let secondary = secondary_owned
            .as_ref()
            .map(|(data, time, rate)| SecondaryInput { data, time, sampling_rate: *rate });
        let outcome = registry::run(&step.name, data, time, channel.sampling_rate, &step.params, secondary);
        rows.push(row_from_outcome(item, channel, step, *trial_index, outcome));
    }
    rows
}

/// Resolves a descriptor's required secondary channel from the step's own
/// parameter map (a string parameter named after
/// `requires_secondary_channel.param_name`, holding the secondary
/// channel's id). Returns `None` when the descriptor needs no secondary
/// channel or the requested one can't be found — `registry::run` then
/// reports the missing-secondary-channel error itself.
fn resolve_secondary<'a>(
    recording: &'a crate::core_types::Recording,
    descriptor: &crate::registry::AnalysisDescriptor,
    step: &AnalysisStep,
) -> Option<&'a Channel> {
    let req = descriptor.requires_secondary_channel.as_ref()?;
    let channel_id = step.params.get(&req.param_name)?.as_str()?;
    recording.channels.get(channel_id)
}

fn row_from_outcome(
    item: &BatchItem,
    channel: &Channel,
    step: &AnalysisStep,
    trial_index: Option<usize>,
    outcome: Result<crate::registry::DispatchOutcome, crate::error::DispatchError>,
) -> ResultRow {
    match outcome {
        Ok(outcome) => ResultRow {
            file_name: file_name_of(&item.path),
            file_path: item.path.clone(),
            channel: channel.id.clone(),
            analysis: step.name.clone(),
            scope: item.scope.label(),
            trial_index,
            values: outcome.results,
        },
        Err(err) => ResultRow::error(&item.path, &channel.id, &step.name, item.scope.label(), err.to_string()),
    }
}

#[cfg(feature = "parallel")]
/// Parallel variant of `run`: items are processed concurrently via rayon,
/// but rows are reassembled in item order afterward so output ordering
/// matches the sequential path regardless of which item finishes first.
pub fn run_parallel(batch: &Batch, loaders: &LoaderRegistry, cancel: &AtomicBool, on_progress: &ProgressCallback) -> BatchOutcome {
    use rayon::prelude::*;

    let total = batch.items.len();
    let per_item: Vec<Vec<ResultRow>> = batch
        .items
        .par_iter()
        .enumerate()
        .map(|(index, item)| {
            if cancel.load(Ordering::Relaxed) {
                return Vec::new();
            }
            on_progress(index, total, "loading");
            process_item(item, batch, loaders, cancel, on_progress, index, total)
        })
        .collect();

    if cancel.load(Ordering::Relaxed) {
        let completed = per_item.iter().take_while(|rows| !rows.is_empty()).count();
        let rows = per_item.into_iter().flatten().collect();
        return BatchOutcome { rows, status: RunStatus::Cancelled { completed_items: completed } };
    }

    BatchOutcome { rows: per_item.into_iter().flatten().collect(), status: RunStatus::Completed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Recording;
    use crate::loader::Loader;

    struct OneRecordingLoader;

    impl Loader for OneRecordingLoader {
        fn name(&self) -> &'static str {
            "stub"
        }
        fn extensions(&self) -> &'static [&'static str] {
            &["abf"]
        }
        fn load(&self, path: &str) -> Result<Recording, LoaderError> {
            let mut r = Recording::new(path);
            r.channels.insert("0".into(), Channel::new("0", "Vm", "mV", 1000.0, vec![vec![-70.0; 500]]));
            Ok(r)
        }
    }

    fn loaders() -> LoaderRegistry {
        let mut r = LoaderRegistry::new();
        r.register(Box::new(OneRecordingLoader));
        r
    }

    fn init_registry() {
        crate::analyses::init();
    }

    #[test]
    fn unknown_file_becomes_an_error_row() {
        init_registry();
        let batch = Batch {
            items: vec![BatchItem { path: "missing.abf".into(), scope: Scope::FirstTrial, channel_id: "0".into(), trial_index: None }],
            pipeline: Pipeline::default(),
            analyses: vec![AnalysisStep { name: "rmp".into(), params: ParamMap::new() }],
        };
        let mut bad_loaders = LoaderRegistry::new();
        struct FailingLoader;
        impl Loader for FailingLoader {
            fn name(&self) -> &'static str {
                "stub"
            }
            fn extensions(&self) -> &'static [&'static str] {
                &["abf"]
            }
            fn load(&self, path: &str) -> Result<Recording, LoaderError> {
                Err(LoaderError::FileNotFound(path.to_string()))
            }
        }
        bad_loaders.register(Box::new(FailingLoader));
        let cancel = AtomicBool::new(false);
        let outcome = run(&batch, &bad_loaders, &cancel, &|_, _, _| {});
        assert_eq!(outcome.rows.len(), 1);
        assert!(outcome.rows[0].values.contains_error());
    }

    #[test]
    fn first_trial_scope_runs_rmp_and_produces_one_row() {
        init_registry();
        let batch = Batch {
            items: vec![BatchItem { path: "a.abf".into(), scope: Scope::FirstTrial, channel_id: "0".into(), trial_index: None }],
            pipeline: Pipeline::default(),
            analyses: vec![AnalysisStep { name: "rmp".into(), params: ParamMap::new() }],
        };
        let cancel = AtomicBool::new(false);
        let outcome = run(&batch, &loaders(), &cancel, &|_, _, _| {});
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].trial_index, Some(0));
        assert!(!outcome.rows[0].values.contains_error());
    }

    #[test]
    fn cancellation_before_first_item_yields_zero_completed() {
        init_registry();
        let batch = Batch {
            items: vec![BatchItem { path: "a.abf".into(), scope: Scope::FirstTrial, channel_id: "0".into(), trial_index: None }],
            pipeline: Pipeline::default(),
            analyses: vec![AnalysisStep { name: "rmp".into(), params: ParamMap::new() }],
        };
        let cancel = AtomicBool::new(true);
        let outcome = run(&batch, &loaders(), &cancel, &|_, _, _| {});
        assert!(matches!(outcome.status, RunStatus::Cancelled { completed_items: 0 }));
        assert!(outcome.rows.is_empty());
    }

    #[test]
    fn unknown_analysis_name_becomes_an_error_row_not_a_panic() {
        init_registry();
        let batch = Batch {
            items: vec![BatchItem { path: "a.abf".into(), scope: Scope::FirstTrial, channel_id: "0".into(), trial_index: None }],
            pipeline: Pipeline::default(),
            analyses: vec![AnalysisStep { name: "does_not_exist".into(), params: ParamMap::new() }],
        };
        let cancel = AtomicBool::new(false);
        let outcome = run(&batch, &loaders(), &cancel, &|_, _, _| {});
        assert_eq!(outcome.rows.len(), 1);
        assert!(outcome.rows[0].values.contains_error());
    }
}
