//! Analysis descriptors: the metadata bundle that drives both batch
//! execution and UI parameter widgets, without the core knowing anything
//! about a UI.

use std::any::Any;

use super::params::{ParamMap, ParamValue};
use super::value::ResultMap;

/// A single UI-facing parameter descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Float {
        name: String,
        label: String,
        default: f64,
        min: Option<f64>,
        max: Option<f64>,
        decimals: Option<u32>,
        visible_when: Option<(String, ParamValue)>,
        hidden: bool,
    },
    Int {
        name: String,
        label: String,
        default: i64,
        min: Option<i64>,
        max: Option<i64>,
        visible_when: Option<(String, ParamValue)>,
        hidden: bool,
    },
    Bool {
        name: String,
        label: String,
        default: bool,
        visible_when: Option<(String, ParamValue)>,
        hidden: bool,
    },
    Choice {
        name: String,
        label: String,
        default: String,
        choices: Vec<String>,
        visible_when: Option<(String, ParamValue)>,
        hidden: bool,
    },
}

impl Param {
    pub fn name(&self) -> &str {
        match self {
            Param::Float { name, .. }
            | Param::Int { name, .. }
            | Param::Bool { name, .. }
            | Param::Choice { name, .. } => name,
        }
    }

    pub fn hidden(&self) -> bool {
        match self {
            Param::Float { hidden, .. }
            | Param::Int { hidden, .. }
            | Param::Bool { hidden, .. }
            | Param::Choice { hidden, .. } => *hidden,
        }
    }

    /// Resolves this parameter's default into a `ParamValue`, for seeding a
    /// `ParamMap` before an analysis runs.
    pub fn default_value(&self) -> ParamValue {
        match self {
            Param::Float { default, .. } => ParamValue::Float(*default),
            Param::Int { default, .. } => ParamValue::Int(*default),
            Param::Bool { default, .. } => ParamValue::Bool(*default),
            Param::Choice { default, .. } => ParamValue::Str(default.clone()),
        }
    }
}

/// Applicability of an analysis to a recording mode; purely advisory (UI
/// filtering), never enforced by dispatch itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClampMode {
    CurrentClamp,
    VoltageClamp,
    Any,
}

/// A secondary-channel requirement, e.g. a TTL channel for
/// optogenetic sync.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryChannelRequirement {
    pub param_name: String,
    pub label: String,
}

/// Visualization overlay metadata, purely consumed by a GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum PlotHint {
    Trace { label: String },
    VLines { key: String, label: String },
    HLines { key: String, label: String },
    Scatter { x_key: String, y_key: String, label: String },
}

/// The primary channel plus, when declared, a resolved secondary channel
/// passed into an analysis function.
pub struct AnalysisInput<'a> {
    pub data: &'a [f64],
    pub time: &'a [f64],
    pub sampling_rate: f64,
    pub params: &'a ParamMap,
    pub secondary: Option<SecondaryInput<'a>>,
}

pub struct SecondaryInput<'a> {
    pub data: &'a [f64],
    pub time: &'a [f64],
    pub sampling_rate: f64,
}

/// What dispatch returns: the flat tabulation-ready map plus an
/// optional nested typed artifact (fitted curves, spike indices, ...) for
/// GUI consumption.
pub struct DispatchOutcome {
    pub results: ResultMap,
    pub artifact: Option<Box<dyn Any + Send + Sync>>,
}

impl DispatchOutcome {
    pub fn new(results: ResultMap) -> Self {
        Self { results, artifact: None }
    }

    pub fn with_artifact(results: ResultMap, artifact: Box<dyn Any + Send + Sync>) -> Self {
        Self { results, artifact: Some(artifact) }
    }
}

pub type AnalysisFn = fn(&AnalysisInput) -> DispatchOutcome;

/// Signature for analyses that need every trial of a channel at once (I-V
/// and F-I curves) rather than one scope-resolved trace. The uniform
/// `run(name, data, time, sampling_rate, params)` dispatch contract can
/// only carry a single 1-D trace, so these analyses are dispatched through
/// `registry::run_multi_trial` instead; the batch engine picks whichever
/// path a descriptor declares.
pub type MultiTrialAnalysisFn = fn(&[Vec<f64>], &[f64], f64, &ParamMap) -> DispatchOutcome;

/// Bundles everything the registry needs to describe and dispatch one
/// analysis.
pub struct AnalysisDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub requires_secondary_channel: Option<SecondaryChannelRequirement>,
    pub ui_params: Vec<Param>,
    pub plots: Vec<PlotHint>,
    pub clamp_mode: Option<ClampMode>,
    pub func: AnalysisFn,
    /// `Some` for analyses that require all trials of a channel at once.
    pub multi_trial: Option<MultiTrialAnalysisFn>,
}

impl AnalysisDescriptor {
    /// Builds a `ParamMap` seeded with every declared default, so an
    /// analysis invoked with an empty override map still sees its full
    /// descriptor defaults.
    pub fn default_params(&self) -> ParamMap {
        self.ui_params
            .iter()
            .map(|p| (p.name().to_string(), p.default_value()))
            .collect()
    }
}
