//! --------------------------
//! INFORMATION
//! --------------------------
//! Title: Analysis Registry
//! Description: Declarative analysis descriptors, dynamic parameter maps,
//!              and dispatch by name. Write-once at start-up via
//!              `crate::analyses::init`, read-only thereafter.
//! --------------------------

mod descriptor;
mod dispatch;
mod params;
mod value;

pub use descriptor::{
    AnalysisDescriptor, AnalysisFn, AnalysisInput, ClampMode, DispatchOutcome,
    MultiTrialAnalysisFn, Param, PlotHint, SecondaryChannelRequirement, SecondaryInput,
};
pub use dispatch::{describe, init, list, run, run_multi_trial, RegistryBuilder};
pub use params::{ParamMap, ParamValue};
pub use value::{ResultMap, Value, ABSENT};
