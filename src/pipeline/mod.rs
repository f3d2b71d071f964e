//! --------------------------
//! INFORMATION
//! --------------------------
//! Title: Signal Processing Pipeline
//! Description: An ordered, composable chain of preprocessing steps over a
//!              1-D sample array. Every step preserves array length
//!              and every filter is zero-phase; analyses depend on both
//!              invariants holding.
//! --------------------------

pub mod artifact;
pub mod baseline;
pub mod filter;

pub use artifact::ArtifactMethod;

use crate::error::PipelineError;
use crate::registry::ParamMap;

/// One preprocessing step. Kept as a typed
/// enum rather than a raw string so a pipeline, once built, can never
/// reference an unknown tag; `Step::parse` is the bridge from a
/// registry-declared string tag + params to this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    LowPass { cutoff_hz: f64, order: usize },
    HighPass { cutoff_hz: f64, order: usize },
    BandPass { low_hz: f64, high_hz: f64, order: usize },
    Notch { center_hz: f64, q: f64 },
    Comb { base_hz: f64, q: f64, n_harmonics: usize },
    BaselineMean,
    BaselineMedian,
    BaselineMode { decimals: i32 },
    BaselineLinear,
    BaselineWindow { t_start: f64, t_end: f64 },
    Artifact { onset_time: f64, duration_ms: f64, method: ArtifactMethod },
}

impl Step {
    /// Parses a step from its `(tag, params)` form, matching tagged
    /// record table. Returns `PipelineError::UnknownStep` for any tag not
    /// in that table.
    pub fn parse(tag: &str, params: &ParamMap) -> Result<Step, PipelineError> {
        Ok(match tag {
            "filter:lowpass" => Step::LowPass {
                cutoff_hz: params.get_f64_or("cutoff", 100.0),
                order: params.get_i64_or("order", 4).max(0) as usize,
            },
            "filter:highpass" => Step::HighPass {
                cutoff_hz: params.get_f64_or("cutoff", 1.0),
                order: params.get_i64_or("order", 4).max(0) as usize,
            },
            "filter:bandpass" => Step::BandPass {
                low_hz: params.get_f64_or("low", 1.0),
                high_hz: params.get_f64_or("high", 100.0),
                order: params.get_i64_or("order", 4).max(0) as usize,
            },
            "notch" => Step::Notch {
                center_hz: params.get_f64_or("center", 60.0),
                q: params.get_f64_or("q", 30.0),
            },
            "comb" => Step::Comb {
                base_hz: params.get_f64_or("base", 60.0),
                q: params.get_f64_or("q", 30.0),
                n_harmonics: params.get_i64_or("n_harmonics", 3).max(0) as usize,
            },
            "baseline:mean" => Step::BaselineMean,
            "baseline:median" => Step::BaselineMedian,
            "baseline:mode" => Step::BaselineMode { decimals: params.get_i64_or("decimals", 1) as i32 },
            "baseline:linear" => Step::BaselineLinear,
            "baseline:window" => Step::BaselineWindow {
                t_start: params.get_f64_or("t_start", 0.0),
                t_end: params.get_f64_or("t_end", 0.0),
            },
            "artifact" => Step::Artifact {
                onset_time: params.get_f64_or("onset_time", 0.0),
                duration_ms: params.get_f64_or("duration_ms", 1.0),
                method: match params.get_str_or("method", "hold") {
                    "zero" => ArtifactMethod::Zero,
                    "linear" => ArtifactMethod::Linear,
                    _ => ArtifactMethod::Hold,
                },
            },
            other => return Err(PipelineError::UnknownStep(other.to_string())),
        })
    }

    fn apply(&self, data: &[f64], sampling_rate: f64, time: &[f64]) -> Result<Vec<f64>, PipelineError> {
        match self {
            Step::LowPass { cutoff_hz, order } => filter::lowpass(data, sampling_rate, *cutoff_hz, *order),
            Step::HighPass { cutoff_hz, order } => filter::highpass(data, sampling_rate, *cutoff_hz, *order),
            Step::BandPass { low_hz, high_hz, order } => {
                filter::bandpass(data, sampling_rate, *low_hz, *high_hz, *order)
            }
            Step::Notch { center_hz, q } => filter::notch(data, sampling_rate, *center_hz, *q),
            Step::Comb { base_hz, q, n_harmonics } => filter::comb(data, sampling_rate, *base_hz, *q, *n_harmonics),
            Step::BaselineMean => Ok(baseline::subtract_mean(data)),
            Step::BaselineMedian => Ok(baseline::subtract_median(data)),
            Step::BaselineMode { decimals } => Ok(baseline::subtract_mode(data, *decimals)),
            Step::BaselineLinear => Ok(baseline::subtract_linear_trend(data)),
            Step::BaselineWindow { t_start, t_end } => baseline::subtract_window_mean(data, time, *t_start, *t_end),
            Step::Artifact { onset_time, duration_ms, method } => {
                artifact::blank(data, time, *onset_time, *duration_ms, *method)
            }
        }
    }
}

/// An ordered sequence of steps applied to one trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in order, each seeing the previous step's output.
    /// The result always has the same length as `data`.
    pub fn process(&self, data: &[f64], sampling_rate: f64, time: &[f64]) -> Result<Vec<f64>, PipelineError> {
        let mut current = data.to_vec();
        for step in &self.steps {
            let next = step.apply(&current, sampling_rate, time)?;
            debug_assert_eq!(next.len(), current.len(), "pipeline step changed array length");
            current = next;
        }
        Ok(current)
    }
}
