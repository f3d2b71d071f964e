//! --------------------------
//! INFORMATION
//! --------------------------
//! Title: Error Taxonomy
//! Description: Crate-wide error types. Analysis-level and numeric failures
//!              are NOT represented here — those are reported as an `error`
//!              field inside a flat result map (see `registry::Value`) so a
//!              bad trace never unwinds past an analysis function. The
//!              types below are for programmer errors (unknown analysis
//!              name, unknown pipeline step) and loader failures, which
//!              should propagate or fail loud.
//! --------------------------

use thiserror::Error;

/// Failures constructing or running a signal-processing pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("unknown pipeline step '{0}'")]
    UnknownStep(String),

    #[error("step '{step}' has invalid parameters: {message}")]
    InvalidParams { step: String, message: String },

    #[error("step '{step}' requires at least {min} samples, got {actual}")]
    InsufficientSamples {
        step: String,
        min: usize,
        actual: usize,
    },
}

/// Failures in the analysis registry's dispatch layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("unknown analysis '{0}'")]
    UnknownAnalysis(String),

    #[error("analysis '{analysis}' requires a secondary channel ('{param_name}') that was not provided")]
    MissingSecondaryChannel { analysis: String, param_name: String },
}

/// Loader-contract failures. Raised by external loaders, never by the
/// core; the batch engine catches these and turns them into an
/// `error` row rather than propagating.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoaderError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("error reading file '{path}': {message}")]
    FileReadError { path: String, message: String },
}
