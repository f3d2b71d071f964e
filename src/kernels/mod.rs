//! --------------------------
//! INFORMATION
//! --------------------------
//! Title: Numeric Kernels
//! Description: Peak finding, robust noise estimation, curve fitting,
//!              matched-filter FFT convolution, linear regression, and
//!              inter-spike-interval statistics. Every analysis in
//!              `crate::analyses` is built out of these primitives.
//! --------------------------

pub mod fitting;
pub mod matched_filter;
pub mod noise;
pub mod peaks;
pub mod regression;
pub mod spike_stats;

pub use fitting::{fit_bi_exponential, fit_mono_exponential, BiExpFit, FitOutcome, MonoExpFit};
pub use matched_filter::cross_correlate_same;
pub use noise::{mad, std_dev};
pub use peaks::{find_peaks, PeakParams};
pub use regression::{linear_regression, LinearFit};
pub use spike_stats::{cv, cv2, isi_stats, lv, IsiStats};
