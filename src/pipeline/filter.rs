//! Zero-phase IIR filtering: Butterworth low/high/band-pass, notch,
//! and comb (cascaded notches), all run forward-backward so latency stays
//! at zero samples.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};

use crate::error::PipelineError;

fn even_order(step: &str, order: usize) -> Result<usize, PipelineError> {
    if order == 0 || order % 2 != 0 {
        return Err(PipelineError::InvalidParams {
            step: step.to_string(),
            message: "order must be a positive even number (cascaded biquad sections)".to_string(),
        });
    }
    Ok(order)
}

fn nyquist_check(step: &str, sampling_rate: f64, freqs: &[f64]) -> Result<(), PipelineError> {
    let nyquist = sampling_rate / 2.0;
    for &f in freqs {
        if !(f > 0.0 && f < nyquist) {
            return Err(PipelineError::InvalidParams {
                step: step.to_string(),
                message: format!("frequency {f} Hz must lie in (0, nyquist={nyquist} Hz)"),
            });
        }
    }
    Ok(())
}

/// Q values for an `order`-pole Butterworth filter realized as
/// `order / 2` cascaded 2nd-order (biquad) sections.
fn butterworth_qs(order: usize) -> Vec<f64> {
    (1..=order / 2)
        .map(|k| {
            let theta = ((2 * k - 1) as f64) * std::f64::consts::PI / (2.0 * order as f64);
            1.0 / (2.0 * theta.cos())
        })
        .collect()
}

fn build_cascade(
    step: &str,
    kind: Type<f64>,
    cutoff_hz: f64,
    sampling_rate: f64,
    order: usize,
) -> Result<Vec<Coefficients<f64>>, PipelineError> {
    let order = even_order(step, order)?;
    butterworth_qs(order)
        .into_iter()
        .map(|q| {
            Coefficients::<f64>::from_params(kind, sampling_rate.hz(), cutoff_hz.hz(), q).map_err(|_| {
                PipelineError::InvalidParams {
                    step: step.to_string(),
                    message: format!("could not build filter coefficients at {cutoff_hz} Hz"),
                }
            })
        })
        .collect()
}

fn run_cascade(coeffs: &[Coefficients<f64>], input: &[f64]) -> Vec<f64> {
    let mut stages: Vec<DirectForm2Transposed<f64>> =
        coeffs.iter().map(|c| DirectForm2Transposed::<f64>::new(*c)).collect();
    input
        .iter()
        .map(|&x| stages.iter_mut().fold(x, |v, s| s.run(v)))
        .collect()
}

/// Runs the cascade forward, then backward over the time-reversed output,
/// cancelling phase distortion (classic filtfilt construction).
fn zero_phase(coeffs: &[Coefficients<f64>], input: &[f64]) -> Vec<f64> {
    let forward = run_cascade(coeffs, input);
    let reversed: Vec<f64> = forward.into_iter().rev().collect();
    let backward = run_cascade(coeffs, &reversed);
    backward.into_iter().rev().collect()
}

pub fn lowpass(data: &[f64], sampling_rate: f64, cutoff_hz: f64, order: usize) -> Result<Vec<f64>, PipelineError> {
    nyquist_check("filter:lowpass", sampling_rate, &[cutoff_hz])?;
    let coeffs = build_cascade("filter:lowpass", Type::LowPass, cutoff_hz, sampling_rate, order)?;
    Ok(zero_phase(&coeffs, data))
}

pub fn highpass(data: &[f64], sampling_rate: f64, cutoff_hz: f64, order: usize) -> Result<Vec<f64>, PipelineError> {
    nyquist_check("filter:highpass", sampling_rate, &[cutoff_hz])?;
    let coeffs = build_cascade("filter:highpass", Type::HighPass, cutoff_hz, sampling_rate, order)?;
    Ok(zero_phase(&coeffs, data))
}

/// Bandpass realized as a highpass cascade at `low_hz` followed by a
/// lowpass cascade at `high_hz`, each zero-phase. Requires
/// `0 < low_hz < high_hz < nyquist`.
pub fn bandpass(
    data: &[f64],
    sampling_rate: f64,
    low_hz: f64,
    high_hz: f64,
    order: usize,
) -> Result<Vec<f64>, PipelineError> {
    if !(low_hz > 0.0 && low_hz < high_hz) {
        return Err(PipelineError::InvalidParams {
            step: "filter:bandpass".to_string(),
            message: format!("require 0 < low ({low_hz}) < high ({high_hz})"),
        });
    }
    nyquist_check("filter:bandpass", sampling_rate, &[low_hz, high_hz])?;
    let hp = build_cascade("filter:bandpass", Type::HighPass, low_hz, sampling_rate, order)?;
    let lp = build_cascade("filter:bandpass", Type::LowPass, high_hz, sampling_rate, order)?;
    let stage1 = zero_phase(&hp, data);
    Ok(zero_phase(&lp, &stage1))
}

/// IIR notch at `center_hz` with quality factor `q`.
pub fn notch(data: &[f64], sampling_rate: f64, center_hz: f64, q: f64) -> Result<Vec<f64>, PipelineError> {
    nyquist_check("notch", sampling_rate, &[center_hz])?;
    if q <= 0.0 {
        return Err(PipelineError::InvalidParams {
            step: "notch".to_string(),
            message: "q must be positive".to_string(),
        });
    }
    let coeffs = Coefficients::<f64>::from_params(Type::Notch, sampling_rate.hz(), center_hz.hz(), q)
        .map_err(|_| PipelineError::InvalidParams {
            step: "notch".to_string(),
            message: format!("could not build notch coefficients at {center_hz} Hz"),
        })?;
    Ok(zero_phase(&[coeffs], data))
}

/// Cascaded notches at `base_hz, 2*base_hz, ..., n_harmonics*base_hz`
///, each zero-phase and with the same `q`.
pub fn comb(
    data: &[f64],
    sampling_rate: f64,
    base_hz: f64,
    q: f64,
    n_harmonics: usize,
) -> Result<Vec<f64>, PipelineError> {
    if n_harmonics == 0 {
        return Err(PipelineError::InvalidParams {
            step: "comb".to_string(),
            message: "n_harmonics must be at least 1".to_string(),
        });
    }
    let mut out = data.to_vec();
    for harmonic in 1..=n_harmonics {
        out = notch(&out, sampling_rate, base_hz * harmonic as f64, q).map_err(|e| match e {
            PipelineError::InvalidParams { message, .. } => {
                PipelineError::InvalidParams { step: "comb".to_string(), message }
            }
            other => other,
        })?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowpass_preserves_length() {
        let data = vec![0.0; 1000];
        let out = lowpass(&data, 1000.0, 50.0, 4).unwrap();
        assert_eq!(out.len(), data.len());
    }

    #[test]
    fn odd_order_is_rejected() {
        let data = vec![0.0; 100];
        assert!(lowpass(&data, 1000.0, 50.0, 3).is_err());
    }

    #[test]
    fn cutoff_above_nyquist_is_rejected() {
        let data = vec![0.0; 100];
        assert!(lowpass(&data, 1000.0, 600.0, 2).is_err());
    }

    #[test]
    fn bandpass_requires_ordered_bounds() {
        let data = vec![0.0; 100];
        assert!(bandpass(&data, 1000.0, 200.0, 100.0, 2).is_err());
    }

    #[test]
    fn lowpass_attenuates_high_frequency_sine() {
        let sampling_rate = 2000.0;
        let n = 2000;
        let data: Vec<f64> = (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * 500.0 * (i as f64 / sampling_rate)).sin())
            .collect();
        let out = lowpass(&data, sampling_rate, 20.0, 4).unwrap();
        let input_energy: f64 = data.iter().map(|v| v * v).sum();
        let output_energy: f64 = out.iter().map(|v| v * v).sum();
        assert!(output_energy < input_energy * 0.1);
    }

    #[test]
    fn comb_applies_all_harmonics() {
        let data = vec![1.0; 2000];
        let out = comb(&data, 2000.0, 60.0, 30.0, 3).unwrap();
        assert_eq!(out.len(), data.len());
    }
}
