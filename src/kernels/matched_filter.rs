//! FFT-based matched filtering: cross-correlates a representative event
//! waveform against a trace via overlap-save FFT convolution.

use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

/// Cross-correlates `signal` against `template`, returning a result the
/// same length as `signal` and centered the way `scipy.signal.correlate(
/// signal, template, mode='same')` is: output index `i` corresponds to
/// sliding `template` so its center aligns with `signal[i]`.
///
/// Implemented as FFT convolution of `signal` with the time-reversed
/// template (cross-correlation = convolution with the reversed kernel),
/// zero-padded to the next power of two for `rustfft`.
pub fn cross_correlate_same(signal: &[f64], template: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let m = template.len();
    if n == 0 || m == 0 {
        return vec![0.0; n];
    }

    let reversed: Vec<f64> = template.iter().rev().copied().collect();
    let full_len = n + m - 1;
    let fft_len = full_len.next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(fft_len);
    let ifft = planner.plan_fft_inverse(fft_len);

    let mut a: Vec<Complex64> = signal.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    a.resize(fft_len, Complex64::new(0.0, 0.0));
    let mut b: Vec<Complex64> = reversed.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    b.resize(fft_len, Complex64::new(0.0, 0.0));

    fft.process(&mut a);
    fft.process(&mut b);

    for (x, y) in a.iter_mut().zip(b.iter()) {
        *x *= y;
    }

    ifft.process(&mut a);
    let scale = 1.0 / fft_len as f64;
    let full: Vec<f64> = a.iter().take(full_len).map(|c| c.re * scale).collect();

    // 'full' has length n+m-1; 'same' keeps the centered n samples, which
    // for correlation (reversed-template convolution) start at offset
    // (m - 1) / 2, matching numpy/scipy's centering convention.
    let start = (m - 1) / 2;
    full.into_iter().skip(start).take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_mode_output_matches_input_length() {
        let signal = vec![0.0; 100];
        let template = vec![1.0, -1.0, 1.0];
        let out = cross_correlate_same(&signal, &template);
        assert_eq!(out.len(), signal.len());
    }

    #[test]
    fn correlation_peaks_where_template_matches() {
        let mut signal = vec![0.0; 50];
        let template = vec![0.0, 1.0, 2.0, 1.0, 0.0];
        let insert_at = 20;
        for (i, &v) in template.iter().enumerate() {
            signal[insert_at + i] = v;
        }
        let out = cross_correlate_same(&signal, &template);
        let peak_idx = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        let expected_center = insert_at + template.len() / 2;
        assert!((peak_idx as isize - expected_center as isize).abs() <= 2);
    }
}
