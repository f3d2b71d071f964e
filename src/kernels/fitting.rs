//! Bounded nonlinear least-squares curve fitting, used by the
//! membrane time constant and capacitance analyses to fit mono- and
//! bi-exponential decays. Bounds on time constants are enforced by
//! reparameterizing `tau` through a sigmoid rather than by clamping the
//! raw optimizer state, so Levenberg-Marquardt always sees an unconstrained
//! problem.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::{DMatrix, DVector, Dyn, Owned};

/// Outcome of a curve-fit optimization. Analyses surface this alongside the
/// fitted parameters rather than discarding it, so a stalled fit is
/// reported rather than silently accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitOutcome {
    Converged,
    NoImprovementPossible,
    NumericalFailure,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonoExpFit {
    pub amplitude: f64,
    pub tau: f64,
    pub offset: f64,
    pub r_squared: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiExpFit {
    pub amplitude_fast: f64,
    pub tau_fast: f64,
    pub amplitude_slow: f64,
    pub tau_slow: f64,
    pub offset: f64,
    pub r_squared: f64,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Inverts the sigmoid bound map to seed the optimizer at a fractional
/// position within `(tau_min, tau_max)`.
fn unbounded_seed(tau_guess: f64, tau_min: f64, tau_max: f64) -> f64 {
    let frac = ((tau_guess - tau_min) / (tau_max - tau_min)).clamp(1e-6, 1.0 - 1e-6);
    (frac / (1.0 - frac)).ln()
}

fn bounded_tau(p: f64, tau_min: f64, tau_max: f64) -> f64 {
    tau_min + (tau_max - tau_min) * sigmoid(p)
}

fn dtau_dp(p: f64, tau_min: f64, tau_max: f64) -> f64 {
    let s = sigmoid(p);
    (tau_max - tau_min) * s * (1.0 - s)
}

fn outcome_from(reason: &TerminationReason) -> FitOutcome {
    match reason {
        TerminationReason::Converged { .. } => FitOutcome::Converged,
        TerminationReason::NoImprovementPossible(_) | TerminationReason::LostPatience => {
            FitOutcome::NoImprovementPossible
        }
        _ => FitOutcome::NumericalFailure,
    }
}

fn r_squared(y: &[f64], predicted: &[f64]) -> f64 {
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let ss_res: f64 = y.iter().zip(predicted.iter()).map(|(a, b)| (a - b).powi(2)).sum();
    if ss_tot <= f64::EPSILON {
        1.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

struct MonoExpProblem<'a> {
    t: &'a [f64],
    y: &'a [f64],
    params: DVector<f64>,
    tau_min: f64,
    tau_max: f64,
}

impl<'a> LeastSquaresProblem<f64, Dyn, Dyn> for MonoExpProblem<'a> {
    type ParameterStorage = Owned<f64, Dyn>;
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;

    fn set_params(&mut self, params: &DVector<f64>) {
        self.params = params.clone();
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let tau = bounded_tau(self.params[1], self.tau_min, self.tau_max);
        let (amplitude, offset) = (self.params[0], self.params[2]);
        Some(DVector::from_iterator(
            self.t.len(),
            self.t.iter().zip(self.y.iter()).map(|(&ti, &yi)| {
                amplitude * (-ti / tau).exp() + offset - yi
            }),
        ))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let tau = bounded_tau(self.params[1], self.tau_min, self.tau_max);
        let dtau = dtau_dp(self.params[1], self.tau_min, self.tau_max);
        let amplitude = self.params[0];
        let mut j = DMatrix::zeros(self.t.len(), 3);
        for (i, &ti) in self.t.iter().enumerate() {
            let e = (-ti / tau).exp();
            j[(i, 0)] = e;
            j[(i, 1)] = amplitude * e * (ti / (tau * tau)) * dtau;
            j[(i, 2)] = 1.0;
        }
        Some(j)
    }
}

/// Fits `y(t) = amplitude * exp(-t / tau) + offset`, constraining `tau` to
/// `tau_bounds`. Requires at least 3 samples, the minimum needed to
/// determine the 3 free parameters. Returns `None` on malformed input
/// (length mismatch or too few points), otherwise the fit plus its
/// convergence outcome.
pub fn fit_mono_exponential(
    t: &[f64],
    y: &[f64],
    tau_bounds: (f64, f64),
) -> Option<(MonoExpFit, FitOutcome)> {
    if t.len() != y.len() || t.len() < 3 {
        return None;
    }
    let (tau_min, tau_max) = tau_bounds;
    let amplitude0 = y[0] - y[y.len() - 1];
    let offset0 = *y.last().unwrap();
    let tau0 = unbounded_seed((tau_min + tau_max) / 2.0, tau_min, tau_max);

    let problem = MonoExpProblem {
        t,
        y,
        params: DVector::from_vec(vec![amplitude0, tau0, offset0]),
        tau_min,
        tau_max,
    };

    let (result, report) = LevenbergMarquardt::new().minimize(problem);
    let outcome = outcome_from(&report.termination);

    let tau = bounded_tau(result.params[1], tau_min, tau_max);
    let amplitude = result.params[0];
    let offset = result.params[2];
    let predicted: Vec<f64> = t.iter().map(|&ti| amplitude * (-ti / tau).exp() + offset).collect();

    Some((MonoExpFit { amplitude, tau, offset, r_squared: r_squared(y, &predicted) }, outcome))
}

struct BiExpProblem<'a> {
    t: &'a [f64],
    y: &'a [f64],
    params: DVector<f64>,
    tau_fast_bounds: (f64, f64),
    tau_slow_bounds: (f64, f64),
}

impl<'a> LeastSquaresProblem<f64, Dyn, Dyn> for BiExpProblem<'a> {
    type ParameterStorage = Owned<f64, Dyn>;
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;

    fn set_params(&mut self, params: &DVector<f64>) {
        self.params = params.clone();
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let (tf_min, tf_max) = self.tau_fast_bounds;
        let (ts_min, ts_max) = self.tau_slow_bounds;
        let tau_fast = bounded_tau(self.params[1], tf_min, tf_max);
        let tau_slow = bounded_tau(self.params[3], ts_min, ts_max);
        let (af, a_s, offset) = (self.params[0], self.params[2], self.params[4]);
        Some(DVector::from_iterator(
            self.t.len(),
            self.t.iter().zip(self.y.iter()).map(|(&ti, &yi)| {
                af * (-ti / tau_fast).exp() + a_s * (-ti / tau_slow).exp() + offset - yi
            }),
        ))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let (tf_min, tf_max) = self.tau_fast_bounds;
        let (ts_min, ts_max) = self.tau_slow_bounds;
        let tau_fast = bounded_tau(self.params[1], tf_min, tf_max);
        let tau_slow = bounded_tau(self.params[3], ts_min, ts_max);
        let dtf = dtau_dp(self.params[1], tf_min, tf_max);
        let dts = dtau_dp(self.params[3], ts_min, ts_max);
        let (af, a_s) = (self.params[0], self.params[2]);

        let mut j = DMatrix::zeros(self.t.len(), 5);
        for (i, &ti) in self.t.iter().enumerate() {
            let ef = (-ti / tau_fast).exp();
            let es = (-ti / tau_slow).exp();
            j[(i, 0)] = ef;
            j[(i, 1)] = af * ef * (ti / (tau_fast * tau_fast)) * dtf;
            j[(i, 2)] = es;
            j[(i, 3)] = a_s * es * (ti / (tau_slow * tau_slow)) * dts;
            j[(i, 4)] = 1.0;
        }
        Some(j)
    }
}

/// Fits `y(t) = a_fast * exp(-t/tau_fast) + a_slow * exp(-t/tau_slow) +
/// offset`, with independent bounds on each time constant. Requires at
/// least 6 samples so the 5-parameter model stays identifiable.
pub fn fit_bi_exponential(
    t: &[f64],
    y: &[f64],
    tau_fast_bounds: (f64, f64),
    tau_slow_bounds: (f64, f64),
) -> Option<(BiExpFit, FitOutcome)> {
    if t.len() != y.len() || t.len() < 6 {
        return None;
    }
    let total_amplitude = y[0] - y[y.len() - 1];
    let offset0 = *y.last().unwrap();
    let tau_fast0 = unbounded_seed(
        (tau_fast_bounds.0 + tau_fast_bounds.1) / 2.0,
        tau_fast_bounds.0,
        tau_fast_bounds.1,
    );
    let tau_slow0 = unbounded_seed(
        (tau_slow_bounds.0 + tau_slow_bounds.1) / 2.0,
        tau_slow_bounds.0,
        tau_slow_bounds.1,
    );

    let problem = BiExpProblem {
        t,
        y,
        params: DVector::from_vec(vec![
            total_amplitude * 0.7,
            tau_fast0,
            total_amplitude * 0.3,
            tau_slow0,
            offset0,
        ]),
        tau_fast_bounds,
        tau_slow_bounds,
    };

    let (result, report) = LevenbergMarquardt::new().minimize(problem);
    let outcome = outcome_from(&report.termination);

    let tau_fast = bounded_tau(result.params[1], tau_fast_bounds.0, tau_fast_bounds.1);
    let tau_slow = bounded_tau(result.params[3], tau_slow_bounds.0, tau_slow_bounds.1);
    let amplitude_fast = result.params[0];
    let amplitude_slow = result.params[2];
    let offset = result.params[4];
    let predicted: Vec<f64> = t
        .iter()
        .map(|&ti| {
            amplitude_fast * (-ti / tau_fast).exp() + amplitude_slow * (-ti / tau_slow).exp() + offset
        })
        .collect();

    Some((
        BiExpFit {
            amplitude_fast,
            tau_fast,
            amplitude_slow,
            tau_slow,
            offset,
            r_squared: r_squared(y, &predicted),
        },
        outcome,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth_mono(t: &[f64], amplitude: f64, tau: f64, offset: f64) -> Vec<f64> {
        t.iter().map(|&ti| amplitude * (-ti / tau).exp() + offset).collect()
    }

    #[test]
    fn mono_exponential_recovers_known_tau() {
        let t: Vec<f64> = (0..200).map(|i| i as f64 * 0.001).collect();
        let y = synth_mono(&t, -10.0, 0.02, -65.0);
        let (fit, outcome) = fit_mono_exponential(&t, &y, (0.001, 0.2)).unwrap();
        assert_eq!(outcome, FitOutcome::Converged);
        assert!((fit.tau - 0.02).abs() < 1e-3);
        assert!(fit.r_squared > 0.99);
    }

    #[test]
    fn mono_exponential_rejects_short_input() {
        assert!(fit_mono_exponential(&[0.0, 1.0], &[1.0, 2.0], (0.001, 1.0)).is_none());
    }

    #[test]
    fn mono_exponential_accepts_minimum_sample_count() {
        let t = [0.0, 0.01, 0.02];
        let y = synth_mono(&t, -10.0, 0.02, -65.0);
        assert!(fit_mono_exponential(&t, &y, (0.001, 0.2)).is_some());
    }

    #[test]
    fn bi_exponential_rejects_short_input() {
        assert!(fit_bi_exponential(
            &[0.0, 1.0, 2.0],
            &[1.0, 2.0, 3.0],
            (0.001, 0.01),
            (0.05, 0.5)
        )
        .is_none());
    }

    #[test]
    fn tau_stays_within_bounds_even_from_poor_seed() {
        let t: Vec<f64> = (0..100).map(|i| i as f64 * 0.001).collect();
        let y = synth_mono(&t, 5.0, 0.15, 0.0);
        let (fit, _) = fit_mono_exponential(&t, &y, (0.01, 0.2)).unwrap();
        assert!(fit.tau >= 0.01 && fit.tau <= 0.2);
    }
}
