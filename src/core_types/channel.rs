//! Channel: one logical data channel of a Recording, carrying one or more
//! trials (sweeps) of sampled data. Out-of-range access returns `None`
//! rather than panicking or raising.

use serde::{Deserialize, Serialize};

/// Optional electrode/pipette metadata carried alongside a channel's samples.
/// All fields are nullable; loaders populate what they know.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ElectrodeMetadata {
    pub description: Option<String>,
    pub location: Option<String>,
    pub filtering: Option<String>,
    pub gain: Option<f64>,
    pub offset: Option<f64>,
    pub resistance: Option<String>,
    pub seal: Option<String>,
}

/// One logical recording channel: a sequence of trials sharing one sampling
/// rate and a start time relative to the owning Recording.
///
/// Channels own their `data_trials` exclusively; nothing in
/// this crate mutates a trial after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub units: String,
    pub sampling_rate: f64,
    pub t_start: f64,
    pub data_trials: Vec<Vec<f64>>,
    pub electrode: ElectrodeMetadata,
}

impl Channel {
    /// Constructs a Channel. `units` falls back to `"unknown"` when empty.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        units: impl Into<String>,
        sampling_rate: f64,
        data_trials: Vec<Vec<f64>>,
    ) -> Self {
        let units = units.into();
        let units = if units.is_empty() { "unknown".to_string() } else { units };
        Self {
            id: id.into(),
            name: name.into(),
            units,
            sampling_rate,
            t_start: 0.0,
            data_trials,
            electrode: ElectrodeMetadata::default(),
        }
    }

    pub fn num_trials(&self) -> usize {
        self.data_trials.len()
    }

    /// Length of a given trial, or 0 if the index is absent.
    pub fn num_samples(&self, trial_index: usize) -> usize {
        self.data_trials.get(trial_index).map_or(0, |t| t.len())
    }

    fn valid_rate(&self) -> Option<f64> {
        (self.sampling_rate > 0.0 && self.sampling_rate.is_finite()).then_some(self.sampling_rate)
    }

    /// Returns the data for `trial_index`, or `None` if the index is out of
    /// range.
    pub fn get_data(&self, trial_index: usize) -> Option<&[f64]> {
        self.data_trials.get(trial_index).map(|v| v.as_slice())
    }

    /// Lazily computes the absolute time vector for a trial:
    /// `t_k = k / sampling_rate + t_start`. Returns `None` for an absent
    /// trial, an empty trial, or a non-positive sampling rate.
    pub fn get_time_vector(&self, trial_index: usize) -> Option<Vec<f64>> {
        self.time_vector_with_offset(trial_index, self.t_start)
    }

    /// Relative time vector (offset = 0).
    pub fn get_relative_time_vector(&self, trial_index: usize) -> Option<Vec<f64>> {
        self.time_vector_with_offset(trial_index, 0.0)
    }

    /// Length of the relative time vector without materializing it.
    pub fn relative_time_vector_len(&self, trial_index: usize) -> usize {
        self.num_samples(trial_index)
    }

    fn time_vector_with_offset(&self, trial_index: usize, offset: f64) -> Option<Vec<f64>> {
        let n = self.get_data(trial_index)?.len();
        let rate = self.valid_rate()?;
        if n == 0 {
            return None;
        }
        Some((0..n).map(|k| k as f64 / rate + offset).collect())
    }

    /// Averages all trials. Requires every trial to share the same length;
    /// a single-trial channel returns that trial unchanged. Returns `None`
    /// for zero trials or mismatched lengths.
    pub fn get_averaged_data(&self) -> Option<Vec<f64>> {
        match self.data_trials.as_slice() {
            [] => {
                tracing::debug!(channel = %self.name, "cannot average: no trials");
                None
            }
            [only] => Some(only.clone()),
            trials => {
                let first_len = trials[0].len();
                if trials.iter().any(|t| t.len() != first_len) {
                    tracing::error!(
                        channel = %self.name,
                        "cannot average: trials have differing lengths"
                    );
                    return None;
                }
                if first_len == 0 {
                    return None;
                }
                let mut acc = vec![0.0f64; first_len];
                for trial in trials {
                    for (a, v) in acc.iter_mut().zip(trial.iter()) {
                        *a += *v;
                    }
                }
                let n = trials.len() as f64;
                for a in acc.iter_mut() {
                    *a /= n;
                }
                Some(acc)
            }
        }
    }

    /// Time vector matching `get_averaged_data`'s length, using this
    /// channel's own sampling rate and `t_start`.
    pub fn get_averaged_time_vector(&self) -> Option<Vec<f64>> {
        let n = self.get_averaged_data()?.len();
        let rate = self.valid_rate()?;
        if n == 0 {
            return None;
        }
        Some((0..n).map(|k| k as f64 / rate + self.t_start).collect())
    }

    pub fn get_relative_averaged_time_vector(&self) -> Option<Vec<f64>> {
        let n = self.get_averaged_data()?.len();
        let rate = self.valid_rate()?;
        if n == 0 {
            return None;
        }
        Some((0..n).map(|k| k as f64 / rate).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(trials: Vec<Vec<f64>>) -> Channel {
        Channel::new("0", "Vm", "mV", 1000.0, trials)
    }

    #[test]
    fn time_vector_spacing_is_exact() {
        let c = ch(vec![vec![0.0; 10]]);
        let tv = c.get_relative_time_vector(0).unwrap();
        for w in tv.windows(2) {
            assert!((w[1] - w[0] - 1.0 / 1000.0).abs() < 1e-12);
        }
    }

    #[test]
    fn averaging_idempotent_on_single_trial() {
        let data = vec![1.0, 2.0, 3.0];
        let c = ch(vec![data.clone()]);
        assert_eq!(c.get_averaged_data().unwrap(), data);
    }

    #[test]
    fn averaging_fails_on_mismatched_lengths() {
        let c = ch(vec![vec![1.0, 2.0], vec![1.0, 2.0, 3.0]]);
        assert!(c.get_averaged_data().is_none());
    }

    #[test]
    fn zero_trial_channel_returns_absent() {
        let c = ch(vec![]);
        assert!(c.get_data(0).is_none());
        assert!(c.get_time_vector(0).is_none());
        assert!(c.get_averaged_data().is_none());
    }

    #[test]
    fn units_fall_back_to_unknown() {
        let c = Channel::new("0", "Vm", "", 1000.0, vec![vec![0.0]]);
        assert_eq!(c.units, "unknown");
    }

    #[test]
    fn out_of_range_trial_is_absent_not_panic() {
        let c = ch(vec![vec![1.0, 2.0]]);
        assert!(c.get_data(5).is_none());
        assert!(c.get_relative_time_vector(5).is_none());
    }
}
