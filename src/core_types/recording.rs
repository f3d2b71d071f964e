//! Recording: one loaded file's worth of Channels plus session metadata.
//! Produced by loaders; immutable from the core's perspective — nothing here mutates a Channel after insertion.

use std::collections::HashMap;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::channel::Channel;

/// A single loaded recording session. Exclusively owns its Channels; the registry and batch engine never hold a reference back
/// into a Recording beyond the scope of one item's processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub source_file: String,
    pub channels: HashMap<String, Channel>,
    /// Global sampling rate in Hz, if uniform across channels; `None` when
    /// channels carry heterogeneous rates.
    pub sampling_rate: Option<f64>,
    pub t_start: Option<f64>,
    pub session_start_time_dt: Option<DateTime<Utc>>,
    pub protocol_name: Option<String>,
    pub injected_current: Option<f64>,
    pub metadata: HashMap<String, JsonValue>,
}

impl Recording {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            channels: HashMap::new(),
            sampling_rate: None,
            t_start: None,
            session_start_time_dt: None,
            protocol_name: None,
            injected_current: None,
            metadata: HashMap::new(),
        }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.values().map(|c| c.name.as_str()).collect()
    }

    /// Maximum trial count across all channels; 0 if there are no channels.
    pub fn max_trials(&self) -> usize {
        self.channels.values().map(Channel::num_trials).max().unwrap_or(0)
    }

    /// Derived duration in seconds: the longest trial of the longest
    /// channel, given that channel's sampling rate. `None` when the
    /// recording has no channels with any samples.
    pub fn duration(&self) -> Option<f64> {
        self.channels
            .values()
            .filter_map(|c| {
                let rate = c.sampling_rate;
                if rate <= 0.0 {
                    return None;
                }
                (0..c.num_trials())
                    .map(|i| c.num_samples(i) as f64 / rate)
                    .fold(None, |acc, d| Some(acc.map_or(d, |m: f64| m.max(d))))
            })
            .fold(None, |acc, d| Some(acc.map_or(d, |m: f64| m.max(d))))
    }

    /// Resolves a tz-aware session start timestamp for export. Falls back
    /// to local-now (converted to UTC) rather than ever emitting a naive
    /// timestamp when the source metadata didn't carry one.
    pub fn resolved_session_start_time(&self) -> DateTime<Utc> {
        self.session_start_time_dt.unwrap_or_else(|| {
            tracing::warn!(
                source_file = %self.source_file,
                "session_start_time_dt missing at export; falling back to local-now (or UTC)"
            );
            Local::now().with_timezone(&Utc)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Channel;

    #[test]
    fn empty_recording_has_no_duration() {
        let r = Recording::new("a.abf");
        assert_eq!(r.duration(), None);
        assert_eq!(r.max_trials(), 0);
    }

    #[test]
    fn duration_uses_longest_trial_of_longest_channel() {
        let mut r = Recording::new("a.abf");
        r.channels.insert(
            "0".into(),
            Channel::new("0", "Vm", "mV", 1000.0, vec![vec![0.0; 2000]]),
        );
        assert!((r.duration().unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn missing_session_start_time_resolves_to_tz_aware() {
        let r = Recording::new("a.abf");
        let _resolved: DateTime<Utc> = r.resolved_session_start_time();
    }
}
