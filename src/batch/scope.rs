//! Resolving a batch item's `(channel, scope, trial_index?)` to one or
//! more 1-D traces.

use crate::core_types::{Channel, Recording};

/// How an item's channel is reduced to one or more traces before the
/// preprocessing pipeline and analyses run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every trial of the recording's default channel (preferred voltage
    /// channel, auto-selected — the item's `channel_id` is ignored).
    Recording,
    /// Every trial of the named channel.
    AllTrials,
    /// Trial 0 only.
    FirstTrial,
    /// The trial-wise average, requiring every trial to share one length.
    AverageTrace,
    /// Exactly the trial named by the item's `trial_index`.
    SpecificTrial,
}

impl Scope {
    pub fn label(&self) -> &'static str {
        match self {
            Scope::Recording => "recording",
            Scope::AllTrials => "all_trials",
            Scope::FirstTrial => "first_trial",
            Scope::AverageTrace => "average_trace",
            Scope::SpecificTrial => "specific_trial",
        }
    }
}

/// One resolved trace: its originating trial index (`None` for an
/// averaged trace), the samples and the matching time vector.
pub struct ResolvedTrace {
    pub trial_index: Option<usize>,
    pub data: Vec<f64>,
    pub time: Vec<f64>,
}

/// Picks the channel a `Scope::Recording` item should use: the
/// lexicographically-first channel id whose units look like a voltage
/// (case-insensitive substring "v"), falling back to the
/// lexicographically-first channel of any kind. Channel ids are sorted
/// first so the choice is deterministic regardless of `HashMap` order.
pub fn preferred_voltage_channel(recording: &Recording) -> Option<&Channel> {
    let mut ids: Vec<&String> = recording.channels.keys().collect();
    ids.sort();

    ids.iter()
        .filter_map(|id| recording.channels.get(*id))
        .find(|c| c.units.to_ascii_lowercase().contains('v'))
        .or_else(|| ids.first().and_then(|id| recording.channels.get(id.as_str())))
}

/// Resolves `scope` against `channel`, returning every trace the scope
/// implies. `Err` carries a human-readable reason (out-of-range trial,
/// mismatched trial lengths for averaging, ...).
pub fn resolve(channel: &Channel, scope: Scope, trial_index: Option<usize>) -> Result<Vec<ResolvedTrace>, String> {
    match scope {
        Scope::Recording | Scope::AllTrials => {
            let n = channel.num_trials();
            if n == 0 {
                return Err("channel has no trials".to_string());
            }
            (0..n)
                .map(|i| {
                    let data = channel.get_data(i).ok_or_else(|| format!("trial {i} is absent"))?.to_vec();
                    let time = channel
                        .get_relative_time_vector(i)
                        .ok_or_else(|| format!("trial {i} has no time vector"))?;
                    Ok(ResolvedTrace { trial_index: Some(i), data, time })
                })
                .collect()
        }
        Scope::FirstTrial => {
            let data = channel.get_data(0).ok_or("channel has no trials")?.to_vec();
            let time = channel.get_relative_time_vector(0).ok_or("first trial has no time vector")?;
            Ok(vec![ResolvedTrace { trial_index: Some(0), data, time }])
        }
        Scope::AverageTrace => {
            let data = channel.get_averaged_data().ok_or("cannot average trials of differing length")?;
            let time = channel
                .get_relative_averaged_time_vector()
                .ok_or("cannot build a time vector for the averaged trace")?;
            Ok(vec![ResolvedTrace { trial_index: None, data, time }])
        }
        Scope::SpecificTrial => {
            let idx = trial_index.ok_or("specific_trial scope requires a trial_index")?;
            let data = channel.get_data(idx).ok_or_else(|| format!("trial {idx} is out of range"))?.to_vec();
            let time = channel
                .get_relative_time_vector(idx)
                .ok_or_else(|| format!("trial {idx} has no time vector"))?;
            Ok(vec![ResolvedTrace { trial_index: Some(idx), data, time }])
        }
    }
}
