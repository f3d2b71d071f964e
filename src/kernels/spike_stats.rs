//! Inter-spike-interval regularity statistics: coefficient of
//! variation, CV2 (Holt et al. 1996) and local variation LV (Shinomoto et
//! al. 2003), used by the spike-train dynamics analysis.

/// Summary of ISI-derived regularity measures for one spike train.
#[derive(Debug, Clone, PartialEq)]
pub struct IsiStats {
    pub isis: Vec<f64>,
    pub mean_isi: f64,
    pub cv: f64,
    pub cv2: f64,
    pub lv: f64,
}

/// Computes `IsiStats` from a sequence of spike times (seconds, ascending).
/// Requires at least 3 spikes (2 ISIs) to compute CV2/LV; `None` otherwise.
pub fn isi_stats(spike_times: &[f64]) -> Option<IsiStats> {
    if spike_times.len() < 3 {
        return None;
    }
    let isis: Vec<f64> = spike_times.windows(2).map(|w| w[1] - w[0]).collect();
    let mean_isi = isis.iter().sum::<f64>() / isis.len() as f64;
    Some(IsiStats {
        cv: cv(&isis),
        cv2: cv2(&isis),
        lv: lv(&isis),
        mean_isi,
        isis,
    })
}

/// Coefficient of variation: `std(isis) / mean(isis)`. Requires at least 2
/// ISIs (i.e. at least 3 spikes); returns 0.0 otherwise.
pub fn cv(isis: &[f64]) -> f64 {
    if isis.len() < 2 {
        return 0.0;
    }
    let mean = isis.iter().sum::<f64>() / isis.len() as f64;
    if mean.abs() < f64::EPSILON {
        return 0.0;
    }
    let var = isis.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / isis.len() as f64;
    var.sqrt() / mean
}

/// CV2 (Holt et al. 1996): the mean, over consecutive ISI pairs, of
/// `2 * |ISI[i+1] - ISI[i]| / (ISI[i+1] + ISI[i])`. Local measure of
/// irregularity robust to slow firing-rate drift.
pub fn cv2(isis: &[f64]) -> f64 {
    if isis.len() < 2 {
        return 0.0;
    }
    let terms: Vec<f64> = isis
        .windows(2)
        .filter_map(|w| {
            let denom = w[0] + w[1];
            (denom.abs() > f64::EPSILON).then(|| 2.0 * (w[1] - w[0]).abs() / denom)
        })
        .collect();
    if terms.is_empty() {
        return 0.0;
    }
    terms.iter().sum::<f64>() / terms.len() as f64
}

/// Local Variation (Shinomoto et al. 2003): the mean, over consecutive ISI
/// pairs, of `3 * (ISI[i] - ISI[i+1])^2 / (ISI[i] + ISI[i+1])^2`.
pub fn lv(isis: &[f64]) -> f64 {
    if isis.len() < 2 {
        return 0.0;
    }
    let terms: Vec<f64> = isis
        .windows(2)
        .filter_map(|w| {
            let denom = w[0] + w[1];
            (denom.abs() > f64::EPSILON)
                .then(|| 3.0 * (w[0] - w[1]).powi(2) / denom.powi(2))
        })
        .collect();
    if terms.is_empty() {
        return 0.0;
    }
    terms.iter().sum::<f64>() / terms.len() as f64
}
