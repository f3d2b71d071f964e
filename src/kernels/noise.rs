//! Robust noise estimation.

/// Population standard deviation of `x`. Returns 0.0 for fewer than 2 samples.
pub fn std_dev(x: &[f64]) -> f64 {
    if x.len() < 2 {
        return 0.0;
    }
    let mean = x.iter().sum::<f64>() / x.len() as f64;
    let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / x.len() as f64;
    var.sqrt()
}

/// Median Absolute Deviation, scaled by 1.4826 to be consistent with a
/// Gaussian standard deviation. When the scaled MAD would be zero, a floor
/// of `1e-12` is substituted so downstream divisions never produce `inf`.
pub fn mad(x: &[f64]) -> f64 {
    const SCALE: f64 = 1.4826;
    const FLOOR: f64 = 1e-12;

    if x.is_empty() {
        return FLOOR;
    }
    let med = median(x);
    let abs_dev: Vec<f64> = x.iter().map(|v| (v - med).abs()).collect();
    let scaled = SCALE * median(&abs_dev);
    if scaled <= FLOOR {
        FLOOR
    } else {
        scaled
    }
}

fn median(x: &[f64]) -> f64 {
    let mut sorted = x.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_dev_of_constant_is_zero() {
        assert_eq!(std_dev(&[2.0, 2.0, 2.0]), 0.0);
    }

    #[test]
    fn std_dev_matches_known_value() {
        let x = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&x) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn mad_of_constant_floors_to_minimum() {
        assert_eq!(mad(&[3.0, 3.0, 3.0]), 1e-12);
    }

    #[test]
    fn mad_scales_by_gaussian_constant() {
        // Symmetric spread around 0 with known absolute deviation of 1.0.
        let x = [-1.0, -1.0, 0.0, 1.0, 1.0];
        assert!((mad(&x) - 1.4826).abs() < 1e-9);
    }

    #[test]
    fn mad_is_robust_to_outlier() {
        let mut x = vec![0.0; 19];
        x.push(1000.0);
        assert!(mad(&x) < 1.0);
    }
}
