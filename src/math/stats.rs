//! Descriptive statistics over plain slices.
//!
//! Empty input yields `0.0` rather than `NaN` so that summaries of an empty
//! residual set stay serializable.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with divisor `n`.
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / values.len() as f64).sqrt()
}

/// Standard deviation with divisor `n - 1` (zero for fewer than two values).
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Pearson correlation of two equally long samples; `None` for fewer than
/// two pairs or a constant sample.
pub fn correlation(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let (mx, my) = (mean(xs), mean(ys));
    let cov: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum::<f64>() / (xs.len() - 1) as f64;
    let scale = sample_std(xs) * sample_std(ys);
    (scale > 0.0).then(|| cov / scale)
}

pub fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moments_of_small_sample() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&xs) - 5.0).abs() < 1e-12);
        assert!((population_std(&xs) - 2.0).abs() < 1e-12);
        assert!((sample_std(&xs) - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(max_abs(&[-3.5, 1.0, 2.0]), 3.5);
    }

    #[test]
    fn correlation_of_linear_and_constant_samples() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        assert!((correlation(&xs, &[1.0, 3.0, 5.0, 7.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((correlation(&xs, &[4.0, 2.0, 0.0, -2.0]).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(correlation(&xs, &[2.0; 4]), None);
        assert_eq!(correlation(&[1.0], &[1.0]), None);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(population_std(&[]), 0.0);
        assert_eq!(sample_std(&[1.0]), 0.0);
        assert_eq!(max_abs(&[]), 0.0);
    }
}
