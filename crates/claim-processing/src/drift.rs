//! Two-sample drift statistics.

use std::collections::HashMap;

/// Result of a two-sample Kolmogorov-Smirnov test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsResult {
    /// Largest distance between the two empirical CDFs.
    pub statistic: f64,
    /// Asymptotic two-sided p-value.
    pub p_value: f64,
}

/// Two-sample KS test between `reference` and `current`.
///
/// Returns `None` when either sample is empty. NaNs are ignored.
pub fn ks_two_sample(reference: &[f64], current: &[f64]) -> Option<KsResult> {
    let mut a: Vec<f64> = reference.iter().copied().filter(|v| !v.is_nan()).collect();
    let mut b: Vec<f64> = current.iter().copied().filter(|v| !v.is_nan()).collect();
    if a.is_empty() || b.is_empty() {
        return None;
    }
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let (n, m) = (a.len(), b.len());
    let (mut i, mut j) = (0usize, 0usize);
    let mut statistic = 0.0f64;
    while i < n && j < m {
        let value = a[i].min(b[j]);
        // Step past ties on both sides before comparing the CDFs.
        while i < n && a[i] <= value {
            i += 1;
        }
        while j < m && b[j] <= value {
            j += 1;
        }
        let distance = (i as f64 / n as f64 - j as f64 / m as f64).abs();
        statistic = statistic.max(distance);
    }

    let effective = ((n * m) as f64 / (n + m) as f64).sqrt();
    let p_value = kolmogorov_survival((effective + 0.12 + 0.11 / effective) * statistic);
    Some(KsResult { statistic, p_value })
}

/// `Q_KS(lambda) = 2 * sum_{k>=1} (-1)^(k-1) exp(-2 k^2 lambda^2)`.
fn kolmogorov_survival(lambda: f64) -> f64 {
    if lambda < 1e-3 {
        return 1.0;
    }
    let mut sum = 0.0;
    let mut sign = 1.0;
    let mut previous_term = 0.0f64;
    for k in 1..=100 {
        let k = k as f64;
        let term = sign * 2.0 * (-2.0 * k * k * lambda * lambda).exp();
        sum += term;
        if term.abs() <= 1e-10 * previous_term.abs() || term.abs() <= 1e-16 * sum.abs() {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        previous_term = term;
    }
    // Series did not converge; only happens for tiny lambda.
    1.0
}

/// Total variation distance between the category frequencies of two samples.
///
/// Missing values count as their own category. Returns `None` when either
/// sample is empty.
pub fn total_variation_distance(reference: &[Option<String>], current: &[Option<String>]) -> Option<f64> {
    if reference.is_empty() || current.is_empty() {
        return None;
    }
    fn frequencies(sample: &[Option<String>]) -> HashMap<Option<&str>, f64> {
        let mut counts: HashMap<Option<&str>, f64> = HashMap::new();
        for value in sample {
            *counts.entry(value.as_deref()).or_insert(0.0) += 1.0;
        }
        let total = sample.len() as f64;
        counts.values_mut().for_each(|c| *c /= total);
        counts
    }

    let p = frequencies(reference);
    let q = frequencies(current);
    let mut distance = 0.0;
    for (category, p_freq) in &p {
        distance += (p_freq - q.get(category).copied().unwrap_or(0.0)).abs();
    }
    for (category, q_freq) in &q {
        if !p.contains_key(category) {
            distance += q_freq;
        }
    }
    Some(distance / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_ks_identical_samples() {
        let sample: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let result = ks_two_sample(&sample, &sample).unwrap();
        assert_eq!(result.statistic, 0.0);
        assert!(result.p_value > 0.99);
    }

    #[test]
    fn test_ks_shifted_samples_drift() {
        let reference: Vec<f64> = (0..300).map(|i| i as f64).collect();
        let current: Vec<f64> = (0..300).map(|i| i as f64 + 150.0).collect();
        let result = ks_two_sample(&reference, &current).unwrap();
        assert!((result.statistic - 0.5).abs() < 1e-9);
        assert!(result.p_value < 0.001);
    }

    #[test]
    fn test_ks_interleaved_samples_do_not_drift() {
        let reference: Vec<f64> = (0..400).filter(|i| i % 2 == 0).map(|i| i as f64).collect();
        let current: Vec<f64> = (0..400).filter(|i| i % 2 == 1).map(|i| i as f64).collect();
        let result = ks_two_sample(&reference, &current).unwrap();
        assert!(result.statistic < 0.01);
        assert!(result.p_value > 0.5);
    }

    #[test]
    fn test_ks_handles_ties() {
        let reference = vec![0.0, 0.0, 1.0, 1.0];
        let current = vec![0.0, 1.0, 1.0, 1.0];
        let result = ks_two_sample(&reference, &current).unwrap();
        assert!((result.statistic - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_ks_empty_sample() {
        assert!(ks_two_sample(&[], &[1.0]).is_none());
    }

    #[test]
    fn test_tvd() {
        let a = strings(&["Male", "Male", "Female", "Female"]);
        assert_eq!(total_variation_distance(&a, &a), Some(0.0));

        let b = strings(&["Male", "Male", "Male", "Male"]);
        assert!((total_variation_distance(&a, &b).unwrap() - 0.5).abs() < 1e-12);

        let c = strings(&["Other"]);
        assert!((total_variation_distance(&a, &c).unwrap() - 1.0).abs() < 1e-12);
    }
}
