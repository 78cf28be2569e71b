//! Descriptive statistics used for data-quality flags and routing heuristics.
//!
//! Every function skips non-finite values and returns NaN for inputs with too
//! few finite points to define the statistic.

fn finite(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| v.is_finite())
}

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> f64 {
    let (n, sum) = finite(values).fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
    if n == 0 {
        return f64::NAN;
    }
    sum / n as f64
}

/// Unbiased sample variance (n - 1 denominator).
pub fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    let (n, ss) = finite(values).fold((0usize, 0.0), |(n, s), v| (n + 1, s + (v - m).powi(2)));
    if n < 2 {
        return f64::NAN;
    }
    ss / (n - 1) as f64
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Central moments m2, m3, m4 with the 1/n convention.
fn central_moments(values: &[f64]) -> Option<(f64, f64, f64)> {
    let m = mean(values);
    let mut n = 0usize;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in finite(values) {
        let d = v - m;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
        n += 1;
    }
    if n < 3 {
        return None;
    }
    let nf = n as f64;
    Some((m2 / nf, m3 / nf, m4 / nf))
}

/// Moment skewness g1 = m3 / m2^1.5. Zero for constant data.
pub fn skewness(values: &[f64]) -> f64 {
    match central_moments(values) {
        Some((m2, _, _)) if m2 <= 0.0 => 0.0,
        Some((m2, m3, _)) => m3 / m2.powf(1.5),
        None => f64::NAN,
    }
}

/// Excess kurtosis g2 = m4 / m2² - 3 (0 for a Normal). Zero for constant data.
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    match central_moments(values) {
        Some((m2, _, _)) if m2 <= 0.0 => 0.0,
        Some((m2, _, m4)) => m4 / (m2 * m2) - 3.0,
        None => f64::NAN,
    }
}

/// Coefficient of variation: sample std / |mean|.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if m == 0.0 || m.is_nan() {
        return f64::NAN;
    }
    std_dev(values) / m.abs()
}

/// Quantile of an already-sorted slice by linear interpolation.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() || p.is_nan() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let p = p.clamp(0.0, 1.0);
    let idx = p * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = idx - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// Finite values sorted ascending.
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = finite(values).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Quantile of unsorted data.
pub fn quantile(values: &[f64], p: f64) -> f64 {
    quantile_sorted(&sorted_finite(values), p)
}

/// Quartiles (Q1, median, Q3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

impl Quartiles {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// Quartiles of unsorted data; None when there are no finite values.
pub fn quartiles(values: &[f64]) -> Option<Quartiles> {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return None;
    }
    Some(Quartiles {
        q1: quantile_sorted(&sorted, 0.25),
        median: quantile_sorted(&sorted, 0.5),
        q3: quantile_sorted(&sorted, 0.75),
    })
}

/// Tukey fences (Q1 - k·IQR, Q3 + k·IQR).
pub fn tukey_fences(values: &[f64], k: f64) -> Option<(f64, f64)> {
    let q = quartiles(values)?;
    let iqr = q.iqr();
    Some((q.q1 - k * iqr, q.q3 + k * iqr))
}

/// Range max - min of the finite values.
pub fn range(values: &[f64]) -> f64 {
    let (lo, hi) = finite(values).fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo > hi {
        return f64::NAN;
    }
    hi - lo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    #[test]
    fn mean_and_variance() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(approx_eq(mean(&xs), 5.0, 1e-12));
        assert!(approx_eq(variance(&xs), 32.0 / 7.0, 1e-12));
        assert!(mean(&[]).is_nan());
        assert!(variance(&[1.0]).is_nan());
    }

    #[test]
    fn non_finite_values_are_skipped() {
        assert!(approx_eq(mean(&[1.0, f64::NAN, 3.0, f64::INFINITY]), 2.0, 1e-12));
    }

    #[test]
    fn symmetric_data_has_zero_skew() {
        let xs = [-3.0, -1.0, 0.0, 1.0, 3.0];
        assert!(approx_eq(skewness(&xs), 0.0, 1e-12));
    }

    #[test]
    fn right_tail_has_positive_skew() {
        let xs = [1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 20.0];
        assert!(skewness(&xs) > 1.0);
        assert!(excess_kurtosis(&xs) > 0.0);
    }

    #[test]
    fn two_point_data_has_minimal_kurtosis() {
        // A symmetric two-point distribution has m4/m2² = 1.
        let xs = [0.0, 0.0, 1.0, 1.0];
        assert!(approx_eq(excess_kurtosis(&xs), -2.0, 1e-12));
    }

    #[test]
    fn constant_data_moments() {
        let xs = [4.0; 6];
        assert_eq!(skewness(&xs), 0.0);
        assert_eq!(excess_kurtosis(&xs), 0.0);
        assert!(approx_eq(coefficient_of_variation(&xs), 0.0, 1e-12));
    }

    #[test]
    fn quantiles_interpolate() {
        let xs = [5.0, 1.0, 4.0, 2.0, 3.0];
        assert!(approx_eq(quantile(&xs, 0.5), 3.0, 1e-12));
        assert!(approx_eq(quantile(&xs, 0.25), 2.0, 1e-12));
        assert!(approx_eq(quantile(&xs, 0.1), 1.4, 1e-12));
        let q = quartiles(&xs).unwrap();
        assert!(approx_eq(q.iqr(), 2.0, 1e-12));
        assert!(quartiles(&[]).is_none());
    }

    #[test]
    fn tukey_fences_flag_far_values() {
        let xs = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0];
        let (lo, hi) = tukey_fences(&xs, 3.0).unwrap();
        assert!(lo < 10.0 && hi > 16.0);
        assert!(100.0 > hi);
    }

    #[test]
    fn range_of_values() {
        assert!(approx_eq(range(&[3.0, -1.0, 7.5]), 8.5, 1e-12));
        assert!(range(&[]).is_nan());
    }
}
