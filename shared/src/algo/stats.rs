//! Statistical functions for validating samplers

use scilib::math::basic::erf;
use std::f64::consts::SQRT_2;

/// Cumulative distribution function for standard normal distribution
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// One-sample Kolmogorov-Smirnov statistic against an arbitrary CDF
///
/// # Arguments
/// * `samples` - Sample data to test
/// * `cdf` - Theoretical cumulative distribution function
///
/// # Returns
/// Maximum distance between the empirical and theoretical CDFs, or 1.0 for
/// an empty sample.
pub fn ks_statistic<F>(samples: &[f64], cdf: F) -> f64
where
    F: Fn(f64) -> f64,
{
    let n = samples.len();
    if n == 0 {
        return 1.0;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut max_diff: f64 = 0.0;
    for (i, &value) in sorted.iter().enumerate() {
        let theoretical = cdf(value);
        let before = i as f64 / n as f64;
        let after = (i + 1) as f64 / n as f64;
        max_diff = max_diff
            .max((before - theoretical).abs())
            .max((after - theoretical).abs());
    }

    max_diff
}

/// Kolmogorov-Smirnov statistic of standardised data against N(0, 1)
///
/// The sample is shifted and scaled to zero mean and unit variance first,
/// so this tests shape only. Returns 1.0 for empty or constant data.
pub fn ks_test_normal(residuals: &[f64]) -> f64 {
    let n = residuals.len();
    if n == 0 {
        return 1.0;
    }

    let mean: f64 = residuals.iter().sum::<f64>() / n as f64;
    let variance: f64 = residuals.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    let std_dev = variance.sqrt();

    if std_dev < 1e-10 {
        return 1.0;
    }

    let standardised: Vec<f64> = residuals.iter().map(|x| (x - mean) / std_dev).collect();
    ks_statistic(&standardised, normal_cdf)
}

/// Critical value for the KS statistic at a given significance level
///
/// Uses the large-n asymptotic approximation.
pub fn ks_critical_value(n: usize, alpha: f64) -> f64 {
    let c_alpha = match alpha {
        a if (a - 0.10).abs() < 1e-6 => 1.22,
        a if (a - 0.05).abs() < 1e-6 => 1.36,
        a if (a - 0.01).abs() < 1e-6 => 1.63,
        _ => 1.36,
    };

    c_alpha / (n as f64).sqrt()
}

/// Median of the non-NaN values of a slice
///
/// # Returns
///
/// * `Ok(median)` - The median value (mean of the two middle values for even counts)
/// * `Err(message)` - If no valid values remain after filtering NaN
pub fn median(values: &[f64]) -> Result<f64, String> {
    let mut valid: Vec<f64> = values.iter().filter(|v| !v.is_nan()).copied().collect();

    if valid.is_empty() {
        return Err(format!(
            "Cannot take the median of {} values, none of them valid",
            values.len()
        ));
    }

    valid.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = valid.len() / 2;
    if valid.len() % 2 == 0 {
        Ok((valid[mid - 1] + valid[mid]) / 2.0)
    } else {
        Ok(valid[mid])
    }
}

/// Pearson correlation coefficient between two samples
///
/// Returns correlation in range [-1, 1], or NaN if the samples differ in
/// length, are empty, or either has zero variance.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.is_empty() {
        return f64::NAN;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x < 1e-10 || var_y < 1e-10 {
        return f64::NAN;
    }

    cov / (var_x.sqrt() * var_y.sqrt())
}
