//! Composite Simpson quadrature for smooth one-dimensional integrands.
//!
//! Cosmological distances are integrals of 1/E(z), which is smooth and
//! monotone over any redshift range of interest, so a fixed-order composite
//! rule is accurate to well below the precision the priors need.

use thiserror::Error;

/// Errors raised by the quadrature routines
#[derive(Debug, Error, PartialEq)]
pub enum QuadratureError {
    #[error("Simpson's rule needs an even, non-zero number of intervals, got {0}")]
    OddIntervals(usize),
    #[error("Integration bounds must be finite, got ({0}, {1})")]
    NonFiniteBounds(f64, f64),
}

/// Integrate `f` over `[a, b]` with the composite Simpson rule.
///
/// # Arguments
/// * `f` - Integrand
/// * `a` - Lower bound
/// * `b` - Upper bound (may be below `a`, the sign follows)
/// * `intervals` - Number of sub-intervals, must be even and non-zero
///
/// # Returns
/// * `Ok(f64)` - Approximation of the integral
/// * `Err(QuadratureError)` - If the interval count or bounds are invalid
pub fn simpson<F>(f: F, a: f64, b: f64, intervals: usize) -> Result<f64, QuadratureError>
where
    F: Fn(f64) -> f64,
{
    if intervals == 0 || intervals % 2 != 0 {
        return Err(QuadratureError::OddIntervals(intervals));
    }
    if !a.is_finite() || !b.is_finite() {
        return Err(QuadratureError::NonFiniteBounds(a, b));
    }
    if a == b {
        return Ok(0.0);
    }

    let h = (b - a) / intervals as f64;
    let mut sum = f(a) + f(b);
    for i in 1..intervals {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(a + i as f64 * h);
    }

    Ok(sum * h / 3.0)
}
