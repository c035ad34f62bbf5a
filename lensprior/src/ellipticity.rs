//! Ellipticity and shear parameterisations.
//!
//! Samplers draw shapes as an axis ratio `q` and position angle `phi`; the
//! renderer wants the Cartesian ellipticity
//!
//! ```text
//! e1 = (1 - q) / (1 + q) * cos(2 phi)
//! e2 = (1 - q) / (1 + q) * sin(2 phi)
//! ```
//!
//! The map has period pi in `phi`, so the inverse recovers the angle only
//! modulo pi, and for `q = 1` the angle is undefined.

/// Cap on |e| so the inverse never produces a zero axis ratio.
const MAX_MODULUS: f64 = 0.9999;

/// Axis ratio and angle to Cartesian ellipticity.
///
/// # Arguments
/// * `phi` - Position angle in radians
/// * `q` - Axis ratio in (0, 1]
///
/// # Returns
/// `(e1, e2)`
pub fn phi_q2_ellipticity(phi: f64, q: f64) -> (f64, f64) {
    let modulus = (1.0 - q) / (1.0 + q);
    let (sin, cos) = (2.0 * phi).sin_cos();
    (modulus * cos, modulus * sin)
}

/// Cartesian ellipticity to angle and axis ratio.
///
/// # Returns
/// `(phi, q)` with `phi` in (-pi/2, pi/2]
pub fn ellipticity2phi_q(e1: f64, e2: f64) -> (f64, f64) {
    let phi = e2.atan2(e1) / 2.0;
    let modulus = e1.hypot(e2).min(MAX_MODULUS);
    let q = (1.0 - modulus) / (1.0 + modulus);
    (phi, q)
}

/// Shear modulus and angle to Cartesian shear components.
pub fn shear_polar2cartesian(phi: f64, gamma: f64) -> (f64, f64) {
    let (sin, cos) = (2.0 * phi).sin_cos();
    (gamma * cos, gamma * sin)
}

/// Cartesian shear components to `(phi, gamma)`.
pub fn shear_cartesian2polar(gamma1: f64, gamma2: f64) -> (f64, f64) {
    (gamma2.atan2(gamma1) / 2.0, gamma1.hypot(gamma2))
}
