//! Velocity dispersion function of early-type galaxies

use scilib::math::basic::gamma;

use crate::error::{PriorError, Result};

/// Modified Schechter fit of the velocity dispersion function,
/// dn/dσ = φ* (σ/σ*)^α exp(-(σ/σ*)^β) β / Γ(α/β) / σ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityDispersionFunction {
    /// Normalisation in h³ Mpc⁻³
    pub phi_star: f64,
    /// Characteristic dispersion in km/s
    pub sigma_star: f64,
    pub alpha: f64,
    pub beta: f64,
}

/// Fits keyed by the calibration dataset name
const FITS: &[(&str, VelocityDispersionFunction)] = &[(
    // Choi, Park & Vogeley (2007), SDSS early types
    "CPV2007",
    VelocityDispersionFunction {
        phi_star: 8.0e-3,
        sigma_star: 161.0,
        alpha: 2.32,
        beta: 2.67,
    },
)];

impl VelocityDispersionFunction {
    pub const DEFAULT_FIT: &'static str = "CPV2007";

    pub fn from_fit(fit_data: Option<&str>) -> Result<Self> {
        let key = fit_data.unwrap_or(Self::DEFAULT_FIT);
        FITS.iter()
            .find(|(name, _)| *name == key)
            .map(|(_, fit)| *fit)
            .ok_or_else(|| {
                PriorError::config(format!("unknown velocity dispersion fit '{key}'"))
            })
    }

    /// Number density per unit velocity dispersion at `sigma` (km/s)
    pub fn density(&self, sigma: f64) -> f64 {
        if sigma <= 0.0 {
            return 0.0;
        }
        let x = sigma / self.sigma_star;
        self.phi_star * x.powf(self.alpha) * (-x.powf(self.beta)).exp() * self.beta
            / gamma(self.alpha / self.beta)
            / sigma
    }

    /// Unnormalised weights over a velocity dispersion grid
    pub fn weights(&self, grid: &[f64]) -> Vec<f64> {
        grid.iter().map(|&sigma| self.density(sigma)).collect()
    }
}
