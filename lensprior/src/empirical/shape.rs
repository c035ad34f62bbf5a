//! Shape relations: light axis ratio and mass-profile slope

use rand::Rng;
use rand_distr::{Distribution, Normal, Weibull};

use crate::error::{PriorError, Result};

/// Smallest axis ratio [`AxisRatioRayleigh`] returns
pub const MIN_AXIS_RATIO: f64 = 0.2;

/// Redraws allowed before an axis ratio draw gives up
const MAX_AXIS_RATIO_ATTEMPTS: u64 = 10_000;

/// Axis ratio q = 1 - Rayleigh(s) where the Rayleigh scale falls linearly
/// with velocity dispersion, s = a + b σ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRatioRayleigh {
    pub a: f64,
    pub b: f64,
}

impl AxisRatioRayleigh {
    pub fn from_fit(fit_data: Option<&str>) -> Result<Self> {
        match fit_data {
            // SDSS early types
            Some("SDSS") => Ok(Self {
                a: 0.378,
                b: -5.72e-4,
            }),
            Some(other) => Err(PriorError::config(format!(
                "unknown axis ratio fit '{other}'"
            ))),
            None => Err(PriorError::config("AxisRatioRayleigh requires fit_data")),
        }
    }

    /// Rayleigh scale at velocity dispersion `vel_disp` (km/s)
    pub fn rayleigh_scale(&self, vel_disp: f64) -> f64 {
        (self.a + self.b * vel_disp).max(1e-3)
    }

    /// Draw an axis ratio between [`MIN_AXIS_RATIO`] and 1
    pub fn sample_axis_ratio<R: Rng + ?Sized>(&self, vel_disp: f64, rng: &mut R) -> Result<f64> {
        let scale = self.rayleigh_scale(vel_disp);
        let rayleigh = Weibull::new(scale * std::f64::consts::SQRT_2, 2.0)
            .map_err(|e| PriorError::config(format!("axis ratio scale {scale}: {e}")))?;
        for _ in 0..MAX_AXIS_RATIO_ATTEMPTS {
            let q = 1.0 - rayleigh.sample(rng);
            if q >= MIN_AXIS_RATIO {
                return Ok(q);
            }
        }
        Err(PriorError::RetryExhausted {
            what: format!("axis ratio above {MIN_AXIS_RATIO} at σ = {vel_disp}"),
            attempts: MAX_AXIS_RATIO_ATTEMPTS,
        })
    }
}

/// Power-law mass slope from the effective radius,
/// γ = a log10(R_eff / kpc) + b, with Gaussian scatter
#[derive(Debug, Clone, Copy)]
pub struct FundamentalMassHyperplane {
    pub a: f64,
    pub b: f64,
    scatter: Normal<f64>,
}

impl FundamentalMassHyperplane {
    pub fn from_fit(fit_data: Option<&str>) -> Result<Self> {
        match fit_data {
            // Auger et al. (2010), SLACS lenses
            Some("SLACS") => Ok(Self {
                a: -0.41,
                b: 2.34,
                scatter: Normal::new(0.0, 0.12)
                    .map_err(|e| PriorError::config(format!("mass hyperplane scatter: {e}")))?,
            }),
            Some(other) => Err(PriorError::config(format!(
                "unknown mass hyperplane fit '{other}'"
            ))),
            None => Err(PriorError::config("FundamentalMassHyperplane requires fit_data")),
        }
    }

    pub fn mean_gamma(&self, r_eff_kpc: f64) -> f64 {
        self.a * r_eff_kpc.log10() + self.b
    }

    /// Draw the power-law slope for an effective radius in kpc
    pub fn sample_gamma<R: Rng + ?Sized>(&self, r_eff_kpc: f64, rng: &mut R) -> f64 {
        self.mean_gamma(r_eff_kpc) + self.scatter.sample(rng)
    }
}
