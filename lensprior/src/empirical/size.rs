//! Galaxy size relations

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{PriorError, Result};

fn scatter(sigma: f64, what: &str) -> Result<Normal<f64>> {
    Normal::new(0.0, sigma).map_err(|e| PriorError::config(format!("{what} scatter: {e}")))
}

/// Fundamental Plane in observed units,
/// log10(R_eff / kpc) = a log10(σ) + b m_V + c
#[derive(Debug, Clone, Copy)]
pub struct FundamentalPlane {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    scatter: Normal<f64>,
}

impl FundamentalPlane {
    pub fn from_fit(fit_data: Option<&str>) -> Result<Self> {
        match fit_data {
            // Hyde & Bernardi (2009), SDSS early types
            Some("SDSS") => Ok(Self {
                a: 1.4335,
                b: 0.3150,
                c: -8.8979,
                scatter: scatter(0.0578, "Fundamental Plane")?,
            }),
            Some(other) => Err(PriorError::config(format!(
                "unknown Fundamental Plane fit '{other}'"
            ))),
            None => Err(PriorError::config("FundamentalPlane requires fit_data")),
        }
    }

    /// Mean log10 effective radius in kpc
    pub fn mean_log_radius(&self, vel_disp: f64, apparent_mag: f64) -> f64 {
        self.a * vel_disp.log10() + self.b * apparent_mag + self.c
    }

    /// Draw the effective radius in kpc
    ///
    /// # Arguments
    /// * `vel_disp` - Velocity dispersion in km/s
    /// * `apparent_mag` - V-band apparent magnitude
    pub fn sample_effective_radius<R: Rng + ?Sized>(
        &self,
        vel_disp: f64,
        apparent_mag: f64,
        rng: &mut R,
    ) -> f64 {
        let log_r = self.mean_log_radius(vel_disp, apparent_mag) + self.scatter.sample(rng);
        10f64.powf(log_r)
    }
}

/// Size-luminosity-redshift relation of star-forming galaxies,
/// R_eff = r0 (L / L0)^beta ((1 + z) / (1 + z0))^gamma, log-normal scatter.
///
/// L / L0 is taken from the UV absolute magnitude relative to `m0`.
#[derive(Debug, Clone, Copy)]
pub struct SizeLuminosityRelation {
    /// Radius in kpc at the pivot magnitude and redshift
    pub r0: f64,
    pub m0: f64,
    pub beta: f64,
    pub z0: f64,
    pub gamma: f64,
    ln_scatter: Normal<f64>,
}

impl SizeLuminosityRelation {
    pub const DEFAULT_FIT: &'static str = "Shibuya2015";

    pub fn from_fit(fit_data: Option<&str>) -> Result<Self> {
        match fit_data.unwrap_or(Self::DEFAULT_FIT) {
            // Shibuya, Ouchi & Harikane (2015)
            "Shibuya2015" => Ok(Self {
                r0: 0.9,
                m0: -21.0,
                beta: 0.27,
                z0: 4.0,
                gamma: -1.3,
                ln_scatter: scatter(0.3, "size-luminosity")?,
            }),
            other => Err(PriorError::config(format!(
                "unknown size-luminosity fit '{other}'"
            ))),
        }
    }

    /// Median effective radius in kpc
    pub fn median_radius(&self, z: f64, abs_mag: f64) -> f64 {
        let luminosity_ratio = 10f64.powf(-0.4 * (abs_mag - self.m0));
        self.r0 * luminosity_ratio.powf(self.beta) * ((1.0 + z) / (1.0 + self.z0)).powf(self.gamma)
    }

    /// Draw the effective radius in kpc
    ///
    /// # Arguments
    /// * `z` - Source redshift
    /// * `abs_mag` - Rest-frame UV absolute magnitude
    pub fn sample_effective_radius<R: Rng + ?Sized>(&self, z: f64, abs_mag: f64, rng: &mut R) -> f64 {
        self.median_radius(z, abs_mag) * self.ln_scatter.sample(rng).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::algo::median;

    #[test]
    fn test_fundamental_plane_mean() {
        let fp = FundamentalPlane::from_fit(Some("SDSS")).unwrap();
        let expected = 1.4335 * 200f64.log10() + 0.3150 * 20.0 - 8.8979;
        assert_relative_eq!(fp.mean_log_radius(200.0, 20.0), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_fundamental_plane_scatter_is_lognormal() {
        let fp = FundamentalPlane::from_fit(Some("SDSS")).unwrap();
        let mut rng = StdRng::seed_from_u64(31);
        let logs: Vec<f64> = (0..2000)
            .map(|_| fp.sample_effective_radius(250.0, 19.0, &mut rng).log10())
            .collect();
        assert_relative_eq!(
            median(&logs).unwrap(),
            fp.mean_log_radius(250.0, 19.0),
            epsilon = 0.01
        );
        assert!(FundamentalPlane::from_fit(Some("SLACS")).is_err());
    }

    #[test]
    fn test_size_relation_pivot() {
        let rel = SizeLuminosityRelation::from_fit(None).unwrap();
        assert_relative_eq!(rel.median_radius(4.0, -21.0), 0.9, epsilon = 1e-12);
        // Brighter and lower-redshift sources are larger
        assert!(rel.median_radius(4.0, -22.0) > 0.9);
        assert!(rel.median_radius(7.0, -21.0) < 0.9);
    }

    #[test]
    fn test_size_relation_draws() {
        let rel = SizeLuminosityRelation::from_fit(Some("Shibuya2015")).unwrap();
        let mut rng = StdRng::seed_from_u64(32);
        let radii: Vec<f64> = (0..2000)
            .map(|_| rel.sample_effective_radius(5.0, -20.0, &mut rng))
            .collect();
        assert!(radii.iter().all(|&r| r > 0.0));
        assert_relative_eq!(
            median(&radii).unwrap(),
            rel.median_radius(5.0, -20.0),
            max_relative = 0.05
        );
        assert!(SizeLuminosityRelation::from_fit(Some("vdW2014")).is_err());
    }
}
