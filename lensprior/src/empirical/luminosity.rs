//! Luminosity relations: Faber-Jackson for lenses, UV luminosity functions
//! for high-redshift sources.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{PriorError, Result};

/// Absolute V magnitude of the Sun
pub const M_V_SUN: f64 = 4.84;

/// Faber-Jackson relation log10(L_V / L_sun) = slope log10(σ) + intercept,
/// with Gaussian scatter in log luminosity.
#[derive(Debug, Clone, Copy)]
pub struct FaberJackson {
    pub slope: f64,
    pub intercept: f64,
    scatter: Normal<f64>,
}

impl FaberJackson {
    pub fn from_fit(fit_data: Option<&str>) -> Result<Self> {
        let (slope, intercept, scatter) = match fit_data {
            // Early-type galaxies
            Some("ETGs") => (2.0, 5.8, 0.1),
            Some(other) => {
                return Err(PriorError::config(format!(
                    "unknown Faber-Jackson fit '{other}'"
                )))
            }
            None => return Err(PriorError::config("FaberJackson requires fit_data")),
        };
        Ok(Self {
            slope,
            intercept,
            scatter: Normal::new(0.0, scatter)
                .map_err(|e| PriorError::config(format!("Faber-Jackson scatter: {e}")))?,
        })
    }

    /// Mean log10 V-band luminosity at velocity dispersion `vel_disp` (km/s)
    pub fn mean_log_luminosity(&self, vel_disp: f64) -> f64 {
        self.slope * vel_disp.log10() + self.intercept
    }

    /// Draw log10 L_V including the intrinsic scatter
    pub fn sample_log_luminosity<R: Rng + ?Sized>(&self, vel_disp: f64, rng: &mut R) -> f64 {
        self.mean_log_luminosity(vel_disp) + self.scatter.sample(rng)
    }

    /// Draw the absolute V magnitude
    pub fn sample_absolute_magnitude<R: Rng + ?Sized>(&self, vel_disp: f64, rng: &mut R) -> f64 {
        -2.5 * self.sample_log_luminosity(vel_disp, rng) + M_V_SUN
    }
}

/// Schechter parameters of one redshift bin, in absolute magnitude
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchechterBin {
    pub z: f64,
    pub m_star: f64,
    /// Normalisation in Mpc⁻³ mag⁻¹
    pub phi_star: f64,
    pub alpha: f64,
}

impl SchechterBin {
    /// Number density per magnitude at absolute magnitude `m`
    pub fn density(&self, m: f64) -> f64 {
        let x = 10f64.powf(-0.4 * (m - self.m_star));
        0.4 * std::f64::consts::LN_10 * self.phi_star * x.powf(self.alpha + 1.0) * (-x).exp()
    }
}

/// Rest-frame UV (1500 Å) luminosity functions, Finkelstein et al. (2015)
const FINKELSTEIN_2015: &[SchechterBin] = &[
    SchechterBin { z: 4.0, m_star: -20.73, phi_star: 14.1e-4, alpha: -1.56 },
    SchechterBin { z: 5.0, m_star: -20.81, phi_star: 8.95e-4, alpha: -1.67 },
    SchechterBin { z: 6.0, m_star: -21.13, phi_star: 1.86e-4, alpha: -2.02 },
    SchechterBin { z: 7.0, m_star: -21.03, phi_star: 1.57e-4, alpha: -2.03 },
    SchechterBin { z: 8.0, m_star: -20.89, phi_star: 0.72e-4, alpha: -2.36 },
];

/// Luminosity function tabulated in redshift bins; a redshift uses the
/// nearest bin and redshifts outside the table use the edge bin.
#[derive(Debug, Clone, Copy)]
pub struct LuminosityFunction {
    bins: &'static [SchechterBin],
}

impl LuminosityFunction {
    pub const DEFAULT_FIT: &'static str = "Finkelstein2015";

    pub fn from_fit(fit_data: Option<&str>) -> Result<Self> {
        match fit_data.unwrap_or(Self::DEFAULT_FIT) {
            "Finkelstein2015" => Ok(Self {
                bins: FINKELSTEIN_2015,
            }),
            other => Err(PriorError::config(format!(
                "unknown luminosity function fit '{other}'"
            ))),
        }
    }

    /// Bin used for redshift `z`
    pub fn bin(&self, z: f64) -> &SchechterBin {
        let first = &self.bins[0];
        let last = &self.bins[self.bins.len() - 1];
        if z < first.z - 0.5 || z > last.z + 0.5 {
            log::warn!(
                "Redshift {z:.2} outside luminosity function table [{}, {}], using the edge bin",
                first.z,
                last.z
            );
        }
        self.bins
            .iter()
            .min_by(|a, b| {
                (a.z - z)
                    .abs()
                    .partial_cmp(&(b.z - z).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(first)
    }

    /// Unnormalised weights over an absolute magnitude grid at redshift `z`
    pub fn weights(&self, z: f64, magnitudes: &[f64]) -> Vec<f64> {
        let bin = self.bin(z);
        magnitudes.iter().map(|&m| bin.density(m)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_faber_jackson_mean() {
        let fj = FaberJackson::from_fit(Some("ETGs")).unwrap();
        assert_relative_eq!(fj.mean_log_luminosity(100.0), 9.8, epsilon = 1e-12);
    }

    #[test]
    fn test_faber_jackson_scatter() {
        let fj = FaberJackson::from_fit(Some("ETGs")).unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        let draws: Vec<f64> = (0..2000)
            .map(|_| fj.sample_log_luminosity(200.0, &mut rng))
            .collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        assert_relative_eq!(mean, fj.mean_log_luminosity(200.0), epsilon = 0.01);
        // Brighter lenses have more negative magnitudes
        let mag = fj.sample_absolute_magnitude(300.0, &mut rng);
        assert!(mag < -20.0 && mag > -24.0, "M_V {mag}");
    }

    #[test]
    fn test_faber_jackson_needs_known_fit() {
        assert!(FaberJackson::from_fit(None).is_err());
        assert!(FaberJackson::from_fit(Some("SDSS")).is_err());
    }

    #[test]
    fn test_schechter_density() {
        let bin = FINKELSTEIN_2015[0];
        assert_relative_eq!(bin.density(-21.0), 3.1340484e-4, max_relative = 1e-6);
        assert_relative_eq!(bin.density(bin.m_star), 4.7774958e-4, max_relative = 1e-6);
    }

    #[test]
    fn test_nearest_bin() {
        let lf = LuminosityFunction::from_fit(None).unwrap();
        assert_eq!(lf.bin(4.4).z, 4.0);
        assert_eq!(lf.bin(6.6).z, 7.0);
        assert_eq!(lf.bin(1.0).z, 4.0);
        assert_eq!(lf.bin(11.0).z, 8.0);
    }

    #[test]
    fn test_weights_favour_faint_sources() {
        let lf = LuminosityFunction::from_fit(Some("Finkelstein2015")).unwrap();
        let weights = lf.weights(6.0, &[-23.0, -21.0, -18.0]);
        assert!(weights[0] < weights[1] && weights[1] < weights[2]);
        assert!(LuminosityFunction::from_fit(Some("Bouwens2015")).is_err());
    }
}
