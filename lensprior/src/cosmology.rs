//! Background cosmology for converting physical to observed quantities
//!
//! A wCDM model without radiation: matter density `Om0`, dark energy density
//! `Ode0` with constant equation of state `w0`, and curvature
//! `Ok0 = 1 - Om0 - Ode0`. Leaving out `Ode0` closes the universe flat, and
//! leaving out `w0` gives a cosmological constant, so `{H0, Om0}` alone is flat
//! ΛCDM.
//!
//! Distances are in Mpc. The line-of-sight comoving distance is a Simpson
//! integral of `1/E(z)`; every other distance follows from it in closed form.
//! A `Cosmology` is immutable once built and is shared read-only by every
//! sampler in a run.

use shared::algo::simpson;

use crate::config::CosmologyConfig;
use crate::error::{PriorError, Result};

/// Speed of light in km/s
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// Arcseconds per radian
pub const ARCSEC_PER_RADIAN: f64 = 206_264.806_247_096_36;

/// Simpson sub-intervals for each distance integral
const DISTANCE_INTERVALS: usize = 1000;

/// Curvature below this magnitude is treated as flat
const FLAT_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cosmology {
    h0: f64,
    om0: f64,
    ode0: f64,
    ok0: f64,
    w0: f64,
}

impl Cosmology {
    /// Build a wCDM cosmology.
    ///
    /// # Arguments
    /// * `h0` - Hubble constant in km/s/Mpc
    /// * `om0` - Matter density in units of the critical density
    /// * `ode0` - Dark energy density, `1 - om0` if `None`
    /// * `w0` - Dark energy equation of state, `-1` if `None`
    pub fn new(h0: f64, om0: f64, ode0: Option<f64>, w0: Option<f64>) -> Result<Self> {
        let ode0 = ode0.unwrap_or(1.0 - om0);
        let w0 = w0.unwrap_or(-1.0);
        if !(h0 > 0.0 && h0.is_finite()) {
            return Err(PriorError::config(format!("H0 must be positive, got {h0}")));
        }
        if !(om0 >= 0.0 && om0.is_finite()) {
            return Err(PriorError::config(format!(
                "Om0 must be non-negative, got {om0}"
            )));
        }
        if !ode0.is_finite() || !w0.is_finite() {
            return Err(PriorError::config("Ode0 and w0 must be finite"));
        }

        let cosmo = Self {
            h0,
            om0,
            ode0,
            ok0: 1.0 - om0 - ode0,
            w0,
        };
        log::debug!(
            "Cosmology H0={h0} Om0={om0} Ode0={ode0} Ok0={:.3} w0={w0}",
            cosmo.ok0
        );
        Ok(cosmo)
    }

    pub fn from_config(config: &CosmologyConfig) -> Result<Self> {
        Self::new(config.h0, config.om0, config.ode0, config.w0)
    }

    /// Flat ΛCDM with the given Hubble constant and matter density.
    pub fn flat(h0: f64, om0: f64) -> Result<Self> {
        Self::new(h0, om0, None, None)
    }

    pub fn h0(&self) -> f64 {
        self.h0
    }

    pub fn om0(&self) -> f64 {
        self.om0
    }

    pub fn ode0(&self) -> f64 {
        self.ode0
    }

    pub fn ok0(&self) -> f64 {
        self.ok0
    }

    pub fn w0(&self) -> f64 {
        self.w0
    }

    /// Hubble distance c/H0 in Mpc
    pub fn hubble_distance(&self) -> f64 {
        SPEED_OF_LIGHT_KM_S / self.h0
    }

    /// Dimensionless Hubble parameter E(z) = H(z)/H0
    pub fn efunc(&self, z: f64) -> f64 {
        let zp1 = 1.0 + z;
        (self.om0 * zp1.powi(3)
            + self.ok0 * zp1.powi(2)
            + self.ode0 * zp1.powf(3.0 * (1.0 + self.w0)))
        .sqrt()
    }

    /// Line-of-sight comoving distance between two redshifts, in Mpc
    fn comoving_distance_z1z2(&self, z1: f64, z2: f64) -> Result<f64> {
        let integral = simpson(|z| 1.0 / self.efunc(z), z1, z2, DISTANCE_INTERVALS)?;
        Ok(self.hubble_distance() * integral)
    }

    /// Line-of-sight comoving distance to redshift `z`, in Mpc
    pub fn comoving_distance(&self, z: f64) -> Result<f64> {
        self.comoving_distance_z1z2(0.0, z)
    }

    /// Map a line-of-sight comoving distance to a transverse one.
    fn transverse_from_line_of_sight(&self, dc: f64) -> f64 {
        let dh = self.hubble_distance();
        if self.ok0 > FLAT_TOLERANCE {
            let sqrt_ok = self.ok0.sqrt();
            dh / sqrt_ok * (sqrt_ok * dc / dh).sinh()
        } else if self.ok0 < -FLAT_TOLERANCE {
            let sqrt_ok = (-self.ok0).sqrt();
            dh / sqrt_ok * (sqrt_ok * dc / dh).sin()
        } else {
            dc
        }
    }

    /// Transverse comoving distance D_M to redshift `z`, in Mpc
    pub fn comoving_transverse_distance(&self, z: f64) -> Result<f64> {
        Ok(self.transverse_from_line_of_sight(self.comoving_distance(z)?))
    }

    /// Angular diameter distance D_A to redshift `z`, in Mpc
    pub fn angular_diameter_distance(&self, z: f64) -> Result<f64> {
        Ok(self.comoving_transverse_distance(z)? / (1.0 + z))
    }

    /// Angular diameter distance between two redshifts, in Mpc
    ///
    /// This is the lens-to-source distance D_ls of lensing formulae. It is
    /// only defined for `z1 <= z2`.
    pub fn angular_diameter_distance_z1z2(&self, z1: f64, z2: f64) -> Result<f64> {
        if z2 < z1 {
            return Err(PriorError::config(format!(
                "angular diameter distance needs z1 <= z2, got {z1} > {z2}"
            )));
        }
        let dm1 = self.comoving_transverse_distance(z1)?;
        let dm2 = self.comoving_transverse_distance(z2)?;
        let dh = self.hubble_distance();
        let ok = self.ok0;
        let dm12 = dm2 * (1.0 + ok * dm1 * dm1 / (dh * dh)).sqrt()
            - dm1 * (1.0 + ok * dm2 * dm2 / (dh * dh)).sqrt();
        Ok(dm12 / (1.0 + z2))
    }

    /// Luminosity distance D_L to redshift `z`, in Mpc
    pub fn luminosity_distance(&self, z: f64) -> Result<f64> {
        Ok(self.comoving_transverse_distance(z)? * (1.0 + z))
    }

    /// Distance modulus 5 log10(D_L / 10 pc) at redshift `z`
    pub fn distmod(&self, z: f64) -> Result<f64> {
        Ok(5.0 * self.luminosity_distance(z)?.log10() + 25.0)
    }

    /// Differential comoving volume dV/dz/dΩ at redshift `z`, in Mpc³/sr
    pub fn differential_comoving_volume(&self, z: f64) -> Result<f64> {
        let dm = self.comoving_transverse_distance(z)?;
        Ok(self.hubble_distance() * dm * dm / self.efunc(z))
    }

    /// [`Self::differential_comoving_volume`] over a sorted grid, integrating
    /// each slice between neighbouring points only once.
    pub fn differential_comoving_volume_grid(&self, z_grid: &[f64]) -> Result<Vec<f64>> {
        let mut volumes = Vec::with_capacity(z_grid.len());
        let mut dc = 0.0;
        let mut z_prev = 0.0;
        for &z in z_grid {
            dc += self.comoving_distance_z1z2(z_prev, z)?;
            z_prev = z;
            let dm = self.transverse_from_line_of_sight(dc);
            volumes.push(self.hubble_distance() * dm * dm / self.efunc(z));
        }
        Ok(volumes)
    }

    /// Angle in arcseconds subtended by 1 comoving kpc at redshift `z`
    pub fn arcsec_per_kpc_comoving(&self, z: f64) -> Result<f64> {
        let dm_kpc = self.comoving_transverse_distance(z)? * 1000.0;
        Ok(ARCSEC_PER_RADIAN / dm_kpc)
    }

    /// Angle in arcseconds subtended by 1 proper kpc at redshift `z`
    pub fn arcsec_per_kpc_proper(&self, z: f64) -> Result<f64> {
        let da_kpc = self.angular_diameter_distance(z)? * 1000.0;
        Ok(ARCSEC_PER_RADIAN / da_kpc)
    }
}
