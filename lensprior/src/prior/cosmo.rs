//! Independent draws with a cosmological context

use rand::Rng;

use super::compose::{ComponentDraws, WeightedGrid};
use super::diagonal::DiagonalPrior;
use crate::config::{ParameterSpec, PriorConfig};
use crate::cosmology::Cosmology;
use crate::distributions::Distribution;
use crate::error::{PriorError, Result};
use crate::sample::Sample;

/// [`DiagonalPrior`] plus redshifts, an optional velocity dispersion and
/// line-of-sight terms, all exposed in `misc` for downstream physics.
#[derive(Debug, Clone)]
pub struct DiagonalCosmoPrior {
    diagonal: DiagonalPrior,
    cosmo: Cosmology,
    redshift: WeightedGrid,
    vel_disp: Option<WeightedGrid>,
    los: Vec<(String, Distribution)>,
}

impl DiagonalCosmoPrior {
    pub fn new(config: &PriorConfig) -> Result<Self> {
        let omega = &config.bnn_omega;
        let cosmo_config = omega
            .cosmology
            .as_ref()
            .ok_or_else(|| PriorError::config("DiagonalCosmoBNNPrior requires bnn_omega.cosmology"))?;
        let redshift_config = omega
            .redshift
            .as_ref()
            .ok_or_else(|| PriorError::config("DiagonalCosmoBNNPrior requires bnn_omega.redshift"))?;
        let cosmo = Cosmology::from_config(cosmo_config)?;
        let redshift = WeightedGrid::redshifts(&cosmo, redshift_config)?;
        let vel_disp = omega
            .kinematics
            .as_ref()
            .and_then(|k| k.velocity_dispersion.as_ref())
            .map(WeightedGrid::velocity_dispersions)
            .transpose()?;

        let los = omega
            .los
            .iter()
            .map(|(name, spec)| match spec {
                ParameterSpec::Dist(dist) => Ok((name.clone(), Distribution::from_spec(dist)?)),
                _ => Err(PriorError::config(format!(
                    "LOS parameter '{name}' must be a distribution"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            diagonal: DiagonalPrior::new(config)?,
            cosmo,
            redshift,
            vel_disp,
            los,
        })
    }

    pub(crate) fn draws(&self) -> &[ComponentDraws] {
        self.diagonal.draws()
    }

    pub fn cosmology(&self) -> &Cosmology {
        &self.cosmo
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Sample> {
        let (z_lens, z_src) = self.redshift.choose_pair(rng)?;
        let mut sample = self.diagonal.draw(rng)?;
        sample.misc.insert("z_lens".into(), z_lens);
        sample.misc.insert("z_src".into(), z_src);
        if let Some(vel_disp) = &self.vel_disp {
            sample.misc.insert("vel_disp_iso".into(), vel_disp.choose(rng)?);
        }
        for (name, dist) in &self.los {
            let value = dist.sample(rng)?;
            log::trace!("LOS {name} = {value} (independent draw)");
            sample.misc.insert(name.clone(), value);
        }
        self.diagonal.compose(&mut sample);
        Ok(sample)
    }
}
