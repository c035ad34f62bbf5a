//! Covariant parameters from empirical relations.
//!
//! One sample follows the physical chain
//!
//! 1. a lens and a source redshift, weighted by comoving volume,
//! 2. the lens velocity dispersion, weighted by the velocity dispersion
//!    function,
//! 3. lens quantities from σ: absolute and apparent magnitude
//!    (Faber-Jackson), Einstein radius (SIS), effective radius (Fundamental
//!    Plane), mass slope (mass hyperplane) and light axis ratio,
//! 4. source quantities from z_src: UV magnitude from the luminosity function
//!    and effective radius from the size relation,
//!
//! then fills every remaining parameter with an independent draw. Each
//! derived parameter has a fixed slot (`lens_mass.gamma`, `lens_light.q`, ...)
//! and is only derived when its slot names a model in the configuration.

use rand::Rng;
use shared::GridSpec;

use super::compose::{
    compile_components, convert_all_qphi, draw_all_independent, reframe_source_center,
    share_lens_center, ComponentDraws, WeightedGrid,
};
use crate::config::{BnnOmega, ParameterSpec, PriorConfig};
use crate::cosmology::Cosmology;
use crate::empirical::{
    AxisRatioRayleigh, EmpiricalModel, FaberJackson, FundamentalMassHyperplane, FundamentalPlane,
    LuminosityFunction, SizeLuminosityRelation,
};
use crate::error::{PriorError, Result};
use crate::lensing::einstein_radius_sis;
use crate::sample::{Component, Sample};

/// Absolute UV magnitudes a source magnitude is drawn from
pub const SOURCE_MAGNITUDE_GRID: GridSpec = GridSpec {
    start: -23.0,
    stop: -17.8,
    step: 0.2,
};

/// Extinction along the line of sight, in magnitudes. No dust model.
const DUST_EXTINCTION: f64 = 0.0;

/// Parameters each component may derive from a model
fn model_slots(component: Component) -> &'static [&'static str] {
    match component {
        Component::LensMass => &["theta_E", "gamma"],
        Component::LensLight => &["magnitude", "R_sersic", "q"],
        Component::SrcLight => &["magnitude", "R_sersic"],
        Component::ExternalShear | Component::AgnLight => &[],
    }
}

/// Resolve the model named in slot `component.param`, if any, and check it
/// produces what the slot needs.
fn resolve_slot<T>(
    omega: &BnnOmega,
    component: Component,
    param: &str,
    pick: impl FnOnce(EmpiricalModel) -> Option<T>,
) -> Result<Option<T>> {
    let Some(ParameterSpec::Model(spec)) = omega.component(component).and_then(|c| c.get(param)) else {
        return Ok(None);
    };
    let model = EmpiricalModel::from_spec(spec)?;
    let role = model.role();
    pick(model).map(Some).ok_or_else(|| {
        PriorError::config(format!(
            "{component}.{param} cannot be derived from the {role} model '{}'",
            spec.name
        ))
    })
}

/// Prior with marginally covariant parameters
#[derive(Debug, Clone)]
pub struct EmpiricalPrior {
    components: Vec<ComponentDraws>,
    cosmo: Cosmology,
    redshift: WeightedGrid,
    vel_disp: WeightedGrid,
    sis_theta_e: bool,
    mass_slope: Option<FundamentalMassHyperplane>,
    lens_luminosity: Option<FaberJackson>,
    lens_size: Option<FundamentalPlane>,
    lens_axis_ratio: Option<AxisRatioRayleigh>,
    src_luminosity: Option<LuminosityFunction>,
    src_size: Option<SizeLuminosityRelation>,
    src_magnitudes: Vec<f64>,
}

impl EmpiricalPrior {
    pub fn new(config: &PriorConfig) -> Result<Self> {
        let omega = &config.bnn_omega;
        let missing = |key: &str| PriorError::config(format!("EmpiricalBNNPrior requires bnn_omega.{key}"));
        let cosmo = Cosmology::from_config(omega.cosmology.as_ref().ok_or_else(|| missing("cosmology"))?)?;
        let redshift = WeightedGrid::redshifts(&cosmo, omega.redshift.as_ref().ok_or_else(|| missing("redshift"))?)?;
        let vel_disp_config = omega
            .kinematics
            .as_ref()
            .ok_or_else(|| missing("kinematics"))?
            .velocity_dispersion
            .as_ref()
            .ok_or_else(|| missing("kinematics.velocity_dispersion"))?;
        let vel_disp = WeightedGrid::velocity_dispersions(vel_disp_config)?;

        use Component::{LensLight, LensMass, SrcLight};
        let sis_theta_e = resolve_slot(omega, LensMass, "theta_E", |m| {
            matches!(m, EmpiricalModel::SisEinsteinRadius).then_some(())
        })?
        .is_some();
        let mass_slope = resolve_slot(omega, LensMass, "gamma", |m| match m {
            EmpiricalModel::MassSlope(model) => Some(model),
            _ => None,
        })?;
        let lens_luminosity = resolve_slot(omega, LensLight, "magnitude", |m| match m {
            EmpiricalModel::FaberJackson(model) => Some(model),
            _ => None,
        })?;
        let lens_size = resolve_slot(omega, LensLight, "R_sersic", |m| match m {
            EmpiricalModel::FundamentalPlane(model) => Some(model),
            _ => None,
        })?;
        let lens_axis_ratio = resolve_slot(omega, LensLight, "q", |m| match m {
            EmpiricalModel::AxisRatio(model) => Some(model),
            _ => None,
        })?;
        let src_luminosity = resolve_slot(omega, SrcLight, "magnitude", |m| match m {
            EmpiricalModel::LuminosityFunction(model) => Some(model),
            _ => None,
        })?;
        let src_size = resolve_slot(omega, SrcLight, "R_sersic", |m| match m {
            EmpiricalModel::SizeRelation(model) => Some(model),
            _ => None,
        })?;

        // Each relation needs the output of the one before it
        if lens_size.is_some() && lens_luminosity.is_none() {
            return Err(PriorError::config(
                "lens_light.R_sersic from the Fundamental Plane needs lens_light.magnitude from FaberJackson",
            ));
        }
        if mass_slope.is_some() && lens_size.is_none() {
            return Err(PriorError::config(
                "lens_mass.gamma from the mass hyperplane needs lens_light.R_sersic from FundamentalPlane",
            ));
        }
        if src_size.is_some() && src_luminosity.is_none() {
            return Err(PriorError::config(
                "src_light.R_sersic from the size relation needs src_light.magnitude from a luminosity function",
            ));
        }

        let components = compile_components(
            &config.components,
            |component| config.component_spec(component),
            model_slots,
        )?;

        Ok(Self {
            components,
            cosmo,
            redshift,
            vel_disp,
            sis_theta_e,
            mass_slope,
            lens_luminosity,
            lens_size,
            lens_axis_ratio,
            src_luminosity,
            src_size,
            src_magnitudes: SOURCE_MAGNITUDE_GRID.values(),
        })
    }

    pub(crate) fn draws(&self) -> &[ComponentDraws] {
        &self.components
    }

    pub fn cosmology(&self) -> &Cosmology {
        &self.cosmo
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Sample> {
        let active: Vec<_> = self.components.iter().map(|d| d.component).collect();
        let mut sample = Sample::with_components(&active);

        let (z_lens, z_src) = self.redshift.choose_pair(rng)?;
        let vel_disp = self.vel_disp.choose(rng)?;
        sample.misc.insert("z_lens".into(), z_lens);
        sample.misc.insert("z_src".into(), z_src);
        sample.misc.insert("vel_disp_iso".into(), vel_disp);

        self.derive_lens(&mut sample, vel_disp, z_lens, z_src, rng)?;
        self.derive_source(&mut sample, z_src, rng)?;

        draw_all_independent(&mut sample, &self.components, rng)?;
        convert_all_qphi(&mut sample, &self.components);
        reframe_source_center(&mut sample, "center_x", "center_y");
        share_lens_center(&mut sample);
        Ok(sample)
    }

    fn derive_lens<R: Rng + ?Sized>(
        &self,
        sample: &mut Sample,
        vel_disp: f64,
        z_lens: f64,
        z_src: f64,
        rng: &mut R,
    ) -> Result<()> {
        if self.sis_theta_e {
            let theta_e = einstein_radius_sis(&self.cosmo, vel_disp, z_lens, z_src)?;
            derive(sample, Component::LensMass, "theta_E", theta_e);
        }

        if let Some(faber_jackson) = &self.lens_luminosity {
            let abmag = faber_jackson.sample_absolute_magnitude(vel_disp, rng);
            let apmag = abmag + self.cosmo.distmod(z_lens)? - DUST_EXTINCTION;
            sample.misc.insert("lens_light_abmag".into(), abmag);
            derive(sample, Component::LensLight, "magnitude", apmag);

            if let Some(plane) = &self.lens_size {
                let r_eff_kpc = plane.sample_effective_radius(vel_disp, apmag, rng);
                let r_eff = r_eff_kpc * self.cosmo.arcsec_per_kpc_comoving(z_lens)?;
                sample.misc.insert("lens_light_R_eff".into(), r_eff_kpc);
                derive(sample, Component::LensLight, "R_sersic", r_eff);

                if let Some(hyperplane) = &self.mass_slope {
                    let gamma = hyperplane.sample_gamma(r_eff_kpc, rng);
                    derive(sample, Component::LensMass, "gamma", gamma);
                }
            }
        }

        if let Some(axis_ratio) = &self.lens_axis_ratio {
            let q = axis_ratio.sample_axis_ratio(vel_disp, rng)?;
            derive(sample, Component::LensLight, "q", q);
        }
        Ok(())
    }

    fn derive_source<R: Rng + ?Sized>(&self, sample: &mut Sample, z_src: f64, rng: &mut R) -> Result<()> {
        let Some(luminosity) = &self.src_luminosity else {
            return Ok(());
        };
        let weights = luminosity.weights(z_src, &self.src_magnitudes);
        let abmag = crate::empirical::choose_weighted(&self.src_magnitudes, &weights, rng)?;
        let apmag = abmag + self.cosmo.distmod(z_src)? - DUST_EXTINCTION;
        sample.misc.insert("src_light_abmag".into(), abmag);
        derive(sample, Component::SrcLight, "magnitude", apmag);

        if let Some(size) = &self.src_size {
            let r_eff_kpc = size.sample_effective_radius(z_src, abmag, rng);
            let r_eff = r_eff_kpc * self.cosmo.arcsec_per_kpc_comoving(z_src)?;
            sample.misc.insert("src_light_R_eff".into(), r_eff_kpc);
            derive(sample, Component::SrcLight, "R_sersic", r_eff);
        }
        Ok(())
    }
}

/// Store a derived value if `component` is active
fn derive(sample: &mut Sample, component: Component, name: &str, value: f64) {
    if let Some(params) = sample.components.get_mut(component) {
        log::trace!("{component}.{name} = {value} (derived)");
        params.insert(name.to_string(), value);
    }
}
