//! Building blocks shared by every prior variant.
//!
//! Each helper realises one rule of sample composition: independent draws,
//! the (q, φ) → (e1, e2) conversion, placing the source relative to the lens,
//! sharing the lens center, and anchoring the external shear. The variants
//! apply them in their own order.

use rand::Rng;

use crate::config::{ComponentSpec, GridModelConfig, ParameterSpec};
use crate::cosmology::Cosmology;
use crate::distributions::Distribution;
use crate::ellipticity::phi_q2_ellipticity;
use crate::empirical::{choose_distinct_pair, choose_weighted, EmpiricalModel};
use crate::error::{PriorError, Result};
use crate::sample::{Component, Params, Profile, Sample};

/// Compiled independent draws of one component.
///
/// Every distribution-specified parameter is turned into a [`Distribution`]
/// up front, so unknown families and bad hyperparameters fail when the prior
/// is built rather than on the first draw.
#[derive(Debug, Clone)]
pub struct ComponentDraws {
    pub component: Component,
    pub profile: Profile,
    draws: Vec<(String, Distribution)>,
}

impl ComponentDraws {
    /// Compile the distribution-specified parameters of `spec`.
    ///
    /// # Arguments
    /// * `component` - Component the spec belongs to
    /// * `spec` - Declarative spec from the configuration
    /// * `model_slots` - Parameters the caller derives from empirical
    ///   models; a model reference anywhere else is a configuration error
    pub fn compile(component: Component, spec: &ComponentSpec, model_slots: &[&str]) -> Result<Self> {
        let mut draws = Vec::new();
        for (name, param) in &spec.params {
            match param {
                ParameterSpec::Dist(_) if is_shared_center(component, name) => {
                    log::debug!("{component}.{name} follows the lens mass center, not drawn");
                }
                ParameterSpec::Dist(dist) => {
                    let distribution = Distribution::from_spec(dist).map_err(|e| {
                        PriorError::config(format!("{component}.{name}: {e}"))
                    })?;
                    draws.push((name.clone(), distribution));
                }
                ParameterSpec::Model(model) if !model_slots.contains(&name.as_str()) => {
                    return Err(PriorError::config(format!(
                        "model '{}' cannot produce {component}.{name}",
                        model.name
                    )));
                }
                ParameterSpec::Model(_) | ParameterSpec::Derived => {}
            }
        }
        log::debug!(
            "Compiled {} independent draws for {component} ({})",
            draws.len(),
            spec.profile
        );
        Ok(Self {
            component,
            profile: spec.profile,
            draws,
        })
    }

    pub fn distribution(&self, name: &str) -> Option<&Distribution> {
        self.draws
            .iter()
            .find_map(|(param, dist)| (param == name).then_some(dist))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.draws.iter().map(|(name, _)| name.as_str())
    }
}

/// Lens light position, always copied from the lens mass by [`share_lens_center`]
fn is_shared_center(component: Component, name: &str) -> bool {
    component == Component::LensLight && matches!(name, "center_x" | "center_y")
}

/// Compile the independent draws of every component in `components`.
pub fn compile_components<'a>(
    components: &[Component],
    spec_of: impl Fn(Component) -> Result<&'a ComponentSpec>,
    model_slots: impl Fn(Component) -> &'static [&'static str],
) -> Result<Vec<ComponentDraws>> {
    components
        .iter()
        .map(|&component| ComponentDraws::compile(component, spec_of(component)?, model_slots(component)))
        .collect()
}

/// Draw every compiled parameter of `draws` that `params` does not hold yet.
pub fn draw_independent<R: Rng + ?Sized>(
    params: &mut Params,
    draws: &ComponentDraws,
    rng: &mut R,
) -> Result<()> {
    for (name, dist) in &draws.draws {
        if params.contains_key(name) {
            continue;
        }
        let value = dist.sample(rng)?;
        log::trace!("{}.{name} = {value} (independent draw)", draws.component);
        params.insert(name.clone(), value);
    }
    Ok(())
}

/// Draw the independent parameters of every component into `sample`.
pub fn draw_all_independent<R: Rng + ?Sized>(
    sample: &mut Sample,
    components: &[ComponentDraws],
    rng: &mut R,
) -> Result<()> {
    for draws in components {
        let params = sample
            .components
            .get_mut(draws.component)
            .ok_or_else(|| PriorError::config(format!("{} is not in the sample", draws.component)))?;
        draw_independent(params, draws, rng)?;
    }
    Ok(())
}

/// Grid of values with draw weights, built once per prior
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedGrid {
    values: Vec<f64>,
    weights: Vec<f64>,
}

impl WeightedGrid {
    pub fn new(values: Vec<f64>, weights: Vec<f64>) -> Result<Self> {
        if values.len() != weights.len() {
            return Err(PriorError::config(format!(
                "grid of {} points has {} weights",
                values.len(),
                weights.len()
            )));
        }
        if !weights.iter().any(|&w| w > 0.0) {
            return Err(PriorError::config("grid has no point with positive weight"));
        }
        Ok(Self { values, weights })
    }

    /// Redshift grid weighted by the differential comoving volume
    pub fn redshifts(cosmo: &Cosmology, redshift: &GridModelConfig) -> Result<Self> {
        match EmpiricalModel::resolve(&redshift.model, None)? {
            EmpiricalModel::ComovingVolume => {}
            other => {
                return Err(PriorError::config(format!(
                    "redshift grid cannot be weighted by the {} model",
                    other.role()
                )))
            }
        }
        let values = redshift.grid.values();
        let weights = cosmo.differential_comoving_volume_grid(&values)?;
        log::debug!(
            "Redshift grid of {} points over [{}, {})",
            values.len(),
            redshift.grid.start,
            redshift.grid.stop
        );
        Self::new(values, weights)
    }

    /// Velocity dispersion grid weighted by a velocity dispersion function
    pub fn velocity_dispersions(vel_disp: &GridModelConfig) -> Result<Self> {
        let vdf = match EmpiricalModel::resolve(&vel_disp.model, None)? {
            EmpiricalModel::VelocityDispersion(vdf) => vdf,
            other => {
                return Err(PriorError::config(format!(
                    "velocity dispersion grid cannot be weighted by the {} model",
                    other.role()
                )))
            }
        };
        let values = vel_disp.grid.values();
        let weights = vdf.weights(&values);
        log::debug!(
            "Velocity dispersion grid of {} points over [{}, {}) km/s",
            values.len(),
            vel_disp.grid.start,
            vel_disp.grid.stop
        );
        Self::new(values, weights)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        choose_weighted(&self.values, &self.weights, rng)
    }

    /// Two distinct points in increasing order
    pub fn choose_pair<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<(f64, f64)> {
        choose_distinct_pair(&self.values, &self.weights, rng)
    }
}

/// Replace `q, phi` by `e1, e2` when `profile` takes Cartesian ellipticity.
///
/// Leaves `params` untouched if `e1` is already present or either of `q`,
/// `phi` is missing.
///
/// # Returns
/// Whether a conversion happened
pub fn convert_qphi_to_e1e2(params: &mut Params, profile: Profile) -> bool {
    if !profile.uses_ellipticity() || params.contains_key("e1") {
        return false;
    }
    let (Some(&q), Some(&phi)) = (params.get("q"), params.get("phi")) else {
        return false;
    };
    params.remove("q");
    params.remove("phi");
    let (e1, e2) = phi_q2_ellipticity(phi, q);
    params.insert("e1".into(), e1);
    params.insert("e2".into(), e2);
    true
}

/// [`convert_qphi_to_e1e2`] for every non-pixel component of `sample`.
pub fn convert_all_qphi(sample: &mut Sample, components: &[ComponentDraws]) {
    for draws in components.iter().filter(|d| !d.profile.is_pixel()) {
        if let Some(params) = sample.components.get_mut(draws.component) {
            if convert_qphi_to_e1e2(params, draws.profile) {
                log::trace!("{}.e1, e2 from q, phi (sibling conversion)", draws.component);
            }
        }
    }
}

/// Lens mass center, the origin of every relative position
pub fn lens_center(sample: &Sample) -> (f64, f64) {
    (
        sample.param(Component::LensMass, "center_x").unwrap_or(0.0),
        sample.param(Component::LensMass, "center_y").unwrap_or(0.0),
    )
}

/// Translate the source position `(x_key, y_key)` from lens-relative to
/// absolute coordinates.
///
/// Missing source coordinates are taken as zero offset.
pub fn reframe_source_center(sample: &mut Sample, x_key: &str, y_key: &str) {
    let (lens_x, lens_y) = lens_center(sample);
    if let Some(src) = sample.components.get_mut(Component::SrcLight) {
        *src.entry(x_key.to_string()).or_insert(0.0) += lens_x;
        *src.entry(y_key.to_string()).or_insert(0.0) += lens_y;
    }
}

/// Force the lens light center onto the lens mass center.
pub fn share_lens_center(sample: &mut Sample) {
    let (lens_x, lens_y) = lens_center(sample);
    if let Some(light) = sample.components.get_mut(Component::LensLight) {
        light.insert("center_x".into(), lens_x);
        light.insert("center_y".into(), lens_y);
    }
}

/// Define the external shear about the lens center (`ra_0`, `dec_0`).
pub fn anchor_external_shear(sample: &mut Sample) {
    let (lens_x, lens_y) = lens_center(sample);
    if let Some(shear) = sample.components.get_mut(Component::ExternalShear) {
        shear.insert("ra_0".into(), lens_x);
        shear.insert("dec_0".into(), lens_y);
    }
}
