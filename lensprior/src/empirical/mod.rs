//! Empirical scaling relations and the registry that names them.
//!
//! Configuration files refer to relations by name, optionally with the
//! calibration dataset (`fit_data`) whose coefficients to use:
//!
//! ```json
//! "q": {"model": "AxisRatioRayleigh", "model_kwargs": {"fit_data": "SDSS"}}
//! ```
//!
//! [`EmpiricalModel::from_spec`] resolves such a reference through a static
//! registry. Unknown names and unknown calibration keys are configuration
//! errors at construction time; every model is immutable afterwards and can
//! be shared between threads.

pub mod kinematics;
pub mod luminosity;
pub mod shape;
pub mod size;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::config::ModelSpec;
use crate::error::{PriorError, Result};

pub use kinematics::VelocityDispersionFunction;
pub use luminosity::{FaberJackson, LuminosityFunction, SchechterBin, M_V_SUN};
pub use shape::{AxisRatioRayleigh, FundamentalMassHyperplane, MIN_AXIS_RATIO};
pub use size::{FundamentalPlane, SizeLuminosityRelation};

/// A resolved empirical relation
#[derive(Debug, Clone)]
pub enum EmpiricalModel {
    /// Redshift weights from the differential comoving volume
    ComovingVolume,
    VelocityDispersion(VelocityDispersionFunction),
    /// Einstein radius of a singular isothermal sphere
    SisEinsteinRadius,
    FaberJackson(FaberJackson),
    FundamentalPlane(FundamentalPlane),
    AxisRatio(AxisRatioRayleigh),
    MassSlope(FundamentalMassHyperplane),
    LuminosityFunction(LuminosityFunction),
    SizeRelation(SizeLuminosityRelation),
}

type Constructor = fn(Option<&str>) -> Result<EmpiricalModel>;

fn without_fit(name: &str, fit_data: Option<&str>, model: EmpiricalModel) -> Result<EmpiricalModel> {
    match fit_data {
        Some(fit) => Err(PriorError::config(format!(
            "model '{name}' takes no fit_data, got '{fit}'"
        ))),
        None => Ok(model),
    }
}

fn comoving_volume(fit_data: Option<&str>) -> Result<EmpiricalModel> {
    without_fit("differential_comoving_volume", fit_data, EmpiricalModel::ComovingVolume)
}

fn sis_einstein_radius(fit_data: Option<&str>) -> Result<EmpiricalModel> {
    without_fit("approximate_theta_E_for_SIS", fit_data, EmpiricalModel::SisEinsteinRadius)
}

fn velocity_dispersion(fit_data: Option<&str>) -> Result<EmpiricalModel> {
    VelocityDispersionFunction::from_fit(fit_data).map(EmpiricalModel::VelocityDispersion)
}

fn faber_jackson(fit_data: Option<&str>) -> Result<EmpiricalModel> {
    FaberJackson::from_fit(fit_data).map(EmpiricalModel::FaberJackson)
}

fn fundamental_plane(fit_data: Option<&str>) -> Result<EmpiricalModel> {
    FundamentalPlane::from_fit(fit_data).map(EmpiricalModel::FundamentalPlane)
}

fn axis_ratio(fit_data: Option<&str>) -> Result<EmpiricalModel> {
    AxisRatioRayleigh::from_fit(fit_data).map(EmpiricalModel::AxisRatio)
}

fn mass_slope(fit_data: Option<&str>) -> Result<EmpiricalModel> {
    FundamentalMassHyperplane::from_fit(fit_data).map(EmpiricalModel::MassSlope)
}

fn luminosity_function(fit_data: Option<&str>) -> Result<EmpiricalModel> {
    LuminosityFunction::from_fit(fit_data).map(EmpiricalModel::LuminosityFunction)
}

fn size_relation(fit_data: Option<&str>) -> Result<EmpiricalModel> {
    SizeLuminosityRelation::from_fit(fit_data).map(EmpiricalModel::SizeRelation)
}

/// Model names accepted in configuration files
static REGISTRY: Lazy<HashMap<&'static str, Constructor>> = Lazy::new(|| {
    let entries: [(&'static str, Constructor); 9] = [
        ("differential_comoving_volume", comoving_volume),
        ("vel_disp_function_CPV2007", velocity_dispersion),
        ("approximate_theta_E_for_SIS", sis_einstein_radius),
        ("FaberJackson", faber_jackson),
        ("FundamentalPlane", fundamental_plane),
        ("AxisRatioRayleigh", axis_ratio),
        ("FundamentalMassHyperplane", mass_slope),
        ("redshift_binned_luminosity_function", luminosity_function),
        ("size_from_luminosity_and_redshift_relation", size_relation),
    ];
    entries.into_iter().collect()
});

/// Sorted names of all registered models
pub fn registered_models() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

impl EmpiricalModel {
    /// Resolve a model by name and calibration dataset.
    pub fn resolve(name: &str, fit_data: Option<&str>) -> Result<Self> {
        let constructor = REGISTRY.get(name).ok_or_else(|| {
            PriorError::config(format!(
                "unknown empirical model '{name}', expected one of {:?}",
                registered_models()
            ))
        })?;
        let model = constructor(fit_data)?;
        log::debug!("Resolved empirical model {name} (fit_data {fit_data:?})");
        Ok(model)
    }

    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        Self::resolve(&spec.name, spec.fit_data.as_deref())
    }

    /// Short description of what the model produces, for error messages
    pub fn role(&self) -> &'static str {
        match self {
            EmpiricalModel::ComovingVolume => "redshift weights",
            EmpiricalModel::VelocityDispersion(_) => "velocity dispersion weights",
            EmpiricalModel::SisEinsteinRadius => "Einstein radius",
            EmpiricalModel::FaberJackson(_) => "lens luminosity",
            EmpiricalModel::FundamentalPlane(_) => "lens effective radius",
            EmpiricalModel::AxisRatio(_) => "lens light axis ratio",
            EmpiricalModel::MassSlope(_) => "mass profile slope",
            EmpiricalModel::LuminosityFunction(_) => "source luminosity",
            EmpiricalModel::SizeRelation(_) => "source effective radius",
        }
    }
}

fn weighted_index(weights: &[f64], what: &str) -> Result<WeightedIndex<f64>> {
    WeightedIndex::new(weights)
        .map_err(|e| PriorError::config(format!("cannot weight {what} grid: {e}")))
}

/// Draw one grid value with probability proportional to its weight.
pub fn choose_weighted<R: Rng + ?Sized>(grid: &[f64], weights: &[f64], rng: &mut R) -> Result<f64> {
    if grid.len() != weights.len() {
        return Err(PriorError::config(format!(
            "grid of {} points has {} weights",
            grid.len(),
            weights.len()
        )));
    }
    let index = weighted_index(weights, "sampling")?;
    Ok(grid[index.sample(rng)])
}

/// Draw two distinct grid points, weighted and without replacement, and
/// return them in increasing order.
///
/// At least two points need a positive weight.
pub fn choose_distinct_pair<R: Rng + ?Sized>(
    grid: &[f64],
    weights: &[f64],
    rng: &mut R,
) -> Result<(f64, f64)> {
    if grid.len() != weights.len() {
        return Err(PriorError::config(format!(
            "grid of {} points has {} weights",
            grid.len(),
            weights.len()
        )));
    }
    let mut index = weighted_index(weights, "pair")?;
    let first = index.sample(rng);
    index.update_weights(&[(first, &0.0)]).map_err(|e| {
        PriorError::config(format!("need two grid points with positive weight: {e}"))
    })?;
    let second = index.sample(rng);
    let (a, b) = (grid[first], grid[second]);
    Ok(if a <= b { (a, b) } else { (b, a) })
}
