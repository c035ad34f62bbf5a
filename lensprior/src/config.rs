//! Typed run configuration.
//!
//! A run is described by a single JSON document. Every section the prior
//! engine reads is a typed structure below; unknown keys are rejected when the
//! document is parsed so a misspelt hyperparameter never silently falls back
//! to a default. Sections that belong only to the external renderer
//! (`bandpass`, `observation`, `psf`) are carried through untouched.
//!
//! ```json
//! {
//!   "name": "gamma",
//!   "seed": 1113,
//!   "bnn_prior_class": "EmpiricalBNNPrior",
//!   "components": ["lens_mass", "external_shear", "src_light"],
//!   "bnn_omega": {
//!     "cosmology": {"H0": 70.0, "Om0": 0.3},
//!     "lens_mass": {
//!       "profile": "SPEMD",
//!       "center_x": {"dist": "normal", "mu": 0.0, "sigma": 1e-7},
//!       "gamma": {"model": "FundamentalMassHyperplane", "model_kwargs": {"fit_data": "SLACS"}}
//!     }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use shared::GridSpec;

use crate::error::{PriorError, Result};
use crate::pixel_light::PixelSourceSetup;
use crate::sample::{Component, Profile};

/// The prior variant a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PriorClass {
    #[serde(rename = "DiagonalBNNPrior")]
    Diagonal,
    #[serde(rename = "DiagonalCosmoBNNPrior")]
    DiagonalCosmo,
    #[serde(rename = "CovBNNPrior")]
    Cov,
    #[serde(rename = "EmpiricalBNNPrior")]
    Empirical,
    #[serde(rename = "GalsimSourcePrior")]
    GalsimSource,
    #[serde(rename = "RealSourcePrior")]
    RealSource,
}

/// Declarative description of one scalar parameter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawParameterSpec")]
pub enum ParameterSpec {
    /// Independent draw from a named distribution family
    Dist(DistSpec),
    /// Value produced by a named empirical relation
    Model(ModelSpec),
    /// Value computed from sibling parameters
    Derived,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistSpec {
    pub family: String,
    pub hyper: BTreeMap<String, f64>,
    /// Draw in log space and exponentiate
    pub log: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    pub fit_data: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelKwargs {
    fit_data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawParameterSpec {
    dist: Option<String>,
    model: Option<String>,
    model_kwargs: Option<ModelKwargs>,
    #[serde(default)]
    derived: bool,
    #[serde(default)]
    log: bool,
    #[serde(flatten)]
    hyper: BTreeMap<String, f64>,
}

impl TryFrom<RawParameterSpec> for ParameterSpec {
    type Error = String;

    fn try_from(raw: RawParameterSpec) -> std::result::Result<Self, Self::Error> {
        match (raw.dist, raw.model, raw.derived) {
            (Some(family), None, false) => {
                if raw.model_kwargs.is_some() {
                    return Err(format!("distribution '{family}' does not take model_kwargs"));
                }
                Ok(ParameterSpec::Dist(DistSpec {
                    family,
                    hyper: raw.hyper,
                    log: raw.log,
                }))
            }
            (None, Some(name), false) => {
                if let Some(key) = raw.hyper.keys().next() {
                    return Err(format!(
                        "model '{name}' takes its settings in model_kwargs, found '{key}'"
                    ));
                }
                Ok(ParameterSpec::Model(ModelSpec {
                    name,
                    fit_data: raw.model_kwargs.unwrap_or_default().fit_data,
                }))
            }
            (None, None, true) => {
                if !raw.hyper.is_empty() || raw.model_kwargs.is_some() {
                    return Err("a derived parameter takes no other settings".to_string());
                }
                Ok(ParameterSpec::Derived)
            }
            (None, None, false) => {
                Err("parameter needs one of 'dist', 'model' or 'derived'".to_string())
            }
            _ => Err("'dist', 'model' and 'derived' are mutually exclusive".to_string()),
        }
    }
}

/// Profile plus parameter specs of one component.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComponentSpec {
    pub profile: Profile,
    #[serde(flatten)]
    pub params: BTreeMap<String, ParameterSpec>,
}

impl ComponentSpec {
    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.get(name)
    }

    /// Names of parameters realised by independent draws.
    pub fn distributed(&self) -> impl Iterator<Item = (&str, &DistSpec)> {
        self.params.iter().filter_map(|(name, spec)| match spec {
            ParameterSpec::Dist(dist) => Some((name.as_str(), dist)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CosmologyConfig {
    /// Hubble constant in km/s/Mpc
    #[serde(rename = "H0")]
    pub h0: f64,
    #[serde(rename = "Om0")]
    pub om0: f64,
    /// Dark-energy density, flat closure when absent
    #[serde(rename = "Ode0", default)]
    pub ode0: Option<f64>,
    /// Dark-energy equation of state, cosmological constant when absent
    #[serde(default)]
    pub w0: Option<f64>,
}

/// A grid-weighted model: which density to weight by and over which grid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridModelConfig {
    pub model: String,
    pub grid: GridSpec,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct KinematicsConfig {
    #[serde(alias = "vel_disp", default)]
    pub velocity_dispersion: Option<GridModelConfig>,
    /// Numeric settings for an external kinematics estimator
    #[serde(flatten)]
    pub estimator: BTreeMap<String, f64>,
}

/// Mean and covariance of a jointly normal parameter block.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CovOmega {
    /// Per parameter, whether the normal is over its natural log; all
    /// linear when empty
    #[serde(default)]
    pub is_log: Vec<bool>,
    pub mu: Vec<f64>,
    pub cov_mat: Vec<Vec<f64>>,
}

/// Parameters drawn jointly, as `[component, parameter]` pairs in the order
/// of `cov_omega`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CovInfo {
    pub cov_params_list: Vec<(Component, String)>,
    pub cov_omega: CovOmega,
}

/// Hyperparameters of the whole hierarchy.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BnnOmega {
    #[serde(default)]
    pub cosmology: Option<CosmologyConfig>,
    #[serde(default)]
    pub redshift: Option<GridModelConfig>,
    #[serde(default)]
    pub kinematics: Option<KinematicsConfig>,
    /// Line-of-sight quantities such as `kappa_ext`
    #[serde(rename = "LOS", default)]
    pub los: BTreeMap<String, ParameterSpec>,
    /// Measurement-error settings for downstream time-delay modelling
    #[serde(default)]
    pub time_delays: Option<serde_json::Value>,
    /// Jointly normal block of parameters
    #[serde(default)]
    pub cov_info: Option<CovInfo>,
    #[serde(default)]
    pub lens_mass: Option<ComponentSpec>,
    #[serde(default)]
    pub external_shear: Option<ComponentSpec>,
    #[serde(default)]
    pub lens_light: Option<ComponentSpec>,
    #[serde(default)]
    pub src_light: Option<ComponentSpec>,
    #[serde(default)]
    pub agn_light: Option<ComponentSpec>,
}

impl BnnOmega {
    pub fn component(&self, component: Component) -> Option<&ComponentSpec> {
        match component {
            Component::LensMass => self.lens_mass.as_ref(),
            Component::ExternalShear => self.external_shear.as_ref(),
            Component::LensLight => self.lens_light.as_ref(),
            Component::SrcLight => self.src_light.as_ref(),
            Component::AgnLight => self.agn_light.as_ref(),
        }
    }
}

/// Optional lower and upper limits, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bounds {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Bounds {
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectionConfig {
    /// Post-render cut on total magnification (`min` only is meaningful)
    #[serde(default)]
    pub magnification: Option<Bounds>,
    /// Predicate strings evaluated on the sampled parameters
    #[serde(default)]
    pub initial: Vec<String>,
    /// Structured bounds keyed by `component.param`
    #[serde(default)]
    pub bounds: BTreeMap<String, Bounds>,
    /// Axis-ratio range applied to every component with (e1, e2) ellipticity
    #[serde(default)]
    pub ellipticity: Option<Bounds>,
    /// Bounds on image-derived features
    #[serde(default)]
    pub final_bounds: BTreeMap<String, Bounds>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ImageConfig {
    pub num_pix: usize,
    #[serde(default)]
    pub inverse: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstrumentConfig {
    /// Arcseconds per pixel
    pub pixel_scale: f64,
    /// Detector settings read by the renderer only
    #[serde(flatten)]
    pub detector: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumericsConfig {
    #[serde(default = "default_supersampling")]
    pub supersampling_factor: usize,
}

impl Default for NumericsConfig {
    fn default() -> Self {
        Self {
            supersampling_factor: default_supersampling(),
        }
    }
}

/// Fixed, non-sampled settings for pixelated profiles.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalConfig {
    #[serde(default)]
    pub src_light: Option<PixelSourceSetup>,
}

/// Source-near-caustics rejection loop.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CausticsConfig {
    /// Margin around the caustic bounding box, in pixels
    #[serde(default = "default_margin_pixels")]
    pub margin_pixels: f64,
    /// Redraw cap; `null` loops until the source lands inside
    #[serde(default = "default_max_caustic_attempts")]
    pub max_caustic_attempts: Option<u64>,
}

impl Default for CausticsConfig {
    fn default() -> Self {
        Self {
            margin_pixels: default_margin_pixels(),
            max_caustic_attempts: default_max_caustic_attempts(),
        }
    }
}

fn default_supersampling() -> usize {
    1
}

fn default_margin_pixels() -> f64 {
    1.0
}

fn default_max_caustic_attempts() -> Option<u64> {
    Some(10_000)
}

fn default_n_data() -> usize {
    200
}

fn default_checkpoint_interval() -> usize {
    1
}

/// Complete configuration of one generation run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PriorConfig {
    pub name: String,
    #[serde(default)]
    pub seed: u64,
    pub bnn_prior_class: PriorClass,
    #[serde(default = "default_n_data")]
    pub n_data: usize,
    #[serde(default)]
    pub train_vs_val: Option<String>,
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
    /// Active components, in the order they are declared
    pub components: Vec<Component>,
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub image: Option<ImageConfig>,
    #[serde(default)]
    pub instrument: Option<InstrumentConfig>,
    #[serde(default)]
    pub numerics: NumericsConfig,
    #[serde(default)]
    pub external: ExternalConfig,
    #[serde(default)]
    pub caustics: CausticsConfig,
    #[serde(default)]
    pub bandpass: Option<serde_json::Value>,
    #[serde(default)]
    pub observation: Option<serde_json::Value>,
    #[serde(default)]
    pub psf: Option<serde_json::Value>,
    pub bnn_omega: BnnOmega,
}

impl PriorConfig {
    /// Parse and validate a configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PriorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Structural checks that serde cannot express.
    ///
    /// Variant-specific requirements (cosmology for the empirical prior, a
    /// pixel setup for the pixel priors) are checked when the prior is built.
    pub fn validate(&self) -> Result<()> {
        if self.components.is_empty() {
            return Err(PriorError::config("no components configured"));
        }
        let mut seen = HashSet::new();
        for &component in &self.components {
            if !seen.insert(component) {
                return Err(PriorError::config(format!(
                    "component '{component}' listed twice"
                )));
            }
            if self.bnn_omega.component(component).is_none() {
                return Err(PriorError::config(format!(
                    "component '{component}' has no entry in bnn_omega"
                )));
            }
        }
        if self.checkpoint_interval == 0 {
            return Err(PriorError::config("checkpoint_interval must be positive"));
        }
        if self.numerics.supersampling_factor == 0 {
            return Err(PriorError::config("supersampling_factor must be positive"));
        }
        if let Some(redshift) = &self.bnn_omega.redshift {
            redshift.grid.validate()?;
        }
        if let Some(vel_disp) = self
            .bnn_omega
            .kinematics
            .as_ref()
            .and_then(|k| k.velocity_dispersion.as_ref())
        {
            vel_disp.grid.validate()?;
        }
        Ok(())
    }

    pub fn is_active(&self, component: Component) -> bool {
        self.components.contains(&component)
    }

    /// Spec of an active component.
    pub fn component_spec(&self, component: Component) -> Result<&ComponentSpec> {
        if !self.is_active(component) {
            return Err(PriorError::config(format!(
                "component '{component}' is not active"
            )));
        }
        self.bnn_omega.component(component).ok_or_else(|| {
            PriorError::config(format!("component '{component}' has no entry in bnn_omega"))
        })
    }
}
