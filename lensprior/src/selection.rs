//! Rejection of samples before and after rendering.
//!
//! The initial stage looks at sampled parameters only. Rules come from three
//! places in the `selection` section:
//!
//! * `initial`: predicate strings, either `lens_mass.theta_E > 0.5` or the
//!   older `lambda x: x['lens_mass']['theta_E'] > 0.5`,
//! * `bounds`: `{"lens_mass.gamma": {"min": 1.8, "max": 2.2}}`,
//! * `ellipticity`: axis-ratio bounds, expanded by
//!   [`SelectionFilter::add_ellipticity_selections`] into one rule per
//!   component with (e1, e2) ellipticity.
//!
//! Rules read parameters in the sampling domain, so `lens_mass.q` selects on
//! the drawn axis ratio even after the sample was converted to (e1, e2). A
//! rule that refers to a parameter the sample does not carry rejects the
//! sample. The final stage checks image-derived features such as the total
//! magnification once the renderer has produced them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::config::{Bounds, SelectionConfig};
use crate::ellipticity::ellipticity2phi_q;
use crate::error::{PriorError, Result};
use crate::prior::BnnPrior;
use crate::sample::{Component, Sample};

/// Consecutive initial-stage rejections tolerated before giving up
pub const DEFAULT_MAX_REJECTIONS: u64 = 100_000;

/// Comparison operator of a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Op {
    /// Longest tokens first so `>=` is not read as `>`
    const TOKENS: [(&'static str, Op); 6] = [
        (">=", Op::Ge),
        ("<=", Op::Le),
        ("==", Op::Eq),
        ("!=", Op::Ne),
        (">", Op::Gt),
        ("<", Op::Lt),
    ];

    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Op::Gt => lhs > rhs,
            Op::Ge => lhs >= rhs,
            Op::Lt => lhs < rhs,
            Op::Le => lhs <= rhs,
            Op::Eq => lhs == rhs,
            Op::Ne => lhs != rhs,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Eq => "==",
            Op::Ne => "!=",
        }
    }
}

/// A sampled quantity a rule looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Param(Component, String),
    Misc(String),
}

impl Target {
    fn new(component: &str, param: &str) -> Result<Self> {
        let param = param.trim();
        if param.is_empty() {
            return Err(PriorError::config(format!(
                "selection on '{component}' names no parameter"
            )));
        }
        match component.trim() {
            "misc" => Ok(Target::Misc(param.to_string())),
            other => Ok(Target::Param(other.parse()?, param.to_string())),
        }
    }

    /// Value of the target in the sampling domain.
    ///
    /// Parameters replaced by a conversion are read from the sample as
    /// drawn, and `q`, `phi` are recovered from `(e1, e2)` when the sample
    /// keeps no pre-conversion copy.
    pub fn value(&self, sample: &Sample) -> Option<f64> {
        match self {
            Target::Param(component, name) => sampled_param(sample, *component, name),
            Target::Misc(name) => sample.misc(name),
        }
    }
}

fn sampled_param(sample: &Sample, component: Component, name: &str) -> Option<f64> {
    sample
        .param(component, name)
        .or_else(|| sample.original.as_ref()?.param(component, name))
        .or_else(|| {
            let params = sample.params(component)?;
            let (phi, q) = ellipticity2phi_q(*params.get("e1")?, *params.get("e2")?);
            match name {
                "q" => Some(q),
                "phi" => Some(phi),
                _ => None,
            }
        })
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Param(component, name) => write!(f, "{component}.{name}"),
            Target::Misc(name) => write!(f, "misc.{name}"),
        }
    }
}

impl FromStr for Target {
    type Err = PriorError;

    /// `component.param`
    fn from_str(s: &str) -> Result<Self> {
        let (component, param) = s
            .split_once('.')
            .ok_or_else(|| PriorError::config(format!("expected 'component.param', got '{s}'")))?;
        Target::new(component, param)
    }
}

/// `target OP value`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub target: Target,
    pub op: Op,
    pub value: f64,
}

impl Predicate {
    /// Whether the sample passes; `None` if the target is absent.
    pub fn holds(&self, sample: &Sample) -> Option<bool> {
        self.target
            .value(sample)
            .map(|lhs| self.op.holds(lhs, self.value))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.target, self.op.symbol(), self.value)
    }
}

/// Split `expr` at its first comparison operator.
fn split_at_op(expr: &str) -> Option<(&str, Op, &str)> {
    let (index, token, op) = expr.char_indices().find_map(|(i, _)| {
        Op::TOKENS
            .iter()
            .find(|(token, _)| expr[i..].starts_with(token))
            .map(|&(token, op)| (i, token, op))
    })?;
    Some((&expr[..index], op, &expr[index + token.len()..]))
}

/// `x['component']['param']` to a [`Target`]
fn parse_subscript(lhs: &str) -> Result<Target> {
    let bad = || PriorError::config(format!("expected x['component']['param'], got '{lhs}'"));
    let inner = lhs
        .trim()
        .strip_prefix("x[")
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(bad)?;
    let (component, param) = inner.split_once("][").ok_or_else(bad)?;
    let unquote = |s: &str| s.trim().trim_matches(|c| c == '\'' || c == '"').to_string();
    Target::new(&unquote(component), &unquote(param))
}

impl FromStr for Predicate {
    type Err = PriorError;

    fn from_str(s: &str) -> Result<Self> {
        let (body, lambda) = match s.trim().strip_prefix("lambda") {
            Some(rest) => {
                let (_, body) = rest.split_once(':').ok_or_else(|| {
                    PriorError::config(format!("lambda selection without ':' in '{s}'"))
                })?;
                (body, true)
            }
            None => (s, false),
        };
        let (lhs, op, rhs) = split_at_op(body)
            .ok_or_else(|| PriorError::config(format!("no comparison operator in '{s}'")))?;
        let target = if lambda {
            parse_subscript(lhs)?
        } else {
            lhs.trim().parse()?
        };
        let value = rhs
            .trim()
            .parse::<f64>()
            .map_err(|e| PriorError::config(format!("bad value in selection '{s}': {e}")))?;
        Ok(Predicate { target, op, value })
    }
}

/// One initial-stage rule
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Predicate(Predicate),
    Bounds(Target, Bounds),
    /// Bounds on the axis ratio recovered from a component's (e1, e2)
    AxisRatio(Component, Bounds),
}

impl Rule {
    /// Whether `sample` passes; `None` when a needed parameter is absent.
    fn passes(&self, sample: &Sample) -> Option<bool> {
        match self {
            Rule::Predicate(predicate) => predicate.holds(sample),
            Rule::Bounds(target, bounds) => target.value(sample).map(|v| bounds.contains(v)),
            Rule::AxisRatio(component, bounds) => {
                axis_ratio(sample, *component).map(|q| bounds.contains(q))
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Predicate(predicate) => fmt::Display::fmt(predicate, f),
            Rule::Bounds(target, bounds) => write!(f, "{target} in [{:?}, {:?}]", bounds.min, bounds.max),
            Rule::AxisRatio(component, bounds) => {
                write!(f, "{component} axis ratio in [{:?}, {:?}]", bounds.min, bounds.max)
            }
        }
    }
}

/// Axis ratio of a component, from `q` or from `(e1, e2)`
fn axis_ratio(sample: &Sample, component: Component) -> Option<f64> {
    sampled_param(sample, component, "q")
}

/// Quantities measured on a rendered image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageFeatures {
    pub total_magnification: Option<f64>,
    pub extra: BTreeMap<String, f64>,
}

impl ImageFeatures {
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "total_magnification" => self.total_magnification,
            _ => self.extra.get(name).copied(),
        }
    }
}

/// Both selection stages of a run
#[derive(Debug, Clone, Default)]
pub struct SelectionFilter {
    rules: Vec<Rule>,
    ellipticity: Option<Bounds>,
    magnification_min: Option<f64>,
    final_bounds: BTreeMap<String, Bounds>,
}

impl SelectionFilter {
    pub fn new(config: &SelectionConfig) -> Result<Self> {
        let mut rules = config
            .initial
            .iter()
            .map(|s| s.parse().map(Rule::Predicate))
            .collect::<Result<Vec<_>>>()?;
        for (key, bounds) in &config.bounds {
            rules.push(Rule::Bounds(key.parse()?, *bounds));
        }
        log::debug!("{} initial selection rules", rules.len());
        Ok(Self {
            rules,
            ellipticity: config.ellipticity,
            magnification_min: config.magnification.and_then(|m| m.min),
            final_bounds: config.final_bounds.clone(),
        })
    }

    /// Both stages for a run of `prior`.
    ///
    /// Ellipticity selections are expanded for runs with parametric light
    /// only; with a pixelated profile the `ellipticity` bounds are ignored.
    pub fn for_prior(config: &SelectionConfig, prior: &BnnPrior) -> Result<Self> {
        let mut filter = Self::new(config)?;
        if prior.has_pixel_profile() {
            if filter.ellipticity.take().is_some() {
                log::info!("Pixelated run, skipping the ellipticity selection");
            }
        } else {
            filter.add_ellipticity_selections(&prior.ellipticity_components());
        }
        Ok(filter)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Turn the `ellipticity` axis-ratio bounds into one rule per component
    /// carrying (e1, e2) ellipticity.
    ///
    /// # Returns
    /// Number of rules added
    pub fn add_ellipticity_selections(&mut self, components: &[Component]) -> usize {
        let Some(bounds) = self.ellipticity.take() else {
            return 0;
        };
        for &component in components {
            self.rules.push(Rule::AxisRatio(component, bounds));
        }
        components.len()
    }

    /// Whether `sample` fails any initial rule.
    pub fn reject_initial(&self, sample: &Sample) -> bool {
        self.rules.iter().any(|rule| match rule.passes(sample) {
            Some(pass) => {
                if !pass {
                    log::trace!("Sample rejected by {rule}");
                }
                !pass
            }
            None => {
                log::warn!("Selection {rule} refers to a parameter the sample lacks, rejecting");
                true
            }
        })
    }

    /// Draw from `prior` until a sample passes the initial stage.
    ///
    /// # Arguments
    /// * `prior` - Prior to draw from
    /// * `rng` - Random generator
    /// * `max_rejections` - Consecutive rejections before giving up, `None`
    ///   for no limit
    ///
    /// # Returns
    /// The accepted sample and the number of samples rejected before it
    pub fn sample_accepted<R: Rng + ?Sized>(
        &self,
        prior: &BnnPrior,
        rng: &mut R,
        max_rejections: Option<u64>,
    ) -> Result<(Sample, u64)> {
        let mut rejected = 0u64;
        loop {
            let sample = prior.sample(rng)?;
            if !self.reject_initial(&sample) {
                return Ok((sample, rejected));
            }
            rejected += 1;
            if matches!(max_rejections, Some(max) if rejected >= max) {
                return Err(PriorError::RetryExhausted {
                    what: "drawing a sample that passes the initial selection".into(),
                    attempts: rejected,
                });
            }
        }
    }

    /// Whether rendered image features fail the final stage.
    pub fn reject_final(&self, features: &ImageFeatures) -> bool {
        if let Some(min) = self.magnification_min {
            match features.total_magnification {
                Some(mag) if mag >= min => {}
                Some(mag) => {
                    log::trace!("Image rejected: magnification {mag} below {min}");
                    return true;
                }
                None => {
                    log::warn!("Magnification cut set but no total_magnification measured, rejecting");
                    return true;
                }
            }
        }
        self.final_bounds.iter().any(|(name, bounds)| match features.get(name) {
            Some(value) => !bounds.contains(value),
            None => {
                log::warn!("Final selection on missing feature '{name}', rejecting");
                true
            }
        })
    }
}
