//! Scalar distribution families used by independent parameter draws.
//!
//! A family is chosen by name and configured from a flat map of
//! hyperparameters, as in the configuration file:
//!
//! | family               | required        | optional         |
//! |----------------------|-----------------|------------------|
//! | `normal`             | `mu, sigma`     | `lower, upper`   |
//! | `lognormal`          | `mu, sigma`     | `lower, upper`   |
//! | `generalized_normal` | `mu, alpha, p`  | `lower, upper`   |
//! | `beta`               | `a, b`          | `lower=0, upper=1` (support rescaling) |
//! | `uniform`            | `lower, upper`  |                  |
//! | `one_minus_rayleigh` | `scale`         | `lower, upper`   |
//!
//! For every family except `beta` and `uniform`, `lower`/`upper` truncate the
//! support and are enforced by rejection. When both are present and equal the
//! bound itself is returned without touching the generator.

use std::collections::BTreeMap;

use rand::Rng;
use rand_distr::{Beta, Distribution as _, Gamma, LogNormal, Normal, Uniform, Weibull};

use crate::config::DistSpec;
use crate::error::{PriorError, Result};

/// Rejection attempts before a truncated draw gives up.
pub const MAX_TRUNCATION_ATTEMPTS: u64 = 1_000_000;

#[derive(Debug, Clone)]
enum Family {
    Normal(Normal<f64>),
    LogNormal(LogNormal<f64>),
    GeneralizedNormal {
        mu: f64,
        alpha: f64,
        p: f64,
        gamma: Gamma<f64>,
    },
    Beta {
        beta: Beta<f64>,
        lower: f64,
        upper: f64,
    },
    Uniform(Uniform<f64>),
    OneMinusRayleigh(Weibull<f64>),
    Constant(f64),
}

/// A configured scalar distribution with optional truncation.
#[derive(Debug, Clone)]
pub struct Distribution {
    family: Family,
    lower: Option<f64>,
    upper: Option<f64>,
    log: bool,
}

/// Keyword lookup that tracks which hyperparameters were consumed.
struct Hyper<'a> {
    family: &'a str,
    values: &'a BTreeMap<String, f64>,
    used: Vec<&'static str>,
}

impl<'a> Hyper<'a> {
    fn new(family: &'a str, values: &'a BTreeMap<String, f64>) -> Self {
        Self {
            family,
            values,
            used: Vec::new(),
        }
    }

    fn required(&mut self, key: &'static str) -> Result<f64> {
        self.optional(key)?.ok_or_else(|| {
            PriorError::config(format!(
                "distribution '{}' requires hyperparameter '{key}'",
                self.family
            ))
        })
    }

    fn optional(&mut self, key: &'static str) -> Result<Option<f64>> {
        self.used.push(key);
        match self.values.get(key) {
            Some(v) if !v.is_finite() => Err(PriorError::config(format!(
                "hyperparameter '{key}' of '{}' is not finite",
                self.family
            ))),
            other => Ok(other.copied()),
        }
    }

    /// Fail on any hyperparameter the family did not ask for.
    fn finish(self) -> Result<()> {
        let unused = self
            .values
            .keys()
            .find(|k| !self.used.iter().any(|used| *used == k.as_str()));
        match unused {
            Some(key) => Err(PriorError::config(format!(
                "distribution '{}' does not take hyperparameter '{key}'",
                self.family
            ))),
            None => Ok(()),
        }
    }
}

fn invalid(family: &str, err: impl std::fmt::Display) -> PriorError {
    PriorError::config(format!("invalid hyperparameters for '{family}': {err}"))
}

impl Distribution {
    /// Build a distribution from its family name and hyperparameters.
    ///
    /// # Arguments
    /// * `name` - Family name, see the module table
    /// * `hyper` - Hyperparameters keyed by name
    ///
    /// # Returns
    /// * `Ok(Distribution)` - Ready to sample
    /// * `Err(PriorError::Config)` - Unknown family, missing or unexpected
    ///   hyperparameters, or values the family rejects
    pub fn from_named(name: &str, hyper: &BTreeMap<String, f64>) -> Result<Self> {
        let mut h = Hyper::new(name, hyper);
        let (family, lower, upper) = match name {
            "normal" => {
                let mu = h.required("mu")?;
                let sigma = h.required("sigma")?;
                let normal = Normal::new(mu, sigma).map_err(|e| invalid(name, e))?;
                (Family::Normal(normal), h.optional("lower")?, h.optional("upper")?)
            }
            "lognormal" => {
                let mu = h.required("mu")?;
                let sigma = h.required("sigma")?;
                let lognormal = LogNormal::new(mu, sigma).map_err(|e| invalid(name, e))?;
                (
                    Family::LogNormal(lognormal),
                    h.optional("lower")?,
                    h.optional("upper")?,
                )
            }
            "generalized_normal" => {
                let mu = h.required("mu")?;
                let alpha = h.required("alpha")?;
                let p = h.required("p")?;
                if !(alpha > 0.0 && p > 0.0) {
                    return Err(invalid(name, "alpha and p must be positive"));
                }
                let gamma = Gamma::new(1.0 / p, 1.0).map_err(|e| invalid(name, e))?;
                (
                    Family::GeneralizedNormal {
                        mu,
                        alpha,
                        p,
                        gamma,
                    },
                    h.optional("lower")?,
                    h.optional("upper")?,
                )
            }
            "beta" => {
                let a = h.required("a")?;
                let b = h.required("b")?;
                let lower = h.optional("lower")?.unwrap_or(0.0);
                let upper = h.optional("upper")?.unwrap_or(1.0);
                if lower > upper {
                    return Err(invalid(name, "lower exceeds upper"));
                }
                let family = if lower == upper {
                    Family::Constant(lower)
                } else {
                    let beta = Beta::new(a, b).map_err(|e| invalid(name, e))?;
                    Family::Beta { beta, lower, upper }
                };
                (family, None, None)
            }
            "uniform" => {
                let lower = h.required("lower")?;
                let upper = h.required("upper")?;
                if lower > upper {
                    return Err(invalid(name, "lower exceeds upper"));
                }
                let family = if lower == upper {
                    Family::Constant(lower)
                } else {
                    Family::Uniform(Uniform::new(lower, upper))
                };
                (family, None, None)
            }
            "one_minus_rayleigh" => {
                let scale = h.required("scale")?;
                if !(scale > 0.0) {
                    return Err(invalid(name, "scale must be positive"));
                }
                // Rayleigh(s) is Weibull with shape 2 and scale s * sqrt(2)
                let weibull =
                    Weibull::new(scale * std::f64::consts::SQRT_2, 2.0).map_err(|e| invalid(name, e))?;
                (
                    Family::OneMinusRayleigh(weibull),
                    h.optional("lower")?,
                    h.optional("upper")?,
                )
            }
            other => {
                return Err(PriorError::config(format!(
                    "unknown distribution family '{other}'"
                )))
            }
        };
        h.finish()?;

        if let (Some(lo), Some(hi)) = (lower, upper) {
            if lo > hi {
                return Err(invalid(name, format!("lower ({lo}) exceeds upper ({hi})")));
            }
            if lo == hi {
                return Ok(Self {
                    family: Family::Constant(lo),
                    lower: None,
                    upper: None,
                    log: false,
                });
            }
        }

        Ok(Self {
            family,
            lower,
            upper,
            log: false,
        })
    }

    /// Build from a parsed parameter spec, honouring its `log` flag.
    pub fn from_spec(spec: &DistSpec) -> Result<Self> {
        Ok(Self::from_named(&spec.family, &spec.hyper)?.with_log(spec.log))
    }

    /// Draw in log space and exponentiate the result.
    pub fn with_log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    fn draw_raw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.family {
            Family::Normal(normal) => normal.sample(rng),
            Family::LogNormal(lognormal) => lognormal.sample(rng),
            Family::GeneralizedNormal {
                mu,
                alpha,
                p,
                gamma,
            } => {
                // |x - mu| / alpha raised to p is Gamma(1/p, 1)
                let magnitude = gamma.sample(rng).powf(1.0 / p);
                let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                mu + alpha * sign * magnitude
            }
            Family::Beta { beta, lower, upper } => lower + (upper - lower) * beta.sample(rng),
            Family::Uniform(uniform) => uniform.sample(rng),
            Family::OneMinusRayleigh(weibull) => 1.0 - weibull.sample(rng),
            Family::Constant(value) => *value,
        }
    }

    fn in_bounds(&self, value: f64) -> bool {
        self.lower.map_or(true, |lo| value >= lo) && self.upper.map_or(true, |hi| value <= hi)
    }

    /// Draw one value.
    ///
    /// Truncation bounds apply in the sampling domain, before the optional
    /// exponentiation.
    ///
    /// # Returns
    /// * `Ok(f64)` - The realised value
    /// * `Err(PriorError::RetryExhausted)` - If the bounds reject
    ///   [`MAX_TRUNCATION_ATTEMPTS`] draws in a row
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        let mut attempts = 0;
        let value = loop {
            let value = self.draw_raw(rng);
            if self.in_bounds(value) {
                break value;
            }
            attempts += 1;
            if attempts >= MAX_TRUNCATION_ATTEMPTS {
                return Err(PriorError::RetryExhausted {
                    what: format!(
                        "truncated draw within [{:?}, {:?}]",
                        self.lower, self.upper
                    ),
                    attempts,
                });
            }
        };
        Ok(if self.log { value.exp() } else { value })
    }
}

/// Draw one value from a family given by name.
pub fn sample_named<R: Rng + ?Sized>(
    name: &str,
    hyper: &BTreeMap<String, f64>,
    rng: &mut R,
) -> Result<f64> {
    Distribution::from_named(name, hyper)?.sample(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::algo::{ks_critical_value, ks_statistic, normal_cdf};

    fn hyper(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn draws(name: &str, pairs: &[(&str, f64)], n: usize, seed: u64) -> Vec<f64> {
        let dist = Distribution::from_named(name, &hyper(pairs)).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| dist.sample(&mut rng).unwrap()).collect()
    }

    #[test]
    fn test_normal_matches_cdf() {
        let samples = draws("normal", &[("mu", 1.5), ("sigma", 0.3)], 2000, 1);
        let stat = ks_statistic(&samples, |x| normal_cdf((x - 1.5) / 0.3));
        assert!(stat < ks_critical_value(samples.len(), 0.01), "KS {stat}");
    }

    #[test]
    fn test_zero_width_normal_is_constant() {
        let samples = draws("normal", &[("mu", 0.0), ("sigma", 0.0)], 50, 2);
        assert!(samples.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_equal_bounds_return_constant() {
        for (name, pairs) in [
            ("normal", vec![("mu", 0.0), ("sigma", 1.0), ("lower", 0.7), ("upper", 0.7)]),
            ("uniform", vec![("lower", -2.0), ("upper", -2.0)]),
            ("beta", vec![("a", 2.0), ("b", 3.0), ("lower", 0.4), ("upper", 0.4)]),
        ] {
            let samples = draws(name, &pairs, 20, 3);
            let expected = pairs.iter().find(|(k, _)| *k == "lower").unwrap().1;
            assert!(samples.iter().all(|&x| x == expected), "{name}");
        }
    }

    #[test]
    fn test_truncated_normal_respects_bounds() {
        let samples = draws(
            "normal",
            &[("mu", 2.0), ("sigma", 0.05), ("lower", 1.95), ("upper", 2.1)],
            1000,
            4,
        );
        assert!(samples.iter().all(|&x| (1.95..=2.1).contains(&x)));
    }

    #[test]
    fn test_generalized_normal_angle() {
        let pi = std::f64::consts::PI;
        let samples = draws(
            "generalized_normal",
            &[("mu", pi), ("alpha", pi), ("p", 10.0), ("lower", 0.0), ("upper", 2.0 * pi)],
            2000,
            5,
        );
        assert!(samples.iter().all(|&x| (0.0..=2.0 * pi).contains(&x)));
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert_relative_eq!(mean, pi, epsilon = 0.1);
    }

    #[test]
    fn test_generalized_normal_p2_is_gaussian() {
        // p = 2 reduces to a normal with sigma = alpha / sqrt(2)
        let alpha = 0.8;
        let samples = draws("generalized_normal", &[("mu", 0.0), ("alpha", alpha), ("p", 2.0)], 2000, 6);
        let sigma = alpha / std::f64::consts::SQRT_2;
        let stat = ks_statistic(&samples, |x| normal_cdf(x / sigma));
        assert!(stat < ks_critical_value(samples.len(), 0.01), "KS {stat}");
    }

    #[test]
    fn test_beta_is_rescaled() {
        let samples = draws("beta", &[("a", 4.0), ("b", 4.0), ("lower", -0.9), ("upper", 0.9)], 1000, 7);
        assert!(samples.iter().all(|&x| (-0.9..=0.9).contains(&x)));
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert_relative_eq!(mean, 0.0, epsilon = 0.05);
    }

    #[test]
    fn test_uniform_matches_cdf() {
        let samples = draws("uniform", &[("lower", -2.0), ("upper", 2.0)], 2000, 8);
        let stat = ks_statistic(&samples, |x| ((x + 2.0) / 4.0).clamp(0.0, 1.0));
        assert!(stat < ks_critical_value(samples.len(), 0.01), "KS {stat}");
    }

    #[test]
    fn test_one_minus_rayleigh() {
        let samples = draws("one_minus_rayleigh", &[("scale", 0.3)], 5000, 9);
        assert!(samples.iter().all(|&x| x <= 1.0));
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let expected = 1.0 - 0.3 * (std::f64::consts::PI / 2.0).sqrt();
        assert_relative_eq!(mean, expected, epsilon = 0.02);

        let bounded = draws("one_minus_rayleigh", &[("scale", 0.3), ("lower", 0.2)], 1000, 10);
        assert!(bounded.iter().all(|&x| (0.2..=1.0).contains(&x)));
    }

    #[test]
    fn test_log_flag_exponentiates() {
        let spec = DistSpec {
            family: "normal".into(),
            hyper: hyper(&[("mu", -0.35), ("sigma", 0.0)]),
            log: true,
        };
        let dist = Distribution::from_spec(&spec).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        assert_relative_eq!(dist.sample(&mut rng).unwrap(), (-0.35f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_lognormal_positive() {
        let samples = draws("lognormal", &[("mu", -2.73), ("sigma", 1.05)], 500, 12);
        assert!(samples.iter().all(|&x| x > 0.0));
    }

    #[test]
    fn test_config_errors() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            sample_named("cauchy", &hyper(&[]), &mut rng),
            Err(PriorError::Config(_))
        ));
        assert!(matches!(
            Distribution::from_named("normal", &hyper(&[("mu", 0.0)])),
            Err(PriorError::Config(msg)) if msg.contains("sigma")
        ));
        assert!(matches!(
            Distribution::from_named("normal", &hyper(&[("mu", 0.0), ("sigma", 1.0), ("scale", 1.0)])),
            Err(PriorError::Config(msg)) if msg.contains("scale")
        ));
        assert!(Distribution::from_named("uniform", &hyper(&[("lower", 1.0), ("upper", 0.0)])).is_err());
        assert!(Distribution::from_named("normal", &hyper(&[("mu", 0.0), ("sigma", -1.0)])).is_err());
    }

    #[test]
    fn test_impossible_truncation_gives_up() {
        let dist = Distribution::from_named(
            "normal",
            &hyper(&[("mu", 0.0), ("sigma", 0.0), ("lower", 1.0), ("upper", 2.0)]),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(13);
        assert!(matches!(
            dist.sample(&mut rng),
            Err(PriorError::RetryExhausted { .. })
        ));
    }
}
