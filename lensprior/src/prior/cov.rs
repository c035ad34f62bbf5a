//! Independent draws plus a block of jointly normal parameters

use nalgebra::{Cholesky, DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use super::compose::{draw_all_independent, ComponentDraws};
use super::diagonal::DiagonalPrior;
use crate::config::{CovInfo, PriorConfig};
use crate::error::{PriorError, Result};
use crate::sample::{Component, Sample};

/// [`DiagonalPrior`] with the parameters of `bnn_omega.cov_info` drawn
/// together from one multivariate normal.
///
/// Parameters marked `is_log` are normal in their natural log. A jointly
/// drawn parameter takes precedence over a distribution configured for it
/// in its component.
#[derive(Debug, Clone)]
pub struct CovPrior {
    diagonal: DiagonalPrior,
    params: Vec<(Component, String)>,
    is_log: Vec<bool>,
    mu: DVector<f64>,
    /// Lower Cholesky factor of the covariance
    scale: DMatrix<f64>,
}

impl CovPrior {
    pub fn new(config: &PriorConfig) -> Result<Self> {
        let info = config
            .bnn_omega
            .cov_info
            .as_ref()
            .ok_or_else(|| PriorError::config("CovBNNPrior requires bnn_omega.cov_info"))?;
        check_cov_params(config, info)?;

        let omega = &info.cov_omega;
        let n = info.cov_params_list.len();
        if omega.mu.len() != n {
            return Err(PriorError::config(format!(
                "cov_omega.mu has {} entries for {n} parameters",
                omega.mu.len()
            )));
        }
        let is_log = match omega.is_log.len() {
            0 => vec![false; n],
            len if len == n => omega.is_log.clone(),
            len => {
                return Err(PriorError::config(format!(
                    "cov_omega.is_log has {len} entries for {n} parameters"
                )))
            }
        };
        if omega.cov_mat.len() != n || omega.cov_mat.iter().any(|row| row.len() != n) {
            return Err(PriorError::config(format!("cov_omega.cov_mat must be {n}x{n}")));
        }

        let cov = DMatrix::from_fn(n, n, |i, j| omega.cov_mat[i][j]);
        let asymmetry = (&cov - cov.transpose()).amax();
        if asymmetry > 1e-12 * cov.amax().max(1.0) {
            return Err(PriorError::config("cov_omega.cov_mat is not symmetric"));
        }
        let cholesky = Cholesky::new(cov)
            .ok_or_else(|| PriorError::config("cov_omega.cov_mat is not positive definite"))?;
        log::debug!(
            "Jointly normal block of {n} parameters: {:?}",
            info.cov_params_list
        );

        Ok(Self {
            diagonal: DiagonalPrior::new(config)?,
            params: info.cov_params_list.clone(),
            is_log,
            mu: DVector::from_column_slice(&omega.mu),
            scale: cholesky.l(),
        })
    }

    pub(crate) fn draws(&self) -> &[ComponentDraws] {
        self.diagonal.draws()
    }

    /// One draw of the joint block, in `cov_params_list` order
    pub fn draw_joint<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let z = DVector::from_fn(self.mu.len(), |_, _| rng.sample::<f64, _>(StandardNormal));
        let x = &self.mu + &self.scale * z;
        x.iter()
            .zip(&self.is_log)
            .map(|(&value, &log)| if log { value.exp() } else { value })
            .collect()
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Sample> {
        let active: Vec<_> = self.draws().iter().map(|d| d.component).collect();
        let mut sample = Sample::with_components(&active);
        let joint = self.draw_joint(rng);
        for ((component, name), value) in self.params.iter().zip(joint) {
            if let Some(params) = sample.components.get_mut(*component) {
                log::trace!("{component}.{name} = {value} (joint normal draw)");
                params.insert(name.clone(), value);
            }
        }
        draw_all_independent(&mut sample, self.draws(), rng)?;
        self.diagonal.compose(&mut sample);
        Ok(sample)
    }
}

/// Every jointly drawn parameter belongs to an active component and appears
/// once.
fn check_cov_params(config: &PriorConfig, info: &CovInfo) -> Result<()> {
    if info.cov_params_list.is_empty() {
        return Err(PriorError::config("cov_info.cov_params_list is empty"));
    }
    for (i, (component, name)) in info.cov_params_list.iter().enumerate() {
        if !config.is_active(*component) {
            return Err(PriorError::config(format!(
                "cov_info names {component}.{name} but {component} is not active"
            )));
        }
        if info.cov_params_list[..i].contains(&(*component, name.clone())) {
            return Err(PriorError::config(format!(
                "cov_info names {component}.{name} twice"
            )));
        }
    }
    Ok(())
}
