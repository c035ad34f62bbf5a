//! Regular sampling grids for weighted discrete draws.
//!
//! Redshift and velocity-dispersion priors are realised by drawing from a
//! regular grid weighted by a physical density. This module provides the
//! grid description, its string form for command-line overrides, and the
//! half-open `arange` expansion used everywhere a grid is materialised.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating or parsing a grid.
#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("Grid must be in format 'start:stop:step', got '{0}'")]
    Format(String),
    #[error("Invalid {field} value '{value}'")]
    Number { field: &'static str, value: String },
    #[error("Grid step must be positive, got {0}")]
    NonPositiveStep(f64),
    #[error("Grid start ({start}) must be less than stop ({stop})")]
    EmptyRange { start: f64, stop: f64 },
}

/// Half-open regular grid `[start, stop)` with spacing `step`.
///
/// The expansion matches the usual `arange` convention: `stop` itself is
/// never part of the grid, and the number of points is
/// `ceil((stop - start) / step)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSpec {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl GridSpec {
    /// Create a grid, validating that it is non-empty and increasing.
    pub fn new(start: f64, stop: f64, step: f64) -> Result<Self, GridError> {
        let grid = Self { start, stop, step };
        grid.validate()?;
        Ok(grid)
    }

    /// Check the grid describes at least one point on an increasing axis.
    pub fn validate(&self) -> Result<(), GridError> {
        if !(self.step > 0.0) {
            return Err(GridError::NonPositiveStep(self.step));
        }
        if !(self.start < self.stop) {
            return Err(GridError::EmptyRange {
                start: self.start,
                stop: self.stop,
            });
        }
        Ok(())
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        if self.validate().is_err() {
            return 0;
        }
        // Guard against (stop - start) / step landing a hair above an integer
        let n = ((self.stop - self.start) / self.step - 1e-9).ceil();
        n.max(0.0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand the grid into its points.
    ///
    /// Points are computed as `start + i * step` rather than by repeated
    /// addition so round-off does not accumulate along long grids.
    pub fn values(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| self.start + i as f64 * self.step)
            .collect()
    }
}

impl FromStr for GridSpec {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err(GridError::Format(s.to_string()));
        }

        let parse = |field: &'static str, raw: &str| {
            raw.trim().parse::<f64>().map_err(|_| GridError::Number {
                field,
                value: raw.to_string(),
            })
        };

        GridSpec::new(
            parse("start", parts[0])?,
            parse("stop", parts[1])?,
            parse("step", parts[2])?,
        )
    }
}

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.stop, self.step)
    }
}
