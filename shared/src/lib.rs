//! Shared numerical components for the lens prior workspace.
//!
//! Holds the pieces that carry no lensing semantics: sampling grids,
//! quadrature, summary statistics used by the statistical tests, and the
//! deterministic per-worker seeding used for batched draws.

pub mod algo;
pub mod grid;

pub use grid::{GridError, GridSpec};
