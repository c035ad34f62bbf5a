//! Numerical algorithms shared across the workspace
//!
//! Quadrature for the cosmological distance integrals, summary statistics
//! for validating samplers, and parallel helpers with reproducible seeding.

pub mod parallel;
pub mod quadrature;
pub mod stats;

pub use parallel::{chunk_seed, map_in_parallel_chunks};
pub use quadrature::{simpson, QuadratureError};
pub use stats::{ks_critical_value, ks_statistic, ks_test_normal, median, normal_cdf, pearson_correlation};
