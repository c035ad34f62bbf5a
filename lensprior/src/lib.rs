//! Hierarchical parameter priors for synthetic strong-lensing images
//!
//! This crate turns a declarative run configuration into lens, light and
//! cosmology parameter samples for an external image renderer: independent
//! draws from named distributions, covariant draws along empirical galaxy
//! scaling relations, and pixelated sources placed relative to the lens.
//! Samples can be filtered before and after rendering and exported as
//! flat metadata rows.

pub mod config;
pub mod cosmology;
pub mod distributions;
pub mod ellipticity;
pub mod empirical;
pub mod error;
pub mod lensing;
pub mod metadata;
pub mod pixel_light;
pub mod prior;
pub mod sample;
pub mod selection;

// Re-exports for easier access
pub use config::{PriorClass, PriorConfig};
pub use cosmology::Cosmology;
pub use distributions::Distribution;
pub use error::{PriorError, Result};
pub use metadata::MetadataWriter;
pub use pixel_light::PixelGeometry;
pub use prior::{BnnPrior, PriorBuilder};
pub use sample::{Component, Profile, Sample};
pub use selection::{ImageFeatures, SelectionFilter};
