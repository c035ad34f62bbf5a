//! Independent draws for every parameter

use rand::Rng;

use super::compose::{
    compile_components, convert_all_qphi, draw_all_independent, reframe_source_center,
    share_lens_center, ComponentDraws,
};
use crate::config::PriorConfig;
use crate::error::Result;
use crate::sample::Sample;

/// Prior whose parameters are all independent draws.
///
/// The only couplings are positional: the source is placed relative to the
/// lens and the lens light sits on the lens mass center.
#[derive(Debug, Clone)]
pub struct DiagonalPrior {
    components: Vec<ComponentDraws>,
}

impl DiagonalPrior {
    pub fn new(config: &PriorConfig) -> Result<Self> {
        let components = compile_components(
            &config.components,
            |component| config.component_spec(component),
            |_| &[],
        )?;
        Ok(Self { components })
    }

    pub(crate) fn draws(&self) -> &[ComponentDraws] {
        &self.components
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Sample> {
        let mut sample = self.draw(rng)?;
        self.compose(&mut sample);
        Ok(sample)
    }

    /// Independent draws, before any conversion
    pub(crate) fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Sample> {
        let active: Vec<_> = self.components.iter().map(|d| d.component).collect();
        let mut sample = Sample::with_components(&active);
        draw_all_independent(&mut sample, &self.components, rng)?;
        Ok(sample)
    }

    /// Ellipticity conversion and positional composition
    pub(crate) fn compose(&self, sample: &mut Sample) {
        convert_all_qphi(sample, &self.components);
        reframe_source_center(sample, "center_x", "center_y");
        share_lens_center(sample);
    }
}
