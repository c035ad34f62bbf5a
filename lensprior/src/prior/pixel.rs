//! Independent draws with a pixelated source.
//!
//! A `GALSIM` source is sampled like any other component (catalog index,
//! dilation, rotation, offset, magnitude) and then converted into an
//! [`InterpolatedImage`] the renderer can use directly. The conversion needs
//! the image geometry, so [`PixelSourcePrior::setup_pixel_profiles`] must be
//! called before the first sample.
//!
//! Two flavors share this machinery:
//!
//! * [`PixelFlavor::Galsim`] converts right after drawing. The sampled
//!   `center_x`, `center_y` of the source are offsets in cutout pixels.
//! * [`PixelFlavor::RealSource`] first makes sure the source sits near the
//!   caustics of the sampled lens, redrawing only its position, and places
//!   the converted image at that position.

use std::fmt;
use std::sync::Arc;

use rand::Rng;

use super::compose::{
    anchor_external_shear, compile_components, convert_all_qphi, draw_all_independent, lens_center,
    reframe_source_center, share_lens_center, ComponentDraws,
};
use crate::config::{CausticsConfig, PriorConfig};
use crate::distributions::Distribution;
use crate::error::{PriorError, Result};
use crate::lensing::{CausticBox, CausticSolver};
use crate::pixel_light::{AnalyticCatalog, PixelCatalog, PixelGeometry, PixelSource};
use crate::sample::{Component, Profile, Sample};

/// Which pixel-source prior a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFlavor {
    Galsim,
    /// Source kept within the lens caustics
    RealSource,
}

/// Source position redrawn until it lies near the caustics
#[derive(Debug, Clone)]
struct CausticPlacement {
    lens_profile: Profile,
    x_key: String,
    y_key: String,
    x_draw: Distribution,
    y_draw: Distribution,
}

pub struct PixelSourcePrior {
    flavor: PixelFlavor,
    components: Vec<ComponentDraws>,
    source: Option<PixelSource>,
    geometry: Option<PixelGeometry>,
    caustics: CausticsConfig,
    placement: Option<CausticPlacement>,
    solver: Arc<dyn CausticSolver>,
}

impl fmt::Debug for PixelSourcePrior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelSourcePrior")
            .field("flavor", &self.flavor)
            .field("components", &self.components)
            .field("source", &self.source)
            .field("geometry", &self.geometry)
            .field("caustics", &self.caustics)
            .field("placement", &self.placement)
            .finish_non_exhaustive()
    }
}

/// Only `GALSIM` sources are supported as pixelated profiles
fn check_pixel_profile(draws: &ComponentDraws) -> Result<()> {
    if !draws.profile.is_pixel() {
        return Ok(());
    }
    if draws.component != Component::SrcLight {
        return Err(PriorError::UnsupportedProfile(format!(
            "pixelated profile {} is only supported for src_light, not {}",
            draws.profile, draws.component
        )));
    }
    if draws.profile != Profile::Galsim {
        return Err(PriorError::UnsupportedProfile(format!(
            "pixelated light profiles other than GALSIM are not implemented, got {}",
            draws.profile
        )));
    }
    Ok(())
}

impl PixelSourcePrior {
    /// Build a pixel-source prior.
    ///
    /// # Arguments
    /// * `config` - Run configuration
    /// * `flavor` - Prior flavor
    /// * `catalog` - Galaxy catalog, or `None` for the [`AnalyticCatalog`]
    ///   the `external.src_light` setup describes
    /// * `solver` - Caustics backend for [`PixelFlavor::RealSource`]
    pub fn new(
        config: &PriorConfig,
        flavor: PixelFlavor,
        catalog: Option<Arc<dyn PixelCatalog>>,
        solver: Arc<dyn CausticSolver>,
    ) -> Result<Self> {
        let components = compile_components(
            &config.components,
            |component| config.component_spec(component),
            |_| &[],
        )?;
        for draws in &components {
            check_pixel_profile(draws)?;
        }
        let find = |component| components.iter().find(|d| d.component == component);

        let src = find(Component::SrcLight);
        let source = match src {
            Some(draws) if draws.profile == Profile::Galsim => {
                let setup = config.external.src_light.clone().unwrap_or_default();
                let catalog: Arc<dyn PixelCatalog> = match catalog {
                    Some(catalog) => catalog,
                    None => Arc::new(AnalyticCatalog::from_setup(&setup)?),
                };
                log::debug!("Pixelated source from a catalog of {} galaxies", catalog.len());
                Some(PixelSource::new(setup, catalog)?)
            }
            _ => None,
        };

        let placement = match (flavor, src) {
            (PixelFlavor::RealSource, Some(src)) => {
                let lens = find(Component::LensMass).ok_or_else(|| {
                    PriorError::config("RealSourcePrior needs an active lens_mass to place the source")
                })?;
                if !lens.profile.is_mass() {
                    return Err(PriorError::UnsupportedProfile(format!(
                        "no caustics for lens_mass profile {}",
                        lens.profile
                    )));
                }
                let key = |galsim: &str, plain: &str| {
                    let name = if src.distribution(galsim).is_some() { galsim } else { plain };
                    let draw = src.distribution(name).cloned().ok_or_else(|| {
                        PriorError::config(format!(
                            "RealSourcePrior redraws src_light.{name} and needs a distribution for it"
                        ))
                    })?;
                    Ok::<_, PriorError>((name.to_string(), draw))
                };
                let (x_key, x_draw) = key("galsim_center_x", "center_x")?;
                let (y_key, y_draw) = key("galsim_center_y", "center_y")?;
                Some(CausticPlacement {
                    lens_profile: lens.profile,
                    x_key,
                    y_key,
                    x_draw,
                    y_draw,
                })
            }
            _ => None,
        };

        Ok(Self {
            flavor,
            components,
            source,
            geometry: None,
            caustics: config.caustics,
            placement,
            solver,
        })
    }

    pub fn flavor(&self) -> PixelFlavor {
        self.flavor
    }

    pub(crate) fn draws(&self) -> &[ComponentDraws] {
        &self.components
    }

    /// Fix the image geometry the source is rendered for.
    pub fn setup_pixel_profiles(&mut self, geometry: PixelGeometry) {
        log::debug!(
            "Pixel profiles rendered on {}x{} pixels of {:.4} arcsec",
            geometry.render_size(),
            geometry.render_size(),
            geometry.render_pixel_scale()
        );
        self.geometry = Some(geometry);
    }

    pub fn pixel_geometry(&self) -> Option<&PixelGeometry> {
        self.geometry.as_ref()
    }

    fn geometry(&self) -> Result<&PixelGeometry> {
        self.geometry.as_ref().ok_or_else(|| {
            PriorError::NotConfigured(
                "image size and pixel scale not set, call setup_pixel_profiles first".into(),
            )
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Sample> {
        let geometry = if self.source.is_some() || self.placement.is_some() {
            Some(self.geometry()?)
        } else {
            None
        };

        let active: Vec<_> = self.components.iter().map(|d| d.component).collect();
        let mut sample = Sample::with_components(&active);
        draw_all_independent(&mut sample, &self.components, rng)?;

        match self.flavor {
            PixelFlavor::Galsim => self.compose_galsim(&mut sample, geometry)?,
            PixelFlavor::RealSource => self.compose_real_source(&mut sample, geometry, rng)?,
        }
        Ok(sample)
    }

    fn compose_galsim(&self, sample: &mut Sample, geometry: Option<&PixelGeometry>) -> Result<()> {
        let original = sample.clone();
        if let (Some(source), Some(geometry), Some(src)) = (
            &self.source,
            geometry,
            sample.components.get_mut(Component::SrcLight),
        ) {
            let offset = (
                src.get("center_x").copied().unwrap_or(0.0),
                src.get("center_y").copied().unwrap_or(0.0),
            );
            let image = source.to_interpolated(geometry, src, offset)?;
            *src = image.to_params();
            sample.src_light_image = Some(image);
        }
        convert_all_qphi(sample, &self.components);
        reframe_source_center(sample, "center_x", "center_y");
        place_image(sample, "center_x", "center_y");
        anchor_external_shear(sample);
        share_lens_center(sample);
        sample.original = Some(Box::new(original));
        Ok(())
    }

    fn compose_real_source<R: Rng + ?Sized>(
        &self,
        sample: &mut Sample,
        geometry: Option<&PixelGeometry>,
        rng: &mut R,
    ) -> Result<()> {
        if let (Some(placement), Some(geometry)) = (&self.placement, geometry) {
            self.ensure_source_in_caustics(sample, placement, geometry, rng)?;
        }
        anchor_external_shear(sample);
        let (x_key, y_key) = match &self.placement {
            Some(placement) => (placement.x_key.as_str(), placement.y_key.as_str()),
            None => ("center_x", "center_y"),
        };
        reframe_source_center(sample, x_key, y_key);
        share_lens_center(sample);

        let original = sample.clone();
        if let (Some(source), Some(geometry), Some(src)) = (
            &self.source,
            geometry,
            sample.components.get_mut(Component::SrcLight),
        ) {
            let mut image = source.to_interpolated(geometry, src, (0.0, 0.0))?;
            image.center_x = src.get(x_key).copied().unwrap_or(0.0);
            image.center_y = src.get(y_key).copied().unwrap_or(0.0);
            *src = image.to_params();
            sample.src_light_image = Some(image);
        }
        convert_all_qphi(sample, &self.components);
        sample.original = Some(Box::new(original));
        Ok(())
    }

    /// Redraw the source position until the source lies within the caustic
    /// bounding box of the sampled lens, widened by the configured margin.
    ///
    /// The source position is still relative to the lens center here; the
    /// check uses its absolute position. The number of redraws goes to
    /// `misc.caustic_redraws`.
    fn ensure_source_in_caustics<R: Rng + ?Sized>(
        &self,
        sample: &mut Sample,
        placement: &CausticPlacement,
        geometry: &PixelGeometry,
        rng: &mut R,
    ) -> Result<()> {
        let lens_mass = sample
            .params(Component::LensMass)
            .ok_or_else(|| PriorError::config("lens_mass was not sampled"))?;
        let points = self.solver.caustic_points(placement.lens_profile, lens_mass)?;
        let bbox = CausticBox::from_points(&points).ok_or_else(|| {
            PriorError::config("caustic solver returned no points for the sampled lens")
        })?;
        let margin = self.caustics.margin_pixels * geometry.pixel_scale;
        let (lens_x, lens_y) = lens_center(sample);

        let src = sample
            .components
            .get_mut(Component::SrcLight)
            .ok_or_else(|| PriorError::config("src_light was not sampled"))?;
        let mut redraws = 0u64;
        loop {
            let x = src.get(&placement.x_key).copied().unwrap_or(0.0);
            let y = src.get(&placement.y_key).copied().unwrap_or(0.0);
            if bbox.contains(lens_x + x, lens_y + y, margin) {
                break;
            }
            if let Some(max) = self.caustics.max_caustic_attempts {
                if redraws >= max {
                    return Err(PriorError::RetryExhausted {
                        what: "placing the source within the caustics".into(),
                        attempts: redraws,
                    });
                }
            }
            let (new_x, new_y) = (placement.x_draw.sample(rng)?, placement.y_draw.sample(rng)?);
            log::trace!("Source offset ({x}, {y}) outside caustics, redrawn as ({new_x}, {new_y})");
            src.insert(placement.x_key.clone(), new_x);
            src.insert(placement.y_key.clone(), new_y);
            redraws += 1;
        }
        if redraws > 0 {
            log::debug!("Source placed within the caustics after {redraws} redraws");
        }
        sample.misc.insert("caustic_redraws".into(), redraws as f64);
        Ok(())
    }
}

/// Move the interpolated image to the (absolute) source position.
fn place_image(sample: &mut Sample, x_key: &str, y_key: &str) {
    let Some(src) = sample.components.get(Component::SrcLight) else {
        return;
    };
    let (x, y) = (src.get(x_key).copied(), src.get(y_key).copied());
    if let (Some(image), Some(x), Some(y)) = (sample.src_light_image.as_mut(), x, y) {
        image.center_x = x;
        image.center_y = y;
    }
}
