//! Pixelated source light.
//!
//! A pixelated source is described in a sample by a catalog index and a
//! geometric transform (dilation, rotation, offset). Before rendering, these
//! are turned into an [`InterpolatedImage`]: a cutout on a grid fine enough
//! for the supersampled image, plus the placement scalars the renderer's
//! interpolation profile expects.
//!
//! Galaxy cutouts come from a [`PixelCatalog`]. [`AnalyticCatalog`] is the
//! built-in implementation; it draws elliptical Sersic galaxies and convolves
//! them with a Gaussian PSF.

use std::f64::consts::LN_2;
use std::fs;
use std::path::PathBuf;

use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::error::{PriorError, Result};
use crate::sample::Params;

/// Galaxy image type requested from the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GalaxyType {
    #[default]
    Real,
    Parametric,
}

/// PSF applied to catalog cutouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PsfType {
    /// The catalog's own PSF, dilated to the target resolution
    Real,
    #[default]
    Gaussian,
}

fn default_psf_fwhm() -> f64 {
    0.2
}

fn default_psf_size() -> usize {
    49
}

fn default_psf_pixel_size() -> f64 {
    0.074
}

fn default_draw_method() -> String {
    "auto".to_string()
}

/// Fixed settings of a pixelated source, shared by every sample of a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PixelSourceSetup {
    #[serde(default)]
    pub galaxy_type: GalaxyType,
    #[serde(default)]
    pub psf_type: PsfType,
    /// FWHM of the Gaussian PSF in arcsec
    #[serde(default = "default_psf_fwhm")]
    pub psf_gaussian_fwhm: f64,
    /// PSF kernel width in pixels, odd
    #[serde(default = "default_psf_size")]
    pub psf_size: usize,
    /// Pixel size the catalog PSF was measured at, in arcsec
    #[serde(default = "default_psf_pixel_size")]
    pub psf_pixel_size: f64,
    #[serde(default)]
    pub no_convolution: bool,
    #[serde(default)]
    pub catalog_dir: Option<PathBuf>,
    #[serde(default)]
    pub catalog_name: Option<String>,
    #[serde(default = "default_draw_method")]
    pub draw_image_method: String,
}

impl Default for PixelSourceSetup {
    fn default() -> Self {
        Self {
            galaxy_type: GalaxyType::default(),
            psf_type: PsfType::default(),
            psf_gaussian_fwhm: default_psf_fwhm(),
            psf_size: default_psf_size(),
            psf_pixel_size: default_psf_pixel_size(),
            no_convolution: false,
            catalog_dir: None,
            catalog_name: None,
            draw_image_method: default_draw_method(),
        }
    }
}

impl PixelSourceSetup {
    /// Location of the catalog file, when one is configured
    pub fn catalog_path(&self) -> Option<PathBuf> {
        let name = self.catalog_name.as_ref()?;
        Some(match &self.catalog_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        })
    }
}

/// Image size and resolution of the rendered lens images.
///
/// Cutouts are drawn on the supersampled grid: `num_pix × ssf` pixels of
/// `pixel_scale / ssf` arcsec, covering the same field of view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelGeometry {
    pub num_pix: usize,
    /// Arcsec per pixel of the final image
    pub pixel_scale: f64,
    pub supersampling_factor: usize,
}

impl PixelGeometry {
    pub fn new(num_pix: usize, pixel_scale: f64, supersampling_factor: usize) -> Result<Self> {
        if num_pix == 0 {
            return Err(PriorError::config("num_pix must be positive"));
        }
        if !(pixel_scale > 0.0) {
            return Err(PriorError::config(format!(
                "pixel_scale must be positive, got {pixel_scale}"
            )));
        }
        if supersampling_factor == 0 {
            return Err(PriorError::config("supersampling_factor must be positive"));
        }
        Ok(Self {
            num_pix,
            pixel_scale,
            supersampling_factor,
        })
    }

    /// Geometry from the `image`, `instrument` and `numerics` sections
    pub fn from_config(config: &crate::config::PriorConfig) -> Result<Self> {
        let image = config
            .image
            .as_ref()
            .ok_or_else(|| PriorError::NotConfigured("configuration has no image section".into()))?;
        let instrument = config.instrument.as_ref().ok_or_else(|| {
            PriorError::NotConfigured("configuration has no instrument section".into())
        })?;
        Self::new(
            image.num_pix,
            instrument.pixel_scale,
            config.numerics.supersampling_factor,
        )
    }

    /// Cutout width in pixels
    pub fn render_size(&self) -> usize {
        self.num_pix * self.supersampling_factor
    }

    /// Cutout pixel size in arcsec
    pub fn render_pixel_scale(&self) -> f64 {
        self.pixel_scale / self.supersampling_factor as f64
    }
}

/// One cutout requested from a catalog
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutoutRequest<'a> {
    pub index: usize,
    /// Dilation; the galaxy is drawn on pixels of `pixel_size / scale`
    pub scale: f64,
    /// Rotation in radians
    pub angle: f64,
    /// Offset of the galaxy from the cutout center, in cutout pixels
    pub offset_x: f64,
    pub offset_y: f64,
    pub image_size: usize,
    pub pixel_size: f64,
    pub setup: &'a PixelSourceSetup,
}

impl CutoutRequest<'_> {
    /// Pixel size the galaxy is drawn at
    pub fn effective_pixel_size(&self) -> f64 {
        self.pixel_size / self.scale
    }
}

/// A rendered galaxy and the PSF it was convolved with
#[derive(Debug, Clone, PartialEq)]
pub struct Cutout {
    pub image: Array2<f64>,
    pub psf_kernel: Array2<f64>,
}

/// Source of galaxy cutouts
pub trait PixelCatalog: Send + Sync {
    /// Number of galaxies in the catalog
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn render(&self, request: &CutoutRequest<'_>) -> Result<Cutout>;
}

/// Light profile of one [`AnalyticCatalog`] galaxy
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogGalaxy {
    /// Half-light radius in arcsec
    pub r_eff: f64,
    pub n_sersic: f64,
    /// Axis ratio in (0, 1]
    pub q: f64,
    /// Major-axis position angle in radians
    pub phi: f64,
}

impl CatalogGalaxy {
    /// Unnormalised surface brightness at `(x, y)` arcsec in the galaxy frame
    fn surface_brightness(&self, x: f64, y: f64) -> f64 {
        let (sin, cos) = self.phi.sin_cos();
        let xr = x * cos + y * sin;
        let yr = -x * sin + y * cos;
        let r = (self.q * xr * xr + yr * yr / self.q).sqrt();
        (-sersic_b(self.n_sersic) * ((r / self.r_eff).powf(1.0 / self.n_sersic) - 1.0)).exp()
    }
}

/// Sersic b_n, Ciotti & Bertin (1999) expansion
fn sersic_b(n: f64) -> f64 {
    2.0 * n - 1.0 / 3.0 + 4.0 / (405.0 * n) + 46.0 / (25515.0 * n * n)
}

/// Catalog of analytic Sersic galaxies
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticCatalog {
    galaxies: Vec<CatalogGalaxy>,
}

impl AnalyticCatalog {
    pub fn new(galaxies: Vec<CatalogGalaxy>) -> Result<Self> {
        if galaxies.is_empty() {
            return Err(PriorError::config("pixel catalog is empty"));
        }
        for (i, galaxy) in galaxies.iter().enumerate() {
            if !(galaxy.r_eff > 0.0 && galaxy.n_sersic > 0.0 && galaxy.q > 0.0 && galaxy.q <= 1.0) {
                return Err(PriorError::config(format!(
                    "catalog galaxy {i} has an invalid profile: {galaxy:?}"
                )));
            }
        }
        Ok(Self { galaxies })
    }

    /// Catalog of `count` galaxies with sizes, indices and shapes drawn from
    /// a generator seeded with `seed`
    pub fn synthetic(count: usize, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let galaxies = (0..count)
            .map(|_| CatalogGalaxy {
                r_eff: rng.gen_range(0.1..0.6),
                n_sersic: rng.gen_range(0.8..4.0),
                q: rng.gen_range(0.3..1.0),
                phi: rng.gen_range(0.0..std::f64::consts::PI),
            })
            .collect();
        Self::new(galaxies)
    }

    /// Load a JSON array of [`CatalogGalaxy`] entries
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let galaxies: Vec<CatalogGalaxy> = serde_json::from_str(&json)?;
        log::debug!("Loaded {} catalog galaxies from {}", galaxies.len(), path.display());
        Self::new(galaxies)
    }

    /// Catalog named by a pixel source setup, or the synthetic default
    pub fn from_setup(setup: &PixelSourceSetup) -> Result<Self> {
        match setup.catalog_path() {
            Some(path) => Self::from_file(&path),
            None => Self::synthetic(DEFAULT_CATALOG_SIZE, 0),
        }
    }

    pub fn galaxy(&self, index: usize) -> Option<&CatalogGalaxy> {
        self.galaxies.get(index)
    }
}

/// Size of the synthetic catalog used when no catalog file is configured
pub const DEFAULT_CATALOG_SIZE: usize = 96;

impl PixelCatalog for AnalyticCatalog {
    fn len(&self) -> usize {
        self.galaxies.len()
    }

    fn render(&self, request: &CutoutRequest<'_>) -> Result<Cutout> {
        let setup = request.setup;
        if setup.psf_type == PsfType::Real {
            return Err(PriorError::UnsupportedProfile(
                "analytic catalog has no measured PSF, use psf_type 'gaussian'".into(),
            ));
        }
        let galaxy = self.galaxy(request.index).ok_or_else(|| {
            PriorError::config(format!(
                "catalog index {} out of range for {} galaxies",
                request.index,
                self.len()
            ))
        })?;
        if !(request.scale > 0.0) {
            return Err(PriorError::config(format!(
                "cutout scale must be positive, got {}",
                request.scale
            )));
        }

        let pixel = request.effective_pixel_size();
        let size = request.image_size;
        let center = (size as f64 - 1.0) / 2.0;
        let rotated = CatalogGalaxy {
            phi: galaxy.phi + request.angle,
            ..*galaxy
        };
        let mut image = Array2::from_shape_fn((size, size), |(row, col)| {
            let x = (col as f64 - center - request.offset_x) * pixel;
            let y = (row as f64 - center - request.offset_y) * pixel;
            rotated.surface_brightness(x, y)
        });
        normalize(&mut image);

        let sigma_pixels = setup.psf_gaussian_fwhm / (2.0 * (2.0 * LN_2).sqrt()) / pixel;
        let psf_kernel = gaussian_kernel(setup.psf_size, sigma_pixels)?;
        if !setup.no_convolution {
            image = convolve_same(&image.view(), &psf_kernel.view());
        }

        Ok(Cutout { image, psf_kernel })
    }
}

fn normalize(image: &mut Array2<f64>) {
    let total = image.sum();
    if total > 0.0 {
        image.mapv_inplace(|v| v / total);
    }
}

/// Normalised Gaussian kernel of odd width `size`, `sigma` in pixels
pub fn gaussian_kernel(size: usize, sigma: f64) -> Result<Array2<f64>> {
    if size % 2 == 0 {
        return Err(PriorError::config(format!("PSF size must be odd, got {size}")));
    }
    if !(sigma > 0.0) {
        return Err(PriorError::config(format!("PSF sigma must be positive, got {sigma}")));
    }
    let half = (size / 2) as f64;
    let mut kernel = Array2::from_shape_fn((size, size), |(row, col)| {
        let (x, y) = (col as f64 - half, row as f64 - half);
        (-(x * x + y * y) / (2.0 * sigma * sigma)).exp()
    });
    normalize(&mut kernel);
    Ok(kernel)
}

/// 2-D convolution with zero padding; the output has the shape of `image`
pub fn convolve_same(image: &ArrayView2<f64>, kernel: &ArrayView2<f64>) -> Array2<f64> {
    let (rows, cols) = image.dim();
    let (k_rows, k_cols) = kernel.dim();
    let (pad_rows, pad_cols) = ((k_rows / 2) as isize, (k_cols / 2) as isize);

    Array2::from_shape_fn((rows, cols), |(i, j)| {
        let mut sum = 0.0;
        for ki in 0..k_rows {
            let row = i as isize + ki as isize - pad_rows;
            if row < 0 || row >= rows as isize {
                continue;
            }
            for kj in 0..k_cols {
                let col = j as isize + kj as isize - pad_cols;
                if col >= 0 && col < cols as isize {
                    sum += image[[row as usize, col as usize]] * kernel[[ki, kj]];
                }
            }
        }
        sum
    })
}

/// Rendering-ready description of a pixelated source
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedImage {
    pub image: Array2<f64>,
    /// Arcsec per image pixel
    pub scale: f64,
    pub center_x: f64,
    pub center_y: f64,
    pub phi_g: f64,
    /// Apparent magnitude the renderer normalises the image to
    pub magnitude: Option<f64>,
}

impl InterpolatedImage {
    /// Scalar parameters, as stored in the sample's `src_light` entry
    pub fn to_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("scale".into(), self.scale);
        params.insert("center_x".into(), self.center_x);
        params.insert("center_y".into(), self.center_y);
        params.insert("phi_G".into(), self.phi_g);
        if let Some(magnitude) = self.magnitude {
            params.insert("magnitude".into(), magnitude);
        }
        params
    }
}

/// Catalog-backed conversion of sampled pixel parameters
pub struct PixelSource {
    setup: PixelSourceSetup,
    catalog: std::sync::Arc<dyn PixelCatalog>,
}

impl std::fmt::Debug for PixelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelSource")
            .field("setup", &self.setup)
            .field("catalog_len", &self.catalog.len())
            .finish()
    }
}

fn param_or(params: &Params, keys: &[&str], default: f64) -> f64 {
    keys.iter()
        .find_map(|key| params.get(*key).copied())
        .unwrap_or(default)
}

impl PixelSource {
    pub fn new(setup: PixelSourceSetup, catalog: std::sync::Arc<dyn PixelCatalog>) -> Result<Self> {
        if catalog.is_empty() {
            return Err(PriorError::config("pixel catalog is empty"));
        }
        Ok(Self { setup, catalog })
    }

    pub fn setup(&self) -> &PixelSourceSetup {
        &self.setup
    }

    /// Catalog entry selected by a sampled `catalog_index`
    fn catalog_index(&self, params: &Params) -> Result<usize> {
        let raw = params
            .get("catalog_index")
            .copied()
            .ok_or_else(|| PriorError::config("GALSIM source needs a catalog_index parameter"))?;
        let index = raw.floor();
        if index < 0.0 || index >= self.catalog.len() as f64 {
            return Err(PriorError::config(format!(
                "catalog_index {raw} outside catalog of {} galaxies",
                self.catalog.len()
            )));
        }
        Ok(index as usize)
    }

    /// Render the cutout for sampled `GALSIM` parameters.
    ///
    /// `offset_pixels` shifts the galaxy inside the cutout; the returned
    /// image is centred at the origin with no further rotation.
    ///
    /// # Arguments
    /// * `geometry` - Target image geometry
    /// * `params` - Sampled `catalog_index`, `galsim_scale`, `galsim_angle`
    ///   and optional `magnitude`
    /// * `offset_pixels` - Galaxy offset in cutout pixels
    pub fn to_interpolated(
        &self,
        geometry: &PixelGeometry,
        params: &Params,
        offset_pixels: (f64, f64),
    ) -> Result<InterpolatedImage> {
        let pixel_size = geometry.render_pixel_scale();
        let request = CutoutRequest {
            index: self.catalog_index(params)?,
            scale: param_or(params, &["galsim_scale", "scale"], 1.0),
            angle: param_or(params, &["galsim_angle", "angle"], 0.0),
            offset_x: offset_pixels.0,
            offset_y: offset_pixels.1,
            image_size: geometry.render_size(),
            pixel_size,
            setup: &self.setup,
        };
        let cutout = self.catalog.render(&request)?;
        log::trace!(
            "Rendered catalog galaxy {} at scale {:.3} on {}x{} pixels",
            request.index,
            request.scale,
            request.image_size,
            request.image_size
        );
        Ok(InterpolatedImage {
            image: cutout.image,
            scale: pixel_size,
            center_x: 0.0,
            center_y: 0.0,
            phi_g: 0.0,
            magnitude: params.get("magnitude").copied(),
        })
    }
}
