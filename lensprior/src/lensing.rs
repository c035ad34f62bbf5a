//! Lensing geometry needed while sampling: Einstein radii and caustics.
//!
//! The full lens-equation machinery belongs to the renderer. The prior only
//! needs two things from it: the closed-form Einstein radius of a singular
//! isothermal sphere, and the rough extent of the source-plane caustics of a
//! sampled lens so sources can be placed where they will be multiply imaged.
//! The latter sits behind [`CausticSolver`] so a full ray-tracing backend can
//! be plugged in; [`IsothermalCaustics`] is the built-in backend.

use std::f64::consts::{PI, TAU};

use crate::cosmology::{Cosmology, ARCSEC_PER_RADIAN, SPEED_OF_LIGHT_KM_S};
use crate::ellipticity::ellipticity2phi_q;
use crate::error::{PriorError, Result};
use crate::sample::{Params, Profile};

/// Einstein radius of a singular isothermal sphere, in arcsec
///
/// θ_E = 4π (σ/c)² D_ls / D_s with angular diameter distances.
///
/// # Arguments
/// * `cosmo` - Background cosmology
/// * `vel_disp` - Isotropic velocity dispersion in km/s
/// * `z_lens` - Lens redshift
/// * `z_src` - Source redshift, at least `z_lens`
pub fn einstein_radius_sis(cosmo: &Cosmology, vel_disp: f64, z_lens: f64, z_src: f64) -> Result<f64> {
    let d_ls = cosmo.angular_diameter_distance_z1z2(z_lens, z_src)?;
    let d_s = cosmo.angular_diameter_distance(z_src)?;
    let theta_rad = 4.0 * PI * (vel_disp / SPEED_OF_LIGHT_KM_S).powi(2) * d_ls / d_s;
    Ok(theta_rad * ARCSEC_PER_RADIAN)
}

/// Source-plane caustics of a lens mass model
pub trait CausticSolver: Send + Sync {
    /// Points along the caustics of `lens_mass`, in arcsec
    ///
    /// # Arguments
    /// * `profile` - Mass profile of the lens
    /// * `lens_mass` - Realised lens mass parameters, with ellipticity as
    ///   either `(e1, e2)` or `(q, phi)`
    fn caustic_points(&self, profile: Profile, lens_mass: &Params) -> Result<Vec<(f64, f64)>>;
}

/// Axis-aligned bounding box of a set of caustic points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CausticBox {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl CausticBox {
    /// Bounding box of `points`, or `None` when there are none
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let mut bbox = Self {
            x_min: x0,
            x_max: x0,
            y_min: y0,
            y_max: y0,
        };
        for &(x, y) in rest {
            bbox.x_min = bbox.x_min.min(x);
            bbox.x_max = bbox.x_max.max(x);
            bbox.y_min = bbox.y_min.min(y);
            bbox.y_max = bbox.y_max.max(y);
        }
        Some(bbox)
    }

    /// Whether `(x, y)` lies in the box grown by `margin` on every side
    pub fn contains(&self, x: f64, y: f64, margin: f64) -> bool {
        self.x_min - margin <= x
            && x <= self.x_max + margin
            && self.y_min - margin <= y
            && y <= self.y_max + margin
    }
}

/// Axis ratios closer to 1 than this use the spherical deflection
const ROUND_TOLERANCE: f64 = 1e-6;

/// Caustics of isothermal lenses in closed form.
///
/// `SIE` and `SPEMD` lenses are treated as isothermal ellipsoids (the SPEMD
/// slope is ignored), `SIS` as round. The tangential critical curve of an
/// isothermal ellipsoid is an ellipse; sampling it and ray-shooting every
/// point through the lens equation traces the tangential caustic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsothermalCaustics {
    /// Points sampled along the critical curve
    pub n_points: usize,
}

impl Default for IsothermalCaustics {
    fn default() -> Self {
        Self { n_points: 256 }
    }
}

/// Lens mass geometry read from realised parameters
struct IsothermalLens {
    theta_e: f64,
    q: f64,
    phi: f64,
    center_x: f64,
    center_y: f64,
}

impl IsothermalLens {
    fn from_params(profile: Profile, params: &Params) -> Result<Self> {
        let get = |name: &str| {
            params.get(name).copied().ok_or_else(|| {
                PriorError::config(format!("lens_mass is missing '{name}' for caustics"))
            })
        };
        let theta_e = get("theta_E")?;
        if !(theta_e > 0.0) {
            return Err(PriorError::config(format!(
                "caustics need a positive theta_E, got {theta_e}"
            )));
        }

        let (phi, q) = match profile {
            Profile::Sis => (0.0, 1.0),
            _ => match (params.get("e1"), params.get("e2"), params.get("q"), params.get("phi")) {
                (Some(&e1), Some(&e2), _, _) => ellipticity2phi_q(e1, e2),
                (_, _, Some(&q), Some(&phi)) => (phi, q),
                _ => (0.0, 1.0),
            },
        };
        if !(q > 0.0 && q <= 1.0) {
            return Err(PriorError::config(format!(
                "lens axis ratio must lie in (0, 1], got {q}"
            )));
        }

        Ok(Self {
            theta_e,
            q,
            phi,
            center_x: params.get("center_x").copied().unwrap_or(0.0),
            center_y: params.get("center_y").copied().unwrap_or(0.0),
        })
    }

    /// Deflection at `(x, y)` in the principal frame, major axis along x
    fn deflection(&self, b: f64, x: f64, y: f64) -> (f64, f64) {
        let e = (1.0 - self.q * self.q).sqrt();
        if e < ROUND_TOLERANCE {
            let r = x.hypot(y);
            return (b * x / r, b * y / r);
        }
        let omega = (self.q * self.q * x * x + y * y).sqrt();
        let amp = b * self.q / e;
        (amp * (e * x / omega).atan(), amp * (e * y / omega).atanh())
    }

    fn to_sky(&self, x: f64, y: f64) -> (f64, f64) {
        let (sin, cos) = self.phi.sin_cos();
        (
            self.center_x + x * cos - y * sin,
            self.center_y + x * sin + y * cos,
        )
    }
}

impl CausticSolver for IsothermalCaustics {
    fn caustic_points(&self, profile: Profile, lens_mass: &Params) -> Result<Vec<(f64, f64)>> {
        if !profile.is_mass() {
            return Err(PriorError::UnsupportedProfile(format!(
                "no caustics for lens mass profile {profile}"
            )));
        }
        let lens = IsothermalLens::from_params(profile, lens_mass)?;
        // Critical curve q²x² + y² = (bq)², an ellipse with semi-axes b and bq
        let b = lens.theta_e / lens.q.sqrt();
        let n = self.n_points.max(4);

        Ok((0..n)
            .map(|i| {
                let t = TAU * i as f64 / n as f64;
                let (x, y) = (b * t.cos(), b * lens.q * t.sin());
                let (ax, ay) = lens.deflection(b, x, y);
                lens.to_sky(x - ax, y - ay)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(pairs: &[(&str, f64)]) -> Params {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_einstein_radius_sis() {
        let cosmo = Cosmology::flat(70.0, 0.3).unwrap();
        let theta_e = einstein_radius_sis(&cosmo, 250.0, 0.5, 2.0).unwrap();
        assert_relative_eq!(theta_e, 1.14529, max_relative = 1e-4);
        // θ_E scales with σ²
        let doubled = einstein_radius_sis(&cosmo, 500.0, 0.5, 2.0).unwrap();
        assert_relative_eq!(doubled, 4.0 * theta_e, max_relative = 1e-12);
        assert!(einstein_radius_sis(&cosmo, 250.0, 2.0, 0.5).is_err());
    }

    #[test]
    fn test_round_lens_caustic_collapses_to_center() {
        let lens = params(&[("theta_E", 1.2), ("center_x", 0.3), ("center_y", -0.1)]);
        let points = IsothermalCaustics::default()
            .caustic_points(Profile::Sis, &lens)
            .unwrap();
        let bbox = CausticBox::from_points(&points).unwrap();
        assert_relative_eq!(bbox.x_min, 0.3, epsilon = 1e-9);
        assert_relative_eq!(bbox.x_max, 0.3, epsilon = 1e-9);
        assert_relative_eq!(bbox.y_min, -0.1, epsilon = 1e-9);
        assert!(bbox.contains(0.3, -0.1, 0.0));
        assert!(!bbox.contains(0.5, -0.1, 0.08));
        assert!(bbox.contains(0.35, -0.1, 0.08));
    }

    #[test]
    fn test_elliptical_caustic_extent() {
        let (e1, e2) = crate::ellipticity::phi_q2_ellipticity(0.0, 0.6);
        let lens = params(&[("theta_E", 1.0), ("e1", e1), ("e2", e2)]);
        let points = IsothermalCaustics::default()
            .caustic_points(Profile::Sie, &lens)
            .unwrap();
        let bbox = CausticBox::from_points(&points).unwrap();
        // The tangential caustic is a diamond inside the Einstein ring
        assert!(bbox.x_max > 0.01 && bbox.y_max > 0.01);
        assert!(bbox.x_max < 1.0 && bbox.y_max < 1.0);
        assert_relative_eq!(bbox.x_min, -bbox.x_max, epsilon = 1e-9);
        assert_relative_eq!(bbox.y_min, -bbox.y_max, epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_swaps_extent() {
        let solver = IsothermalCaustics::default();
        let aligned = params(&[("theta_E", 1.0), ("q", 0.5), ("phi", 0.0)]);
        let rotated = params(&[("theta_E", 1.0), ("q", 0.5), ("phi", PI / 2.0)]);
        let a = CausticBox::from_points(&solver.caustic_points(Profile::Spemd, &aligned).unwrap()).unwrap();
        let r = CausticBox::from_points(&solver.caustic_points(Profile::Spemd, &rotated).unwrap()).unwrap();
        assert_relative_eq!(a.x_max, r.y_max, epsilon = 1e-9);
        assert_relative_eq!(a.y_max, r.x_max, epsilon = 1e-9);
    }

    #[test]
    fn test_unsupported_and_invalid_lenses() {
        let solver = IsothermalCaustics::default();
        let lens = params(&[("theta_E", 1.0)]);
        assert!(matches!(
            solver.caustic_points(Profile::SersicEllipse, &lens),
            Err(PriorError::UnsupportedProfile(_))
        ));
        assert!(solver.caustic_points(Profile::Sie, &params(&[])).is_err());
        assert!(solver
            .caustic_points(Profile::Sie, &params(&[("theta_E", 1.0), ("q", 1.5), ("phi", 0.0)]))
            .is_err());
        assert!(CausticBox::from_points(&[]).is_none());
    }
}
