//! Lensing components, profiles and the realised sample record.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PriorError;
use crate::pixel_light::InterpolatedImage;

/// Realised parameters of one component, keyed by parameter name.
pub type Params = BTreeMap<String, f64>;

/// The lensing components a configuration may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    LensMass,
    ExternalShear,
    LensLight,
    SrcLight,
    AgnLight,
}

impl Component {
    /// All components, in the order they are sampled and exported.
    pub const ALL: [Component; 5] = [
        Component::LensMass,
        Component::ExternalShear,
        Component::LensLight,
        Component::SrcLight,
        Component::AgnLight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::LensMass => "lens_mass",
            Component::ExternalShear => "external_shear",
            Component::LensLight => "lens_light",
            Component::SrcLight => "src_light",
            Component::AgnLight => "agn_light",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = PriorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Component::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| PriorError::config(format!("unknown component '{s}'")))
    }
}

/// Mass and light profiles understood by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Profile {
    /// Softened power-law elliptical mass distribution
    Spemd,
    /// Singular isothermal ellipsoid
    Sie,
    /// Singular isothermal sphere
    Sis,
    /// External shear in Cartesian components
    Shear,
    /// External shear as modulus and angle
    ShearGammaPsi,
    Sersic,
    SersicEllipse,
    /// Point source given by its image-plane positions
    LensedPosition,
    /// Point source given by its source-plane position
    SourcePosition,
    /// Pixelated galaxy drawn from a cutout catalog
    Galsim,
    /// Rendering-ready interpolated pixel image
    Interpol,
}

impl Profile {
    /// Whether the profile is parameterised by the (e1, e2) ellipticity.
    pub fn uses_ellipticity(&self) -> bool {
        matches!(self, Profile::Spemd | Profile::Sie | Profile::SersicEllipse)
    }

    /// Whether the profile is a pixel image rather than a parametric model.
    pub fn is_pixel(&self) -> bool {
        matches!(self, Profile::Galsim | Profile::Interpol)
    }

    /// Whether the profile describes a lens mass distribution.
    pub fn is_mass(&self) -> bool {
        matches!(self, Profile::Spemd | Profile::Sie | Profile::Sis)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Profile::Spemd => "SPEMD",
            Profile::Sie => "SIE",
            Profile::Sis => "SIS",
            Profile::Shear => "SHEAR",
            Profile::ShearGammaPsi => "SHEAR_GAMMA_PSI",
            Profile::Sersic => "SERSIC",
            Profile::SersicEllipse => "SERSIC_ELLIPSE",
            Profile::LensedPosition => "LENSED_POSITION",
            Profile::SourcePosition => "SOURCE_POSITION",
            Profile::Galsim => "GALSIM",
            Profile::Interpol => "INTERPOL",
        };
        f.write_str(name)
    }
}

/// One slot per component; a slot is filled only for configured components.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentMap<T> {
    lens_mass: Option<T>,
    external_shear: Option<T>,
    lens_light: Option<T>,
    src_light: Option<T>,
    agn_light: Option<T>,
}

impl<T> Default for ComponentMap<T> {
    fn default() -> Self {
        Self {
            lens_mass: None,
            external_shear: None,
            lens_light: None,
            src_light: None,
            agn_light: None,
        }
    }
}

impl<T> ComponentMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, component: Component) -> &Option<T> {
        match component {
            Component::LensMass => &self.lens_mass,
            Component::ExternalShear => &self.external_shear,
            Component::LensLight => &self.lens_light,
            Component::SrcLight => &self.src_light,
            Component::AgnLight => &self.agn_light,
        }
    }

    fn slot_mut(&mut self, component: Component) -> &mut Option<T> {
        match component {
            Component::LensMass => &mut self.lens_mass,
            Component::ExternalShear => &mut self.external_shear,
            Component::LensLight => &mut self.lens_light,
            Component::SrcLight => &mut self.src_light,
            Component::AgnLight => &mut self.agn_light,
        }
    }

    pub fn get(&self, component: Component) -> Option<&T> {
        self.slot(component).as_ref()
    }

    pub fn get_mut(&mut self, component: Component) -> Option<&mut T> {
        self.slot_mut(component).as_mut()
    }

    pub fn insert(&mut self, component: Component, value: T) -> Option<T> {
        self.slot_mut(component).replace(value)
    }

    pub fn remove(&mut self, component: Component) -> Option<T> {
        self.slot_mut(component).take()
    }

    pub fn contains(&self, component: Component) -> bool {
        self.slot(component).is_some()
    }

    /// Filled slots in canonical component order.
    pub fn iter(&self) -> impl Iterator<Item = (Component, &T)> {
        Component::ALL
            .into_iter()
            .filter_map(move |c| self.get(c).map(|v| (c, v)))
    }

    pub fn components(&self) -> Vec<Component> {
        self.iter().map(|(c, _)| c).collect()
    }
}

/// One realised, internally consistent parameter set.
///
/// `components` holds a parameter map for every configured component and
/// nothing else; `misc` holds derived diagnostics (redshifts, velocity
/// dispersion, physical radii, absolute magnitudes).
#[derive(Debug, Clone, Default)]
pub struct Sample {
    pub components: ComponentMap<Params>,
    pub misc: Params,
    /// Rendering-ready source image for pixelated source profiles
    pub src_light_image: Option<InterpolatedImage>,
    /// The sample as drawn, before pixel-profile and ellipticity conversion
    pub original: Option<Box<Sample>>,
}

impl Sample {
    /// Empty sample with a parameter map for each of `components`.
    pub fn with_components(components: &[Component]) -> Self {
        let mut sample = Sample::default();
        for &component in components {
            sample.components.insert(component, Params::new());
        }
        sample
    }

    pub fn params(&self, component: Component) -> Option<&Params> {
        self.components.get(component)
    }

    /// Value of `component.name`, if the component is configured and the
    /// parameter was realised.
    pub fn param(&self, component: Component, name: &str) -> Option<f64> {
        self.components.get(component)?.get(name).copied()
    }

    pub fn misc(&self, name: &str) -> Option<f64> {
        self.misc.get(name).copied()
    }

    /// Flat `{component}_{parameter}` view for metadata export.
    ///
    /// Parameters of the original (pre-conversion) sample are added when the
    /// converted sample no longer carries them. `misc` keys are kept verbatim.
    pub fn flatten(&self) -> BTreeMap<String, f64> {
        let mut flat = BTreeMap::new();
        for (component, params) in self.components.iter() {
            for (name, value) in params {
                flat.insert(format!("{component}_{name}"), *value);
            }
        }
        if let Some(original) = &self.original {
            for (component, params) in original.components.iter() {
                for (name, value) in params {
                    flat.entry(format!("{component}_{name}")).or_insert(*value);
                }
            }
        }
        for (name, value) in &self.misc {
            flat.entry(name.clone()).or_insert(*value);
        }
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_names_round_trip() {
        for component in Component::ALL {
            assert_eq!(component.as_str().parse::<Component>().unwrap(), component);
        }
        assert!("dark_matter".parse::<Component>().is_err());
    }

    #[test]
    fn test_profile_from_config_names() {
        let profile: Profile = serde_json::from_str("\"SHEAR_GAMMA_PSI\"").unwrap();
        assert_eq!(profile, Profile::ShearGammaPsi);
        let profile: Profile = serde_json::from_str("\"SERSIC_ELLIPSE\"").unwrap();
        assert!(profile.uses_ellipticity());
        assert_eq!(profile.to_string(), "SERSIC_ELLIPSE");
        assert!(serde_json::from_str::<Profile>("\"NFW\"").is_err());
    }

    #[test]
    fn test_component_map_slots() {
        let mut map = ComponentMap::new();
        map.insert(Component::SrcLight, 2);
        map.insert(Component::LensMass, 1);
        assert_eq!(map.components(), vec![Component::LensMass, Component::SrcLight]);
        assert_eq!(map.get(Component::LensLight), None);
        assert_eq!(map.remove(Component::LensMass), Some(1));
        assert!(!map.contains(Component::LensMass));
    }

    #[test]
    fn test_flatten_naming_and_original() {
        let mut sample = Sample::with_components(&[Component::LensMass, Component::SrcLight]);
        sample
            .components
            .get_mut(Component::LensMass)
            .unwrap()
            .insert("theta_E".into(), 1.1);
        sample
            .components
            .get_mut(Component::SrcLight)
            .unwrap()
            .insert("scale".into(), 0.02);
        sample.misc.insert("z_lens".into(), 0.5);

        let mut original = Sample::with_components(&[Component::SrcLight]);
        original
            .components
            .get_mut(Component::SrcLight)
            .unwrap()
            .insert("galsim_angle".into(), 0.3);
        original
            .components
            .get_mut(Component::SrcLight)
            .unwrap()
            .insert("scale".into(), 99.0);
        sample.original = Some(Box::new(original));

        let flat = sample.flatten();
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["lens_mass_theta_E", "src_light_galsim_angle", "src_light_scale", "z_lens"]
        );
        // Converted values win over the original draw
        assert_eq!(flat["src_light_scale"], 0.02);
    }
}
