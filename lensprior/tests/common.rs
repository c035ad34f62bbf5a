//! Common run configurations for lensprior tests
#![allow(dead_code)]

use lensprior::PriorConfig;

/// Lens at a fixed position, isothermal, with a Sersic source.
pub const DIAGONAL_FIXED_CENTER: &str = r#"{
    "name": "fixed_center",
    "bnn_prior_class": "DiagonalBNNPrior",
    "components": ["lens_mass", "src_light"],
    "bnn_omega": {
        "lens_mass": {
            "profile": "SIE",
            "center_x": {"dist": "normal", "mu": 0.0, "sigma": 0.0},
            "center_y": {"dist": "normal", "mu": 0.0, "sigma": 0.0},
            "theta_E": {"dist": "normal", "mu": 1.2, "sigma": 0.1, "lower": 0.3},
            "q": {"dist": "uniform", "lower": 0.5, "upper": 1.0},
            "phi": {"dist": "uniform", "lower": -1.5708, "upper": 1.5708}
        },
        "src_light": {
            "profile": "SERSIC",
            "center_x": {"dist": "uniform", "lower": -0.1, "upper": 0.1},
            "center_y": {"dist": "uniform", "lower": -0.1, "upper": 0.1},
            "R_sersic": {"dist": "lognormal", "mu": -1.0, "sigma": 0.2},
            "n_sersic": {"dist": "normal", "mu": 1.0, "sigma": 0.1, "lower": 0.5},
            "magnitude": {"dist": "uniform", "lower": 22.0, "upper": 25.0}
        }
    }
}"#;

/// Lens light with its own center hyperparameters, far from the mass.
pub const DIAGONAL_OFFSET_LIGHT: &str = r#"{
    "name": "offset_light",
    "bnn_prior_class": "DiagonalBNNPrior",
    "components": ["lens_mass", "external_shear", "lens_light", "src_light"],
    "bnn_omega": {
        "lens_mass": {
            "profile": "SPEMD",
            "center_x": {"dist": "normal", "mu": 0.05, "sigma": 0.05},
            "center_y": {"dist": "normal", "mu": -0.05, "sigma": 0.05},
            "theta_E": {"dist": "lognormal", "mu": 0.0, "sigma": 0.1},
            "gamma": {"dist": "normal", "mu": 2.0, "sigma": 0.1, "lower": 1.5, "upper": 2.5},
            "e1": {"dist": "beta", "a": 4.0, "b": 4.0, "lower": -0.5, "upper": 0.5},
            "e2": {"dist": "beta", "a": 4.0, "b": 4.0, "lower": -0.5, "upper": 0.5}
        },
        "external_shear": {
            "profile": "SHEAR_GAMMA_PSI",
            "gamma_ext": {"dist": "lognormal", "mu": -2.73, "sigma": 1.05},
            "psi_ext": {"dist": "uniform", "lower": -1.5708, "upper": 1.5708}
        },
        "lens_light": {
            "profile": "SERSIC_ELLIPSE",
            "center_x": {"dist": "normal", "mu": 10.0, "sigma": 1.0},
            "center_y": {"dist": "normal", "mu": -10.0, "sigma": 1.0},
            "R_sersic": {"dist": "normal", "mu": 0.8, "sigma": 0.1, "lower": 0.1},
            "n_sersic": {"dist": "normal", "mu": 3.0, "sigma": 0.5, "lower": 0.5},
            "q": {"dist": "uniform", "lower": 0.5, "upper": 1.0},
            "phi": {"dist": "uniform", "lower": -1.5708, "upper": 1.5708},
            "magnitude": {"dist": "uniform", "lower": 17.0, "upper": 20.0}
        },
        "src_light": {
            "profile": "SERSIC_ELLIPSE",
            "center_x": {"dist": "uniform", "lower": -0.2, "upper": 0.2},
            "center_y": {"dist": "uniform", "lower": -0.2, "upper": 0.2},
            "R_sersic": {"dist": "lognormal", "mu": -0.7, "sigma": 0.4},
            "n_sersic": {"dist": "normal", "mu": 1.0, "sigma": 0.3, "lower": 0.5},
            "q": {"dist": "uniform", "lower": 0.3, "upper": 1.0},
            "phi": {"dist": "uniform", "lower": -1.5708, "upper": 1.5708},
            "magnitude": {"dist": "uniform", "lower": 22.0, "upper": 25.0}
        }
    }
}"#;

/// Full empirical chain: redshifts, velocity dispersion, scaling relations.
pub const EMPIRICAL: &str = r#"{
    "name": "empirical",
    "seed": 1113,
    "bnn_prior_class": "EmpiricalBNNPrior",
    "components": ["lens_mass", "external_shear", "lens_light", "src_light"],
    "bnn_omega": {
        "cosmology": {"H0": 70.0, "Om0": 0.3},
        "redshift": {"model": "differential_comoving_volume", "grid": {"start": 0.01, "stop": 5.0, "step": 0.1}},
        "kinematics": {"velocity_dispersion": {"model": "vel_disp_function_CPV2007", "grid": {"start": 100.0, "stop": 400.0, "step": 10.0}}},
        "lens_mass": {
            "profile": "SPEMD",
            "center_x": {"dist": "normal", "mu": 0.0, "sigma": 0.01},
            "center_y": {"dist": "normal", "mu": 0.0, "sigma": 0.01},
            "gamma": {"model": "FundamentalMassHyperplane", "model_kwargs": {"fit_data": "SLACS"}},
            "theta_E": {"model": "approximate_theta_E_for_SIS"},
            "e1": {"dist": "beta", "a": 4.0, "b": 4.0, "lower": -0.9, "upper": 0.9},
            "e2": {"dist": "beta", "a": 4.0, "b": 4.0, "lower": -0.9, "upper": 0.9}
        },
        "external_shear": {
            "profile": "SHEAR_GAMMA_PSI",
            "gamma_ext": {"dist": "lognormal", "mu": -2.73, "sigma": 1.05},
            "psi_ext": {"dist": "uniform", "lower": -1.5708, "upper": 1.5708}
        },
        "lens_light": {
            "profile": "SERSIC_ELLIPSE",
            "magnitude": {"model": "FaberJackson", "model_kwargs": {"fit_data": "ETGs"}},
            "R_sersic": {"model": "FundamentalPlane", "model_kwargs": {"fit_data": "SDSS"}},
            "n_sersic": {"dist": "normal", "mu": 3.0, "sigma": 0.55, "lower": 0.5},
            "q": {"model": "AxisRatioRayleigh", "model_kwargs": {"fit_data": "SDSS"}},
            "phi": {"dist": "uniform", "lower": -1.5708, "upper": 1.5708}
        },
        "src_light": {
            "profile": "SERSIC_ELLIPSE",
            "magnitude": {"model": "redshift_binned_luminosity_function"},
            "R_sersic": {"model": "size_from_luminosity_and_redshift_relation"},
            "n_sersic": {"dist": "normal", "mu": 0.8, "sigma": 0.3, "lower": 0.3},
            "center_x": {"dist": "uniform", "lower": -0.2, "upper": 0.2},
            "center_y": {"dist": "uniform", "lower": -0.2, "upper": 0.2},
            "q": {"dist": "normal", "mu": 0.6, "sigma": 0.1, "lower": 0.2, "upper": 1.0},
            "phi": {"dist": "uniform", "lower": -1.5708, "upper": 1.5708}
        }
    }
}"#;

/// Pixelated source placed near the caustics of a centered lens.
pub const REAL_SOURCE_CENTERED: &str = r#"{
    "name": "real_source",
    "bnn_prior_class": "RealSourcePrior",
    "components": ["lens_mass", "external_shear", "src_light"],
    "image": {"num_pix": 16},
    "instrument": {"pixel_scale": 0.08},
    "external": {"src_light": {"psf_size": 7, "psf_gaussian_fwhm": 0.15}},
    "caustics": {"margin_pixels": 1.0, "max_caustic_attempts": 5},
    "bnn_omega": {
        "lens_mass": {
            "profile": "SIE",
            "center_x": {"dist": "normal", "mu": 0.0, "sigma": 0.0},
            "center_y": {"dist": "normal", "mu": 0.0, "sigma": 0.0},
            "theta_E": {"dist": "normal", "mu": 1.0, "sigma": 0.05},
            "q": {"dist": "uniform", "lower": 0.6, "upper": 1.0},
            "phi": {"dist": "uniform", "lower": 0.0, "upper": 3.14159}
        },
        "external_shear": {
            "profile": "SHEAR_GAMMA_PSI",
            "gamma_ext": {"dist": "uniform", "lower": 0.0, "upper": 0.05},
            "psi_ext": {"dist": "uniform", "lower": -1.5708, "upper": 1.5708}
        },
        "src_light": {
            "profile": "GALSIM",
            "catalog_index": {"dist": "uniform", "lower": 0.0, "upper": 96.0},
            "galsim_scale": {"dist": "uniform", "lower": 0.8, "upper": 1.2},
            "galsim_angle": {"dist": "uniform", "lower": -3.14159, "upper": 3.14159},
            "galsim_center_x": {"dist": "uniform", "lower": 0.0, "upper": 0.0},
            "galsim_center_y": {"dist": "uniform", "lower": 0.0, "upper": 0.0},
            "magnitude": {"dist": "uniform", "lower": 22.0, "upper": 24.0}
        }
    }
}"#;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn load(json: &str) -> PriorConfig {
    PriorConfig::from_json_str(json).expect("test configuration should parse")
}
