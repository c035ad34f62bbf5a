//! End-to-end sampling scenarios across prior variants

mod common;

use std::fs;
use std::sync::Arc;

use common::{init_logging, load};
use lensprior::config::SelectionConfig;
use lensprior::lensing::CausticSolver;
use lensprior::metadata::{add_qphi_columns, add_relative_src_offset};
use lensprior::sample::Params;
use lensprior::{
    BnnPrior, Component, MetadataWriter, PixelGeometry, PriorBuilder, Profile, SelectionFilter,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

/// Caustics of a fixed square around the origin
struct SquareCaustics {
    half: f64,
}

impl CausticSolver for SquareCaustics {
    fn caustic_points(&self, _: Profile, _: &Params) -> lensprior::Result<Vec<(f64, f64)>> {
        let h = self.half;
        Ok(vec![(-h, -h), (h, -h), (h, h), (-h, h)])
    }
}

#[test]
fn test_zero_width_center_is_exact() {
    init_logging();
    let config = load(common::DIAGONAL_FIXED_CENTER);
    let prior = BnnPrior::from_config(&config).unwrap();
    let mut rng = StdRng::seed_from_u64(17);

    for _ in 0..100 {
        let sample = prior.sample(&mut rng).unwrap();
        assert_eq!(sample.param(Component::LensMass, "center_x"), Some(0.0));
        assert_eq!(sample.param(Component::LensMass, "center_y"), Some(0.0));
        let theta_e = sample.param(Component::LensMass, "theta_E").unwrap();
        assert!(theta_e >= 0.3);
    }
}

#[test]
fn test_empirical_chain_stays_on_its_grids() {
    init_logging();
    let config = load(common::EMPIRICAL);
    let prior = BnnPrior::from_config(&config).unwrap();
    let mut rng = StdRng::seed_from_u64(config.seed);

    for _ in 0..100 {
        let sample = prior.sample(&mut rng).unwrap();
        let z_lens = sample.misc("z_lens").unwrap();
        let z_src = sample.misc("z_src").unwrap();
        assert!(z_lens >= 0.01 && z_src <= 5.0, "z = ({z_lens}, {z_src})");
        assert!(z_lens < z_src);

        let vel_disp = sample.misc("vel_disp_iso").unwrap();
        assert!((100.0..=400.0).contains(&vel_disp));

        let lens = sample.params(Component::LensMass).unwrap();
        assert!(lens["theta_E"] > 0.0 && lens["theta_E"].is_finite());
        assert!(lens.contains_key("gamma"));
    }
}

#[test]
fn test_centered_real_source_needs_no_redraw() {
    init_logging();
    let config = load(common::REAL_SOURCE_CENTERED);
    let mut prior = PriorBuilder::new(&config)
        .caustic_solver(Arc::new(SquareCaustics { half: 0.1 }))
        .build()
        .unwrap();
    assert!(prior.has_pixel_profile());
    prior.setup_pixel_profiles(PixelGeometry::from_config(&config).unwrap());

    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..10 {
        let sample = prior.sample(&mut rng).unwrap();
        assert_eq!(sample.misc("caustic_redraws"), Some(0.0));
        assert_eq!(sample.param(Component::SrcLight, "center_x"), Some(0.0));
        assert!(sample.src_light_image.is_some());
        assert!(sample.original.is_some());
    }
}

#[test]
fn test_real_source_outside_every_caustic_gives_up() {
    init_logging();
    let json = common::REAL_SOURCE_CENTERED
        .replace(
            r#""galsim_center_x": {"dist": "uniform", "lower": 0.0, "upper": 0.0}"#,
            r#""galsim_center_x": {"dist": "uniform", "lower": 2.0, "upper": 3.0}"#,
        );
    let config = load(&json);
    let mut prior = PriorBuilder::new(&config)
        .caustic_solver(Arc::new(SquareCaustics { half: 0.1 }))
        .build()
        .unwrap();
    prior.setup_pixel_profiles(PixelGeometry::from_config(&config).unwrap());

    let mut rng = StdRng::seed_from_u64(29);
    let err = prior.sample(&mut rng).unwrap_err();
    assert!(matches!(
        err,
        lensprior::PriorError::RetryExhausted { attempts: 5, .. }
    ));
}

#[test]
fn test_initial_selection_rejects_small_einstein_radius() {
    init_logging();
    let json = common::DIAGONAL_FIXED_CENTER.replace(
        r#""theta_E": {"dist": "normal", "mu": 1.2, "sigma": 0.1, "lower": 0.3}"#,
        r#""theta_E": {"dist": "normal", "mu": 0.3, "sigma": 0.0}"#,
    );
    let config = load(&json);
    let prior = BnnPrior::from_config(&config).unwrap();
    let selection = SelectionFilter::new(&SelectionConfig {
        initial: vec!["lens_mass.theta_E > 0.5".to_string()],
        ..SelectionConfig::default()
    })
    .unwrap();

    let mut rng = StdRng::seed_from_u64(31);
    let sample = prior.sample(&mut rng).unwrap();
    assert_eq!(sample.param(Component::LensMass, "theta_E"), Some(0.3));
    assert!(selection.reject_initial(&sample));

    let lenient = SelectionFilter::new(&SelectionConfig {
        initial: vec!["lens_mass.theta_E > 0.2".to_string()],
        ..SelectionConfig::default()
    })
    .unwrap();
    assert!(!lenient.reject_initial(&sample));
}

#[test]
fn test_selection_reads_sampled_axis_ratio() {
    init_logging();
    let config = load(common::DIAGONAL_FIXED_CENTER);
    let prior = BnnPrior::from_config(&config).unwrap();
    let bounds: SelectionConfig =
        serde_json::from_str(r#"{"bounds": {"lens_mass.q": {"min": 0.1}}}"#).unwrap();
    let predicate: SelectionConfig =
        serde_json::from_str(r#"{"initial": ["lens_mass.q > 0.1"]}"#).unwrap();
    let tight: SelectionConfig =
        serde_json::from_str(r#"{"bounds": {"lens_mass.q": {"min": 0.75}}}"#).unwrap();

    let mut rng = StdRng::seed_from_u64(43);
    let samples: Vec<_> = (0..100).map(|_| prior.sample(&mut rng).unwrap()).collect();
    // q is stored as (e1, e2) after sampling
    assert!(samples[0].param(Component::LensMass, "q").is_none());

    for config in [&bounds, &predicate] {
        let selection = SelectionFilter::for_prior(config, &prior).unwrap();
        let rejected = samples.iter().filter(|s| selection.reject_initial(s)).count();
        assert_eq!(rejected, 0);
    }
    // q ~ U[0.5, 1], so about half fall below 0.75
    let selection = SelectionFilter::for_prior(&tight, &prior).unwrap();
    let rejected = samples.iter().filter(|s| selection.reject_initial(s)).count();
    assert!((25..=75).contains(&rejected), "{rejected} of 100 rejected");
}

#[test]
fn test_unsatisfiable_selection_gives_up() {
    init_logging();
    let config = load(common::DIAGONAL_FIXED_CENTER);
    let prior = BnnPrior::from_config(&config).unwrap();
    let selection = SelectionFilter::for_prior(
        &SelectionConfig {
            initial: vec!["lens_mass.theta_E > 100".to_string()],
            ..SelectionConfig::default()
        },
        &prior,
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(47);
    let err = selection.sample_accepted(&prior, &mut rng, Some(20)).unwrap_err();
    assert!(matches!(
        err,
        lensprior::PriorError::RetryExhausted { attempts: 20, .. }
    ));

    let lenient = SelectionFilter::for_prior(&SelectionConfig::default(), &prior).unwrap();
    let (sample, rejected) = lenient.sample_accepted(&prior, &mut rng, Some(1)).unwrap();
    assert_eq!(rejected, 0);
    assert!(sample.param(Component::LensMass, "theta_E").is_some());
}

#[test]
fn test_pixel_runs_skip_the_ellipticity_selection() {
    init_logging();
    let selection_config = SelectionConfig {
        ellipticity: Some(lensprior::config::Bounds {
            min: Some(0.99),
            max: Some(1.0),
        }),
        ..SelectionConfig::default()
    };

    let pixel_config = load(common::REAL_SOURCE_CENTERED);
    let pixel = BnnPrior::from_config(&pixel_config).unwrap();
    let selection = SelectionFilter::for_prior(&selection_config, &pixel).unwrap();
    assert!(selection.rules().is_empty());

    let parametric_config = load(common::DIAGONAL_OFFSET_LIGHT);
    let parametric = BnnPrior::from_config(&parametric_config).unwrap();
    let selection = SelectionFilter::for_prior(&selection_config, &parametric).unwrap();
    assert_eq!(selection.rules().len(), 3);
}

#[test]
fn test_lens_light_center_hyperparameters_are_ignored() {
    init_logging();
    let without_center = common::DIAGONAL_OFFSET_LIGHT
        .replace(r#""center_x": {"dist": "normal", "mu": 10.0, "sigma": 1.0},"#, "")
        .replace(r#""center_y": {"dist": "normal", "mu": -10.0, "sigma": 1.0},"#, "");
    assert_ne!(without_center, common::DIAGONAL_OFFSET_LIGHT);

    let with = BnnPrior::from_config(&load(common::DIAGONAL_OFFSET_LIGHT)).unwrap();
    let without = BnnPrior::from_config(&load(&without_center)).unwrap();
    let mut rng_with = StdRng::seed_from_u64(53);
    let mut rng_without = StdRng::seed_from_u64(53);
    for _ in 0..20 {
        let a = with.sample(&mut rng_with).unwrap();
        let b = without.sample(&mut rng_without).unwrap();
        assert_eq!(a.flatten(), b.flatten());
    }
}

#[test]
fn test_lens_light_follows_the_mass_center() {
    init_logging();
    let config = load(common::DIAGONAL_OFFSET_LIGHT);
    let prior = BnnPrior::from_config(&config).unwrap();
    let mut rng = StdRng::seed_from_u64(37);

    for _ in 0..50 {
        let sample = prior.sample(&mut rng).unwrap();
        for key in ["center_x", "center_y"] {
            let mass = sample.param(Component::LensMass, key).unwrap();
            assert_eq!(sample.param(Component::LensLight, key), Some(mass));
            let src = sample.param(Component::SrcLight, key).unwrap();
            assert!((src - mass).abs() <= 0.2 + 1e-12);
        }
    }
}

#[test]
fn test_ellipticity_selection_applies_to_every_elliptical_component() {
    init_logging();
    let config = load(common::DIAGONAL_OFFSET_LIGHT);
    let prior = BnnPrior::from_config(&config).unwrap();
    let mut components = prior.ellipticity_components();
    components.sort();
    assert_eq!(
        components,
        [Component::LensLight, Component::LensMass, Component::SrcLight]
    );

    let mut selection = SelectionFilter::new(&SelectionConfig {
        ellipticity: Some(lensprior::config::Bounds {
            min: Some(0.99),
            max: Some(1.0),
        }),
        ..SelectionConfig::default()
    })
    .unwrap();
    assert_eq!(selection.add_ellipticity_selections(&components), 3);

    // Nearly round in all three components at once is vanishingly rare
    let mut rng = StdRng::seed_from_u64(41);
    let rejected = (0..50)
        .filter(|_| selection.reject_initial(&prior.sample(&mut rng).unwrap()))
        .count();
    assert!(rejected >= 45, "only {rejected} of 50 rejected");
}

#[test]
fn test_batch_to_metadata_csv() {
    init_logging();
    let config = load(common::DIAGONAL_OFFSET_LIGHT);
    let prior = BnnPrior::from_config(&config).unwrap();
    let samples = prior.sample_batch(40, 7).unwrap();
    assert_eq!(samples.len(), 40);

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("metadata.csv");
    let mut writer = MetadataWriter::create(&path, 10).unwrap();
    for sample in &samples {
        let mut row = sample.flatten();
        add_qphi_columns(&mut row);
        add_relative_src_offset(&mut row);
        writer.write_row(&row).unwrap();
    }
    let header = writer.header().unwrap().to_vec();
    writer.finish().unwrap();

    for column in [
        "lens_mass_theta_E",
        "lens_mass_q",
        "lens_light_phi",
        "external_shear_gamma_ext",
        "src_light_pos_offset_x",
    ] {
        assert!(header.iter().any(|h| h == column), "missing {column}");
    }
    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 41);
    assert!(lines[1..]
        .iter()
        .all(|line| line.split(',').count() == header.len() && !line.contains(",,")));
}
