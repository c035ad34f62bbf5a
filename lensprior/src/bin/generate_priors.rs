//! Draw lens parameter samples and write their metadata table
//!
//! Rendering and the post-render selection happen downstream; this tool
//! stops at the parameters every image will be generated from.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use lensprior::metadata::{add_g1g2_columns, add_qphi_columns, add_relative_src_offset};
use lensprior::selection::DEFAULT_MAX_REJECTIONS;
use lensprior::{BnnPrior, MetadataWriter, PixelGeometry, PriorConfig, SelectionFilter};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser, Debug)]
#[command(author, version, about = "Draw lens parameter samples and write their metadata")]
struct Args {
    /// Run configuration (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Number of accepted samples (overrides the configuration)
    #[arg(long)]
    n_data: Option<usize>,

    /// Random seed (overrides the configuration)
    #[arg(long)]
    seed: Option<u64>,

    /// Output CSV, defaults to metadata.csv in the configured out_dir
    #[arg(long)]
    out: Option<PathBuf>,

    /// Consecutive samples the initial selection may reject before the run
    /// fails (0 for no limit)
    #[arg(long, default_value_t = DEFAULT_MAX_REJECTIONS)]
    max_rejections: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = PriorConfig::from_file(&args.config)?;
    let n_data = args.n_data.unwrap_or(config.n_data);
    let seed = args.seed.unwrap_or(config.seed);
    let out = args.out.unwrap_or_else(|| {
        config
            .out_dir
            .clone()
            .unwrap_or_default()
            .join("metadata.csv")
    });
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    info!(
        "Run '{}' ({:?}): {n_data} samples, seed {seed}",
        config.name, config.bnn_prior_class
    );

    let mut prior = BnnPrior::from_config(&config)?;
    if prior.has_pixel_profile() {
        prior.setup_pixel_profiles(PixelGeometry::from_config(&config)?);
    }
    let selection = SelectionFilter::for_prior(&config.selection, &prior)?;
    let max_rejections = (args.max_rejections > 0).then_some(args.max_rejections);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut writer = MetadataWriter::create(&out, config.checkpoint_interval)?;

    let pb = ProgressBar::new(n_data as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) ETA: {eta}")?
            .progress_chars("█▉▊▋▌▍▎▏ "),
    );
    pb.set_message(format!("Sampling {}", config.name));

    let mut rejected = 0u64;
    while writer.rows() < n_data {
        let (sample, skipped) = selection.sample_accepted(&prior, &mut rng, max_rejections)?;
        rejected += skipped;
        let mut row = sample.flatten();
        add_qphi_columns(&mut row);
        add_g1g2_columns(&mut row);
        add_relative_src_offset(&mut row);
        writer.write_row(&row)?;
        pb.inc(1);
    }
    pb.finish_with_message("Done");
    writer.finish()?;

    info!(
        "Wrote {n_data} samples to {} ({rejected} rejected by the initial selection)",
        out.display()
    );
    Ok(())
}
