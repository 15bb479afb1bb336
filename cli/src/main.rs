//! colorseg command line front end
//!
//! Segments the foreground color cluster out of a single image and writes
//! the intermediate artifacts as PNG files.
//!
//! ## Usage
//!
//! ```bash
//! # Segment with the default configuration (blue cluster of interest)
//! colorseg photo.jpg
//!
//! # Write artifacts somewhere else and use a custom threshold
//! colorseg photo.jpg --output results --threshold 1e-8
//!
//! # Target a different cluster color and keep only the final foreground
//! colorseg photo.jpg --target-color 255,0,0 --mask-only
//!
//! # Start from a JSON configuration file
//! colorseg photo.jpg --config run.json
//! ```

use std::{fs, path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use clap::Parser;
use colorseg::{ClusterSelection, DirectorySink, SegmentationConfig, SegmentationPipeline};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input image
    input: PathBuf,

    /// Output directory for segmentation artifacts
    #[arg(short, long, default_value = "outputs")]
    output: PathBuf,

    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Density threshold for the refined mask
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Seed for the mixture initialization
    #[arg(long)]
    seed: Option<u64>,

    /// Resize width applied before clustering
    #[arg(long)]
    width: Option<u32>,

    /// Resize height applied before clustering
    #[arg(long)]
    height: Option<u32>,

    /// Select the mixture component by fixed index instead of reference color
    #[arg(long, conflicts_with = "target_color")]
    cluster_index: Option<usize>,

    /// Reference color "R,G,B" the cluster of interest should be closest to
    #[arg(long)]
    target_color: Option<String>,

    /// Only save the refined foreground (skip intermediate artifacts)
    #[arg(long)]
    mask_only: bool,

    /// Log level filter when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let _logger = flexi_logger::Logger::try_with_env_or_str(&args.log_level)
        .with_context(|| format!("invalid log specification: {}", args.log_level))?
        .start()
        .context("logger initialization failed")?;

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        let config_str = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        serde_json::from_str::<SegmentationConfig>(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?
    } else {
        SegmentationConfig::default()
    };

    // Apply command line overrides
    config.input.image_path = args.input.clone();
    if let Some(threshold) = args.threshold {
        config.refinement.probability_threshold = threshold;
    }
    if let Some(seed) = args.seed {
        config.mixture.random_seed = seed;
    }
    if let Some(width) = args.width {
        config.input.resize_width = width;
    }
    if let Some(height) = args.height {
        config.input.resize_height = height;
    }
    if let Some(index) = args.cluster_index {
        config.refinement.cluster_selection = ClusterSelection::Index(index);
    }
    if let Some(color) = &args.target_color {
        config.refinement.cluster_selection = ClusterSelection::ClosestTo(parse_color(color)?);
    }

    if !args.input.exists() {
        anyhow::bail!("Input path does not exist: {}", args.input.display());
    }

    let pipeline = SegmentationPipeline::new(config).context("invalid configuration")?;
    let mut sink = DirectorySink::new(&args.output)
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                args.output.display()
            )
        })?
        .with_mask_only(args.mask_only);

    let start_time = Instant::now();
    let segmentation = pipeline
        .run(&mut sink)
        .with_context(|| format!("Failed to segment {}", args.input.display()))?;
    let elapsed = start_time.elapsed();

    let total_pixels = segmentation.refined_mask.len();
    println!(
        "Processed {} in {:.2}s: component {}, {}/{} foreground pixels -> {}",
        args.input.display(),
        elapsed.as_secs_f32(),
        segmentation.component,
        segmentation.foreground_pixel_count(),
        total_pixels,
        args.output.display()
    );

    Ok(())
}

/// Parse an "R,G,B" color triple.
fn parse_color(value: &str) -> Result<[u8; 3]> {
    let components: Vec<u8> = value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<u8>()
                .with_context(|| format!("invalid color component: '{part}'"))
        })
        .collect::<Result<_>>()?;
    if components.len() != 3 {
        anyhow::bail!("expected three comma-separated components, got '{value}'");
    }
    Ok([components[0], components[1], components[2]])
}
