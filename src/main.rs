use anyhow::{Context, Result};
use clap::Parser;
use kmeans_cutout::capture::{FileSource, ImageSource};
use kmeans_cutout::config::{
    BackgroundMode, KMeansParams, SegmentationConfig, SizeThreshold, DEFAULT_REFINE_ITERATIONS,
};
use kmeans_cutout::output::{DirectorySink, OutputSink};
use kmeans_cutout::segmentation::{KMeansSegmenter, Segmenter};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image to separate into foreground and background
    input: PathBuf,

    /// Directory the renderings are written to
    #[arg(short, long, default_value = "outputs")]
    output_dir: PathBuf,

    /// File name prefix, followed by a timestamp
    #[arg(long, default_value = "seg_k2")]
    prefix: String,

    /// Append (x, y) coordinates to the color features
    #[arg(long)]
    add_xy: bool,

    /// Weight of the (x, y) features
    #[arg(long, default_value_t = 0.40)]
    xy_weight: f32,

    /// Gaussian sigma before clustering (0 disables)
    #[arg(long, default_value_t = 1.0)]
    blur_sigma: f32,

    /// K-means restarts
    #[arg(long, default_value_t = 6)]
    attempts: u32,

    /// K-means iteration cap per restart
    #[arg(long, default_value_t = 100)]
    max_iter: u32,

    /// K-means centroid movement tolerance
    #[arg(long, default_value_t = 0.5)]
    eps: f32,

    /// Fill holes smaller than this many pixels (0 = derive from image size)
    #[arg(long, default_value_t = 0)]
    min_hole: u32,

    /// Minimum object area in pixels (0 = derive from image size)
    #[arg(long, default_value_t = 0)]
    min_object: u32,

    /// Refine the mask with graph cut
    #[arg(long)]
    refine: bool,

    /// Graph-cut iterations when refining
    #[arg(long, default_value_t = DEFAULT_REFINE_ITERATIONS)]
    refine_iterations: u32,

    /// Longest side the image is downscaled to before processing
    #[arg(long, default_value_t = 1600)]
    max_side: u32,

    /// Which composites to write
    #[arg(long, value_enum, default_value_t = BackgroundMode::Both)]
    background: BackgroundMode,

    /// Also write the binary mask
    #[arg(long)]
    save_mask: bool,

    /// Seed for centroid initialization, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn to_config(&self) -> SegmentationConfig {
        SegmentationConfig {
            add_xy: self.add_xy,
            xy_weight: self.xy_weight,
            blur_sigma: self.blur_sigma,
            kmeans: KMeansParams {
                max_iter: self.max_iter,
                attempts: self.attempts,
                tolerance: self.eps,
            },
            min_hole: SizeThreshold::from_pixels(self.min_hole),
            min_object: SizeThreshold::from_pixels(self.min_object),
            refine: self.refine,
            refine_iterations: self.refine_iterations,
            max_side: self.max_side,
            background: self.background,
            seed: self.seed,
            ..SegmentationConfig::default()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let config = args.to_config();
    tracing::info!("kmeans-cutout starting");
    tracing::info!(
        "K=2, add_xy={}, blur_sigma={}, refine={}, max_side={}",
        config.add_xy,
        config.blur_sigma,
        config.refine,
        config.max_side
    );

    let mut source = FileSource::new(&args.input);
    let image = source
        .load()
        .with_context(|| format!("Failed to load {}", source.describe()))?;

    let segmenter = KMeansSegmenter::new(config);
    let start = Instant::now();
    let result = segmenter
        .segment(&image)
        .context("Failed to segment image")?;
    tracing::info!("Segmentation took {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);

    let mut sink = DirectorySink::new(&args.output_dir, args.prefix.clone()).with_mask(args.save_mask);
    let written = sink
        .write_result(&result)
        .context("Failed to write outputs")?;

    println!("{}", result.analysis);
    for path in written {
        println!("{}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_match_library_defaults() {
        let args = Args::parse_from(["kmeans-cutout", "in.png"]);
        let config = args.to_config();
        assert_eq!(config, SegmentationConfig::default());
        assert_eq!(args.output_dir, PathBuf::from("outputs"));
    }

    #[test]
    fn zero_thresholds_mean_auto() {
        let args = Args::parse_from([
            "kmeans-cutout",
            "in.png",
            "--min-hole",
            "0",
            "--min-object",
            "500",
            "--background",
            "white",
            "--seed",
            "3",
        ]);
        let config = args.to_config();
        assert_eq!(config.min_hole, SizeThreshold::Auto);
        assert_eq!(config.min_object, SizeThreshold::Explicit(500));
        assert_eq!(config.background, BackgroundMode::White);
        assert_eq!(config.seed, Some(3));
    }
}
