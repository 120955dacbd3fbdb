use super::cues::{border_touch_ratio, edge_density, edge_map};
use super::features::{build_features, FeatureOptions};
use super::kmeans::KMeans;
use super::preprocess::{rgb_to_lab, Preprocessor};
use super::roles::select_foreground;
use super::types::{Analysis, LabelGrid, Mask, SegmentationOutput, Segmenter};
use crate::config::{SegmentationConfig, CLUSTER_COUNT};
use crate::error::{Result, SegmentError};
use crate::output::compose;
use crate::postprocess::{postprocess, MASK_THRESHOLD};
use crate::refine::{refine_mask, GrabCut, MaskRefiner};
use image::RgbImage;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Segment `image` with the default graph-cut refiner
pub fn segment_image(image: &RgbImage, config: &SegmentationConfig) -> Result<SegmentationOutput> {
    let refiner = GrabCut::new().with_seed(config.seed);
    segment_image_with(image, config, &refiner)
}

/// Segment `image`, using `refiner` when refinement is enabled
///
/// Steps: downscale, cluster Lab(+xy) features into two groups, pick the foreground
/// cluster, clean its mask, optionally refine, then compose.
pub fn segment_image_with<R: MaskRefiner + ?Sized>(
    image: &RgbImage,
    config: &SegmentationConfig,
    refiner: &R,
) -> Result<SegmentationOutput> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(SegmentError::EmptyImage { width, height });
    }
    config.validate()?;

    let _span = tracing::debug_span!("segment").entered();

    let image = Preprocessor::new(config.max_side).downscale(image);
    let (width, height) = image.dimensions();

    let features = build_features(
        &image,
        &FeatureOptions {
            add_xy: config.add_xy,
            xy_weight: config.xy_weight,
            blur_sigma: config.blur_sigma,
        },
    );

    let mut rng = config
        .seed
        .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
    let clustering = KMeans::new(CLUSTER_COUNT, config.kmeans).fit(features.view(), &mut rng);
    tracing::debug!(
        "Cluster sizes {:?}, compactness {:.1}",
        clustering.counts(),
        clustering.compactness
    );
    let labels = LabelGrid::from_raster(&clustering.labels, width, height);

    let foreground = select_foreground(&image, &labels, &config.weights);
    let raw_mask = labels.to_mask(foreground);

    let limits = config.size_limits(width, height);
    let mut mask = postprocess(&raw_mask, limits);

    if config.refine {
        mask = refine_mask(refiner, &image, &mask, config.refine_iterations, limits)?;
    }

    let (white, transparent) = compose::render(&image, &mask, config.background);
    let analysis = analyze(&image, &labels, &mask);
    tracing::info!(
        "Segmented {}x{} image: foreground cluster {}, {}",
        width,
        height,
        foreground,
        analysis
    );

    Ok(SegmentationOutput {
        original: image,
        mask,
        white,
        transparent,
        analysis,
    })
}

/// Separability and foreground statistics for the report line
pub fn analyze(image: &RgbImage, labels: &LabelGrid, mask: &Mask) -> Analysis {
    let lab = rgb_to_lab(image);
    let mut sums = [[0.0f64; 3]; CLUSTER_COUNT];
    let mut counts = [0usize; CLUSTER_COUNT];
    for ((y, x), &label) in labels.as_array().indexed_iter() {
        let k = label as usize;
        counts[k] += 1;
        for c in 0..3 {
            sums[k][c] += lab[[y, x, c]] as f64;
        }
    }
    let means: Vec<[f64; 3]> = sums
        .iter()
        .zip(counts)
        .map(|(s, n)| if n == 0 { [0.0; 3] } else { s.map(|v| v / n as f64) })
        .collect();
    let delta = (0..3)
        .map(|c| (means[0][c] - means[1][c]).powi(2))
        .sum::<f64>()
        .sqrt();

    let member = Array2::from_shape_fn((mask.height() as usize, mask.width() as usize), |(y, x)| {
        mask.get_pixel(x as u32, y as u32)[0] > MASK_THRESHOLD
    });

    Analysis {
        cluster_delta_lab: delta as f32,
        foreground_edge_density: edge_density(&edge_map(image), &member),
        foreground_border_touch: border_touch_ratio(&member),
    }
}

/// K-means background separation behind the `Segmenter` trait
pub struct KMeansSegmenter {
    config: SegmentationConfig,
    refiner: Box<dyn MaskRefiner>,
}

impl KMeansSegmenter {
    pub fn new(config: SegmentationConfig) -> Self {
        let refiner = Box::new(GrabCut::new().with_seed(config.seed));
        Self { config, refiner }
    }

    /// Replace the refinement backend
    pub fn with_refiner(mut self, refiner: Box<dyn MaskRefiner>) -> Self {
        self.refiner = refiner;
        self
    }
}

impl Segmenter for KMeansSegmenter {
    fn segment(&self, image: &RgbImage) -> Result<SegmentationOutput> {
        segment_image_with(image, &self.config, self.refiner.as_ref())
    }
}
