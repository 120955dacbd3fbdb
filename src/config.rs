use crate::error::{Result, SegmentError};

/// Number of clusters in a segmentation run: background and object
pub const CLUSTER_COUNT: usize = 2;

/// Iterations of graph-cut refinement used when none is configured
pub const DEFAULT_REFINE_ITERATIONS: u32 = 5;

/// Minimum-size threshold for holes or objects, either fixed or derived from image area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeThreshold {
    /// Derive the threshold from the image area
    #[default]
    Auto,
    /// Use this many pixels
    Explicit(u32),
}

impl SizeThreshold {
    /// Map the CLI convention (0 = auto) onto a threshold
    pub fn from_pixels(pixels: u32) -> Self {
        if pixels == 0 {
            Self::Auto
        } else {
            Self::Explicit(pixels)
        }
    }

    fn resolve(self, area: u64, fraction: f64, floor: u32) -> u32 {
        match self {
            Self::Explicit(pixels) => pixels,
            Self::Auto => ((fraction * area as f64) as u32).max(floor),
        }
    }
}

/// Hole and object thresholds resolved for a concrete image size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub min_hole: u32,
    pub min_object: u32,
}

impl SizeLimits {
    /// Resolve `min_hole` / `min_object` for a `width` x `height` image
    ///
    /// Auto holes are 0.08% of the area (at least 32 px), auto objects 0.8% (at least 128 px).
    pub fn resolve(min_hole: SizeThreshold, min_object: SizeThreshold, width: u32, height: u32) -> Self {
        let area = width as u64 * height as u64;
        Self {
            min_hole: min_hole.resolve(area, 0.0008, 32),
            min_object: min_object.resolve(area, 0.008, 128),
        }
    }
}

/// Which composites to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BackgroundMode {
    White,
    Transparent,
    #[default]
    Both,
}

impl BackgroundMode {
    pub fn wants_white(self) -> bool {
        matches!(self, Self::White | Self::Both)
    }

    pub fn wants_transparent(self) -> bool {
        matches!(self, Self::Transparent | Self::Both)
    }
}

/// Weights of the cues that decide which cluster is the foreground
///
/// Empirical constants. Changing them changes which cluster gets picked on real images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub border_clear: f32,
    pub edge_density: f32,
    pub saliency: f32,
    pub centrality: f32,
    pub area_complement: f32,
}

impl ScoreWeights {
    pub const BORDER_CLEAR: f32 = 1.6;
    pub const EDGE_DENSITY: f32 = 1.2;
    pub const SALIENCY: f32 = 0.9;
    pub const CENTRALITY: f32 = 0.7;
    pub const AREA_COMPLEMENT: f32 = 0.5;
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            border_clear: Self::BORDER_CLEAR,
            edge_density: Self::EDGE_DENSITY,
            saliency: Self::SALIENCY,
            centrality: Self::CENTRALITY,
            area_complement: Self::AREA_COMPLEMENT,
        }
    }
}

/// Convergence parameters of the clustering step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansParams {
    /// Upper bound on Lloyd iterations per attempt
    pub max_iter: u32,
    /// Independent restarts; the most compact one wins
    pub attempts: u32,
    /// Stop once no centroid moves further than this
    pub tolerance: f32,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            max_iter: 100,
            attempts: 6,
            tolerance: 0.5,
        }
    }
}

/// Parameters of one segmentation run
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationConfig {
    /// Append normalized (x, y) to the color features
    pub add_xy: bool,
    /// Scale applied to the spatial features
    pub xy_weight: f32,
    /// Gaussian sigma applied before clustering, <= 0 disables it
    pub blur_sigma: f32,
    pub kmeans: KMeansParams,
    pub min_hole: SizeThreshold,
    pub min_object: SizeThreshold,
    /// Run graph-cut refinement after post-processing
    pub refine: bool,
    pub refine_iterations: u32,
    /// Longest side the image is downscaled to before processing
    pub max_side: u32,
    pub background: BackgroundMode,
    pub weights: ScoreWeights,
    /// Seed for centroid initialization; `None` draws from the OS
    pub seed: Option<u64>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            add_xy: false,
            xy_weight: 0.40,
            blur_sigma: 1.0,
            kmeans: KMeansParams::default(),
            min_hole: SizeThreshold::Auto,
            min_object: SizeThreshold::Auto,
            refine: false,
            refine_iterations: DEFAULT_REFINE_ITERATIONS,
            max_side: 1600,
            background: BackgroundMode::Both,
            weights: ScoreWeights::default(),
            seed: None,
        }
    }
}

impl SegmentationConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.xy_weight.is_finite() || self.xy_weight < 0.0 {
            return Err(SegmentError::InvalidConfig(format!(
                "xy_weight must be a non-negative number, got {}",
                self.xy_weight
            )));
        }
        if !self.blur_sigma.is_finite() {
            return Err(SegmentError::InvalidConfig(format!(
                "blur_sigma must be finite, got {}",
                self.blur_sigma
            )));
        }
        if self.kmeans.max_iter == 0 || self.kmeans.attempts == 0 {
            return Err(SegmentError::InvalidConfig(
                "k-means needs at least one iteration and one attempt".into(),
            ));
        }
        if self.kmeans.tolerance.is_nan() || self.kmeans.tolerance <= 0.0 {
            return Err(SegmentError::InvalidConfig(format!(
                "k-means tolerance must be positive, got {}",
                self.kmeans.tolerance
            )));
        }
        if self.max_side == 0 {
            return Err(SegmentError::InvalidConfig("max_side must be positive".into()));
        }
        let w = &self.weights;
        let all = [w.border_clear, w.edge_density, w.saliency, w.centrality, w.area_complement];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(SegmentError::InvalidConfig("score weights must be finite".into()));
        }
        Ok(())
    }

    /// Thresholds for a processed image of the given size
    pub fn size_limits(&self, width: u32, height: u32) -> SizeLimits {
        SizeLimits::resolve(self.min_hole, self.min_object, width, height)
    }
}
