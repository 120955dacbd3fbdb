//! Foreground/background separation of a single image by two-cluster K-means in
//! L*a*b* space, heuristic choice of the object cluster, morphological cleanup and
//! optional graph-cut refinement.

pub mod capture;
pub mod config;
pub mod error;
pub mod output;
pub mod postprocess;
pub mod refine;
pub mod segmentation;

pub use config::{BackgroundMode, KMeansParams, ScoreWeights, SegmentationConfig, SizeThreshold};
pub use error::SegmentError;
pub use segmentation::{segment_image, KMeansSegmenter, SegmentationOutput, Segmenter};
