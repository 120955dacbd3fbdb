pub mod cues;
mod features;
mod kmeans;
mod pipeline;
mod preprocess;
mod roles;
pub mod types;

pub use features::{build_features, FeatureOptions};
pub use kmeans::{Clustering, KMeans};
pub use pipeline::{analyze, segment_image, segment_image_with, KMeansSegmenter};
pub use preprocess::{blur_planes, blur_rgb, rgb_to_lab, Preprocessor};
pub use roles::{pick_foreground, score_clusters, select_foreground, ClusterScore};
pub use types::{Analysis, LabelGrid, Mask, SegmentationOutput, Segmenter};
