use super::cues::{
    area_fraction, border_touch_ratio, center_prior, edge_density, edge_map, masked_mean,
    saliency_map, CENTER_SIGMA_RATIO,
};
use super::preprocess::rgb_to_lab;
use super::types::LabelGrid;
use crate::config::{ScoreWeights, CLUSTER_COUNT};
use image::RgbImage;

/// Cue breakdown and composite score of one cluster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterScore {
    pub area_fraction: f32,
    pub edge_density: f32,
    pub border_touch: f32,
    /// Mean saliency; 0.0 for an empty cluster
    pub saliency: f32,
    /// Mean center prior; 0.0 for an empty cluster
    pub centrality: f32,
    pub composite: f32,
}

impl ClusterScore {
    fn new(
        area_fraction: f32,
        edge_density: f32,
        border_touch: f32,
        saliency: f32,
        centrality: f32,
        weights: &ScoreWeights,
    ) -> Self {
        let composite = weights.border_clear * (1.0 - border_touch)
            + weights.edge_density * edge_density
            + weights.saliency * saliency
            + weights.centrality * centrality
            + weights.area_complement * (1.0 - area_fraction);
        Self {
            area_fraction,
            edge_density,
            border_touch,
            saliency,
            centrality,
            composite,
        }
    }
}

/// Score both clusters of `labels` against `image`
///
/// Foreground objects tend to be central, salient, rich in edges, clear of the frame
/// and smaller than the background; each cue rewards one of those traits.
pub fn score_clusters(
    image: &RgbImage,
    labels: &LabelGrid,
    weights: &ScoreWeights,
) -> [ClusterScore; CLUSTER_COUNT] {
    let edges = edge_map(image);
    let saliency = saliency_map(&rgb_to_lab(image));
    let centrality = center_prior(
        labels.height() as usize,
        labels.width() as usize,
        CENTER_SIGMA_RATIO,
    );

    std::array::from_fn(|k| {
        let member = labels.membership(k as u8);
        ClusterScore::new(
            area_fraction(&member),
            edge_density(&edges, &member),
            border_touch_ratio(&member),
            masked_mean(&saliency, &member),
            masked_mean(&centrality, &member),
            weights,
        )
    })
}

/// Index of the non-empty cluster with the highest composite score
///
/// Ties go to the lower index. Empty clusters are never picked.
pub fn pick_foreground(scores: &[ClusterScore; CLUSTER_COUNT]) -> u8 {
    let mut best: Option<usize> = None;
    for (k, score) in scores.iter().enumerate() {
        if score.area_fraction <= 0.0 {
            continue;
        }
        if best.map_or(true, |b| score.composite > scores[b].composite) {
            best = Some(k);
        }
    }
    best.unwrap_or(0) as u8
}

/// Decide which cluster of `labels` is the foreground
pub fn select_foreground(image: &RgbImage, labels: &LabelGrid, weights: &ScoreWeights) -> u8 {
    let _span = tracing::debug_span!("select_foreground").entered();

    let scores = score_clusters(image, labels, weights);
    for (k, s) in scores.iter().enumerate() {
        tracing::debug!(
            "Cluster {}: area={:.3} edge={:.3} touch={:.3} saliency={:.3} centrality={:.3} score={:.3}",
            k,
            s.area_fraction,
            s.edge_density,
            s.border_touch,
            s.saliency,
            s.centrality,
            s.composite
        );
    }

    pick_foreground(&scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use ndarray::Array2;

    fn square_scene() -> (RgbImage, LabelGrid) {
        let mut image = RgbImage::from_pixel(60, 60, Rgb([30, 60, 200]));
        let mut labels = Array2::<u8>::zeros((60, 60));
        for y in 20..40 {
            for x in 20..40 {
                image.put_pixel(x, y, Rgb([220, 40, 40]));
                labels[[y as usize, x as usize]] = 1;
            }
        }
        (image, LabelGrid::from_array(labels))
    }

    #[test]
    fn central_square_wins() {
        let (image, labels) = square_scene();
        let weights = ScoreWeights::default();
        let scores = score_clusters(&image, &labels, &weights);

        assert_eq!(scores[1].border_touch, 0.0);
        assert!(scores[0].border_touch > 0.0);
        assert!(scores[1].saliency > scores[0].saliency);
        assert!(scores[1].centrality > scores[0].centrality);
        assert_eq!(select_foreground(&image, &labels, &weights), 1);
    }

    #[test]
    fn selection_is_deterministic() {
        let (image, labels) = square_scene();
        let weights = ScoreWeights::default();
        let first = select_foreground(&image, &labels, &weights);
        for _ in 0..3 {
            assert_eq!(select_foreground(&image, &labels, &weights), first);
        }
    }

    #[test]
    fn empty_cluster_is_never_foreground() {
        let image = RgbImage::from_pixel(16, 16, Rgb([128, 128, 128]));
        let labels = LabelGrid::from_array(Array2::zeros((16, 16)));
        let scores = score_clusters(&image, &labels, &ScoreWeights::default());

        assert_eq!(scores[1].area_fraction, 0.0);
        assert_eq!(scores[1].saliency, 0.0);
        assert_eq!(scores[1].centrality, 0.0);
        assert!(scores[1].composite > scores[0].composite);
        assert_eq!(pick_foreground(&scores), 0);

        let flipped = LabelGrid::from_array(Array2::from_elem((16, 16), 1));
        let scores = score_clusters(&image, &flipped, &ScoreWeights::default());
        assert_eq!(pick_foreground(&scores), 1);
    }

    #[test]
    fn ties_go_to_cluster_zero() {
        let score = ClusterScore::new(0.5, 0.0, 0.0, 0.0, 0.0, &ScoreWeights::default());
        assert_eq!(pick_foreground(&[score, score]), 0);
    }

    #[test]
    fn weights_can_be_overridden() {
        let (image, labels) = square_scene();
        let weights = ScoreWeights {
            border_clear: 0.0,
            edge_density: 0.0,
            saliency: 0.0,
            centrality: 0.0,
            area_complement: -1.0,
        };
        // only area counts, and larger is now better
        assert_eq!(select_foreground(&image, &labels, &weights), 0);
    }
}
