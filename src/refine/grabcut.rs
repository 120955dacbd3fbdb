use super::gmm::{Color, ColorModel};
use super::maxflow::FlowGraph;
use super::{MaskRefiner, Trimap, TrimapLabel};
use crate::error::{Result, SegmentError};
use crate::segmentation::Mask;
use image::{GrayImage, Luma, RgbImage};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Smoothness weight between neighbouring pixels
pub const DEFAULT_GAMMA: f64 = 50.0;

/// Iterated graph-cut segmentation with Gaussian mixture color models
///
/// Each iteration reassigns pixels to mixture components, refits the foreground and
/// background models, and relabels the probable pixels of the trimap with an s-t min-cut.
/// Definite pixels never change.
#[derive(Debug, Clone)]
pub struct GrabCut {
    gamma: f64,
    seed: Option<u64>,
}

impl Default for GrabCut {
    fn default() -> Self {
        Self {
            gamma: DEFAULT_GAMMA,
            seed: None,
        }
    }
}

impl GrabCut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the k-means used to initialize the color models
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Override the smoothness weight; 0 labels probable pixels by color alone
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }
}

/// Smoothness weights toward the left, up-left, up and up-right neighbours
struct NeighbourWeights {
    left: Vec<f64>,
    up_left: Vec<f64>,
    up: Vec<f64>,
    up_right: Vec<f64>,
}

fn squared_color_distance(a: &Color, b: &Color) -> f64 {
    (0..3).map(|c| (a[c] - b[c]) * (a[c] - b[c])).sum()
}

/// Inverse of twice the mean squared color difference over all neighbour pairs
fn contrast_beta(colors: &[Color], width: usize, height: usize) -> f64 {
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for y in 0..height {
        for x in 0..width {
            let c = &colors[y * width + x];
            let mut visit = |nx: usize, ny: usize| {
                sum += squared_color_distance(c, &colors[ny * width + nx]);
                pairs += 1;
            };
            if x > 0 {
                visit(x - 1, y);
            }
            if y > 0 {
                visit(x, y - 1);
                if x > 0 {
                    visit(x - 1, y - 1);
                }
                if x + 1 < width {
                    visit(x + 1, y - 1);
                }
            }
        }
    }

    if pairs == 0 || sum <= f64::EPSILON {
        0.0
    } else {
        1.0 / (2.0 * sum / pairs as f64)
    }
}

impl NeighbourWeights {
    fn new(colors: &[Color], width: usize, height: usize, gamma: f64) -> Self {
        let beta = contrast_beta(colors, width, height);
        let diagonal = gamma / std::f64::consts::SQRT_2;
        let n = width * height;
        let mut weights = Self {
            left: vec![0.0; n],
            up_left: vec![0.0; n],
            up: vec![0.0; n],
            up_right: vec![0.0; n],
        };

        let weight = |a: usize, b: usize, scale: f64| {
            scale * (-beta * squared_color_distance(&colors[a], &colors[b])).exp()
        };
        for y in 0..height {
            for x in 0..width {
                let p = y * width + x;
                if x > 0 {
                    weights.left[p] = weight(p, p - 1, gamma);
                }
                if y > 0 {
                    weights.up[p] = weight(p, p - width, gamma);
                    if x > 0 {
                        weights.up_left[p] = weight(p, p - width - 1, diagonal);
                    }
                    if x + 1 < width {
                        weights.up_right[p] = weight(p, p - width + 1, diagonal);
                    }
                }
            }
        }
        weights
    }
}

/// Pixel colors currently labeled background and foreground
fn samples_by_side(colors: &[Color], labels: &[TrimapLabel]) -> (Vec<Color>, Vec<Color>) {
    let mut background = Vec::new();
    let mut foreground = Vec::new();
    for (color, label) in colors.iter().zip(labels) {
        if label.is_foreground() {
            foreground.push(*color);
        } else {
            background.push(*color);
        }
    }
    (background, foreground)
}

/// Reassign each sample to its most likely component of `model`, then refit
fn fit_with_best_components(samples: &[Color], model: &ColorModel) -> ColorModel {
    let assignments: Vec<usize> = samples.iter().map(|c| model.best_component(c)).collect();
    ColorModel::fit(samples, &assignments)
}

impl MaskRefiner for GrabCut {
    fn refine(&self, image: &RgbImage, trimap: &Trimap, iterations: u32) -> Result<Mask> {
        let (width, height) = image.dimensions();
        if (width, height) != (trimap.width(), trimap.height()) {
            return Err(SegmentError::Refinement(format!(
                "trimap is {}x{} but image is {}x{}",
                trimap.width(),
                trimap.height(),
                width,
                height
            )));
        }
        let (w, h) = (width as usize, height as usize);

        let colors: Vec<Color> = image
            .pixels()
            .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64])
            .collect();
        let mut labels: Vec<TrimapLabel> = trimap.as_array().iter().copied().collect();

        let (bg_samples, fg_samples) = samples_by_side(&colors, &labels);
        if bg_samples.is_empty() || fg_samples.is_empty() {
            tracing::warn!(
                "Trimap has {} background and {} foreground pixels, skipping graph cut",
                bg_samples.len(),
                fg_samples.len()
            );
            return Ok(trimap.to_mask());
        }

        let mut rng = self
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        let mut bg_model = ColorModel::fit(
            &bg_samples,
            &ColorModel::initial_assignments(&bg_samples, &mut rng),
        );
        let mut fg_model = ColorModel::fit(
            &fg_samples,
            &ColorModel::initial_assignments(&fg_samples, &mut rng),
        );

        let neighbours = NeighbourWeights::new(&colors, w, h, self.gamma);
        let lambda = 9.0 * self.gamma;

        for iteration in 0..iterations {
            let (bg_samples, fg_samples) = samples_by_side(&colors, &labels);
            bg_model = fit_with_best_components(&bg_samples, &bg_model);
            fg_model = fit_with_best_components(&fg_samples, &fg_model);

            let mut graph = FlowGraph::new(w * h, w * h * 6);
            for y in 0..h {
                for x in 0..w {
                    let p = y * w + x;
                    let (from_source, to_sink) = match labels[p] {
                        TrimapLabel::Background => (0.0, lambda),
                        TrimapLabel::Foreground => (lambda, 0.0),
                        _ => (bg_model.cost(&colors[p]), fg_model.cost(&colors[p])),
                    };
                    graph.add_terminal_weights(p, from_source, to_sink);

                    if x > 0 {
                        let wt = neighbours.left[p];
                        graph.add_edge(p, p - 1, wt, wt);
                    }
                    if y > 0 {
                        let wt = neighbours.up[p];
                        graph.add_edge(p, p - w, wt, wt);
                        if x > 0 {
                            let wt = neighbours.up_left[p];
                            graph.add_edge(p, p - w - 1, wt, wt);
                        }
                        if x + 1 < w {
                            let wt = neighbours.up_right[p];
                            graph.add_edge(p, p - w + 1, wt, wt);
                        }
                    }
                }
            }

            let flow = graph.max_flow();
            let source_side = graph.source_side();
            let mut flipped = 0usize;
            for (label, &is_fg) in labels.iter_mut().zip(&source_side) {
                if !label.is_probable() {
                    continue;
                }
                let updated = if is_fg {
                    TrimapLabel::ProbableForeground
                } else {
                    TrimapLabel::ProbableBackground
                };
                if updated != *label {
                    flipped += 1;
                    *label = updated;
                }
            }
            tracing::debug!(
                "Graph cut iteration {}: flow {:.1}, {} pixels relabeled",
                iteration,
                flow,
                flipped
            );
        }

        Ok(GrayImage::from_fn(width, height, |x, y| {
            let label = labels[y as usize * w + x as usize];
            Luma([if label.is_foreground() { 255 } else { 0 }])
        }))
    }
}
