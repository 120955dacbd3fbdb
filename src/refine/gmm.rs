//! Gaussian mixture color model with full 3x3 covariances.

use crate::config::KMeansParams;
use crate::segmentation::KMeans;
use ndarray::Array2;
use rand::Rng;

pub const COMPONENTS: usize = 5;

/// Added to the covariance diagonal when it is (nearly) singular
const COVARIANCE_REGULARIZER: f64 = 0.01;
const DETERMINANT_EPS: f64 = f64::EPSILON;

pub type Color = [f64; 3];

#[derive(Debug, Clone, Copy)]
struct Component {
    weight: f64,
    mean: Color,
    inverse: [[f64; 3]; 3],
    determinant: f64,
}

impl Component {
    const EMPTY: Self = Self {
        weight: 0.0,
        mean: [0.0; 3],
        inverse: [[0.0; 3]; 3],
        determinant: 1.0,
    };

    /// Unnormalized Gaussian density; the constant factor cancels in every ratio taken
    fn density(&self, color: &Color) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        let d = [
            color[0] - self.mean[0],
            color[1] - self.mean[1],
            color[2] - self.mean[2],
        ];
        let mut mahalanobis = 0.0;
        for i in 0..3 {
            for j in 0..3 {
                mahalanobis += d[i] * self.inverse[i][j] * d[j];
            }
        }
        (-0.5 * mahalanobis).exp() / self.determinant.sqrt()
    }
}

/// Running sums for one component
#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    count: usize,
    sum: [f64; 3],
    products: [[f64; 3]; 3],
}

impl Accumulator {
    fn add(&mut self, c: &Color) {
        self.count += 1;
        for i in 0..3 {
            self.sum[i] += c[i];
            for j in 0..3 {
                self.products[i][j] += c[i] * c[j];
            }
        }
    }

    fn finish(&self, total: usize) -> Component {
        if self.count == 0 || total == 0 {
            return Component::EMPTY;
        }
        let n = self.count as f64;
        let mean = self.sum.map(|s| s / n);
        let mut cov = [[0.0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                cov[i][j] = self.products[i][j] / n - mean[i] * mean[j];
            }
        }

        let mut det = determinant(&cov);
        if det <= DETERMINANT_EPS {
            for (i, row) in cov.iter_mut().enumerate() {
                row[i] += COVARIANCE_REGULARIZER;
            }
            det = determinant(&cov);
        }

        Component {
            weight: n / total as f64,
            mean,
            inverse: inverse(&cov, det),
            determinant: det,
        }
    }
}

fn determinant(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

fn inverse(m: &[[f64; 3]; 3], det: f64) -> [[f64; 3]; 3] {
    let inv_det = 1.0 / det;
    [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ]
}

/// Mixture of `COMPONENTS` Gaussians over RGB colors
#[derive(Debug, Clone)]
pub struct ColorModel {
    components: [Component; COMPONENTS],
}

impl ColorModel {
    /// Fit a model to `samples` given each sample's component index
    pub fn fit(samples: &[Color], assignments: &[usize]) -> Self {
        let mut acc = [Accumulator::default(); COMPONENTS];
        for (color, &k) in samples.iter().zip(assignments) {
            acc[k].add(color);
        }
        Self {
            components: acc.map(|a| a.finish(samples.len())),
        }
    }

    /// Initial component indices from k-means over the samples
    pub fn initial_assignments<R: Rng>(samples: &[Color], rng: &mut R) -> Vec<usize> {
        let data = Array2::from_shape_fn((samples.len(), 3), |(i, c)| samples[i][c] as f32);
        let params = KMeansParams {
            max_iter: 10,
            attempts: 1,
            tolerance: 1e-3,
        };
        KMeans::new(COMPONENTS, params).fit(data.view(), rng).labels
    }

    /// Mixture likelihood of `color`
    pub fn likelihood(&self, color: &Color) -> f64 {
        self.components
            .iter()
            .map(|c| c.weight * c.density(color))
            .sum()
    }

    /// Component that explains `color` best
    pub fn best_component(&self, color: &Color) -> usize {
        let mut best = 0;
        let mut best_density = f64::NEG_INFINITY;
        for (k, component) in self.components.iter().enumerate() {
            let density = component.density(color);
            if density > best_density {
                best_density = density;
                best = k;
            }
        }
        best
    }

    /// Negative log-likelihood, finite even where the model assigns zero probability
    pub fn cost(&self, color: &Color) -> f64 {
        -self.likelihood(color).max(f64::MIN_POSITIVE).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn inverse_of_diagonal_matrix() {
        let m = [[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 5.0]];
        let det = determinant(&m);
        assert_relative_eq!(det, 40.0);
        let inv = inverse(&m, det);
        assert_relative_eq!(inv[0][0], 0.5);
        assert_relative_eq!(inv[1][1], 0.25);
        assert_relative_eq!(inv[2][2], 0.2);
        assert_relative_eq!(inv[0][1], 0.0);
    }

    #[test]
    fn model_prefers_its_own_colors() {
        let mut samples = Vec::new();
        for i in 0..50 {
            let jitter = (i % 5) as f64;
            samples.push([200.0 + jitter, 20.0 - jitter, 30.0 + jitter]);
        }
        let mut rng = StdRng::seed_from_u64(5);
        let assignments = ColorModel::initial_assignments(&samples, &mut rng);
        let model = ColorModel::fit(&samples, &assignments);

        let red = model.likelihood(&[202.0, 18.0, 32.0]);
        let blue = model.likelihood(&[10.0, 20.0, 220.0]);
        assert!(red > blue);
        assert!(model.cost(&[10.0, 20.0, 220.0]) > model.cost(&[202.0, 18.0, 32.0]));
    }

    #[test]
    fn flat_samples_are_regularized() {
        let samples = vec![[7.0, 7.0, 7.0]; 20];
        let assignments = vec![0; 20];
        let model = ColorModel::fit(&samples, &assignments);
        assert!(model.likelihood(&[7.0, 7.0, 7.0]).is_finite());
        assert!(model.likelihood(&[7.0, 7.0, 7.0]) > 0.0);
        assert_eq!(model.best_component(&[7.0, 7.0, 7.0]), 0);
    }
}
