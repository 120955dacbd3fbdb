use crate::config::KMeansParams;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::Rng;

/// Result of a clustering run
#[derive(Debug, Clone)]
pub struct Clustering {
    /// Cluster index of every input row
    pub labels: Vec<usize>,
    /// (k, d) centroid matrix
    pub centroids: Array2<f32>,
    /// Sum of squared distances from each point to its centroid
    pub compactness: f64,
}

impl Clustering {
    /// Number of points assigned to each cluster
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.centroids.nrows()];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }
}

/// Lloyd's k-means with k-means++ seeding and random restarts
pub struct KMeans {
    k: usize,
    params: KMeansParams,
}

impl KMeans {
    pub fn new(k: usize, params: KMeansParams) -> Self {
        Self { k: k.max(1), params }
    }

    /// Cluster the rows of `data`, keeping the most compact of `attempts` runs
    ///
    /// Clusters can come back empty when the data has fewer distinct points than `k`.
    pub fn fit<R: Rng>(&self, data: ArrayView2<f32>, rng: &mut R) -> Clustering {
        let _span = tracing::debug_span!("kmeans", k = self.k).entered();

        if data.nrows() == 0 {
            return Clustering {
                labels: Vec::new(),
                centroids: Array2::zeros((self.k, data.ncols())),
                compactness: 0.0,
            };
        }

        let mut best: Option<Clustering> = None;
        for attempt in 0..self.params.attempts.max(1) {
            let run = self.run_once(data, rng);
            tracing::debug!("k-means attempt {}: compactness {:.2}", attempt, run.compactness);
            if best.as_ref().map_or(true, |b| run.compactness < b.compactness) {
                best = Some(run);
            }
        }

        // attempts >= 1 so a run was recorded
        best.unwrap_or_else(|| self.run_once(data, rng))
    }

    fn run_once<R: Rng>(&self, data: ArrayView2<f32>, rng: &mut R) -> Clustering {
        let mut centroids = self.seed_plus_plus(data, rng);
        let mut labels = vec![0usize; data.nrows()];

        for iteration in 0..self.params.max_iter.max(1) {
            assign(data, &centroids, &mut labels);
            let updated = update_centroids(data, &labels, &centroids);
            let shift = max_shift(&centroids, &updated);
            centroids = updated;
            if shift < self.params.tolerance {
                tracing::trace!("k-means converged after {} iterations", iteration + 1);
                break;
            }
        }

        let compactness = assign(data, &centroids, &mut labels);
        Clustering {
            labels,
            centroids,
            compactness,
        }
    }

    /// Spread initial centroids with probability proportional to squared distance
    fn seed_plus_plus<R: Rng>(&self, data: ArrayView2<f32>, rng: &mut R) -> Array2<f32> {
        let n = data.nrows();
        let mut centroids = Array2::<f32>::zeros((self.k, data.ncols()));

        let first = rng.random_range(0..n);
        centroids.row_mut(0).assign(&data.row(first));
        let mut nearest: Vec<f64> = data
            .rows()
            .into_iter()
            .map(|row| squared_distance(row, centroids.row(0)))
            .collect();

        for c in 1..self.k {
            let total: f64 = nearest.iter().sum();
            let chosen = if total > 0.0 {
                let mut target = rng.random::<f64>() * total;
                let mut pick = n - 1;
                for (i, d) in nearest.iter().enumerate() {
                    target -= d;
                    if target <= 0.0 {
                        pick = i;
                        break;
                    }
                }
                pick
            } else {
                rng.random_range(0..n)
            };

            centroids.row_mut(c).assign(&data.row(chosen));
            for (d, row) in nearest.iter_mut().zip(data.rows()) {
                *d = d.min(squared_distance(row, centroids.row(c)));
            }
        }

        centroids
    }
}

fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x - *y) as f64;
            d * d
        })
        .sum()
}

/// Assign every row to its nearest centroid, returning the total squared distance
fn assign(data: ArrayView2<f32>, centroids: &Array2<f32>, labels: &mut [usize]) -> f64 {
    let mut compactness = 0.0;
    for (label, row) in labels.iter_mut().zip(data.rows()) {
        let mut best = f64::INFINITY;
        for (c, centroid) in centroids.rows().into_iter().enumerate() {
            let d = squared_distance(row, centroid);
            if d < best {
                best = d;
                *label = c;
            }
        }
        compactness += best;
    }
    compactness
}

/// Mean of each cluster; empty clusters keep their previous centroid
fn update_centroids(data: ArrayView2<f32>, labels: &[usize], previous: &Array2<f32>) -> Array2<f32> {
    let (k, dims) = previous.dim();
    let mut sums = Array2::<f64>::zeros((k, dims));
    let mut counts = vec![0usize; k];

    for (&label, row) in labels.iter().zip(data.rows()) {
        counts[label] += 1;
        for (s, v) in sums.row_mut(label).iter_mut().zip(row.iter()) {
            *s += *v as f64;
        }
    }

    let mut centroids = previous.clone();
    for c in 0..k {
        if counts[c] == 0 {
            continue;
        }
        for j in 0..dims {
            centroids[[c, j]] = (sums[[c, j]] / counts[c] as f64) as f32;
        }
    }
    centroids
}

fn max_shift(old: &Array2<f32>, new: &Array2<f32>) -> f32 {
    old.rows()
        .into_iter()
        .zip(new.rows())
        .map(|(a, b)| squared_distance(a, b).sqrt() as f32)
        .fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params() -> KMeansParams {
        KMeansParams {
            max_iter: 50,
            attempts: 3,
            tolerance: 1e-3,
        }
    }

    #[test]
    fn separates_two_blobs() {
        let data = array![
            [0.0f32, 0.0],
            [0.5, 0.2],
            [0.1, 0.4],
            [10.0, 10.0],
            [10.3, 9.8],
            [9.7, 10.1],
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let result = KMeans::new(2, params()).fit(data.view(), &mut rng);

        assert_eq!(result.labels.len(), 6);
        assert_eq!(result.labels[0], result.labels[1]);
        assert_eq!(result.labels[0], result.labels[2]);
        assert_eq!(result.labels[3], result.labels[4]);
        assert_eq!(result.labels[3], result.labels[5]);
        assert_ne!(result.labels[0], result.labels[3]);
        assert_eq!(result.counts(), vec![3, 3]);
        assert!(result.compactness < 1.0);
    }

    #[test]
    fn flat_data_does_not_panic() {
        let data = Array2::<f32>::from_elem((25, 3), 4.0);
        let mut rng = StdRng::seed_from_u64(1);
        let result = KMeans::new(2, params()).fit(data.view(), &mut rng);
        assert_eq!(result.labels.len(), 25);
        assert!(result.labels.iter().all(|&l| l < 2));
        assert_eq!(result.compactness, 0.0);
    }

    #[test]
    fn more_clusters_than_points() {
        let data = array![[1.0f32, 2.0], [3.0, 4.0]];
        let mut rng = StdRng::seed_from_u64(3);
        let result = KMeans::new(5, params()).fit(data.view(), &mut rng);
        assert_eq!(result.centroids.nrows(), 5);
        assert_eq!(result.counts().iter().sum::<usize>(), 2);
        assert_eq!(result.compactness, 0.0);
    }

    #[test]
    fn empty_input_yields_empty_labels() {
        let data = Array2::<f32>::zeros((0, 3));
        let mut rng = StdRng::seed_from_u64(0);
        let result = KMeans::new(2, params()).fit(data.view(), &mut rng);
        assert!(result.labels.is_empty());
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let data = array![[0.0f32], [1.0], [2.0], [8.0], [9.0], [10.0]];
        let a = KMeans::new(2, params()).fit(data.view(), &mut StdRng::seed_from_u64(11));
        let b = KMeans::new(2, params()).fit(data.view(), &mut StdRng::seed_from_u64(11));
        assert_eq!(a.labels, b.labels);
    }
}
