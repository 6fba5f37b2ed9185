//! Seeded k-means over unit-length embeddings.
//!
//! k-means++ initialization followed by Lloyd refinement under cosine
//! distance. Centroids are re-normalized after every update, so the same
//! seed and inputs always produce the same assignments.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::EngineError;

/// Centroid movement below which refinement stops
const CONVERGENCE_TOLERANCE: f32 = 1e-6;

/// k-means partitioner.
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    seed: u64,
    max_iterations: usize,
}

impl KMeans {
    /// Create a partitioner for `k` clusters.
    pub fn new(k: usize) -> Result<Self, EngineError> {
        if k == 0 {
            return Err(EngineError::Clustering("k must be greater than 0".to_string()));
        }
        Ok(Self {
            k,
            seed: 42,
            max_iterations: 100,
        })
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Assign each vector a cluster index in `0..k`.
    ///
    /// Some indices may end up unused; callers drop empty clusters.
    pub fn fit_predict(&self, vectors: &[Vec<f32>]) -> Result<Vec<usize>, EngineError> {
        if vectors.is_empty() {
            return Ok(Vec::new());
        }
        let dimension = vectors[0].len();
        if vectors.iter().any(|v| v.len() != dimension) {
            return Err(EngineError::Clustering(
                "all vectors must share one dimension".to_string(),
            ));
        }

        let mut centroids = self.kmeans_plus_plus(vectors);

        for _iteration in 0..self.max_iterations {
            let assignments = assign_clusters(vectors, &centroids);
            let new_centroids = update_centroids(vectors, &assignments, &centroids);

            let converged = centroids
                .iter()
                .zip(new_centroids.iter())
                .all(|(old, new)| cosine_distance(old, new) <= CONVERGENCE_TOLERANCE);

            centroids = new_centroids;
            if converged {
                break;
            }
        }

        Ok(assign_clusters(vectors, &centroids))
    }

    /// k-means++ seeding: first centroid uniform, the rest weighted by squared distance.
    fn kmeans_plus_plus(&self, vectors: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let k = self.k.min(vectors.len());

        let mut centroids = Vec::with_capacity(k);
        let first_idx = rng.random_range(0..vectors.len());
        centroids.push(vectors[first_idx].clone());

        while centroids.len() < k {
            let weights: Vec<f64> = vectors
                .iter()
                .map(|v| {
                    let d = centroids
                        .iter()
                        .map(|c| cosine_distance(v, c))
                        .fold(f32::INFINITY, f32::min)
                        .max(0.0) as f64;
                    d * d
                })
                .collect();
            let total: f64 = weights.iter().sum();

            let chosen = if total <= 0.0 {
                // Every point already coincides with a centroid
                rng.random_range(0..vectors.len())
            } else {
                let threshold = rng.random::<f64>() * total;
                let mut cumulative = 0.0;
                let mut chosen = None;
                for (i, &w) in weights.iter().enumerate() {
                    cumulative += w;
                    if w > 0.0 && cumulative >= threshold {
                        chosen = Some(i);
                        break;
                    }
                }
                // Rounding can leave the threshold just past the sum
                chosen.unwrap_or_else(|| {
                    weights.iter().rposition(|&w| w > 0.0).unwrap_or(0)
                })
            };
            centroids.push(vectors[chosen].clone());
        }

        centroids
    }
}

/// Cosine distance for unit-length vectors.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    1.0 - dot
}

fn normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Nearest centroid per vector; ties go to the lowest index.
fn assign_clusters(vectors: &[Vec<f32>], centroids: &[Vec<f32>]) -> Vec<usize> {
    vectors
        .iter()
        .map(|v| {
            let mut best_cluster = 0;
            let mut best_dist = f32::INFINITY;
            for (idx, centroid) in centroids.iter().enumerate() {
                let dist = cosine_distance(v, centroid);
                if dist < best_dist {
                    best_dist = dist;
                    best_cluster = idx;
                }
            }
            best_cluster
        })
        .collect()
}

/// Mean direction of each cluster; empty clusters keep their old centroid.
fn update_centroids(
    vectors: &[Vec<f32>],
    assignments: &[usize],
    previous: &[Vec<f32>],
) -> Vec<Vec<f32>> {
    let dimension = previous.first().map(|c| c.len()).unwrap_or(0);
    let mut sums = vec![vec![0.0f32; dimension]; previous.len()];
    let mut counts = vec![0usize; previous.len()];

    for (vector, &cluster) in vectors.iter().zip(assignments.iter()) {
        counts[cluster] += 1;
        for (sum, &val) in sums[cluster].iter_mut().zip(vector.iter()) {
            *sum += val;
        }
    }

    sums.into_iter()
        .zip(counts)
        .zip(previous.iter())
        .map(|((mut sum, count), old)| {
            if count == 0 {
                old.clone()
            } else {
                normalize(&mut sum);
                sum
            }
        })
        .collect()
}
