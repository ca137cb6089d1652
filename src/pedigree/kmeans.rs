//! K-means clustering with k-means++ seeding and multiple restarts.

use crate::rng::Rng;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Configuration for k-means.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansConfig {
    pub n_clusters: usize,
    /// Independent restarts; the lowest-inertia run is kept.
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence threshold on the total squared center shift.
    pub tol: f64,
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_clusters: 3,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }
}

/// A fitted clustering.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// Cluster index of each row.
    pub labels: Vec<usize>,
    /// Cluster centers (clusters × dimensions).
    pub centers: DMatrix<f64>,
    /// Sum of squared distances to the assigned center.
    pub inertia: f64,
    pub n_iter: usize,
}

impl KMeansFit {
    /// Number of distinct labels actually used.
    pub fn n_used_clusters(&self) -> usize {
        let mut used = vec![false; self.centers.nrows()];
        for &l in &self.labels {
            used[l] = true;
        }
        used.iter().filter(|&&u| u).count()
    }
}

/// Cluster the rows of `data`.
///
/// Returns `None` when there are fewer rows than clusters, no clusters are
/// requested, or the data is not finite.
pub fn kmeans(data: &DMatrix<f64>, config: &KMeansConfig) -> Option<KMeansFit> {
    let n = data.nrows();
    let k = config.n_clusters;
    if k == 0 || n < k || data.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let mut rng = Rng::new(config.seed);
    let mut best: Option<KMeansFit> = None;
    for _ in 0..config.n_init.max(1) {
        let centers = init_plus_plus(data, k, &mut rng);
        let fit = lloyd(data, centers, config.max_iter, config.tol);
        if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
            best = Some(fit);
        }
    }
    best
}

fn squared_distance(data: &DMatrix<f64>, row: usize, centers: &DMatrix<f64>, c: usize) -> f64 {
    data.row(row)
        .iter()
        .zip(centers.row(c).iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum()
}

/// k-means++ seeding: each new center is drawn with probability
/// proportional to the squared distance to the nearest chosen center.
fn init_plus_plus(data: &DMatrix<f64>, k: usize, rng: &mut Rng) -> DMatrix<f64> {
    let (n, d) = data.shape();
    let mut centers = DMatrix::zeros(k, d);

    let first = rng.next_index(n);
    centers.set_row(0, &data.row(first));

    let mut nearest: Vec<f64> = (0..n).map(|i| squared_distance(data, i, &centers, 0)).collect();

    for c in 1..k {
        let total: f64 = nearest.iter().sum();
        let chosen = if total > 0.0 {
            let target = rng.next_f64() * total;
            let mut acc = 0.0;
            let mut pick = n - 1;
            for (i, &w) in nearest.iter().enumerate() {
                acc += w;
                if acc >= target && w > 0.0 {
                    pick = i;
                    break;
                }
            }
            pick
        } else {
            rng.next_index(n)
        };

        centers.set_row(c, &data.row(chosen));
        for (i, dist) in nearest.iter_mut().enumerate() {
            *dist = dist.min(squared_distance(data, i, &centers, c));
        }
    }
    centers
}

fn assign(data: &DMatrix<f64>, centers: &DMatrix<f64>) -> (Vec<usize>, f64) {
    let mut inertia = 0.0;
    let labels = (0..data.nrows())
        .map(|i| {
            let (best, dist) = (0..centers.nrows())
                .map(|c| (c, squared_distance(data, i, centers, c)))
                .fold((0, f64::INFINITY), |acc, x| if x.1 < acc.1 { x } else { acc });
            inertia += dist;
            best
        })
        .collect();
    (labels, inertia)
}

fn lloyd(data: &DMatrix<f64>, mut centers: DMatrix<f64>, max_iter: usize, tol: f64) -> KMeansFit {
    let (k, d) = centers.shape();
    let mut n_iter = 0;

    for iter in 0..max_iter {
        n_iter = iter + 1;
        let (labels, _) = assign(data, &centers);

        let mut sums = DMatrix::<f64>::zeros(k, d);
        let mut counts = vec![0usize; k];
        for (i, &l) in labels.iter().enumerate() {
            counts[l] += 1;
            for j in 0..d {
                sums[(l, j)] += data[(i, j)];
            }
        }

        let mut shift = 0.0;
        for c in 0..k {
            // Empty clusters keep their previous center.
            if counts[c] == 0 {
                continue;
            }
            for j in 0..d {
                let updated = sums[(c, j)] / counts[c] as f64;
                shift += (updated - centers[(c, j)]).powi(2);
                centers[(c, j)] = updated;
            }
        }

        if shift <= tol {
            break;
        }
    }

    let (labels, inertia) = assign(data, &centers);
    KMeansFit {
        labels,
        centers,
        inertia,
        n_iter,
    }
}
