//! Seeded k-means over embedding rows.
//!
//! Single Lloyd run with deterministic initialization, used to confine link
//! candidates to topical neighborhoods. Labels are only ever compared for
//! equality, so cluster numbering carries no meaning.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::ClusterError;

const MAX_ITERATIONS: usize = 100;
const TOLERANCE: f32 = 1e-4;

fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Assign every row of `points` to one of `clusters` groups.
///
/// Initial centroids are distinct rows drawn from a [`StdRng`] seeded with
/// `seed`, so the same inputs always produce the same labels. A cluster
/// left without members keeps its previous centroid.
pub fn kmeans_labels(
    points: &Array2<f32>,
    clusters: usize,
    seed: u64,
) -> Result<Vec<usize>, ClusterError> {
    if clusters == 0 {
        return Err(ClusterError::ZeroClusters);
    }
    let n = points.nrows();
    if n < clusters {
        return Err(ClusterError::TooFewPoints {
            points: n,
            clusters,
        });
    }

    let dim = points.ncols();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = Array2::zeros((clusters, dim));
    for (c, row) in rand::seq::index::sample(&mut rng, n, clusters)
        .into_iter()
        .enumerate()
    {
        centroids.row_mut(c).assign(&points.row(row));
    }

    let mut labels = vec![0usize; n];
    for _ in 0..MAX_ITERATIONS {
        for (i, point) in points.rows().into_iter().enumerate() {
            let mut best = 0;
            let mut best_distance = f32::INFINITY;
            for (c, centroid) in centroids.rows().into_iter().enumerate() {
                let distance = squared_distance(point, centroid);
                if distance < best_distance {
                    best = c;
                    best_distance = distance;
                }
            }
            labels[i] = best;
        }

        let mut next = Array2::zeros((clusters, dim));
        let mut counts = vec![0usize; clusters];
        for (i, point) in points.rows().into_iter().enumerate() {
            counts[labels[i]] += 1;
            let mut sum = next.row_mut(labels[i]);
            sum += &point;
        }
        for c in 0..clusters {
            if counts[c] == 0 {
                next.row_mut(c).assign(&centroids.row(c));
            } else {
                let mut sum = next.row_mut(c);
                sum /= counts[c] as f32;
            }
        }

        let shift = centroids
            .rows()
            .into_iter()
            .zip(next.rows())
            .map(|(old, new)| squared_distance(old, new))
            .fold(0.0_f32, f32::max);
        centroids = next;
        if shift < TOLERANCE {
            break;
        }
    }

    Ok(labels)
}
