//! One-dimensional k-means with k-means++ seeding.
//!
//! Used only to seed the VBEM components, so it stops after a fixed number
//! of Lloyd iterations or when assignments stop changing.

use rand::distr::weighted::WeightedIndex;
use rand::{Rng, RngCore};
use rand_distr::Distribution;

const MAX_LLOYD_ITERATIONS: usize = 50;

/// Cluster centers (ascending) and the index of each value's center.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    pub centers: Vec<f64>,
    pub assignments: Vec<usize>,
}

impl KMeans {
    /// Number of values assigned to each center.
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.centers.len()];
        for &a in &self.assignments {
            counts[a] += 1;
        }
        counts
    }
}

fn nearest(x: f64, centers: &[f64]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centers.iter().enumerate() {
        let d = (x - c).abs();
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

/// k-means++ seeding: the first center uniformly, each next one with
/// probability proportional to the squared distance to the closest center.
pub fn seed_centers(values: &[f64], k: usize, rng: &mut dyn RngCore) -> Vec<f64> {
    if values.is_empty() || k == 0 {
        return Vec::new();
    }
    let first = rng.random_range(0..values.len());
    let mut centers = vec![values[first]];
    while centers.len() < k {
        let d2: Vec<f64> = values
            .iter()
            .map(|x| {
                let c = centers[nearest(*x, &centers)];
                (x - c) * (x - c)
            })
            .collect();
        // fails once every value coincides with a center
        let Ok(weighted) = WeightedIndex::<f64>::new(&d2) else {
            break;
        };
        centers.push(values[weighted.sample(rng)]);
    }
    centers
}

/// Run k-means on `values`.
///
/// Returns fewer than `k` centers when the data has fewer distinct values.
pub fn kmeans(values: &[f64], k: usize, rng: &mut dyn RngCore) -> KMeans {
    let mut centers = seed_centers(values, k, rng);
    let mut assignments: Vec<usize> = values.iter().map(|x| nearest(*x, &centers)).collect();

    for _ in 0..MAX_LLOYD_ITERATIONS {
        let mut sums = vec![0.0; centers.len()];
        let mut counts = vec![0usize; centers.len()];
        for (x, &a) in values.iter().zip(&assignments) {
            sums[a] += x;
            counts[a] += 1;
        }
        for (c, (s, n)) in centers.iter_mut().zip(sums.iter().zip(&counts)) {
            // empty clusters keep their previous center
            if *n > 0 {
                *c = s / *n as f64;
            }
        }
        let next: Vec<usize> = values.iter().map(|x| nearest(*x, &centers)).collect();
        if next == assignments {
            break;
        }
        assignments = next;
    }

    let mut order: Vec<usize> = (0..centers.len()).collect();
    order.sort_by(|a, b| centers[*a].total_cmp(&centers[*b]));
    let mut rank = vec![0; centers.len()];
    for (new, &old) in order.iter().enumerate() {
        rank[old] = new;
    }
    KMeans {
        centers: order.iter().map(|&i| centers[i]).collect(),
        assignments: assignments.into_iter().map(|a| rank[a]).collect(),
    }
}
