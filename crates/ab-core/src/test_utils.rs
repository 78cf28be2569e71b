//! Test utilities for ab-core.
//!
//! Seeded synthetic data generators and float assertions shared by unit
//! tests, integration tests and benchmarks.

use ab_common::{StandardData, UserRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal, Normal};

/// Assert that two floating point numbers are approximately equal.
#[macro_export]
macro_rules! assert_approx_eq {
    ($a:expr, $b:expr) => {
        $crate::assert_approx_eq!($a, $b, 1e-6_f64)
    };
    ($a:expr, $b:expr, $epsilon:expr) => {{
        let a: f64 = $a;
        let b: f64 = $b;
        let eps: f64 = $epsilon;
        let diff = (a - b).abs();
        if diff > eps {
            panic!(
                "assertion failed: `(left ~= right)` (left: `{}`, right: `{}`, diff: `{}`, epsilon: `{}`)",
                a, b, diff, eps
            );
        }
    }};
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// `n` draws from Normal(mu, sd).
pub fn normal_values(n: usize, mu: f64, sd: f64, seed: u64) -> Vec<f64> {
    let mut rng = seeded_rng(seed);
    let dist = Normal::new(mu, sd).unwrap();
    (0..n).map(|_| dist.sample(&mut rng)).collect()
}

/// `n` draws from LogNormal(mu, sd) (log-scale parameters).
pub fn lognormal_values(n: usize, mu: f64, sd: f64, seed: u64) -> Vec<f64> {
    let mut rng = seeded_rng(seed);
    let dist = LogNormal::new(mu, sd).unwrap();
    (0..n).map(|_| dist.sample(&mut rng)).collect()
}

/// Equal-sized Normal clusters at each of `centers`, unit spread.
pub fn normal_mixture(n_each: usize, centers: &[f64], seed: u64) -> Vec<f64> {
    centers
        .iter()
        .enumerate()
        .flat_map(|(i, &c)| normal_values(n_each, c, 1.0, seed.wrapping_add(i as u64)))
        .collect()
}

/// User-level data where every user converted with the given value.
pub fn converted_users(values: &[f64]) -> StandardData {
    let users = values.iter().map(|&v| UserRecord::new(true, v)).collect();
    StandardData::user_level(users).unwrap()
}

/// Zero-inflated user-level data: each of `n` users converts with
/// probability `rate` and then spends a LogNormal(mu, sd) amount.
pub fn zero_inflated_users(n: usize, rate: f64, mu: f64, sd: f64, seed: u64) -> StandardData {
    let mut rng = seeded_rng(seed);
    let value = LogNormal::new(mu, sd).unwrap();
    let users = (0..n)
        .map(|_| {
            if rng.random::<f64>() < rate {
                UserRecord::new(true, value.sample(&mut rng))
            } else {
                UserRecord::new(false, 0.0)
            }
        })
        .collect();
    StandardData::user_level(users).unwrap()
}
