//! Criterion benchmarks for the inference hot paths in `ab-core`.
//!
//! Data is synthetic and seeded so runs are comparable across machines.

use ab_common::{Family, ModelConfig};
use ab_core::config::FitOptions;
use ab_core::inference::{
    BetaBinomialConjugate, InferenceEngine, LogNormalConjugate, NormalMixtureVbem,
};
use ab_core::selection::{compare_models, Candidate, Criterion as InfoCriterion};
use ab_core::test_utils::{converted_users, lognormal_values, normal_mixture, zero_inflated_users};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_conjugate(c: &mut Criterion) {
    let mut group = c.benchmark_group("conjugate");
    let options = FitOptions::default().with_seed(1);

    let binomial = ab_common::StandardData::binomial(4_500, 10_000).unwrap();
    group.bench_function("beta_binomial", |b| {
        b.iter(|| {
            let result = BetaBinomialConjugate
                .fit(black_box(&binomial), &ModelConfig::simple(Family::Beta, 1), &options)
                .expect("beta fit");
            black_box(result.diagnostics.runtime_ms);
        })
    });

    for n in [100usize, 10_000] {
        let data = converted_users(&lognormal_values(n, 3.0, 1.0, 7));
        group.bench_with_input(BenchmarkId::new("lognormal", n), &data, |b, data| {
            b.iter(|| {
                let result = LogNormalConjugate
                    .fit(black_box(data), &ModelConfig::simple(Family::LogNormal, 1), &options)
                    .expect("lognormal fit");
                black_box(result.posterior.mean());
            })
        });
    }
    group.finish();
}

fn bench_vbem(c: &mut Criterion) {
    let mut group = c.benchmark_group("vbem");
    group.sample_size(20);
    for k in [2usize, 3] {
        let centers: Vec<f64> = (0..k).map(|i| i as f64 * 8.0).collect();
        let data = converted_users(&normal_mixture(200, &centers, 3));
        let options = FitOptions::default().with_seed(5);
        group.bench_with_input(BenchmarkId::new("normal_mixture", k), &data, |b, data| {
            b.iter(|| {
                let result = NormalMixtureVbem::new()
                    .fit(black_box(data), &ModelConfig::simple(Family::Normal, k), &options)
                    .expect("vbem fit");
                black_box(result.diagnostics.iterations);
            })
        });
    }
    group.finish();
}

fn bench_waic(c: &mut Criterion) {
    let mut group = c.benchmark_group("waic");
    group.sample_size(20);
    let options = FitOptions::default().with_seed(9);
    for n in [500usize, 5_000] {
        let data = zero_inflated_users(n, 0.3, 2.5, 0.8, 11);
        let candidates: Vec<Candidate> = [Family::LogNormal, Family::Normal]
            .into_iter()
            .map(|family| {
                let config = ModelConfig::compound(family, 1);
                let engine = ab_core::inference::CompoundEngine;
                let result = engine.fit(&data, &config, &options).expect("compound fit");
                Candidate::from_result(&result)
            })
            .collect();
        group.bench_with_input(BenchmarkId::new("compare_compound", n), &data, |b, data| {
            b.iter(|| {
                let cmp = compare_models(&candidates, black_box(data), InfoCriterion::Waic, &options)
                    .expect("comparison");
                black_box(cmp.ranked.len());
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_conjugate, bench_vbem, bench_waic);
criterion_main!(benches);
