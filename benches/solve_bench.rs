//! Benchmarks for the matrix-game solve pipeline.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use policy_solver::solver::{reduce, solve, BackendPreference, PayoffMatrix, SolveOptions};

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> PayoffMatrix {
    let data: Vec<Vec<f64>> = (0..rows)
        .map(|_| (0..cols).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect();
    PayoffMatrix::from_rows(data).unwrap()
}

fn reduce_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let matrices: Vec<PayoffMatrix> = (0..64).map(|_| random_matrix(&mut rng, 5, 5)).collect();

    c.bench_function("reduce_5x5", |b| {
        let mut index = 0usize;
        b.iter(|| {
            let matrix = &matrices[index % matrices.len()];
            index += 1;
            black_box(reduce(matrix))
        })
    });
}

fn small_engine_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let matrices: Vec<PayoffMatrix> = (0..64).map(|_| random_matrix(&mut rng, 5, 5)).collect();
    let options = SolveOptions::new().with_backend(BackendPreference::Linprog);

    c.bench_function("solve_small_5x5", |b| {
        let mut index = 0usize;
        b.iter(|| {
            let matrix = &matrices[index % matrices.len()];
            index += 1;
            black_box(solve(matrix, &options).unwrap())
        })
    });
}

fn general_lp_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let matrices: Vec<PayoffMatrix> = (0..16).map(|_| random_matrix(&mut rng, 12, 12)).collect();
    let options = SolveOptions::new().with_backend(BackendPreference::Linprog);

    c.bench_function("solve_lp_12x12", |b| {
        let mut index = 0usize;
        b.iter(|| {
            let matrix = &matrices[index % matrices.len()];
            index += 1;
            black_box(solve(matrix, &options).unwrap())
        })
    });
}

criterion_group!(
    benches,
    reduce_benchmark,
    small_engine_benchmark,
    general_lp_benchmark
);
criterion_main!(benches);
