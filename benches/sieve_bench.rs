use beal_hunter::precompute::ResidueTables;
use beal_hunter::sieve::{coprime_lanes, filter_lanes, gcd, survives, LANES};
use beal_hunter::verify::check_power_hit;
use beal_hunter::Signature;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const SIG: Signature = Signature { x: 3, y: 4, z: 5 };

fn bench_table_build(c: &mut Criterion) {
    c.bench_function("ResidueTables::build(100k x 100k)", |b| {
        b.iter(|| ResidueTables::build(black_box(SIG), black_box(100_000), black_box(100_000)));
    });
}

fn bench_scalar_row(c: &mut Criterion) {
    let tables = ResidueTables::build(SIG, 10_000, 10_000).unwrap();
    c.bench_function("scalar row (A=7919, 10k B)", |b| {
        b.iter(|| {
            let a = black_box(7919);
            (1..=10_000u64).filter(|&bv| gcd(a, bv) == 1 && survives(&tables, a, bv)).count()
        });
    });
}

fn bench_batch_row(c: &mut Criterion) {
    let tables = ResidueTables::build(SIG, 10_000, 10_000).unwrap();
    c.bench_function("batch row (A=7919, 10k B)", |b| {
        b.iter(|| {
            let a = black_box(7919);
            let mut alive = 0u32;
            let mut b0 = 1;
            while b0 <= 10_000 {
                let lanes = coprime_lanes(a, b0, 10_000);
                alive += filter_lanes(&tables, a, b0, lanes).count_ones();
                b0 += LANES;
            }
            alive
        });
    });
}

fn bench_exact_check(c: &mut Criterion) {
    c.bench_function("check_power_hit(large A, B)", |b| {
        b.iter(|| check_power_hit(black_box(987_654_321), black_box(123_456_789), SIG, u64::MAX));
    });
}

criterion_group!(
    benches,
    bench_table_build,
    bench_scalar_row,
    bench_batch_row,
    bench_exact_check,
);
criterion_main!(benches);
