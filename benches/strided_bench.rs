use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use strided_nd::{concat, sort, NdArray, Order};

fn random_matrix(size: usize, order: Order, seed: u64) -> NdArray<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f64> = (0..size * size).map(|_| rng.gen::<f64>()).collect();
    match NdArray::from_vec(data, &[size, size], order) {
        Ok(a) => a,
        Err(err) => panic!("from_vec failed: {err}"),
    }
}

fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");
    for size in [100usize, 500] {
        group.throughput(Throughput::Elements((size * size) as u64));
        let a = random_matrix(size, Order::RowMajor, 0);
        let a_t = a.transpose();

        group.bench_with_input(BenchmarkId::new("contiguous", size), &size, |b, _| {
            b.iter(|| black_box(a.iter().fold(0.0, |acc, x| acc + x)));
        });

        group.bench_with_input(BenchmarkId::new("transposed", size), &size, |b, _| {
            b.iter(|| black_box(a_t.iter().fold(0.0, |acc, x| acc + x)));
        });

        group.bench_with_input(BenchmarkId::new("dup_transposed", size), &size, |b, _| {
            b.iter(|| a_t.dup());
        });
    }
    group.finish();
}

fn bench_reduce(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce");
    group.sample_size(20);
    for size in [100usize, 500] {
        group.throughput(Throughput::Elements((size * size) as u64));
        let a = random_matrix(size, Order::ColumnMajor, 1);

        for dim in [0usize, 1] {
            group.bench_with_input(BenchmarkId::new(format!("sum_dim{dim}"), size), &size, |b, _| {
                b.iter(|| match a.sum(&[dim]) {
                    Ok(s) => s,
                    Err(err) => panic!("sum failed: {err}"),
                });
            });
        }

        group.bench_with_input(BenchmarkId::new("sum_all", size), &size, |b, _| {
            b.iter(|| black_box(a.sum_all()));
        });
    }
    group.finish();
}

fn bench_concat(c: &mut Criterion) {
    let mut group = c.benchmark_group("concat");
    group.sample_size(20);
    for size in [100usize, 500] {
        let a = random_matrix(size, Order::RowMajor, 2);
        let b = random_matrix(size, Order::ColumnMajor, 3);
        group.throughput(Throughput::Elements((2 * size * size) as u64));

        for axis in [0usize, 1] {
            group.bench_with_input(BenchmarkId::new(format!("axis{axis}"), size), &size, |bench, _| {
                bench.iter(|| match concat(axis, &[&a, &b]) {
                    Ok(out) => out,
                    Err(err) => panic!("concat failed: {err}"),
                });
            });
        }
    }
    group.finish();
}

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort");
    group.sample_size(10);
    for size in [100usize, 500] {
        group.throughput(Throughput::Elements((size * size) as u64));
        let a = random_matrix(size, Order::RowMajor, 4);

        group.bench_with_input(BenchmarkId::new("rows", size), &size, |b, _| {
            b.iter(|| match sort(&a, 1, true) {
                Ok(out) => out,
                Err(err) => panic!("sort failed: {err}"),
            });
        });

        group.bench_with_input(BenchmarkId::new("columns", size), &size, |b, _| {
            b.iter(|| match sort(&a, 0, true) {
                Ok(out) => out,
                Err(err) => panic!("sort failed: {err}"),
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_iterate, bench_reduce, bench_concat, bench_sort);
criterion_main!(benches);
