use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rustpython_gc::vm::builtins::{PyInt, PyList};
use rustpython_gc::{Collector, GcConfig};

/// a ring of lists, each also holding one int
fn make_ring(gc: &Collector, len: usize) {
    let first = PyList::new_ref(gc, vec![PyInt::new_ref(gc, 0).into()]);
    let mut last = first.clone();
    for i in 1..len {
        let node = PyList::new_ref(gc, vec![PyInt::new_ref(gc, i as i64).into()]);
        last.append(node.to_object());
        last = node;
    }
    last.append(first.into());
}

fn bench_collect_garbage(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect_garbage");
    for len in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let gc = Collector::with_config(GcConfig::default().with_enabled(false));
            b.iter(|| {
                make_ring(&gc, len);
                black_box(gc.collect(2))
            });
        });
    }
    group.finish();
}

fn bench_collect_live(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect_live");
    for len in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let gc = Collector::with_config(GcConfig::default().with_enabled(false));
            let root = PyList::new_ref(&gc, vec![]);
            for _ in 0..len {
                root.append(PyList::new_ref(&gc, vec![root.to_object()]).into());
            }
            b.iter(|| black_box(gc.collect(2)));
            drop(root);
            gc.collect(2).ok();
        });
    }
    group.finish();
}

criterion_group!(benches, bench_collect_garbage, bench_collect_live);
criterion_main!(benches);
