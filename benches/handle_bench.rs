use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rbrope::cext::{BridgeContext, Handle};
use rbrope::rope::Rope;
use rbrope::runtime::Value;

fn bench_wrap_new(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle/wrap_new");

    for &size in &[100, 1_000, 10_000] {
        let values: Vec<Value> = (0..size)
            .map(|i| Value::string(Rope::utf8(&i.to_string())))
            .collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &values, |b, values| {
            b.iter(|| {
                let context = BridgeContext::default();
                for value in values {
                    black_box(context.wrap(value));
                }
            });
        });
    }

    group.finish();
}

fn bench_wrap_existing(c: &mut Criterion) {
    let context = BridgeContext::default();
    let value = Value::string(Rope::utf8("hot"));
    context.wrap(&value);
    c.bench_function("handle/wrap_existing", |b| {
        b.iter(|| black_box(context.wrap(&value)));
    });
}

fn bench_unwrap(c: &mut Criterion) {
    let context = BridgeContext::default();
    let values: Vec<Value> = (0..1_000)
        .map(|i| Value::string(Rope::utf8(&i.to_string())))
        .collect();
    let handles: Vec<Handle> = values.iter().map(|v| context.wrap(v)).collect();
    c.bench_function("handle/unwrap", |b| {
        b.iter(|| {
            for handle in &handles {
                black_box(context.unwrap(*handle).unwrap());
            }
        });
    });
    c.bench_function("handle/unwrap_fixnum", |b| {
        let handle = context.wrap(&Value::Integer(42));
        b.iter(|| black_box(context.unwrap(handle).unwrap()));
    });
}

criterion_group!(benches, bench_wrap_new, bench_wrap_existing, bench_unwrap);
criterion_main!(benches);
