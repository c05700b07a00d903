use criterion::{criterion_group, criterion_main};

mod cost_function;
use cost_function::{bench_cost_function, bench_router};

criterion_group!(benches, bench_cost_function, bench_router);
criterion_main!(benches);
