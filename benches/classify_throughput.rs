//! Classification and aggregation throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use boundary_probe::outcome::{Attempt, FaultKind, ProbeFault, ProbeValue, RawResult};
use boundary_probe::{aggregate, classify, Category, OutcomeKind};

fn sample_results() -> Vec<(Category, RawResult)> {
    vec![
        (
            Category::Memory,
            RawResult::Value(ProbeValue::Exhaustion {
                unit: "bytes".into(),
                acquired: 32 << 20,
                target: 64 << 20,
                stopped_by: Some(FaultKind::ResourceExhausted),
                basis: None,
            }),
        ),
        (
            Category::Network,
            RawResult::Error(ProbeFault::new(FaultKind::ConnectionRefused, "refused").with_code(111)),
        ),
        (Category::ResourceLimit, RawResult::TimedOut { budget_ms: 1000 }),
        (Category::ProcessControl, RawResult::Signaled { signal: 15 }),
        (
            Category::PrivilegedSyscall,
            RawResult::Value(ProbeValue::Attempts {
                attempts: (0..11)
                    .map(|i| Attempt::blocked(format!("variant-{i}"), "EPERM"))
                    .collect(),
            }),
        ),
    ]
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    for (category, raw) in sample_results() {
        group.bench_with_input(
            BenchmarkId::new("category", category.as_str()),
            &raw,
            |b, raw| b.iter(|| classify(black_box(category), black_box(raw), Duration::from_millis(3))),
        );
    }
    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let pattern = [
        OutcomeKind::Blocked,
        OutcomeKind::Inconclusive,
        OutcomeKind::Blocked,
        OutcomeKind::Crashed,
    ];
    for size in [8usize, 256, 4096] {
        let kinds: Vec<OutcomeKind> = pattern.iter().copied().cycle().take(size).collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("outcomes", size), &kinds, |b, kinds| {
            b.iter(|| aggregate(black_box(kinds).iter().copied()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classify, bench_aggregate);
criterion_main!(benches);
