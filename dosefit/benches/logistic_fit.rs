use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dosefit::{DoseResponseFitter, LogisticCurve, Result, SubmaximalPointFinder, geomspace};
use std::time::Duration;

// fit a noiseless sigmoid sampled at `size` concentrations, then locate its bend point
fn fit_and_bend(size: usize) -> Result<()> {
    let truth = LogisticCurve::new(2., 98., 0.05, 1.2);
    let x = geomspace(1e-6, 1e3, size);
    let y = truth.evaluate_all(&x);

    let curve = DoseResponseFitter::new().fit(&x, &y)?;
    SubmaximalPointFinder::new().find(&curve, &x)?;

    Ok(())
}

fn benchmark_logistic_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("Logistic fit and bend point");
    group.sample_size(10).warm_up_time(Duration::from_secs(1));
    for size in (10..51).step_by(10) {
        group.bench_with_input(BenchmarkId::new("Concentrations", size), &size, |b, &s| {
            b.iter(|| fit_and_bend(s));
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_logistic_fit);
criterion_main!(benches);
