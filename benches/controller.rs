//! Criterion benchmarks for the navinet controller.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use navinet::controller::{Controller, ControllerConfig, Percept, Switches};

fn make_controller(num_neurons: usize, seed: u64) -> Controller {
    let switches = Switches {
        gvlearn_on: true,
        gvnavi_on: true,
        lvlearn_on: true,
        beta_on: true,
        ..Default::default()
    };
    let cfg = ControllerConfig::with_size(num_neurons)
        .with_seed(seed)
        .with_switches(switches)
        .with_colors(2)
        .with_landmarks(4);
    match Controller::new(cfg) {
        Ok(c) => c,
        Err(e) => panic!("bench config rejected: {e}"),
    }
}

/// Benchmark update() with varying ring widths.
fn bench_update_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_size");

    for size in [8, 18, 36, 72, 144].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("full", size), size, |b, &size| {
            let mut ctrl = make_controller(size, 42);
            let signals = [0.2, 0.0, 0.7, 0.0];
            let mut heading = 0.0;

            b.iter(|| {
                heading += 0.01;
                let p = Percept::new(heading, 1.0).with_landmarks(&signals);
                black_box(ctrl.update(&p).ok())
            });
        });
    }

    group.finish();
}

/// Benchmark path integration alone.
fn bench_pin_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("pin_only");
    let size = 36;
    group.throughput(Throughput::Elements(size as u64));

    group.bench_function("pin_36", |b| {
        let mut ctrl = match Controller::new(ControllerConfig::with_size(size)) {
            Ok(c) => c,
            Err(e) => panic!("bench config rejected: {e}"),
        };
        let mut heading = 0.0;

        b.iter(|| {
            heading += 0.01;
            black_box(ctrl.update(&Percept::new(heading, 1.0)).ok())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_update_sizes, bench_pin_only);
criterion_main!(benches);
