//! Benchmarks for pair finding and full simulation steps.
//!
//! Run with: cargo bench -p impulse-core

#![allow(missing_docs, clippy::cast_precision_loss)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::{Point3, Vector3};
use rand::Rng;

use impulse_core::broad_phase::{BroadPhase, BruteForce, SweepAndPrune};
use impulse_core::{
    BodyDesc, BroadPhaseAlgorithm, Bounds, Shape, SimulationConfig, Stepper, StepperConfig, World,
};

/// Scatter `count` spheres in a cube whose volume grows with the count,
/// keeping density roughly constant.
fn random_world(count: usize) -> World {
    let mut rng = rand::thread_rng();
    let extent = (count as f64).cbrt() * 2.0;

    let mut world = World::new(SimulationConfig::default());
    let small = world.add_shape(Shape::sphere(0.25)).unwrap();
    let large = world.add_shape(Shape::sphere(0.5)).unwrap();

    for i in 0..count {
        let position = Point3::new(
            rng.gen_range(-extent..extent),
            rng.gen_range(-extent..extent),
            rng.gen_range(-extent..extent),
        );
        let velocity = Vector3::new(
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-5.0..5.0),
        );
        let shape = if i % 3 == 0 { large } else { small };
        world
            .add_body(BodyDesc::new(shape, position).with_linear_velocity(velocity))
            .unwrap();
    }

    world
}

fn random_bounds(count: usize) -> Vec<Bounds> {
    let mut rng = rand::thread_rng();
    let extent = (count as f64).cbrt() * 2.0;
    (0..count)
        .map(|_| {
            let center = Point3::new(
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
            );
            Bounds::from_center(center, Vector3::new(0.5, 0.5, 0.5))
        })
        .collect()
}

/// Brute force against sweep-and-prune over the same boxes.
fn bench_broad_phase(c: &mut Criterion) {
    let mut group = c.benchmark_group("broad_phase");

    for count in [16, 64, 256, 1024] {
        let bounds = random_bounds(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("brute_force", count), &bounds, |b, bounds| {
            let mut brute = BruteForce::new();
            let mut pairs = Vec::new();
            b.iter(|| {
                brute.find_pairs(black_box(bounds), &mut pairs);
                black_box(pairs.len())
            });
        });

        group.bench_with_input(
            BenchmarkId::new("sweep_and_prune", count),
            &bounds,
            |b, bounds| {
                let mut sap = SweepAndPrune::new();
                let mut pairs = Vec::new();
                b.iter(|| {
                    sap.find_pairs(black_box(bounds), &mut pairs);
                    black_box(pairs.len())
                });
            },
        );
    }

    group.finish();
}

/// One full tick: gravity, detection, ordered resolution, integration.
fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");

    for count in [16, 64, 256] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_function(BenchmarkId::new("spheres", count), |b| {
            let mut world = random_world(count);
            let mut stepper = Stepper::new();
            b.iter(|| black_box(stepper.step(&mut world)));
        });
    }

    group.finish();
}

fn bench_step_without_contacts(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_integration_only");

    for count in [64, 1024] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_function(BenchmarkId::new("spheres", count), |b| {
            let mut world = random_world(count);
            let mut stepper = Stepper::with_config(
                StepperConfig::no_contacts().with_broad_phase(BroadPhaseAlgorithm::SweepAndPrune),
            );
            b.iter(|| black_box(stepper.step(&mut world)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_broad_phase,
    bench_step,
    bench_step_without_contacts,
);
criterion_main!(benches);
