//! Physics benchmarks (criterion - wall-clock time).
//!
//! Run all:    cargo bench --manifest-path benchmarks/Cargo.toml --bench physics
//! Filter:     cargo bench --manifest-path benchmarks/Cargo.toml --bench physics -- gjk_epa

use arcade_physics::physics::broadphase::CollisionSystem;
use arcade_physics::physics::solver::{resolve_contact, ResolveParams};
use arcade_physics::{Contact, GjkEpaSolver, RigidBody, Shape};
use arcade_physics_bench::*;
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use glam::{Mat3, Vec3};

fn placed(mut shape: Shape, origin: Vec3) -> Shape {
    shape.origin = origin;
    shape
}

// ---------------------------------------------------------------------------
// Narrowphase
// ---------------------------------------------------------------------------

fn bench_narrowphase(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("gjk_epa/sphere_sphere");
        let mut solver = GjkEpaSolver::new();
        let a = Shape::sphere(1.0);

        let hit = placed(Shape::sphere(1.0), Vec3::new(1.5, 0.0, 0.0));
        group.bench_function("intersecting", |b| {
            b.iter(|| solver.collide(&a, &hit, 0.01));
        });

        let miss = placed(Shape::sphere(1.0), Vec3::new(5.0, 0.0, 0.0));
        group.bench_function("separated", |b| {
            b.iter(|| solver.collide(&a, &miss, 0.01));
        });
        group.finish();
    }

    {
        let mut group = c.benchmark_group("gjk_epa/cuboid_cuboid");
        let mut solver = GjkEpaSolver::new();
        let a = Shape::cuboid(Vec3::splat(1.0));

        let hit = placed(Shape::cuboid(Vec3::splat(1.0)), Vec3::new(1.5, 0.3, 0.0));
        group.bench_function("intersecting", |b| {
            b.iter(|| solver.collide(&a, &hit, 0.01));
        });

        let mut rotated = placed(Shape::cuboid(Vec3::splat(1.0)), Vec3::new(1.5, 0.3, 0.0));
        rotated.basis = Mat3::from_rotation_y(0.785);
        group.bench_function("rotated", |b| {
            b.iter(|| solver.collide(&a, &rotated, 0.01));
        });
        group.finish();
    }

    {
        let mut group = c.benchmark_group("gjk_epa/hull_hull");
        let mut solver = GjkEpaSolver::new();
        let a = rock_shape(1, 1.0).expect("rock hull");
        let hit = placed(rock_shape(2, 1.0).expect("rock hull"), Vec3::new(1.2, 0.4, 0.1));
        group.bench_function("intersecting", |b| {
            b.iter(|| solver.collide(&a, &hit, 0.01));
        });
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Broadphase
// ---------------------------------------------------------------------------

fn bench_broadphase(c: &mut Criterion) {
    let mut accept = |_: &RigidBody, _: &RigidBody| true;

    {
        let mut group = c.benchmark_group("broadphase/dense_spheres");
        for &n in &[50, 100, 200] {
            let bodies = setup_sphere_field(n);
            let mut system = CollisionSystem::default();
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
                b.iter(|| {
                    let mut count = 0;
                    system.detect(&bodies, &mut accept, |_| count += 1);
                    count
                });
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("broadphase/sparse");
        for &n in &[100, 500, 1000] {
            let bodies = setup_sparse_field(n);
            let mut system = CollisionSystem::default();
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
                b.iter(|| {
                    let mut count = 0;
                    system.detect(&bodies, &mut accept, |_| count += 1);
                    count
                });
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("broadphase/mixed_shapes");
        for &n in &[50, 100, 200] {
            let bodies = setup_mixed_field(n).expect("mixed field");
            let mut system = CollisionSystem::default();
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
                b.iter(|| {
                    let mut count = 0;
                    system.detect(&bodies, &mut accept, |_| count += 1);
                    count
                });
            });
        }
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

fn bench_solver(c: &mut Criterion) {
    let mut group = c.benchmark_group("solver/contact_count");
    for &n in &[10, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || {
                    let bodies = setup_sphere_field(n + 1);
                    let contacts: Vec<Contact> = bodies
                        .windows(2)
                        .map(|pair| {
                            pair[0].borrow_mut().set_linear_velocity(Vec3::X);
                            Contact::new(
                                pair[0].clone(),
                                pair[1].clone(),
                                Vec3::NEG_X,
                                Vec3::X,
                                Vec3::NEG_X,
                                0.1,
                            )
                        })
                        .collect();
                    contacts
                },
                |contacts| {
                    let params = ResolveParams::default();
                    for contact in &contacts {
                        resolve_contact(contact, 1.0 / 60.0, &params);
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/integrate_60_frames");
    group.sample_size(10);
    for &n in &[20, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || setup_simulation(n).expect("simulation scene"),
                |(mut sim, _bodies)| run_frames(&mut sim, 60),
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_narrowphase,
    bench_broadphase,
    bench_solver,
    bench_pipeline,
);
criterion_main!(benches);
