//! Scene builders shared by the physics benchmarks.

use arcade_physics::{BodyRef, RigidBody, Shape, Simulation, SimulationConfig};
use glam::Vec3;

/// Deterministic pseudo-random value in `[0, 1)`.
pub fn hash01(i: u32, salt: u32) -> f32 {
    let mut x = i.wrapping_mul(0x9E37_79B9) ^ salt.wrapping_mul(0x85EB_CA6B);
    x ^= x >> 15;
    x = x.wrapping_mul(0x2C1B_3C6D);
    x ^= x >> 12;
    (x & 0x00FF_FFFF) as f32 / 16_777_216.0
}

fn grid_position(i: u32, spacing: f32) -> Vec3 {
    let side = 16;
    let x = (i % side) as f32;
    let y = ((i / side) % side) as f32;
    let z = (i / (side * side)) as f32;
    Vec3::new(x, y, z) * spacing
}

/// `n` unit spheres on a grid tight enough that neighbours overlap.
pub fn setup_sphere_field(n: u32) -> Vec<BodyRef> {
    (0..n)
        .map(|i| {
            RigidBody::new(Shape::sphere(1.0))
                .with_position(grid_position(i, 1.8))
                .into_ref()
        })
        .collect()
}

/// `n` spheres spread far apart: the bounding-sphere test rejects every pair.
pub fn setup_sparse_field(n: u32) -> Vec<BodyRef> {
    (0..n)
        .map(|i| {
            RigidBody::new(Shape::sphere(0.5))
                .with_position(grid_position(i, 10.0))
                .into_ref()
        })
        .collect()
}

/// Rock-like hull built from jittered points on a sphere.
pub fn rock_shape(seed: u32, radius: f32) -> anyhow::Result<Shape> {
    let points: Vec<Vec3> = (0..32)
        .map(|i| {
            let theta = hash01(i, seed) * std::f32::consts::TAU;
            let z = hash01(i, seed + 1) * 2.0 - 1.0;
            let r = (1.0 - z * z).sqrt();
            let scale = 0.8 + 0.2 * hash01(i, seed + 2);
            Vec3::new(r * theta.cos(), r * theta.sin(), z) * scale
        })
        .collect();
    Ok(Shape::convex_hull_scaled(&points, radius)?)
}

/// `n` bodies cycling through spheres, cuboids, capsules and hulls.
pub fn setup_mixed_field(n: u32) -> anyhow::Result<Vec<BodyRef>> {
    (0..n)
        .map(|i| -> anyhow::Result<BodyRef> {
            let shape = match i % 4 {
                0 => Shape::sphere(1.0),
                1 => Shape::cuboid(Vec3::splat(0.8)),
                2 => Shape::capsule(0.5, 0.6),
                _ => rock_shape(i, 1.0)?,
            };
            Ok(RigidBody::new(shape)
                .with_position(grid_position(i, 1.8))
                .into_ref())
        })
        .collect()
}

/// A simulation of `n` bodies drifting toward the center of the grid.
pub fn setup_simulation(n: u32) -> anyhow::Result<(Simulation, Vec<BodyRef>)> {
    let mut sim = Simulation::new(SimulationConfig::default());
    let bodies = setup_mixed_field(n)?;
    let center = grid_position(n / 2, 1.8);
    for (i, body) in bodies.iter().enumerate() {
        {
            let mut b = body.borrow_mut();
            let to_center = (center - b.position()).normalize_or_zero();
            b.set_linear_velocity(to_center * 2.0);
            b.set_angular_velocity(Vec3::new(0.0, 0.0, hash01(i as u32, 7) - 0.5));
        }
        sim.add_body(body);
    }
    Ok((sim, bodies))
}

/// Step `sim` through `frames` fixed frames.
pub fn run_frames(sim: &mut Simulation, frames: u32) {
    for _ in 0..frames {
        sim.integrate(1.0 / 60.0);
    }
}
