//! Collision hull prefabs built from mesh point clouds.

use arcade_physics::{convex_hull, HullError, Shape};
use glam::Vec3;
use rand::Rng;

/// Hull vertices of a model, reused for every instance at any scale.
#[derive(Debug, Clone)]
pub struct Prefab {
    name: &'static str,
    hull_points: Vec<Vec3>,
}

impl Prefab {
    /// Reduce a model's vertex cloud to its convex hull.
    pub fn from_points(name: &'static str, points: &[Vec3]) -> Result<Self, HullError> {
        let hull = convex_hull(points)?;
        log::debug!(
            "prefab {name}: {} points reduced to {} hull vertices",
            points.len(),
            hull.vertices.len()
        );
        Ok(Self {
            name,
            hull_points: hull.vertices,
        })
    }

    /// Lumpy rock: points on a unit sphere pushed in and out at random.
    pub fn rock(name: &'static str, rng: &mut impl Rng) -> Result<Self, HullError> {
        let points: Vec<Vec3> = (0..96)
            .map(|_| {
                let theta = rng.gen_range(0.0..std::f32::consts::TAU);
                let z: f32 = rng.gen_range(-1.0..1.0);
                let r = (1.0 - z * z).sqrt();
                Vec3::new(r * theta.cos(), r * theta.sin(), z) * rng.gen_range(0.75..1.0)
            })
            .collect();
        Self::from_points(name, &points)
    }

    /// Flat arrowhead pointing along +Y.
    pub fn fighter() -> Result<Self, HullError> {
        let points = [
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(-1.2, -1.0, 0.3),
            Vec3::new(1.2, -1.0, 0.3),
            Vec3::new(-1.2, -1.0, -0.3),
            Vec3::new(1.2, -1.0, -0.3),
            Vec3::new(0.0, -0.6, 0.0),
            Vec3::new(0.0, 0.5, 0.4),
        ];
        Self::from_points("fighter", &points)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    #[cfg(test)]
    pub fn hull_points(&self) -> &[Vec3] {
        &self.hull_points
    }

    pub fn generate_hull(&self, scale: f32) -> Shape {
        Shape::new(arcade_physics::ShapeKind::ConvexHull {
            points: self.hull_points.iter().map(|p| *p * scale).collect(),
        })
    }
}
