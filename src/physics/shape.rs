//! Convex collision shapes and their support mappings.

use glam::{Mat3, Vec3};

use super::hull::{convex_hull, HullError};
use super::{HUGE, TINY};

/// Geometric primitive of a [`Shape`], expressed in body space.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Sphere { radius: f32 },
    Cuboid { half_extents: Vec3 },
    /// Capsule along the local Y axis.
    Capsule { radius: f32, half_height: f32 },
    /// Hull-reduced vertex cloud.
    ConvexHull { points: Vec<Vec3> },
}

/// A convex shape placed in the world, with surface material.
///
/// The owning rigid body moves the shape every integration step by writing
/// [`Shape::origin`] and [`Shape::basis`]; support queries are answered in
/// world space.
#[derive(Debug, Clone)]
pub struct Shape {
    kind: ShapeKind,
    /// World-space position of the shape's local origin.
    pub origin: Vec3,
    /// World-space rotation of the shape. Must be a pure rotation.
    pub basis: Mat3,
    friction: f32,
    restitution: f32,
}

impl Shape {
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            origin: Vec3::ZERO,
            basis: Mat3::IDENTITY,
            friction: 0.5,
            restitution: 0.2,
        }
    }

    pub fn sphere(radius: f32) -> Self {
        Self::new(ShapeKind::Sphere { radius })
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::new(ShapeKind::Cuboid { half_extents })
    }

    pub fn capsule(radius: f32, half_height: f32) -> Self {
        Self::new(ShapeKind::Capsule {
            radius,
            half_height,
        })
    }

    /// Build a hull shape from a raw point cloud, e.g. the vertices of a render mesh.
    pub fn convex_hull(points: &[Vec3]) -> Result<Self, HullError> {
        Self::convex_hull_scaled(points, 1.0)
    }

    /// Build a hull shape from a point cloud scaled uniformly by `scale`.
    pub fn convex_hull_scaled(points: &[Vec3], scale: f32) -> Result<Self, HullError> {
        let hull = convex_hull(points)?;
        let points = hull.vertices.into_iter().map(|p| p * scale).collect();
        Ok(Self::new(ShapeKind::ConvexHull { points }))
    }

    /// Set the friction coefficient, clamped to `[0, 1]`.
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.set_friction(friction);
        self
    }

    /// Set the restitution coefficient, clamped to `[0, 1]`.
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.set_restitution(restitution);
        self
    }

    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction.clamp(0.0, 1.0);
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution.clamp(0.0, 1.0);
    }

    /// Extreme world-space point of the shape along `direction`.
    #[inline]
    pub fn support(&self, direction: Vec3) -> Vec3 {
        if let ShapeKind::Sphere { radius } = self.kind {
            return self.origin + direction.normalize_or_zero() * radius;
        }
        let local_dir = self.basis.transpose() * direction;
        self.origin + self.basis * self.local_support(local_dir)
    }

    fn local_support(&self, local_dir: Vec3) -> Vec3 {
        match &self.kind {
            ShapeKind::Sphere { radius } => local_dir.normalize_or_zero() * *radius,
            ShapeKind::Cuboid { half_extents } => Vec3::new(
                if local_dir.x >= 0.0 {
                    half_extents.x
                } else {
                    -half_extents.x
                },
                if local_dir.y >= 0.0 {
                    half_extents.y
                } else {
                    -half_extents.y
                },
                if local_dir.z >= 0.0 {
                    half_extents.z
                } else {
                    -half_extents.z
                },
            ),
            ShapeKind::Capsule {
                radius,
                half_height,
            } => {
                let tip = if local_dir.y >= 0.0 {
                    Vec3::new(0.0, *half_height, 0.0)
                } else {
                    Vec3::new(0.0, -*half_height, 0.0)
                };
                tip + local_dir.normalize_or_zero() * *radius
            }
            ShapeKind::ConvexHull { points } => {
                let mut best = Vec3::ZERO;
                let mut best_dot = f32::NEG_INFINITY;
                for p in points {
                    let d = p.dot(local_dir);
                    if d > best_dot {
                        best_dot = d;
                        best = *p;
                    }
                }
                best
            }
        }
    }

    /// Conservative radius around [`Shape::origin`] enclosing the whole shape.
    ///
    /// Never smaller than [`TINY`], so that degenerate shapes still take part
    /// in the broad phase.
    pub fn bounding_sphere(&self) -> f32 {
        let radius = match &self.kind {
            ShapeKind::Sphere { radius } => *radius,
            ShapeKind::Cuboid { half_extents } => half_extents.length(),
            ShapeKind::Capsule {
                radius,
                half_height,
            } => *half_height + *radius,
            ShapeKind::ConvexHull { points } => points
                .iter()
                .map(|p| p.length_squared())
                .fold(0.0f32, f32::max)
                .sqrt(),
        };
        if radius.is_finite() {
            radius.clamp(TINY, HUGE)
        } else {
            HUGE
        }
    }

    /// Body-space inertia tensor for the given mass.
    ///
    /// Cuboids use the exact box tensor; every other kind falls back to a
    /// solid sphere of radius [`Shape::bounding_sphere`].
    pub fn body_inertia(&self, mass: f32) -> Mat3 {
        match &self.kind {
            ShapeKind::Cuboid { half_extents } => {
                let size = (*half_extents * 2.0).max(Vec3::splat(TINY));
                let sq = size * size;
                Mat3::from_diagonal(
                    Vec3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (mass / 12.0),
                )
            }
            _ => {
                let r = self.bounding_sphere();
                Mat3::from_diagonal(Vec3::splat(0.4 * mass * r * r))
            }
        }
    }
}
