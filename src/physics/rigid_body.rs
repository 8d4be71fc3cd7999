//! Rigid body state and semi-implicit Euler integration.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use glam::{Mat3, Quat, Vec3};

use super::shape::Shape;
use super::TINY;

static NEXT_BODY_ID: AtomicU32 = AtomicU32::new(1);

/// Stable body identity, unique per process. Pair ordering uses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId(pub u32);

/// Shared handle to a body. Gameplay code owns it; the simulation keeps a clone.
pub type BodyRef = Rc<RefCell<RigidBody>>;

/// Kinematic state saved and restored around collision detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsState {
    pub position: Vec3,
    pub orientation: Mat3,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Default for PhysicsState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Mat3::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

#[derive(Debug)]
pub struct RigidBody {
    id: BodyId,
    mass: f32,
    inverse_mass: f32,
    body_inertia: Mat3,
    inverse_body_inertia: Mat3,
    world_inertia: Mat3,
    inverse_world_inertia: Mat3,
    state: PhysicsState,
    stored: PhysicsState,
    force: Vec3,
    torque: Vec3,
    shape: Shape,
    /// Opaque gameplay tag carried into collision events.
    pub user_data: u64,
    /// Linear velocity damping per second. Default: 0.
    pub linear_damping: f32,
    /// Angular velocity damping per second. Default: 0.
    pub angular_damping: f32,
}

fn next_body_id() -> BodyId {
    BodyId(NEXT_BODY_ID.fetch_add(1, Ordering::Relaxed))
}

/// A clone is a new body with the same state and shape, so it gets its own id.
impl Clone for RigidBody {
    fn clone(&self) -> Self {
        Self {
            id: next_body_id(),
            shape: self.shape.clone(),
            ..*self
        }
    }
}

impl RigidBody {
    /// Create a body of mass 1 at the shape's current origin and basis.
    pub fn new(shape: Shape) -> Self {
        let state = PhysicsState {
            position: shape.origin,
            orientation: shape.basis,
            ..PhysicsState::default()
        };
        let mut body = Self {
            id: next_body_id(),
            mass: 1.0,
            inverse_mass: 1.0,
            body_inertia: Mat3::IDENTITY,
            inverse_body_inertia: Mat3::IDENTITY,
            world_inertia: Mat3::IDENTITY,
            inverse_world_inertia: Mat3::IDENTITY,
            state,
            stored: state,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            shape,
            user_data: 0,
            linear_damping: 0.0,
            angular_damping: 0.0,
        };
        body.set_mass(1.0);
        body
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.set_mass(mass);
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.set_position(position);
        self
    }

    pub fn with_linear_velocity(mut self, velocity: Vec3) -> Self {
        self.state.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, velocity: Vec3) -> Self {
        self.state.angular_velocity = velocity;
        self
    }

    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }

    /// Wrap the body into a shared [`BodyRef`].
    pub fn into_ref(self) -> BodyRef {
        Rc::new(RefCell::new(self))
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    /// Set the mass (clamped to at least [`TINY`]) and rebuild the inertia tensor.
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass.max(TINY);
        self.inverse_mass = 1.0 / self.mass;
        self.body_inertia = self.shape.body_inertia(self.mass);
        let det = self.body_inertia.determinant();
        self.inverse_body_inertia = if det != 0.0 && det.is_finite() {
            self.body_inertia.inverse()
        } else {
            Mat3::ZERO
        };
        self.update_inertia();
    }

    pub fn position(&self) -> Vec3 {
        self.state.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.state.position = position;
        self.shape.origin = position;
    }

    pub fn orientation(&self) -> Mat3 {
        self.state.orientation
    }

    pub fn set_orientation(&mut self, orientation: Mat3) {
        self.state.orientation = orientation;
        self.shape.basis = orientation;
        self.update_inertia();
    }

    pub fn linear_velocity(&self) -> Vec3 {
        self.state.linear_velocity
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.state.linear_velocity = velocity;
    }

    pub fn angular_velocity(&self) -> Vec3 {
        self.state.angular_velocity
    }

    pub fn set_angular_velocity(&mut self, velocity: Vec3) {
        self.state.angular_velocity = velocity;
    }

    pub fn state(&self) -> &PhysicsState {
        &self.state
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Mutable access for material changes. Transform fields are overwritten
    /// on the next position update.
    pub fn shape_mut(&mut self) -> &mut Shape {
        &mut self.shape
    }

    pub fn force(&self) -> Vec3 {
        self.force
    }

    pub fn torque(&self) -> Vec3 {
        self.torque
    }

    pub fn world_inertia(&self) -> Mat3 {
        self.world_inertia
    }

    pub fn inverse_world_inertia(&self) -> Mat3 {
        self.inverse_world_inertia
    }

    pub fn add_force(&mut self, force: Vec3) {
        self.force += force;
    }

    pub fn add_torque(&mut self, torque: Vec3) {
        self.torque += torque;
    }

    /// Add a world-space force applied at `offset` from the center of mass.
    pub fn add_force_at(&mut self, force: Vec3, offset: Vec3) {
        self.force += force;
        self.torque += offset.cross(force);
    }

    pub fn clear_forces(&mut self) {
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }

    /// Apply a world-space impulse at `offset` from the center of mass.
    pub fn apply_impulse(&mut self, impulse: Vec3, offset: Vec3) {
        self.state.linear_velocity += impulse * self.inverse_mass;
        self.state.angular_velocity += self.inverse_world_inertia * offset.cross(impulse);
    }

    /// Velocity of the material point at `offset` from the center of mass.
    pub fn velocity_at(&self, offset: Vec3) -> Vec3 {
        self.state.linear_velocity + self.state.angular_velocity.cross(offset)
    }

    pub fn angular_momentum(&self) -> Vec3 {
        self.world_inertia * self.state.angular_velocity
    }

    pub fn kinetic_energy(&self) -> f32 {
        let v = self.state.linear_velocity;
        let w = self.state.angular_velocity;
        0.5 * (self.mass * v.length_squared() + w.dot(self.world_inertia * w))
    }

    /// Bounding-sphere overlap test against another body.
    pub fn hit_test(&self, other: &RigidBody) -> bool {
        let reach = self.shape.bounding_sphere() + other.shape.bounding_sphere();
        (self.state.position - other.state.position).length_squared() <= reach * reach
    }

    pub fn store_state(&mut self) {
        self.stored = self.state;
    }

    pub fn restore_state(&mut self) {
        self.state = self.stored;
        self.update_inertia();
    }

    /// Advance velocities by the accumulated force and torque.
    pub fn integrate_velocity(&mut self, dt: f32) {
        self.state.linear_velocity += self.force * (self.inverse_mass * dt);
        self.state.angular_velocity += self.inverse_world_inertia * self.torque * dt;

        if self.linear_damping > 0.0 {
            self.state.linear_velocity *= (1.0 - self.linear_damping * dt).clamp(0.0, 1.0);
        }
        if self.angular_damping > 0.0 {
            self.state.angular_velocity *= (1.0 - self.angular_damping * dt).clamp(0.0, 1.0);
        }
    }

    /// Advance position and orientation, keeping angular momentum fixed
    /// across the change of world inertia.
    pub fn integrate_position(&mut self, dt: f32) {
        let momentum = self.world_inertia * self.state.angular_velocity;

        self.state.position += self.state.linear_velocity * dt;

        let angular_speed = self.state.angular_velocity.length();
        let angle = angular_speed * dt;
        if angle > TINY {
            let axis = self.state.angular_velocity / angular_speed;
            let rotated = Mat3::from_axis_angle(axis, angle) * self.state.orientation;
            self.state.orientation = Mat3::from_quat(Quat::from_mat3(&rotated).normalize());
        }

        self.update_inertia();
        self.state.angular_velocity = self.inverse_world_inertia * momentum;

        self.shape.origin = self.state.position;
        self.shape.basis = self.state.orientation;
    }

    fn update_inertia(&mut self) {
        let rotation = self.state.orientation;
        let inverse_rotation = rotation.transpose();
        self.world_inertia = rotation * self.body_inertia * inverse_rotation;
        self.inverse_world_inertia = rotation * self.inverse_body_inertia * inverse_rotation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let a = RigidBody::new(Shape::sphere(1.0));
        let b = RigidBody::new(Shape::sphere(1.0));
        assert!(a.id() < b.id());
    }

    #[test]
    fn test_clone_gets_fresh_id() {
        let original = RigidBody::new(Shape::sphere(1.0))
            .with_mass(3.0)
            .with_position(Vec3::new(1.0, 2.0, 3.0))
            .with_user_data(7);
        let copy = original.clone();

        assert!(original.id() < copy.id());
        assert_eq!(copy.mass(), 3.0);
        assert_eq!(copy.position(), original.position());
        assert_eq!(copy.user_data, 7);
    }

    #[test]
    fn test_mass_is_clamped() {
        let body = RigidBody::new(Shape::sphere(1.0)).with_mass(-2.0);
        assert_eq!(body.mass(), TINY);
        assert!(body.inverse_mass().is_finite());
    }

    #[test]
    fn test_force_integration() {
        let mut body = RigidBody::new(Shape::sphere(1.0)).with_mass(2.0);
        body.add_force(Vec3::new(4.0, 0.0, 0.0));
        body.integrate_velocity(0.5);
        body.integrate_position(0.5);

        let eps = 1e-5;
        assert!((body.linear_velocity() - Vec3::new(1.0, 0.0, 0.0)).length() < eps);
        assert!((body.position() - Vec3::new(0.5, 0.0, 0.0)).length() < eps);
        assert!(
            (body.shape().origin - body.position()).length() < eps,
            "shape should follow the body"
        );
    }

    #[test]
    fn test_clear_forces() {
        let mut body = RigidBody::new(Shape::sphere(1.0));
        body.add_force(Vec3::new(10.0, 20.0, 30.0));
        body.add_torque(Vec3::new(1.0, 2.0, 3.0));
        body.clear_forces();
        assert_eq!(body.force(), Vec3::ZERO);
        assert_eq!(body.torque(), Vec3::ZERO);
    }

    #[test]
    fn test_force_at_offset_produces_torque() {
        let mut body = RigidBody::new(Shape::sphere(1.0));
        body.add_force_at(Vec3::Y, Vec3::X);
        assert_eq!(body.force(), Vec3::Y);
        assert_eq!(body.torque(), Vec3::Z);
    }

    #[test]
    fn test_impulse_at_center() {
        let mut body = RigidBody::new(Shape::sphere(1.0)).with_mass(4.0);
        body.apply_impulse(Vec3::new(0.0, 8.0, 0.0), Vec3::ZERO);
        let eps = 1e-5;
        assert!((body.linear_velocity() - Vec3::new(0.0, 2.0, 0.0)).length() < eps);
        assert!(body.angular_velocity().length() < eps);
    }

    #[test]
    fn test_off_center_impulse_spins() {
        let mut body = RigidBody::new(Shape::sphere(1.0));
        body.apply_impulse(Vec3::Y, Vec3::X);
        assert!(body.angular_velocity().z > 0.0);
        let v = body.velocity_at(Vec3::X);
        assert!(v.y > body.linear_velocity().y);
    }

    #[test]
    fn test_store_restore_round_trip() {
        let mut body = RigidBody::new(Shape::cuboid(Vec3::new(1.0, 0.5, 0.25)))
            .with_linear_velocity(Vec3::new(1.0, 2.0, 3.0))
            .with_angular_velocity(Vec3::new(0.5, -1.0, 2.0));
        body.store_state();
        let before = *body.state();
        let inertia_before = body.world_inertia();

        for _ in 0..10 {
            body.integrate_velocity(0.1);
            body.integrate_position(0.1);
        }
        assert_ne!(*body.state(), before);

        body.restore_state();
        assert_eq!(*body.state(), before);
        assert!(body.world_inertia().abs_diff_eq(inertia_before, 1e-5));
    }

    #[test]
    fn test_free_rotation_conserves_angular_momentum() {
        let mut body = RigidBody::new(Shape::cuboid(Vec3::new(2.0, 1.0, 0.5)))
            .with_mass(3.0)
            .with_angular_velocity(Vec3::new(0.3, 1.5, -0.7));
        let initial = body.angular_momentum().length();

        for _ in 0..600 {
            body.integrate_velocity(1.0 / 60.0);
            body.integrate_position(1.0 / 60.0);
            body.clear_forces();
        }

        let after = body.angular_momentum().length();
        assert!(
            (after - initial).abs() / initial < 1e-3,
            "angular momentum drifted from {initial} to {after}"
        );
    }

    #[test]
    fn test_orientation_stays_orthonormal() {
        let mut body = RigidBody::new(Shape::cuboid(Vec3::ONE))
            .with_angular_velocity(Vec3::new(4.0, -2.0, 7.0));
        for _ in 0..1000 {
            body.integrate_position(1.0 / 60.0);
        }
        let r = body.orientation();
        let should_be_identity = r * r.transpose();
        assert!(should_be_identity.abs_diff_eq(Mat3::IDENTITY, 1e-4));
        assert!((r.determinant() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_hit_test_uses_bounding_spheres() {
        let a = RigidBody::new(Shape::sphere(1.0));
        let b = RigidBody::new(Shape::sphere(0.5)).with_position(Vec3::new(1.4, 0.0, 0.0));
        let c = RigidBody::new(Shape::sphere(0.5)).with_position(Vec3::new(1.6, 0.0, 0.0));
        assert!(a.hit_test(&b));
        assert!(!a.hit_test(&c));
    }

    #[test]
    fn test_damping() {
        let mut body = RigidBody::new(Shape::sphere(1.0))
            .with_linear_velocity(Vec3::new(10.0, 0.0, 0.0));
        body.linear_damping = 0.5;
        body.integrate_velocity(0.1);
        let eps = 1e-4;
        assert!((body.linear_velocity().x - 9.5).abs() < eps);
    }
}
