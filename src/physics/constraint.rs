//! User constraints applied after contact resolution.

use std::collections::BTreeMap;

use glam::Vec3;

use super::rigid_body::{BodyId, BodyRef};

/// A correction applied to one or more bodies once per step, after contacts
/// are resolved and velocities are final.
pub trait Constraint {
    fn apply(&mut self, dt: f32);

    /// Whether the constraint acts on the body `id`.
    fn involves(&self, _id: BodyId) -> bool {
        false
    }
}

/// Handle returned by [`ConstraintSet::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintId(u32);

/// Constraints keyed by insertion handle, applied in insertion order.
#[derive(Default)]
pub struct ConstraintSet {
    constraints: BTreeMap<ConstraintId, Box<dyn Constraint>>,
    next_id: u32,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, constraint: impl Constraint + 'static) -> ConstraintId {
        let id = ConstraintId(self.next_id);
        self.next_id += 1;
        self.constraints.insert(id, Box::new(constraint));
        id
    }

    pub fn remove(&mut self, id: ConstraintId) -> Option<Box<dyn Constraint>> {
        self.constraints.remove(&id)
    }

    /// Drop every constraint acting on `body`. Returns how many were removed.
    pub fn remove_for_body(&mut self, body: BodyId) -> usize {
        let before = self.constraints.len();
        self.constraints.retain(|_, c| !c.involves(body));
        before - self.constraints.len()
    }

    pub fn contains(&self, id: ConstraintId) -> bool {
        self.constraints.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn clear(&mut self) {
        self.constraints.clear();
    }

    pub fn apply(&mut self, dt: f32) {
        for constraint in self.constraints.values_mut() {
            constraint.apply(dt);
        }
    }
}

impl std::fmt::Debug for ConstraintSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintSet")
            .field("len", &self.constraints.len())
            .finish()
    }
}

/// Keeps a body on the `z = 0` plane.
pub struct LockZAxis {
    body: BodyRef,
}

impl LockZAxis {
    pub fn new(body: BodyRef) -> Self {
        Self { body }
    }
}

impl Constraint for LockZAxis {
    fn apply(&mut self, _dt: f32) {
        const MASK: Vec3 = Vec3::new(1.0, 1.0, 0.0);
        let mut body = self.body.borrow_mut();
        let velocity = body.linear_velocity() * MASK;
        let position = body.position() * MASK;
        body.set_linear_velocity(velocity);
        body.set_position(position);
    }

    fn involves(&self, id: BodyId) -> bool {
        self.body.borrow().id() == id
    }
}

/// Restricts a body's spin to the world Z axis.
pub struct LockRotationToZ {
    body: BodyRef,
}

impl LockRotationToZ {
    pub fn new(body: BodyRef) -> Self {
        Self { body }
    }
}

impl Constraint for LockRotationToZ {
    fn apply(&mut self, _dt: f32) {
        let mut body = self.body.borrow_mut();
        let spin = body.angular_velocity();
        body.set_angular_velocity(Vec3::new(0.0, 0.0, spin.z));
    }

    fn involves(&self, id: BodyId) -> bool {
        self.body.borrow().id() == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::rigid_body::RigidBody;
    use crate::physics::shape::Shape;

    fn body() -> BodyRef {
        RigidBody::new(Shape::sphere(1.0))
            .with_position(Vec3::new(1.0, 2.0, 3.0))
            .with_linear_velocity(Vec3::new(4.0, 5.0, 6.0))
            .with_angular_velocity(Vec3::new(1.0, 1.0, 1.0))
            .into_ref()
    }

    #[test]
    fn test_lock_z_axis() {
        let body = body();
        let mut lock = LockZAxis::new(body.clone());
        lock.apply(0.016);

        let b = body.borrow();
        assert_eq!(b.position(), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(b.linear_velocity(), Vec3::new(4.0, 5.0, 0.0));
        assert_eq!(b.shape().origin, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_lock_rotation_to_z() {
        let body = body();
        LockRotationToZ::new(body.clone()).apply(0.016);
        assert_eq!(body.borrow().angular_velocity(), Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_constraint_set_insert_remove() {
        let a = body();
        let b = body();
        let mut set = ConstraintSet::new();
        let first = set.insert(LockZAxis::new(a.clone()));
        let second = set.insert(LockZAxis::new(b.clone()));
        set.insert(LockRotationToZ::new(a.clone()));
        assert_eq!(set.len(), 3);
        assert_ne!(first, second);

        assert!(set.remove(first).is_some());
        assert!(set.remove(first).is_none());
        assert!(!set.contains(first));
        assert!(set.contains(second));

        let a_id = a.borrow().id();
        assert_eq!(set.remove_for_body(a_id), 1);
        assert_eq!(set.len(), 1);

        set.apply(0.016);
        assert_eq!(b.borrow().position().z, 0.0);
        assert_eq!(a.borrow().position().z, 3.0);

        set.clear();
        assert!(set.is_empty());
    }
}
