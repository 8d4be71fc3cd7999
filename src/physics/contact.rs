//! Contact data structures for collision response.

use glam::Vec3;

use super::rigid_body::BodyRef;

/// A confirmed contact between two bodies, valid for one step.
#[derive(Debug, Clone)]
pub struct Contact {
    pub body0: BodyRef,
    pub body1: BodyRef,
    /// Contact normal, pointing from `body1` toward `body0`.
    pub normal: Vec3,
    /// Contact point relative to the center of `body0`.
    pub r0: Vec3,
    /// Contact point relative to the center of `body1`.
    pub r1: Vec3,
    /// Penetration depth.
    pub penetration: f32,
    /// Mean friction of the two shapes.
    pub friction: f32,
    /// Mean restitution of the two shapes.
    pub restitution: f32,
}

impl Contact {
    pub fn new(
        body0: BodyRef,
        body1: BodyRef,
        normal: Vec3,
        r0: Vec3,
        r1: Vec3,
        penetration: f32,
    ) -> Self {
        let (friction, restitution) = {
            let b0 = body0.borrow();
            let b1 = body1.borrow();
            (
                (b0.shape().friction() + b1.shape().friction()) * 0.5,
                (b0.shape().restitution() + b1.shape().restitution()) * 0.5,
            )
        };
        Self {
            body0,
            body1,
            normal,
            r0,
            r1,
            penetration,
            friction,
            restitution,
        }
    }
}
