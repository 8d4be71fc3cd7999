//! Sequential impulse contact resolution.

use glam::{Mat3, Vec3};

use super::contact::Contact;
use super::TINY;

/// Resolution thresholds, taken from
/// [`SimulationConfig`](super::SimulationConfig).
#[derive(Debug, Clone, Copy)]
pub struct ResolveParams {
    /// Penetration tolerated before positional correction kicks in.
    pub allowed_penetration: f32,
    /// Upper bound on the separation velocity used for correction.
    pub max_bias_velocity: f32,
    /// Velocity changes below this are ignored.
    pub min_velocity_for_processing: f32,
}

impl Default for ResolveParams {
    fn default() -> Self {
        Self {
            allowed_penetration: 0.01,
            max_bias_velocity: 0.5,
            min_velocity_for_processing: 1e-4,
        }
    }
}

/// Impulse magnitudes applied for one contact.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContactImpulse {
    pub normal: f32,
    pub tangent: f32,
}

#[inline]
fn effective_inverse_mass(inverse_mass: f32, inverse_inertia: Mat3, r: Vec3, axis: Vec3) -> f32 {
    inverse_mass + axis.dot((inverse_inertia * r.cross(axis)).cross(r))
}

/// Resolve one contact with a normal impulse and a Coulomb-bounded friction impulse.
///
/// Both bodies are updated in place. The returned impulses are zero when the
/// contact is already separating fast enough.
pub fn resolve_contact(contact: &Contact, dt: f32, params: &ResolveParams) -> ContactImpulse {
    let mut impulse = ContactImpulse::default();
    let mut body0 = contact.body0.borrow_mut();
    let mut body1 = contact.body1.borrow_mut();

    let n = contact.normal;
    let r0 = contact.r0;
    let r1 = contact.r1;

    let allowed = params.allowed_penetration;
    let excess = contact.penetration - allowed;
    let min_separation = if contact.penetration > allowed {
        excess / dt
    } else {
        let softness = (-0.1 * excess / (TINY + allowed)).clamp(TINY, 1.0);
        softness * excess / dt.max(TINY)
    };
    let min_separation = min_separation.min(params.max_bias_velocity);

    let denominator = (effective_inverse_mass(
        body0.inverse_mass(),
        body0.inverse_world_inertia(),
        r0,
        n,
    ) + effective_inverse_mass(body1.inverse_mass(), body1.inverse_world_inertia(), r1, n))
    .max(TINY);

    let normal_velocity = n.dot(body0.velocity_at(r0) - body1.velocity_at(r1));
    if normal_velocity > min_separation {
        return impulse;
    }

    let mut final_velocity = -contact.restitution * normal_velocity;
    if final_velocity < params.min_velocity_for_processing {
        final_velocity = min_separation;
    }

    let delta_velocity = final_velocity - normal_velocity;
    if delta_velocity <= params.min_velocity_for_processing {
        return impulse;
    }

    let normal_impulse = delta_velocity / denominator;
    body0.apply_impulse(n * normal_impulse, r0);
    body1.apply_impulse(-n * normal_impulse, r1);
    impulse.normal = normal_impulse;

    let relative = body0.velocity_at(r0) - body1.velocity_at(r1);
    let tangent = n * relative.dot(n) - relative;
    let tangent_speed = tangent.length();
    if tangent_speed < params.min_velocity_for_processing {
        return impulse;
    }
    let t = tangent / tangent_speed;

    let denominator = effective_inverse_mass(body0.inverse_mass(), body0.inverse_world_inertia(), r0, t)
        + effective_inverse_mass(body1.inverse_mass(), body1.inverse_world_inertia(), r1, t);
    if denominator < TINY {
        return impulse;
    }

    let tangent_impulse = (tangent_speed / denominator).min(contact.friction * normal_impulse);
    body0.apply_impulse(t * tangent_impulse, r0);
    body1.apply_impulse(-t * tangent_impulse, r1);
    impulse.tangent = tangent_impulse;

    impulse
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::rigid_body::{BodyRef, RigidBody};
    use crate::physics::shape::Shape;

    fn ball(position: Vec3, velocity: Vec3, friction: f32, restitution: f32) -> BodyRef {
        let shape = Shape::sphere(1.0)
            .with_friction(friction)
            .with_restitution(restitution);
        RigidBody::new(shape)
            .with_position(position)
            .with_linear_velocity(velocity)
            .into_ref()
    }

    #[test]
    fn test_head_on_elastic_swap() {
        let a = ball(Vec3::new(-0.9, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0), 0.0, 1.0);
        let b = ball(Vec3::new(0.9, 0.0, 0.0), Vec3::new(-5.0, 0.0, 0.0), 0.0, 1.0);
        let contact = Contact::new(
            a.clone(),
            b.clone(),
            Vec3::NEG_X,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            0.2,
        );

        let impulse = resolve_contact(&contact, 0.016, &ResolveParams::default());
        let eps = 1e-4;
        assert!((impulse.normal - 10.0).abs() < eps);
        assert!((a.borrow().linear_velocity() - Vec3::new(-5.0, 0.0, 0.0)).length() < eps);
        assert!((b.borrow().linear_velocity() - Vec3::new(5.0, 0.0, 0.0)).length() < eps);
    }

    #[test]
    fn test_separating_contact_is_ignored() {
        let a = ball(Vec3::new(-0.9, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0), 0.5, 0.5);
        let b = ball(Vec3::new(0.9, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), 0.5, 0.5);
        let contact = Contact::new(
            a.clone(),
            b.clone(),
            Vec3::NEG_X,
            Vec3::X,
            Vec3::NEG_X,
            0.005,
        );

        let impulse = resolve_contact(&contact, 0.016, &ResolveParams::default());
        assert_eq!(impulse, ContactImpulse::default());
        assert_eq!(a.borrow().linear_velocity(), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_resting_contact_pushes_apart() {
        let a = ball(Vec3::new(0.0, 0.9, 0.0), Vec3::ZERO, 0.5, 0.0);
        let b = ball(Vec3::new(0.0, -0.9, 0.0), Vec3::ZERO, 0.5, 0.0);
        let contact = Contact::new(a.clone(), b.clone(), Vec3::Y, Vec3::NEG_Y, Vec3::Y, 0.2);

        let impulse = resolve_contact(&contact, 0.016, &ResolveParams::default());
        assert!(impulse.normal > 0.0);
        let relative = a.borrow().linear_velocity() - b.borrow().linear_velocity();
        // Deep overlap asks for the capped bias velocity.
        assert!((relative.y - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_friction_bound() {
        for step in 0..=10 {
            let friction = step as f32 / 10.0;
            let a = ball(
                Vec3::new(0.0, 0.9, 0.0),
                Vec3::new(3.0, -2.0, 1.0),
                friction,
                0.3,
            );
            let b = ball(Vec3::new(0.0, -0.9, 0.0), Vec3::new(-1.0, 1.0, 0.5), friction, 0.3);
            let contact = Contact::new(a, b, Vec3::Y, Vec3::new(0.1, -1.0, 0.0), Vec3::Y, 0.05);

            let impulse = resolve_contact(&contact, 0.016, &ResolveParams::default());
            assert!(impulse.normal > 0.0);
            assert!(
                impulse.tangent <= friction * impulse.normal + 1e-5,
                "friction {friction}: tangent {} exceeds bound {}",
                impulse.tangent,
                friction * impulse.normal
            );
        }
    }

    #[test]
    fn test_frictionless_contact_keeps_tangent_velocity() {
        let a = ball(Vec3::new(0.0, 0.9, 0.0), Vec3::new(2.0, -1.0, 0.0), 0.0, 0.0);
        let b = ball(Vec3::new(0.0, -0.9, 0.0), Vec3::ZERO, 0.0, 0.0);
        let contact = Contact::new(a.clone(), b, Vec3::Y, Vec3::NEG_Y, Vec3::Y, 0.05);

        let impulse = resolve_contact(&contact, 0.016, &ResolveParams::default());
        assert_eq!(impulse.tangent, 0.0);
        assert!((a.borrow().linear_velocity().x - 2.0).abs() < 1e-5);
    }
}
