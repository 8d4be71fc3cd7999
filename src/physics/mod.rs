//! Rigid body simulation with convex collision detection.
//!
//! # Architecture
//!
//! Each [`Simulation::integrate`] call runs one step:
//!
//! 1. Store state, integrate velocities and positions provisionally
//! 2. Detect contacts at the provisional positions (bounding spheres, GJK/EPA)
//! 3. Restore the stored state
//! 4. Resolve each contact with sequential impulses
//! 5. Integrate velocities
//! 6. Apply user constraints
//! 7. Integrate positions and clear force accumulators
//!
//! [`Simulation::step`] wraps this in a fixed timestep accumulator.

pub mod broadphase;
pub mod constraint;
pub mod contact;
pub mod epa;
pub mod events;
pub mod gjk;
pub mod hull;
pub mod narrowphase;
pub mod rigid_body;
pub mod shape;
pub mod solver;

use std::collections::BTreeMap;
use std::rc::Rc;

use glam::Vec3;
use tracing::{debug, trace, warn};

use self::broadphase::CollisionSystem;
use self::constraint::ConstraintSet;
use self::contact::Contact;
use self::events::{CollisionEvent, CollisionNotifier, COLLISION_EVENT};
use self::rigid_body::{BodyId, BodyRef, RigidBody};
use self::solver::{resolve_contact, ResolveParams};

/// Smallest magnitude treated as non-zero.
pub const TINY: f32 = 1e-5;
/// Upper clamp for distances and radii.
pub const HUGE: f32 = 1e5;

/// Pair predicate deciding whether two bodies may collide.
pub type CollisionFilter = Box<dyn FnMut(&RigidBody, &RigidBody) -> bool>;

/// Configuration for the simulation.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Gravity acceleration. Default: zero (free space).
    pub gravity: Vec3,
    /// Fixed timestep used by [`Simulation::step`] in seconds. Default: 1/60.
    pub fixed_timestep: f64,
    /// Maximum number of sub-steps per frame. Default: 4.
    pub max_substeps: u32,
    /// Contact tolerance passed to GJK/EPA as margin. Default: 0.01.
    pub collision_tolerance: f32,
    /// Penetration left uncorrected. Default: 0.01.
    pub allowed_penetration: f32,
    /// Cap on the separation velocity used to push bodies apart. Default: 0.5.
    pub max_bias_velocity: f32,
    /// Velocity changes below this are skipped. Default: 1e-4.
    pub min_velocity_for_processing: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::ZERO,
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 4,
            collision_tolerance: broadphase::DEFAULT_TOLERANCE,
            allowed_penetration: 0.01,
            max_bias_velocity: 0.5,
            min_velocity_for_processing: 1e-4,
        }
    }
}

impl SimulationConfig {
    fn resolve_params(&self) -> ResolveParams {
        ResolveParams {
            allowed_penetration: self.allowed_penetration,
            max_bias_velocity: self.max_bias_velocity,
            min_velocity_for_processing: self.min_velocity_for_processing,
        }
    }
}

/// The body set, constraint set and step pipeline.
///
/// Bodies are shared handles: the simulation never drops a body on its own,
/// and a body must be removed before its owner discards it.
pub struct Simulation {
    config: SimulationConfig,
    accumulator: f64,
    bodies: BTreeMap<BodyId, BodyRef>,
    /// User constraints, applied once per step after contact resolution.
    pub constraints: ConstraintSet,
    collision_system: CollisionSystem,
    contacts: Vec<Contact>,
    filter: CollisionFilter,
    notifier: Option<Box<dyn CollisionNotifier>>,
    step_bodies: Vec<BodyRef>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        debug!(?config, "Creating simulation");
        Self {
            collision_system: CollisionSystem::new(config.collision_tolerance),
            config,
            accumulator: 0.0,
            bodies: BTreeMap::new(),
            constraints: ConstraintSet::new(),
            contacts: Vec::new(),
            filter: Box::new(|_, _| true),
            notifier: None,
            step_bodies: Vec::new(),
        }
    }

    /// Install the pair filter. Pairs it rejects never collide.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: FnMut(&RigidBody, &RigidBody) -> bool + 'static,
    {
        self.filter = Box::new(filter);
        self
    }

    /// Install the receiver of [`COLLISION_EVENT`] notifications.
    pub fn with_notifier(mut self, notifier: impl CollisionNotifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Register a body. Registering the same body twice is a no-op.
    pub fn add_body(&mut self, body: &BodyRef) -> BodyId {
        let id = body.borrow().id();
        if self.bodies.insert(id, Rc::clone(body)).is_none() {
            debug!(body = id.0, "Added body");
        }
        id
    }

    /// Unregister a body. Returns whether it was registered.
    pub fn remove_body(&mut self, body: &BodyRef) -> bool {
        let id = body.borrow().id();
        self.remove_body_by_id(id).is_some()
    }

    pub fn remove_body_by_id(&mut self, id: BodyId) -> Option<BodyRef> {
        let removed = self.bodies.remove(&id);
        if removed.is_some() {
            debug!(body = id.0, "Removed body");
        }
        removed
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.bodies.contains_key(&id)
    }

    pub fn body(&self, id: BodyId) -> Option<&BodyRef> {
        self.bodies.get(&id)
    }

    /// Registered bodies in id order.
    pub fn bodies(&self) -> impl Iterator<Item = &BodyRef> {
        self.bodies.values()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Contacts detected during the last step.
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Advance the simulation by `delta_time` seconds of frame time.
    ///
    /// Runs whole fixed steps only; the remainder carries over to the next
    /// call. Returns the number of steps taken.
    pub fn step(&mut self, delta_time: f64) -> u32 {
        self.accumulator += delta_time;

        let mut substeps = 0u32;
        while self.accumulator >= self.config.fixed_timestep && substeps < self.config.max_substeps
        {
            self.integrate(self.config.fixed_timestep as f32);
            self.accumulator -= self.config.fixed_timestep;
            substeps += 1;
        }

        // Drop the backlog instead of spiralling.
        if self.accumulator > self.config.fixed_timestep * self.config.max_substeps as f64 {
            warn!(
                backlog = self.accumulator,
                "Simulation is falling behind, dropping accumulated time"
            );
            self.accumulator = 0.0;
        }

        substeps
    }

    /// Run one simulation step of `dt` seconds.
    pub fn integrate(&mut self, dt: f32) {
        self.step_bodies.clear();
        self.step_bodies.extend(self.bodies.values().cloned());

        let gravity = self.config.gravity;
        for body in &self.step_bodies {
            let mut body = body.borrow_mut();
            if gravity != Vec3::ZERO {
                let weight = gravity * body.mass();
                body.add_force(weight);
            }
            body.store_state();
            body.integrate_velocity(dt);
            body.integrate_position(dt);
        }

        self.contacts.clear();
        let contacts = &mut self.contacts;
        let notifier = &mut self.notifier;
        self.collision_system
            .detect(&self.step_bodies, self.filter.as_mut(), |contact| {
                if let Some(notifier) = notifier.as_mut() {
                    notifier.notify(COLLISION_EVENT, &collision_event(&contact));
                }
                contacts.push(contact);
            });
        trace!(contacts = self.contacts.len(), "Detected contacts");

        for body in &self.step_bodies {
            body.borrow_mut().restore_state();
        }

        let params = self.config.resolve_params();
        for contact in &self.contacts {
            resolve_contact(contact, dt, &params);
        }

        for body in &self.step_bodies {
            body.borrow_mut().integrate_velocity(dt);
        }

        self.constraints.apply(dt);

        for body in &self.step_bodies {
            let mut body = body.borrow_mut();
            body.integrate_position(dt);
            body.clear_forces();
        }
    }
}

fn collision_event(contact: &Contact) -> CollisionEvent {
    let body0 = contact.body0.borrow();
    let body1 = contact.body1.borrow();
    CollisionEvent {
        body0: body0.id(),
        body1: body1.id(),
        user_data0: body0.user_data,
        user_data1: body1.user_data,
        normal: contact.normal,
        penetration: contact.penetration,
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("config", &self.config)
            .field("bodies", &self.bodies.len())
            .field("constraints", &self.constraints)
            .field("contacts", &self.contacts.len())
            .finish_non_exhaustive()
    }
}
