//! Arcade Physics
//!
//! Rigid body physics core for arcade games: convex collision detection with
//! GJK/EPA and sequential impulse contact resolution.
//!
//! # Architecture
//!
//! The library is organized bottom-up:
//!
//! 1. **shape** - Convex shapes with support mappings, hull construction
//! 2. **gjk / epa** - Overlap search and penetration depth on the Minkowski difference
//! 3. **narrowphase / broadphase** - Pairwise contact detection
//! 4. **rigid_body / solver** - Integration and impulse resolution
//! 5. **Simulation** - Step pipeline, constraints and collision events

pub mod physics;

pub use physics::broadphase::CollisionSystem;
pub use physics::constraint::{Constraint, ConstraintId, ConstraintSet, LockRotationToZ, LockZAxis};
pub use physics::contact::Contact;
pub use physics::events::{CollisionEvent, CollisionNotifier, COLLISION_EVENT};
pub use physics::hull::{convex_hull, ConvexHull, HullError};
pub use physics::narrowphase::{CollisionStatus, GjkEpaSolver, NarrowPhaseResult};
pub use physics::rigid_body::{BodyId, BodyRef, PhysicsState, RigidBody};
pub use physics::shape::{Shape, ShapeKind};
pub use physics::solver::ContactImpulse;
pub use physics::{CollisionFilter, Simulation, SimulationConfig};

// Re-export glam for convenience
pub use glam;
