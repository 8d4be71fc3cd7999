//! Broadphase collision detection with bounding-sphere rejection.

use tracing::trace;

use super::contact::Contact;
use super::narrowphase::{CollisionStatus, GjkEpaSolver};
use super::rigid_body::{BodyRef, RigidBody};

/// Default contact tolerance in world units.
pub const DEFAULT_TOLERANCE: f32 = 0.01;

/// Pairwise collision detection over a body set.
///
/// Every pair is tested once (O(n^2)); a bounding-sphere test rejects far
/// pairs before GJK/EPA runs.
#[derive(Debug, Clone)]
pub struct CollisionSystem {
    narrowphase: GjkEpaSolver,
    tolerance: f32,
}

impl Default for CollisionSystem {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl CollisionSystem {
    pub fn new(tolerance: f32) -> Self {
        Self {
            narrowphase: GjkEpaSolver::new(),
            tolerance,
        }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Test every pair in `bodies` and hand confirmed contacts to `on_contact`.
    ///
    /// Pairs are ordered so that `body0` has the lower id. Pairs rejected by
    /// `filter` are never tested. Failed GJK/EPA runs count as no contact.
    pub fn detect<F, L>(&mut self, bodies: &[BodyRef], filter: &mut F, mut on_contact: L)
    where
        F: FnMut(&RigidBody, &RigidBody) -> bool + ?Sized,
        L: FnMut(Contact),
    {
        for (i, first) in bodies.iter().enumerate() {
            for second in &bodies[i + 1..] {
                let (body0, body1) = if first.borrow().id() < second.borrow().id() {
                    (first, second)
                } else if second.borrow().id() < first.borrow().id() {
                    (second, first)
                } else {
                    continue;
                };

                let contact = {
                    let b0 = body0.borrow();
                    let b1 = body1.borrow();
                    if !filter(&b0, &b1) || !b0.hit_test(&b1) {
                        continue;
                    }

                    let result = self
                        .narrowphase
                        .collide(b0.shape(), b1.shape(), self.tolerance);
                    match result.status {
                        CollisionStatus::Penetrating => {}
                        CollisionStatus::Separated => continue,
                        status => {
                            trace!(
                                body0 = b0.id().0,
                                body1 = b1.id().0,
                                ?status,
                                gjk_iterations = result.gjk_iterations,
                                epa_iterations = result.epa_iterations,
                                "Narrowphase gave no usable result"
                            );
                            continue;
                        }
                    }

                    let r0 = result.witnesses[0] - b0.shape().origin;
                    let r1 = result.witnesses[1] - b1.shape().origin;
                    (result.normal, r0, r1, result.depth)
                };

                let (normal, r0, r1, depth) = contact;
                on_contact(Contact::new(
                    body0.clone(),
                    body1.clone(),
                    normal,
                    r0,
                    r1,
                    depth,
                ));
            }
        }
    }
}
