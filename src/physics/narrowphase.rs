//! Narrowphase collision detection: GJK overlap followed by EPA penetration.

use glam::Vec3;

use super::epa::Epa;
use super::gjk::{Gjk, GjkStatus, MinkowskiPair};
use super::shape::Shape;

/// Outcome category of a narrowphase query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionStatus {
    #[default]
    Separated,
    Penetrating,
    /// GJK hit its iteration bound. Not a proof of separation.
    GjkFailed,
    /// EPA produced no usable penetration.
    EpaFailed,
}

/// Result of [`GjkEpaSolver::collide`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NarrowPhaseResult {
    pub status: CollisionStatus,
    /// Contact normal from the second shape toward the first.
    pub normal: Vec3,
    /// Witness points on the first and second shape, in world space.
    pub witnesses: [Vec3; 2],
    /// Penetration depth, including the query margin.
    pub depth: f32,
    pub gjk_iterations: u32,
    pub epa_iterations: u32,
}

impl NarrowPhaseResult {
    pub fn has_collided(&self) -> bool {
        self.status == CollisionStatus::Penetrating
    }
}

/// Convex-convex collision query with reusable GJK and EPA buffers.
#[derive(Debug, Clone, Default)]
pub struct GjkEpaSolver {
    gjk: Gjk,
    epa: Epa,
}

impl GjkEpaSolver {
    pub fn new() -> Self {
        Self {
            gjk: Gjk::new(),
            epa: Epa::new(),
        }
    }

    /// Test `a` against `b`, both inflated by `margin`.
    pub fn collide(&mut self, a: &Shape, b: &Shape, margin: f32) -> NarrowPhaseResult {
        let pair = MinkowskiPair::new(a, b, margin);
        let mut result = NarrowPhaseResult::default();

        let status = self.gjk.search_origin(&pair);
        result.gjk_iterations = self.gjk.iterations();
        match status {
            GjkStatus::Separated => return result,
            GjkStatus::Failed => {
                result.status = CollisionStatus::GjkFailed;
                return result;
            }
            GjkStatus::Enclosed => {}
        }

        if self.gjk.order() < 3 {
            self.gjk.enclose_origin(&pair);
        }

        let outcome = self.epa.evaluate(&self.gjk, &pair);
        result.epa_iterations = outcome.iterations;
        if outcome.depth > 0.0 && !outcome.failed {
            result.status = CollisionStatus::Penetrating;
            result.normal = outcome.normal;
            result.witnesses = outcome.nearest;
            result.depth = outcome.depth;
        } else if outcome.failed {
            result.status = CollisionStatus::EpaFailed;
        }
        result
    }
}
