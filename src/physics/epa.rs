//! Expanding polytope penetration solver.
//!
//! Starting from the simplex GJK leaves around the origin, the polytope is
//! grown toward the boundary of the Minkowski difference until the closest
//! face stops moving. Faces live in an index arena; adjacency and the active
//! list are indices into that arena, so nothing is reference counted.

use glam::Vec3;

use super::gjk::{cross_dot, Gjk, MinkowskiPair, Mkv};
use super::{HUGE, TINY};

const EPA_MAX_ITERATIONS: u32 = 256;
const EPA_IN_FACE_EPS: f32 = 0.01;
const EPA_ACCURACY: f32 = 1e-3;
/// Gap to depth ratio under which an exhausted expansion is still usable.
const EPA_RELATIVE_ACCURACY: f32 = 0.05;
const EPA_REFINE_ITERATIONS: u32 = 64;
const EPA_REFINE_MIN_TURN: f32 = 1e-6;

const NONE: usize = usize::MAX;

const MOD3: [usize; 5] = [0, 1, 2, 0, 1];

const TETRAHEDRON_FACES: [[usize; 3]; 4] = [[2, 1, 0], [3, 0, 1], [3, 1, 2], [3, 2, 0]];
const TETRAHEDRON_EDGES: [[usize; 4]; 6] = [
    [0, 0, 2, 1],
    [0, 1, 1, 1],
    [0, 2, 3, 1],
    [1, 0, 3, 2],
    [2, 0, 1, 2],
    [3, 0, 2, 2],
];

const HEXAHEDRON_FACES: [[usize; 3]; 6] = [
    [2, 0, 4],
    [4, 1, 2],
    [1, 4, 0],
    [0, 3, 1],
    [0, 2, 3],
    [1, 3, 2],
];
const HEXAHEDRON_EDGES: [[usize; 4]; 9] = [
    [0, 0, 4, 0],
    [0, 1, 2, 1],
    [0, 2, 1, 2],
    [1, 1, 5, 2],
    [1, 0, 2, 0],
    [2, 2, 3, 2],
    [3, 1, 5, 0],
    [3, 0, 4, 2],
    [5, 1, 4, 1],
];

#[derive(Debug, Clone, Copy)]
struct Face {
    /// Vertex indices into the vertex arena.
    v: [usize; 3],
    /// Neighbour across edge `i`.
    f: [usize; 3],
    /// Edge index of edge `i` as seen from the neighbour.
    e: [usize; 3],
    /// Unit normal pointing toward the origin.
    n: Vec3,
    d: f32,
    mark: u32,
    prev: Option<usize>,
    next: Option<usize>,
    active: bool,
}

/// Result of one EPA evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpaOutcome {
    /// Penetration depth, never negative.
    pub depth: f32,
    /// Contact normal, pointing from the second shape toward the first.
    pub normal: Vec3,
    /// Witness points on the first and second shape.
    pub nearest: [Vec3; 2],
    /// No usable result: rejected input, empty polytope or exhausted iterations.
    pub failed: bool,
    pub iterations: u32,
}

#[derive(Default)]
struct Horizon {
    current: Option<usize>,
    first: Option<usize>,
}

/// Reusable EPA state. Arenas keep their capacity between calls.
#[derive(Debug, Clone, Default)]
pub struct Epa {
    vertices: Vec<Mkv>,
    faces: Vec<Face>,
    root: Option<usize>,
    active_faces: usize,
}

impl Epa {
    pub fn new() -> Self {
        Self {
            vertices: Vec::with_capacity(EPA_MAX_ITERATIONS as usize + 5),
            faces: Vec::with_capacity(EPA_MAX_ITERATIONS as usize * 4),
            root: None,
            active_faces: 0,
        }
    }

    /// Expand the enclosing simplex left in `gjk` and return the penetration.
    ///
    /// Only tetrahedra (order 3) and five-vertex double pyramids (order 4)
    /// are accepted; anything else is rejected with zero depth.
    pub fn evaluate(&mut self, gjk: &Gjk, pair: &MinkowskiPair) -> EpaOutcome {
        self.vertices.clear();
        self.faces.clear();
        self.root = None;
        self.active_faces = 0;

        let (face_table, edge_table): (&[[usize; 3]], &[[usize; 4]]) = match gjk.order() {
            3 => (&TETRAHEDRON_FACES, &TETRAHEDRON_EDGES),
            4 => (&HEXAHEDRON_FACES, &HEXAHEDRON_EDGES),
            _ => {
                return EpaOutcome {
                    failed: true,
                    ..EpaOutcome::default()
                }
            }
        };

        self.vertices.extend_from_slice(gjk.simplex());
        for &[a, b, c] in face_table {
            self.new_face(a, b, c);
        }
        for &[f0, e0, f1, e1] in edge_table {
            self.link(f0, e0, f1, e1);
        }

        let mut outcome = EpaOutcome::default();
        if self.active_faces == 0 {
            outcome.failed = true;
            return outcome;
        }

        let mut mark = 1u32;
        let mut best = None;
        let mut gap = f32::INFINITY;
        let mut stopped = false;
        while outcome.iterations < EPA_MAX_ITERATIONS {
            outcome.iterations += 1;

            let Some(bf) = self.find_best() else {
                stopped = true;
                break;
            };
            let face = self.faces[bf];
            let w = pair.support(-face.n);
            self.vertices.push(w);
            let wi = self.vertices.len() - 1;
            best = Some(bf);

            gap = -(face.n.dot(w.w) + face.d);
            if gap <= EPA_ACCURACY {
                stopped = true;
                break;
            }

            self.detach(bf);
            mark += 1;
            self.faces[bf].mark = mark;

            let mut horizon = Horizon::default();
            let mut edges = 0;
            for i in 0..3 {
                edges += self.build_horizon(mark, wi, face.f[i], face.e[i], &mut horizon);
            }
            if edges < 3 {
                // Best effort: keep the current closest face.
                stopped = true;
                break;
            }
            if let (Some(current), Some(first)) = (horizon.current, horizon.first) {
                self.link(current, 1, first, 2);
            }
        }

        let Some(bf) = best else {
            outcome.failed = true;
            return outcome;
        };
        let face = self.faces[bf];
        // Deep overlaps of curved shapes refine the whole polytope evenly and
        // can run out of iterations with an accurate closest face.
        outcome.failed = !stopped && gap > EPA_RELATIVE_ACCURACY * face.d;
        if outcome.failed {
            return outcome;
        }

        if let Some((outward, support, depth)) = refine_direction(pair, -face.n) {
            outcome.normal = -outward;
            outcome.depth = depth.max(0.0);
            let (on_a, on_b) = pair.witnesses(&support);
            outcome.nearest = [on_a, on_b];
            return outcome;
        }

        outcome.normal = face.n;
        outcome.depth = face.d.max(0.0);

        let offset = face.n * face.d;
        let v = face.v.map(|i| self.vertices[i]);
        let w0 = v[0].w + offset;
        let w1 = v[1].w + offset;
        let w2 = v[2].w + offset;
        let x = w0.cross(w1).length();
        let y = w1.cross(w2).length();
        let z = w2.cross(w0).length();
        let dn = 1.0 / (x + y + z).max(TINY);
        let weights = [y * dn, z * dn, x * dn];

        let mut nearest = [Vec3::ZERO; 2];
        for (vertex, weight) in v.iter().zip(weights) {
            let (on_a, on_b) = pair.witnesses(vertex);
            nearest[0] += on_a * weight;
            nearest[1] += on_b * weight;
        }
        outcome.nearest = nearest;
        outcome
    }

    fn new_face(&mut self, a: usize, b: usize, c: usize) -> usize {
        let wa = self.vertices[a].w;
        let wb = self.vertices[b].w;
        let wc = self.vertices[c].w;
        let nrm = (wb - wa).cross(wc - wa);
        let n = nrm.normalize_or_zero();
        let valid = n != Vec3::ZERO
            && cross_dot(wa, wb, nrm) >= -EPA_IN_FACE_EPS
            && cross_dot(wb, wc, nrm) >= -EPA_IN_FACE_EPS
            && cross_dot(wc, wa, nrm) >= -EPA_IN_FACE_EPS;

        let index = self.faces.len();
        self.faces.push(Face {
            v: [a, b, c],
            f: [NONE; 3],
            e: [0; 3],
            n,
            d: (-n.dot(wa)).clamp(TINY, HUGE),
            mark: 0,
            prev: None,
            next: None,
            active: false,
        });
        if valid {
            self.attach(index);
        }
        index
    }

    fn attach(&mut self, index: usize) {
        if let Some(root) = self.root {
            self.faces[root].prev = Some(index);
        }
        let face = &mut self.faces[index];
        face.prev = None;
        face.next = self.root;
        face.active = true;
        self.root = Some(index);
        self.active_faces += 1;
    }

    fn detach(&mut self, index: usize) {
        let face = self.faces[index];
        if !face.active {
            return;
        }
        match face.prev {
            Some(prev) => self.faces[prev].next = face.next,
            None => self.root = face.next,
        }
        if let Some(next) = face.next {
            self.faces[next].prev = face.prev;
        }
        let face = &mut self.faces[index];
        face.prev = None;
        face.next = None;
        face.active = false;
        self.active_faces -= 1;
    }

    fn link(&mut self, f0: usize, e0: usize, f1: usize, e1: usize) {
        self.faces[f0].f[e0] = f1;
        self.faces[f0].e[e0] = e1;
        self.faces[f1].f[e1] = f0;
        self.faces[f1].e[e1] = e0;
    }

    fn find_best(&self) -> Option<usize> {
        let mut best = None;
        let mut best_d = f32::INFINITY;
        let mut cursor = self.root;
        while let Some(i) = cursor {
            let face = &self.faces[i];
            if face.d < best_d {
                best_d = face.d;
                best = Some(i);
            }
            cursor = face.next;
        }
        best
    }

    /// Walk from face `f` across edge `e`, detaching faces visible from
    /// vertex `w` and fanning new faces to `w` along the horizon.
    fn build_horizon(
        &mut self,
        mark: u32,
        w: usize,
        f: usize,
        e: usize,
        horizon: &mut Horizon,
    ) -> u32 {
        if f == NONE || self.faces[f].mark == mark {
            return 0;
        }

        let face = self.faces[f];
        let e1 = MOD3[e + 1];
        if face.n.dot(self.vertices[w].w) + face.d > 0.0 {
            let nf = self.new_face(face.v[e1], face.v[e], w);
            self.link(nf, 0, f, e);
            match horizon.current {
                Some(current) => self.link(current, 1, nf, 2),
                None => horizon.first = Some(nf),
            }
            horizon.current = Some(nf);
            1
        } else {
            let e2 = MOD3[e + 2];
            self.detach(f);
            self.faces[f].mark = mark;
            self.build_horizon(mark, w, face.f[e1], face.e[e1], horizon)
                + self.build_horizon(mark, w, face.f[e2], face.e[e2], horizon)
        }
    }
}

/// Minimise the support distance `h(d) = support(d) . d` starting from the
/// outward direction `start`. The minimum over all directions is the exact
/// penetration depth; polytope faces only approximate it on curved boundaries.
///
/// Returns the improved direction, its support vertex and distance, or `None`
/// when no step lowered the distance.
fn refine_direction(pair: &MinkowskiPair, start: Vec3) -> Option<(Vec3, Mkv, f32)> {
    let mut dir = start;
    let mut support = pair.support(dir);
    let mut h = support.w.dot(dir);
    let mut step = 1.0 / h.max(TINY);
    let mut improved = false;

    for _ in 0..EPA_REFINE_ITERATIONS {
        // Tangential offset of the support point: the descent direction of h.
        let tangent = support.w - dir * h;
        let turn = step * tangent.length();
        if turn < EPA_REFINE_MIN_TURN {
            break;
        }
        let candidate = (dir - tangent * step).normalize_or_zero();
        if candidate == Vec3::ZERO {
            break;
        }
        let next = pair.support(candidate);
        let next_h = next.w.dot(candidate);
        if next_h < h {
            dir = candidate;
            support = next;
            h = next_h;
            step *= 2.0;
            improved = true;
        } else {
            step *= 0.5;
        }
    }

    improved.then_some((dir, support, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::gjk::GjkStatus;
    use crate::physics::shape::Shape;

    fn penetration(a: &Shape, b: &Shape) -> EpaOutcome {
        let pair = MinkowskiPair::new(a, b, 0.0);
        let mut gjk = Gjk::new();
        assert_eq!(gjk.search_origin(&pair), GjkStatus::Enclosed);
        if gjk.order() < 3 {
            assert!(gjk.enclose_origin(&pair));
        }
        Epa::new().evaluate(&gjk, &pair)
    }

    #[test]
    fn test_sphere_penetration_depth() {
        let a = Shape::sphere(1.0);
        let mut b = Shape::sphere(1.0);
        b.origin = Vec3::new(1.5, 0.0, 0.0);

        let outcome = penetration(&a, &b);
        assert!(!outcome.failed);
        assert!(
            (outcome.depth - 0.5).abs() <= 1e-3 + 1e-4,
            "depth was {}",
            outcome.depth
        );
        assert!(
            outcome.normal.x < -0.99999,
            "normal should point from b to a along the center axis, was {}",
            outcome.normal
        );
    }

    #[test]
    fn test_sphere_witness_points() {
        let a = Shape::sphere(1.0);
        let mut b = Shape::sphere(1.0);
        b.origin = Vec3::new(1.5, 0.0, 0.0);

        let outcome = penetration(&a, &b);
        assert!((outcome.nearest[0] - Vec3::new(1.0, 0.0, 0.0)).length() < 0.1);
        assert!((outcome.nearest[1] - Vec3::new(0.5, 0.0, 0.0)).length() < 0.1);
    }

    #[test]
    fn test_off_axis_sphere_normal() {
        let a = Shape::sphere(1.0);
        let mut b = Shape::sphere(1.0);
        let axis = Vec3::new(1.0, 1.0, 0.5).normalize();
        b.origin = axis * 1.2;

        let outcome = penetration(&a, &b);
        assert!(!outcome.failed);
        assert!((outcome.depth - 0.8).abs() < 2e-3, "depth was {}", outcome.depth);
        assert!(outcome.normal.dot(-axis) > 0.99999);
    }

    #[test]
    fn test_cuboid_face_contact() {
        let a = Shape::cuboid(Vec3::splat(1.0));
        let mut b = Shape::cuboid(Vec3::splat(1.0));
        b.origin = Vec3::new(0.1, 1.8, -0.2);

        let outcome = penetration(&a, &b);
        assert!(!outcome.failed);
        assert!((outcome.depth - 0.2).abs() < 2e-3, "depth was {}", outcome.depth);
        assert!(outcome.normal.y < -0.99);
    }

    #[test]
    fn test_nearly_coincident_spheres() {
        let a = Shape::sphere(1.0);
        let mut b = Shape::sphere(1.0);
        b.origin = Vec3::new(0.05, 0.0, 0.0);

        let outcome = penetration(&a, &b);
        assert!(!outcome.failed, "deep overlap gave up after {} iterations", outcome.iterations);
        assert!((outcome.depth - 1.95).abs() < 2e-3, "depth was {}", outcome.depth);
        assert!(outcome.normal.x < -0.999, "normal was {}", outcome.normal);
    }

    #[test]
    fn test_refine_keeps_flat_face_normal() {
        let a = Shape::cuboid(Vec3::splat(1.0));
        let mut b = Shape::cuboid(Vec3::splat(1.0));
        b.origin = Vec3::new(0.0, 1.5, 0.0);
        let pair = MinkowskiPair::new(&a, &b, 0.0);

        // The face normal already minimises the support distance.
        assert!(refine_direction(&pair, Vec3::Y).is_none());
    }

    #[test]
    fn test_refine_tilted_sphere_direction() {
        let a = Shape::sphere(1.0);
        let mut b = Shape::sphere(1.0);
        b.origin = Vec3::new(1.5, 0.0, 0.0);
        let pair = MinkowskiPair::new(&a, &b, 0.0);

        let tilted = Vec3::new(1.0, 0.03, 0.02).normalize();
        let (outward, _, depth) = refine_direction(&pair, tilted).unwrap();
        assert!(outward.x > 0.99999, "direction was {outward}");
        assert!((depth - 0.5).abs() < 1e-4, "depth was {depth}");
    }

    #[test]
    fn test_rejects_low_order_simplex() {
        let a = Shape::sphere(1.0);
        let b = Shape::sphere(1.0);
        let pair = MinkowskiPair::new(&a, &b, 0.0);
        let gjk = Gjk::new();

        let outcome = Epa::new().evaluate(&gjk, &pair);
        assert!(outcome.failed);
        assert_eq!(outcome.depth, 0.0);
    }
}
