//! GJK overlap search on the Minkowski difference of two convex shapes.

use glam::{Quat, Vec3};

use super::shape::Shape;
use super::TINY;

const GJK_MAX_ITERATIONS: u32 = 128;
const GJK_HASH_SIZE: usize = 64;
const GJK_HASH_MASK: usize = GJK_HASH_SIZE - 1;
const GJK_IN_SIMPLEX_EPS: f32 = 1e-4;
const GJK_SQ_IN_SIMPLEX_EPS: f32 = GJK_IN_SIMPLEX_EPS * GJK_IN_SIMPLEX_EPS;

/// A vertex of the Minkowski difference: the point `w` and the direction `r`
/// whose support produced it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Mkv {
    pub w: Vec3,
    pub r: Vec3,
}

/// Two shapes queried as one Minkowski difference `a - b`, inflated by `margin`.
#[derive(Debug, Clone, Copy)]
pub struct MinkowskiPair<'a> {
    pub a: &'a Shape,
    pub b: &'a Shape,
    pub margin: f32,
}

impl<'a> MinkowskiPair<'a> {
    pub fn new(a: &'a Shape, b: &'a Shape, margin: f32) -> Self {
        Self {
            a,
            b,
            margin: margin.max(TINY),
        }
    }

    /// Support vertex of the inflated difference along `d` (expected unit length).
    #[inline]
    pub fn support(&self, d: Vec3) -> Mkv {
        Mkv {
            w: d * self.margin + (self.a.support(d) - self.b.support(-d)),
            r: d,
        }
    }

    /// Witness points on each original shape for a difference vertex.
    #[inline]
    pub fn witnesses(&self, v: &Mkv) -> (Vec3, Vec3) {
        (self.a.support(v.r), self.b.support(-v.r))
    }
}

/// Outcome of [`Gjk::search_origin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GjkStatus {
    /// The origin lies outside the difference: the shapes do not overlap.
    Separated,
    /// The simplex encloses (or touches) the origin.
    Enclosed,
    /// The iteration bound was hit without a verdict.
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct HashEntry {
    dir: Vec3,
    next: Option<usize>,
}

/// Reusable GJK state. Buffers are kept between calls and reset on entry.
#[derive(Debug, Clone)]
pub struct Gjk {
    table: [Option<usize>; GJK_HASH_SIZE],
    entries: Vec<HashEntry>,
    simplex: [Mkv; 5],
    count: usize,
    ray: Vec3,
    iterations: u32,
}

impl Default for Gjk {
    fn default() -> Self {
        Self::new()
    }
}

impl Gjk {
    pub fn new() -> Self {
        Self {
            table: [None; GJK_HASH_SIZE],
            entries: Vec::with_capacity(GJK_MAX_ITERATIONS as usize + 1),
            simplex: [Mkv::default(); 5],
            count: 0,
            ray: Vec3::X,
            iterations: 0,
        }
    }

    /// Number of simplex vertices minus one.
    pub fn order(&self) -> usize {
        self.count.saturating_sub(1)
    }

    /// Current simplex vertices.
    pub fn simplex(&self) -> &[Mkv] {
        &self.simplex[..self.count]
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Run GJK until the origin is enclosed, proven outside, or the iteration
    /// bound is reached.
    pub fn search_origin(&mut self, pair: &MinkowskiPair) -> GjkStatus {
        self.table = [None; GJK_HASH_SIZE];
        self.entries.clear();
        self.count = 0;
        self.iterations = 0;

        self.ray = Vec3::X;
        self.fetch_support(pair);
        self.ray = -self.simplex[0].w;

        while self.iterations < GJK_MAX_ITERATIONS {
            self.iterations += 1;

            let len = self.ray.length();
            if len <= 0.0 {
                // The last support point sits on the origin.
                return GjkStatus::Enclosed;
            }
            self.ray /= len;

            match self.fetch_support(pair) {
                Some(true) => {}
                // Not past the origin along the search direction.
                Some(false) => return GjkStatus::Separated,
                // Direction cycle: no further progress is possible.
                None => return GjkStatus::Separated,
            }

            let s = self.simplex;
            let enclosed = match self.count {
                2 => self.solve_simplex2(-s[1].w, s[0].w - s[1].w),
                3 => self.solve_simplex3(-s[2].w, s[1].w - s[2].w, s[0].w - s[2].w),
                4 => self.solve_simplex4(
                    -s[3].w,
                    s[2].w - s[3].w,
                    s[1].w - s[3].w,
                    s[0].w - s[3].w,
                ),
                _ => false,
            };
            if enclosed {
                return GjkStatus::Enclosed;
            }
        }

        GjkStatus::Failed
    }

    /// Pad a segment or triangle simplex into the five-vertex double pyramid
    /// EPA expects as its hexahedral starting polytope.
    ///
    /// Vertices 0..3 form the equator and 3, 4 the apexes, with vertex 3 on
    /// the side of `cross(v1 - v0, v2 - v0)`. Returns `false` when the simplex
    /// is already a tetrahedron or too small to pad.
    pub fn enclose_origin(&mut self, pair: &MinkowskiPair) -> bool {
        match self.count {
            2 => {
                let ab = self.simplex[1].w - self.simplex[0].w;
                let axis = ab.normalize_or_zero();
                if axis == Vec3::ZERO {
                    return false;
                }
                let candidates = [ab.cross(Vec3::X), ab.cross(Vec3::Y), ab.cross(Vec3::Z)];
                let mut n = candidates[0];
                for c in &candidates[1..] {
                    if c.length_squared() > n.length_squared() {
                        n = *c;
                    }
                }
                let mut n = n.normalize();
                let rotation = Quat::from_axis_angle(axis, std::f32::consts::TAU / 3.0);

                let ends = [self.simplex[0], self.simplex[1]];
                for i in 0..3 {
                    self.simplex[i] = pair.support(n);
                    n = rotation * n;
                }

                let equator = (self.simplex[1].w - self.simplex[0].w)
                    .cross(self.simplex[2].w - self.simplex[0].w);
                let (upper, lower) = if (ends[0].w - self.simplex[0].w).dot(equator)
                    >= (ends[1].w - self.simplex[0].w).dot(equator)
                {
                    (ends[0], ends[1])
                } else {
                    (ends[1], ends[0])
                };
                self.simplex[3] = upper;
                self.simplex[4] = lower;
                self.count = 5;
                true
            }
            3 => {
                let n = (self.simplex[1].w - self.simplex[0].w)
                    .cross(self.simplex[2].w - self.simplex[0].w)
                    .normalize_or_zero();
                if n == Vec3::ZERO {
                    return false;
                }
                self.simplex[3] = pair.support(n);
                self.simplex[4] = pair.support(-n);
                self.count = 5;
                true
            }
            _ => false,
        }
    }

    /// Fetch the support point along the current ray.
    ///
    /// Returns `None` when the ray was already requested during this search,
    /// otherwise whether the new point advances past the origin.
    fn fetch_support(&mut self, pair: &MinkowskiPair) -> Option<bool> {
        let h = hash(self.ray);
        let mut cursor = self.table[h];
        while let Some(i) = cursor {
            let entry = &self.entries[i];
            if entry.dir == self.ray {
                return None;
            }
            cursor = entry.next;
        }
        self.entries.push(HashEntry {
            dir: self.ray,
            next: self.table[h],
        });
        self.table[h] = Some(self.entries.len() - 1);

        let v = pair.support(self.ray);
        self.simplex[self.count] = v;
        self.count += 1;
        Some(self.ray.dot(v.w) > 0.0)
    }

    fn solve_simplex2(&mut self, ao: Vec3, ab: Vec3) -> bool {
        if ab.dot(ao) >= 0.0 {
            let cabo = ab.cross(ao);
            if cabo.length_squared() > GJK_SQ_IN_SIMPLEX_EPS {
                self.ray = cabo.cross(ab);
                false
            } else {
                // Origin on the segment.
                true
            }
        } else {
            self.count = 1;
            self.simplex[0] = self.simplex[1];
            self.ray = ao;
            false
        }
    }

    fn solve_simplex3(&mut self, ao: Vec3, ab: Vec3, ac: Vec3) -> bool {
        self.solve_simplex3a(ao, ab, ac, ab.cross(ac))
    }

    fn solve_simplex3a(&mut self, ao: Vec3, ab: Vec3, ac: Vec3, cabc: Vec3) -> bool {
        if cross_dot(cabc, ab, ao) < -GJK_IN_SIMPLEX_EPS {
            self.count = 2;
            self.simplex[0] = self.simplex[1];
            self.simplex[1] = self.simplex[2];
            return self.solve_simplex2(ao, ab);
        }

        if cross_dot(cabc, ac, ao) > GJK_IN_SIMPLEX_EPS {
            self.count = 2;
            self.simplex[1] = self.simplex[2];
            return self.solve_simplex2(ao, ac);
        }

        let d = cabc.dot(ao);
        if d.abs() > GJK_IN_SIMPLEX_EPS {
            if d > 0.0 {
                self.ray = cabc;
            } else {
                // Keep the winding so the next vertex lands on the positive side.
                self.ray = -cabc;
                self.simplex.swap(0, 1);
            }
            return false;
        }

        // Origin on the triangle.
        true
    }

    fn solve_simplex4(&mut self, ao: Vec3, ab: Vec3, ac: Vec3, ad: Vec3) -> bool {
        let abc = ab.cross(ac);
        if abc.dot(ao) > GJK_IN_SIMPLEX_EPS {
            self.count = 3;
            self.simplex[0] = self.simplex[1];
            self.simplex[1] = self.simplex[2];
            self.simplex[2] = self.simplex[3];
            return self.solve_simplex3a(ao, ab, ac, abc);
        }

        let acd = ac.cross(ad);
        if acd.dot(ao) > GJK_IN_SIMPLEX_EPS {
            self.count = 3;
            self.simplex[2] = self.simplex[3];
            return self.solve_simplex3a(ao, ac, ad, acd);
        }

        let adb = ad.cross(ab);
        if adb.dot(ao) > GJK_IN_SIMPLEX_EPS {
            self.count = 3;
            self.simplex[1] = self.simplex[0];
            self.simplex[0] = self.simplex[2];
            self.simplex[2] = self.simplex[3];
            return self.solve_simplex3a(ao, ad, ab, adb);
        }

        true
    }
}

/// Triple product `(a × b) · c`.
#[inline]
pub(crate) fn cross_dot(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    a.cross(b).dot(c)
}

#[inline]
fn hash(v: Vec3) -> usize {
    let hx = (v.x * 15461.0) as i32;
    let hy = (v.y * 83003.0) as i32;
    let hz = (v.z * 15473.0) as i32;
    ((hx ^ hy ^ hz).wrapping_mul(169639) as usize) & GJK_HASH_MASK
}
