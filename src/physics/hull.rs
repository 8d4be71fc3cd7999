//! Incremental 3D convex hull construction.
//!
//! Reduces a raw point cloud (typically the vertex buffer of a render mesh) to
//! the vertices of its convex hull, which is all a support mapping needs.

use std::collections::BTreeSet;

use glam::Vec3;

/// Errors raised while building a convex hull.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HullError {
    /// Fewer than four points were given.
    #[error("at least 4 points are required to build a 3D hull, got {0}")]
    IncompleteInput(usize),
    /// A point has a NaN or infinite coordinate.
    #[error("point {0} has a non-finite coordinate")]
    InvalidPoint(usize),
    /// All points are collinear or coplanar.
    #[error("input points are collinear or coplanar")]
    Degenerate,
}

/// A convex hull: its vertices and outward-wound triangles indexing into them.
#[derive(Debug, Clone, Default)]
pub struct ConvexHull {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}

#[derive(Debug, Clone, Copy)]
struct HullFace {
    pts: [usize; 3],
    normal: Vec3,
    offset: f32,
}

impl HullFace {
    fn new(points: &[Vec3], a: usize, b: usize, c: usize) -> Self {
        let normal = (points[b] - points[a])
            .cross(points[c] - points[a])
            .normalize_or_zero();
        Self {
            pts: [a, b, c],
            normal,
            offset: normal.dot(points[a]),
        }
    }

    #[inline]
    fn distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.offset
    }
}

/// Compute the convex hull of `points`.
pub fn convex_hull(points: &[Vec3]) -> Result<ConvexHull, HullError> {
    if points.len() < 4 {
        return Err(HullError::IncompleteInput(points.len()));
    }
    if let Some(i) = points.iter().position(|p| !p.is_finite()) {
        return Err(HullError::InvalidPoint(i));
    }

    let extent = points
        .iter()
        .fold(0.0f32, |acc, p| acc.max(p.abs().max_element()));
    let eps = extent.max(1.0) * 1e-5;

    let [i0, i1, i2, i3] = initial_simplex(points, eps)?;

    let mut faces = Vec::with_capacity(points.len() * 2);
    let centroid = (points[i0] + points[i1] + points[i2] + points[i3]) * 0.25;
    for [a, b, c] in [[i0, i1, i2], [i0, i3, i1], [i0, i2, i3], [i1, i3, i2]] {
        let face = HullFace::new(points, a, b, c);
        if face.distance(centroid) > 0.0 {
            faces.push(HullFace::new(points, a, c, b));
        } else {
            faces.push(face);
        }
    }

    let mut visible = Vec::new();
    let mut edges = BTreeSet::new();
    let mut horizon = Vec::new();

    for (idx, &p) in points.iter().enumerate() {
        if idx == i0 || idx == i1 || idx == i2 || idx == i3 {
            continue;
        }

        visible.clear();
        visible.extend(
            faces
                .iter()
                .enumerate()
                .filter(|(_, f)| f.distance(p) > eps)
                .map(|(i, _)| i),
        );
        if visible.is_empty() {
            continue;
        }

        edges.clear();
        for &f in &visible {
            let [a, b, c] = faces[f].pts;
            edges.insert((a, b));
            edges.insert((b, c));
            edges.insert((c, a));
        }

        // Edges whose twin is not shared with another visible face form the horizon.
        horizon.clear();
        horizon.extend(
            edges
                .iter()
                .filter(|(a, b)| !edges.contains(&(*b, *a)))
                .copied(),
        );

        // Remove back to front so that earlier indices stay valid.
        for &f in visible.iter().rev() {
            faces.swap_remove(f);
        }
        for &(a, b) in &horizon {
            faces.push(HullFace::new(points, a, b, idx));
        }
    }

    Ok(compact(points, &faces))
}

fn initial_simplex(points: &[Vec3], eps: f32) -> Result<[usize; 4], HullError> {
    let i0 = points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.x.total_cmp(&b.x))
        .map(|(i, _)| i)
        .ok_or(HullError::IncompleteInput(0))?;

    let i1 = farthest(points, |p| (p - points[i0]).length_squared());
    if (points[i1] - points[i0]).length() <= eps {
        return Err(HullError::Degenerate);
    }

    let axis = (points[i1] - points[i0]).normalize();
    let i2 = farthest(points, |p| (p - points[i0]).cross(axis).length_squared());
    let normal = (points[i1] - points[i0]).cross(points[i2] - points[i0]);
    if normal.length() <= eps * eps {
        return Err(HullError::Degenerate);
    }

    let normal = normal.normalize();
    let i3 = farthest(points, |p| (p - points[i0]).dot(normal).abs());
    if (points[i3] - points[i0]).dot(normal).abs() <= eps {
        return Err(HullError::Degenerate);
    }

    Ok([i0, i1, i2, i3])
}

fn farthest(points: &[Vec3], metric: impl Fn(Vec3) -> f32) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, p) in points.iter().enumerate() {
        let value = metric(*p);
        if value > best_value {
            best_value = value;
            best = i;
        }
    }
    best
}

fn compact(points: &[Vec3], faces: &[HullFace]) -> ConvexHull {
    let mut remap = vec![u32::MAX; points.len()];
    let mut hull = ConvexHull::default();

    for face in faces {
        let mut tri = [0u32; 3];
        for (slot, &p) in tri.iter_mut().zip(face.pts.iter()) {
            if remap[p] == u32::MAX {
                remap[p] = hull.vertices.len() as u32;
                hull.vertices.push(points[p]);
            }
            *slot = remap[p];
        }
        hull.triangles.push(tri);
    }

    hull
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_corners() -> Vec<Vec3> {
        let mut pts = Vec::new();
        for x in [-1.0, 1.0] {
            for y in [-1.0, 1.0] {
                for z in [-1.0, 1.0] {
                    pts.push(Vec3::new(x, y, z));
                }
            }
        }
        pts
    }

    #[test]
    fn test_cube_with_interior_points() {
        let mut pts = cube_corners();
        pts.push(Vec3::ZERO);
        pts.push(Vec3::new(0.5, -0.2, 0.1));
        pts.push(Vec3::new(-0.9, 0.9, 0.0));

        let hull = convex_hull(&pts).unwrap();
        assert_eq!(hull.vertices.len(), 8);
        for v in &hull.vertices {
            assert!((v.abs() - Vec3::ONE).length() < 1e-6);
        }
        // A closed triangulated cube has 12 triangles.
        assert_eq!(hull.triangles.len(), 12);
    }

    #[test]
    fn test_hull_is_deterministic() {
        let mut pts = Vec::new();
        for i in 0..64 {
            let t = i as f32 * 0.37;
            pts.push(Vec3::new(t.sin(), (t * 1.3).cos(), (t * 0.7).sin() * t.cos()));
        }
        pts.extend(cube_corners());

        let first = convex_hull(&pts).unwrap();
        for _ in 0..4 {
            let again = convex_hull(&pts).unwrap();
            assert_eq!(again.vertices, first.vertices);
            assert_eq!(again.triangles, first.triangles);
        }
    }

    #[test]
    fn test_hull_faces_point_outward() {
        let hull = convex_hull(&cube_corners()).unwrap();
        for tri in &hull.triangles {
            let a = hull.vertices[tri[0] as usize];
            let b = hull.vertices[tri[1] as usize];
            let c = hull.vertices[tri[2] as usize];
            let normal = (b - a).cross(c - a);
            assert!(normal.dot(a) > 0.0, "face should face away from the center");
        }
    }

    #[test]
    fn test_hull_contains_all_input_points() {
        let pts: Vec<Vec3> = (0..64)
            .map(|i| {
                let t = i as f32 * 0.731;
                Vec3::new(t.sin() * 2.0, (t * 1.7).cos(), (t * 0.37).sin() * 3.0)
            })
            .collect();
        let hull = convex_hull(&pts).unwrap();

        for tri in &hull.triangles {
            let a = hull.vertices[tri[0] as usize];
            let b = hull.vertices[tri[1] as usize];
            let c = hull.vertices[tri[2] as usize];
            let normal = (b - a).cross(c - a).normalize();
            for p in &pts {
                assert!(normal.dot(*p - a) < 1e-3);
            }
        }
    }

    #[test]
    fn test_too_few_points() {
        let pts = [Vec3::ZERO, Vec3::X, Vec3::Y];
        assert_eq!(convex_hull(&pts).unwrap_err(), HullError::IncompleteInput(3));
    }

    #[test]
    fn test_coplanar_points() {
        let pts = [
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.5, 0.2, 0.0),
        ];
        assert_eq!(convex_hull(&pts).unwrap_err(), HullError::Degenerate);
    }

    #[test]
    fn test_non_finite_point() {
        let pts = [Vec3::ZERO, Vec3::X, Vec3::new(f32::NAN, 0.0, 0.0), Vec3::Z];
        assert_eq!(convex_hull(&pts).unwrap_err(), HullError::InvalidPoint(2));
    }
}
