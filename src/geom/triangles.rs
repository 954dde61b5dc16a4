use crate::geom::bvh::Triangle;
use crate::Point;

/// Type for holding vertex indices for a triangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriangleIndex(pub usize, pub usize, pub usize);

/// Fan triangulation of a ring with `n` vertices, anchored at vertex 0.
///
/// Correct for convex rings only. Concave rings get triangles outside the
/// ring, which is accepted for occluder geometry.
pub fn fan_triangulate(n: usize) -> Vec<TriangleIndex> {
    if n < 3 {
        return Vec::new();
    }
    (1..n - 1).map(|i| TriangleIndex(0, i, i + 1)).collect()
}

/// Fan-triangulates a ring of points, dropping zero-area triangles.
pub fn fan_triangles(ring: &[Point]) -> Vec<Triangle> {
    fan_triangulate(ring.len())
        .into_iter()
        .map(|TriangleIndex(a, b, c)| Triangle::new(ring[a], ring[b], ring[c]))
        .filter(|tri| tri.area() > 1e-12)
        .collect()
}
