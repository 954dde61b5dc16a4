//! Planar polygon with holes, in plane-local coordinates.

/// Distance under which a point counts as lying on a ring edge.
pub const BOUNDARY_TOL: f64 = 1e-9;

pub type Point2 = (f64, f64);

/// Polygon given by an exterior ring and zero or more hole rings.
///
/// Rings are implicitly closed. A repeated closing vertex and consecutive
/// duplicates are dropped on construction.
#[derive(Debug, Clone)]
pub struct Polygon2d {
    exterior: Vec<Point2>,
    holes: Vec<Vec<Point2>>,
}

impl Polygon2d {
    pub fn new(exterior: Vec<Point2>, holes: Vec<Vec<Point2>>) -> Self {
        Self {
            exterior: clean_ring(exterior),
            holes: holes.into_iter().map(clean_ring).collect(),
        }
    }

    pub fn exterior(&self) -> &[Point2] {
        &self.exterior
    }

    pub fn holes(&self) -> &[Vec<Point2>] {
        &self.holes
    }

    /// Area of the exterior minus the area of the holes.
    pub fn area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(|h| ring_area(h).abs()).sum();
        ring_area(&self.exterior).abs() - holes
    }

    /// Returns `(minx, miny, maxx, maxy)` of the exterior ring.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let first = self.exterior.first()?;
        let init = (first.0, first.1, first.0, first.1);
        Some(self.exterior.iter().fold(init, |(x0, y0, x1, y1), &(x, y)| {
            (x0.min(x), y0.min(y), x1.max(x), y1.max(y))
        }))
    }

    /// Basic validity: finite coordinates, at least 3 distinct vertices,
    /// non-zero area and no self-intersecting ring.
    pub fn validate(&self) -> Result<(), String> {
        check_ring(&self.exterior).map_err(|e| format!("exterior {}", e))?;
        for (i, hole) in self.holes.iter().enumerate() {
            check_ring(hole).map_err(|e| format!("hole {} {}", i, e))?;
        }
        if self.area() <= 0. {
            return Err("holes cover the whole exterior".to_string());
        }
        Ok(())
    }

    /// Strict interior membership.
    ///
    /// A point is contained if it lies inside the exterior ring and outside
    /// every hole. Points on any ring boundary (within `BOUNDARY_TOL`) are
    /// not contained.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        if is_on_ring(&self.exterior, x, y) || !ring_contains(&self.exterior, x, y) {
            return false;
        }
        !self
            .holes
            .iter()
            .any(|h| is_on_ring(h, x, y) || ring_contains(h, x, y))
    }
}

fn clean_ring(mut ring: Vec<Point2>) -> Vec<Point2> {
    ring.dedup();
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// Signed shoelace area (positive for counter-clockwise rings).
pub fn ring_area(ring: &[Point2]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.;
    }
    let mut sum = 0.;
    for i in 0..n {
        let (x0, y0) = ring[i];
        let (x1, y1) = ring[(i + 1) % n];
        sum += x0 * y1 - x1 * y0;
    }
    0.5 * sum
}

/// Even-odd test. Boundary points may go either way.
pub fn ring_contains(ring: &[Point2], x: f64, y: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Returns true if the point lies on one of the ring edges.
pub fn is_on_ring(ring: &[Point2], x: f64, y: f64) -> bool {
    let n = ring.len();
    (0..n).any(|i| segment_distance(ring[i], ring[(i + 1) % n], (x, y)) < BOUNDARY_TOL)
}

fn segment_distance(a: Point2, b: Point2, p: Point2) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0. {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0., 1.)
    } else {
        0.
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

fn check_ring(ring: &[Point2]) -> Result<(), String> {
    if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err("has non-finite coordinates".to_string());
    }
    if ring.len() < 3 {
        return Err(format!("has {} distinct vertices", ring.len()));
    }
    if ring_area(ring).abs() <= f64::EPSILON {
        return Err("has zero area".to_string());
    }
    let n = ring.len();
    for i in 0..n {
        for j in (i + 1)..n {
            // Adjacent edges share a vertex
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            if segments_intersect(ring[i], ring[(i + 1) % n], ring[j], ring[(j + 1) % n]) {
                return Err(format!("self-intersects at edges {} and {}", i, j));
            }
        }
    }
    Ok(())
}

fn orientation(a: Point2, b: Point2, c: Point2) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn on_segment(a: Point2, b: Point2, p: Point2) -> bool {
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

fn segments_intersect(p1: Point2, p2: Point2, q1: Point2, q2: Point2) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > 0. && d2 < 0.) || (d1 < 0. && d2 > 0.))
        && ((d3 > 0. && d4 < 0.) || (d3 < 0. && d4 > 0.))
    {
        return true;
    }
    // Collinear touching
    (d1 == 0. && on_segment(q1, q2, p1))
        || (d2 == 0. && on_segment(q1, q2, p2))
        || (d3 == 0. && on_segment(p1, p2, q1))
        || (d4 == 0. && on_segment(p1, p2, q2))
}
