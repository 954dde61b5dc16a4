//! Plane fitting and plane-local 2D coordinates.
//!
//! A surface ring is mapped onto its own plane so that 2D polygon
//! operations (area, containment, grid overlay) can be used on it, and
//! results can be mapped back with `origin + x * u + y * v`.

use crate::error::SkipReason;
use crate::Point;
use crate::Vector;

/// Tolerance for collinearity and for detecting vertical normals.
pub const PLANE_TOL: f64 = 1e-6;

/// Plane `normal . p = offset` with a unit normal.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub normal: Vector,
    pub offset: f64,
}

impl Plane {
    /// Signed distance of `p` to the plane.
    pub fn distance(&self, p: Point) -> f64 {
        self.normal.dx * p.x + self.normal.dy * p.y + self.normal.dz * p.z - self.offset
    }
}

/// Fits a plane through the first three points of a ring.
///
/// Only the first three points are used. Returns
/// `SkipReason::DegenerateGeometry` if there are fewer than 3 points or
/// if the first two edges are (nearly) collinear.
pub fn fit_plane(points: &[Point]) -> Result<Plane, SkipReason> {
    if points.len() < 3 {
        return Err(SkipReason::DegenerateGeometry);
    }
    let v1 = points[1] - points[0];
    let v2 = points[2] - points[0];
    let n = v1.cross(&v2);
    let len = n.length();
    // Negated comparison so that NaN is rejected too
    if !(len >= PLANE_TOL) {
        return Err(SkipReason::DegenerateGeometry);
    }
    let normal = n * (1. / len);
    let p0 = points[0];
    let offset = normal.dx * p0.x + normal.dy * p0.y + normal.dz * p0.z;

    Ok(Plane { normal, offset })
}

/// Orthonormal basis for projecting 3D points onto a 2D plane and back.
#[derive(Debug, Clone, Copy)]
pub struct PlaneBasis {
    pub origin: Point,
    pub u: Vector,
    pub v: Vector,
    pub normal: Vector,
}

impl PlaneBasis {
    /// Creates a `PlaneBasis` from an origin point and a normal vector.
    ///
    /// Vertical normals use the world X and Y axes. Otherwise
    /// `u = normal x ref`, with `ref` being Z, or Y and then X if the
    /// previous choice is (nearly) parallel to the normal.
    pub fn from_normal(origin: Point, normal: Vector) -> Option<Self> {
        let n = normal.normalize().ok()?;

        let (u, v) = if is_vertical(&n) {
            (Vector::new(1., 0., 0.), Vector::new(0., 1., 0.))
        } else {
            let refs = [
                Vector::new(0., 0., 1.),
                Vector::new(0., 1., 0.),
                Vector::new(1., 0., 0.),
            ];
            let u = refs
                .iter()
                .map(|r| n.cross(r))
                .find(|c| c.length() >= PLANE_TOL)?
                .normalize()
                .ok()?;
            let v = n.cross(&u).normalize().ok()?;
            (u, v)
        };

        Some(Self {
            origin,
            u,
            v,
            normal: n,
        })
    }

    /// Projects a 3D point onto the 2D plane, returning (u, v) coordinates.
    pub fn project(&self, p: Point) -> (f64, f64) {
        let r = p - self.origin;
        (r.dot(&self.u), r.dot(&self.v))
    }

    /// Projects a whole ring. Returns `None` if any coordinate is NaN.
    pub fn project_ring(&self, ring: &[Point]) -> Option<Vec<(f64, f64)>> {
        let pts: Vec<(f64, f64)> = ring.iter().map(|&p| self.project(p)).collect();
        if pts.iter().any(|(x, y)| x.is_nan() || y.is_nan()) {
            return None;
        }
        Some(pts)
    }

    /// Unprojects 2D (u, v) coordinates back to a 3D point on the plane.
    pub fn unproject(&self, x: f64, y: f64) -> Point {
        self.origin + self.u * x + self.v * y
    }
}

fn is_vertical(n: &Vector) -> bool {
    n.dx.abs() < PLANE_TOL && n.dy.abs() < PLANE_TOL && (n.dz.abs() - 1.).abs() < PLANE_TOL
}

/// Ring expressed in plane coordinates together with its basis.
#[derive(Debug, Clone)]
pub struct Projection {
    pub points: Vec<(f64, f64)>,
    pub basis: PlaneBasis,
}

/// Projects a ring onto the plane with the given normal, using the first
/// point of the ring as origin.
///
/// This is a soft failure: an empty ring, an unusable normal or NaN
/// coordinates give `None`.
pub fn project_to_2d(points: &[Point], normal: Vector) -> Option<Projection> {
    let origin = *points.first()?;
    let basis = PlaneBasis::from_normal(origin, normal)?;
    let points = basis.project_ring(points)?;
    Some(Projection { points, basis })
}
