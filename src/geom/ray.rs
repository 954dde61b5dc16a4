//! Ray casting primitives.
//!
//! This module provides a Ray struct with ray-triangle and ray-box tests
//! used by the occluder scene.

use crate::geom::bboxes::Aabb;
use crate::{Point, Vector};

/// Determinant below which a ray is treated as parallel to a triangle.
const PARALLEL_EPS: f64 = 1e-12;

/// A ray defined by an origin point and a direction vector.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Origin point of the ray
    pub origin: Point,
    /// Unit direction vector
    pub direction: Vector,
    inv_direction: Vector,
}

impl Ray {
    /// Creates a new ray from origin point and direction vector.
    ///
    /// The direction vector is automatically normalized.
    pub fn new(origin: Point, direction: Vector) -> Option<Self> {
        let direction = direction.normalize().ok()?;
        let inv_direction = Vector::new(1. / direction.dx, 1. / direction.dy, 1. / direction.dz);
        Some(Self {
            origin,
            direction,
            inv_direction,
        })
    }

    /// Returns the point along the ray at parameter t.
    pub fn point_at(&self, t: f64) -> Point {
        self.origin + self.direction * t
    }

    /// Moller-Trumbore intersection with triangle (a, b, c).
    ///
    /// Returns the ray parameter `t` of the hit, which may be negative
    /// (behind the origin). Triangle edges count as hits.
    pub fn intersect_triangle(&self, a: Point, b: Point, c: Point) -> Option<f64> {
        let e1 = b - a;
        let e2 = c - a;
        let pvec = self.direction.cross(&e2);
        let det = e1.dot(&pvec);
        if det.abs() < PARALLEL_EPS {
            return None;
        }
        let inv_det = 1. / det;

        let tvec = self.origin - a;
        let u = tvec.dot(&pvec) * inv_det;
        if !(0. ..=1.).contains(&u) {
            return None;
        }

        let qvec = tvec.cross(&e1);
        let v = self.direction.dot(&qvec) * inv_det;
        if v < 0. || u + v > 1. {
            return None;
        }

        let t = e2.dot(&qvec) * inv_det;
        if t.is_finite() {
            Some(t)
        } else {
            None
        }
    }

    /// Slab test against a bounding box.
    ///
    /// Returns `(t_enter, t_exit)` if the infinite line hits the box and the
    /// box is not entirely behind the origin.
    pub fn intersect_aabb(&self, bbox: &Aabb) -> Option<(f64, f64)> {
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;

        for axis in 0..3 {
            let inv = self.inv_direction.axis(axis);
            let o = self.origin.axis(axis);
            let mut t0 = (bbox.min.axis(axis) - o) * inv;
            let mut t1 = (bbox.max.axis(axis) - o) * inv;
            if inv < 0. {
                std::mem::swap(&mut t0, &mut t1);
            }
            // 0 * inf gives NaN when the origin lies on a slab plane
            if t0.is_nan() {
                t0 = f64::NEG_INFINITY;
            }
            if t1.is_nan() {
                t1 = f64::INFINITY;
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_max < t_min {
                return None;
            }
        }

        if t_max < 0. {
            return None;
        }
        Some((t_min, t_max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};

    fn xy_triangle() -> (Point, Point, Point) {
        (
            Point::new(0.0, 0.0, 5.0),
            Point::new(4.0, 0.0, 5.0),
            Point::new(0.0, 4.0, 5.0),
        )
    }

    #[test]
    fn test_new_normalizes() -> Result<()> {
        let ray = Ray::new(Point::new(0., 0., 0.), Vector::new(0., 0., 3.))
            .ok_or_else(|| anyhow!("ray"))?;
        assert!(ray.direction.is_close(&Vector::new(0., 0., 1.)));
        assert!(ray.point_at(2.).is_close(&Point::new(0., 0., 2.)));
        assert!(Ray::new(Point::new(0., 0., 0.), Vector::new(0., 0., 0.)).is_none());
        Ok(())
    }

    #[test]
    fn test_triangle_hit_and_miss() -> Result<()> {
        let (a, b, c) = xy_triangle();
        let up = Ray::new(Point::new(1., 1., 0.), Vector::new(0., 0., 1.))
            .ok_or_else(|| anyhow!("ray"))?;
        let t = up.intersect_triangle(a, b, c).ok_or_else(|| anyhow!("no hit"))?;
        assert!((t - 5.).abs() < 1e-12);

        // Outside the triangle
        let off = Ray::new(Point::new(3., 3., 0.), Vector::new(0., 0., 1.))
            .ok_or_else(|| anyhow!("ray"))?;
        assert!(off.intersect_triangle(a, b, c).is_none());

        // Behind the origin gives a negative t
        let down = Ray::new(Point::new(1., 1., 0.), Vector::new(0., 0., -1.))
            .ok_or_else(|| anyhow!("ray"))?;
        let t = down.intersect_triangle(a, b, c).ok_or_else(|| anyhow!("no hit"))?;
        assert!(t < 0.);

        // Parallel
        let side = Ray::new(Point::new(1., 1., 0.), Vector::new(1., 0., 0.))
            .ok_or_else(|| anyhow!("ray"))?;
        assert!(side.intersect_triangle(a, b, c).is_none());
        Ok(())
    }

    #[test]
    fn test_aabb_slab() -> Result<()> {
        let bbox = Aabb::from_points(&[Point::new(1., 1., 1.), Point::new(2., 2., 2.)])
            .ok_or_else(|| anyhow!("bbox"))?;
        let ray = Ray::new(Point::new(0., 0., 0.), Vector::new(1., 1., 1.))
            .ok_or_else(|| anyhow!("ray"))?;
        let (t0, t1) = ray.intersect_aabb(&bbox).ok_or_else(|| anyhow!("miss"))?;
        assert!((t0 - 3f64.sqrt()).abs() < 1e-12);
        assert!((t1 - 2. * 3f64.sqrt()).abs() < 1e-12);

        // Axis-aligned ray lying on the box face
        let grazing = Ray::new(Point::new(0., 1., 1.5), Vector::new(1., 0., 0.))
            .ok_or_else(|| anyhow!("ray"))?;
        assert!(grazing.intersect_aabb(&bbox).is_some());

        let away = Ray::new(Point::new(0., 0., 0.), Vector::new(-1., 0., 0.))
            .ok_or_else(|| anyhow!("ray"))?;
        assert!(away.intersect_aabb(&bbox).is_none());
        Ok(())
    }
}
