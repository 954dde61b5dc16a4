use crate::geom::point::Point;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point,
    pub max: Point,
}

impl Aabb {
    /// Box that contains nothing. Growing it with any point gives that point.
    pub fn empty() -> Self {
        Self {
            min: Point::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Bounding box of all points. `None` for an empty slice.
    pub fn from_points(pts: &[Point]) -> Option<Self> {
        if pts.is_empty() {
            return None;
        }
        Some(pts.iter().fold(Self::empty(), |acc, &p| acc.grow(p)))
    }

    pub fn grow(&self, p: Point) -> Self {
        Self {
            min: Point::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z)),
            max: Point::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z)),
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        self.grow(other.min).grow(other.max)
    }

    pub fn centroid(&self) -> Point {
        Point::new(
            0.5 * (self.min.x + self.max.x),
            0.5 * (self.min.y + self.max.y),
            0.5 * (self.min.z + self.max.z),
        )
    }

    /// Index of the longest axis (0 = x, 1 = y, 2 = z).
    pub fn longest_axis(&self) -> usize {
        let ext = [
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        ];
        if ext[0] >= ext[1] && ext[0] >= ext[2] {
            0
        } else if ext[1] >= ext[2] {
            1
        } else {
            2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let pts = vec![
            Point::new(1., -2., 3.),
            Point::new(-1., 5., 0.),
            Point::new(0., 0., 10.),
        ];
        let bbox = Aabb::from_points(&pts).unwrap();
        assert!(bbox.min.is_close(&Point::new(-1., -2., 0.)));
        assert!(bbox.max.is_close(&Point::new(1., 5., 10.)));
        assert_eq!(bbox.longest_axis(), 2);
        assert!(bbox.centroid().is_close(&Point::new(0., 1.5, 5.)));
        assert!(Aabb::from_points(&[]).is_none());
    }
}
