pub mod bboxes;
pub mod bvh;
pub mod point;
pub mod polygon2d;
pub mod projection;
pub mod ray;
pub mod triangles;
pub mod vector;

/// Geometric precision
pub const EPS: f64 = 1e-13;

/// Approximate comparison of floating point numbers.
pub trait IsClose {
    fn is_close(&self, other: f64) -> bool;
}

impl IsClose for f64 {
    fn is_close(&self, other: f64) -> bool {
        (self - other).abs() < EPS
    }
}
