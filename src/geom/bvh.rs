//! Bounding volume hierarchy over triangles.
//!
//! Built once with median splits along the longest centroid axis and then
//! only read, so a `Bvh` can be shared between threads by reference.

use crate::geom::bboxes::Aabb;
use crate::geom::ray::Ray;
use crate::Point;

/// Maximum number of triangles stored in a leaf.
const LEAF_SIZE: usize = 4;

/// Triangle stored by value.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub a: Point,
    pub b: Point,
    pub c: Point,
}

impl Triangle {
    pub fn new(a: Point, b: Point, c: Point) -> Self {
        Self { a, b, c }
    }

    pub fn area(&self) -> f64 {
        0.5 * (self.b - self.a).cross(&(self.c - self.a)).length()
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::empty().grow(self.a).grow(self.b).grow(self.c)
    }
}

/// A BVH node - either a leaf holding triangle indices or an internal node.
#[derive(Debug, Clone)]
pub enum BvhNode {
    Leaf {
        aabb: Aabb,
        triangles: Vec<usize>,
    },
    Internal {
        aabb: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn aabb(&self) -> &Aabb {
        match self {
            BvhNode::Leaf { aabb, .. } => aabb,
            BvhNode::Internal { aabb, .. } => aabb,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bvh {
    triangles: Vec<Triangle>,
    root: Option<BvhNode>,
}

impl Bvh {
    pub fn build(triangles: Vec<Triangle>) -> Self {
        let mut items: Vec<(usize, Aabb, Point)> = triangles
            .iter()
            .enumerate()
            .map(|(i, tri)| {
                let aabb = tri.aabb();
                (i, aabb, aabb.centroid())
            })
            .collect();

        let root = if items.is_empty() {
            None
        } else {
            Some(build_node(&mut items))
        };

        Self { triangles, root }
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangle(&self, index: usize) -> Option<&Triangle> {
        self.triangles.get(index)
    }

    /// Closest hit with `t > t_min` among triangles accepted by `filter`.
    ///
    /// Returns `(t, triangle index)`.
    pub fn closest_hit<F>(&self, ray: &Ray, t_min: f64, filter: F) -> Option<(f64, usize)>
    where
        F: Fn(usize) -> bool,
    {
        let root = self.root.as_ref()?;
        let mut closest: Option<(f64, usize)> = None;
        let mut stack: Vec<&BvhNode> = vec![root];

        while let Some(node) = stack.pop() {
            let t_bound = closest.map_or(f64::INFINITY, |(t, _)| t);
            match ray.intersect_aabb(node.aabb()) {
                Some((t_enter, _)) if t_enter < t_bound => {}
                _ => continue,
            }
            match node {
                BvhNode::Leaf { triangles, .. } => {
                    for &i in triangles {
                        if !filter(i) {
                            continue;
                        }
                        let tri = &self.triangles[i];
                        if let Some(t) = ray.intersect_triangle(tri.a, tri.b, tri.c) {
                            let best = closest.map_or(f64::INFINITY, |(t, _)| t);
                            if t > t_min && t < best {
                                closest = Some((t, i));
                            }
                        }
                    }
                }
                BvhNode::Internal { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }

        closest
    }

    /// Returns true as soon as any accepted triangle is hit with `t > t_min`.
    pub fn any_hit<F>(&self, ray: &Ray, t_min: f64, filter: F) -> bool
    where
        F: Fn(usize) -> bool,
    {
        let Some(root) = self.root.as_ref() else {
            return false;
        };
        let mut stack: Vec<&BvhNode> = vec![root];

        while let Some(node) = stack.pop() {
            match ray.intersect_aabb(node.aabb()) {
                Some((_, t_exit)) if t_exit > t_min => {}
                _ => continue,
            }
            match node {
                BvhNode::Leaf { triangles, .. } => {
                    let hit = triangles.iter().any(|&i| {
                        let tri = &self.triangles[i];
                        filter(i)
                            && ray
                                .intersect_triangle(tri.a, tri.b, tri.c)
                                .is_some_and(|t| t > t_min)
                    });
                    if hit {
                        return true;
                    }
                }
                BvhNode::Internal { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }

        false
    }
}

fn build_node(items: &mut [(usize, Aabb, Point)]) -> BvhNode {
    let aabb = items
        .iter()
        .fold(Aabb::empty(), |acc, (_, bbox, _)| acc.union(bbox));

    if items.len() <= LEAF_SIZE {
        return BvhNode::Leaf {
            aabb,
            triangles: items.iter().map(|(i, _, _)| *i).collect(),
        };
    }

    let centroids = items
        .iter()
        .fold(Aabb::empty(), |acc, (_, _, c)| acc.grow(*c));
    let axis = centroids.longest_axis();

    items.sort_by(|a, b| a.2.axis(axis).total_cmp(&b.2.axis(axis)));
    let mid = items.len() / 2;
    let (left, right) = items.split_at_mut(mid);

    BvhNode::Internal {
        aabb,
        left: Box::new(build_node(left)),
        right: Box::new(build_node(right)),
    }
}
