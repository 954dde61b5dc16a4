//! Occluder scene.
//!
//! All rings of all buildings are fan-triangulated into one BVH. Each
//! triangle remembers its building (geometry group) and surface, so that
//! queries can ignore the geometry the ray starts from.

use crate::geom::bvh::{Bvh, Triangle};
use crate::geom::ray::Ray;
use crate::geom::triangles::fan_triangles;
use crate::model::{CityModel, SurfaceId};
use crate::{Point, Vector};
use rayon::prelude::*;
use std::collections::HashMap;

/// Identifier of the triangles contributed by one building.
pub type GroupId = usize;

/// Default minimal hit distance.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Geometry ignored by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Nothing,
    /// All triangles of a building.
    Group(GroupId),
    /// Triangles of a single surface of a building.
    Surface(GroupId, SurfaceId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Owner {
    group: GroupId,
    surface: SurfaceId,
}

impl Owner {
    fn is_excluded(&self, exclude: &Exclusion) -> bool {
        match *exclude {
            Exclusion::Nothing => false,
            Exclusion::Group(g) => self.group == g,
            Exclusion::Surface(g, s) => self.group == g && self.surface == s,
        }
    }
}

/// Nearest accepted intersection of a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub t: f64,
    pub group: GroupId,
    pub surface: SurfaceId,
}

#[derive(Debug, Clone)]
pub struct OccluderScene {
    bvh: Bvh,
    owners: Vec<Owner>,
    groups: HashMap<String, GroupId>,
    epsilon: f64,
}

impl OccluderScene {
    /// Triangulates every surface of every building in the model.
    ///
    /// The group of a building is its index in `model.buildings`.
    pub fn build(model: &CityModel) -> Self {
        let mut triangles = Vec::new();
        let mut owners = Vec::new();
        let mut groups = HashMap::new();

        for (group, building) in model.buildings.iter().enumerate() {
            groups.insert(building.id.clone(), group);
            for (surface, s) in building.surfaces() {
                for ring in &s.rings {
                    let tris = fan_triangles(&model.ring_points(ring));
                    owners.extend(std::iter::repeat(Owner { group, surface }).take(tris.len()));
                    triangles.extend(tris);
                }
            }
        }

        Self::from_parts(triangles, owners, groups)
    }

    fn from_parts(
        triangles: Vec<Triangle>,
        owners: Vec<Owner>,
        groups: HashMap<String, GroupId>,
    ) -> Self {
        Self {
            bvh: Bvh::build(triangles),
            owners,
            groups,
            epsilon: DEFAULT_EPSILON,
        }
    }

    /// Sets the minimal hit distance.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Geometry group of a building.
    pub fn group_of(&self, building_id: &str) -> Option<GroupId> {
        self.groups.get(building_id).copied()
    }

    pub fn num_triangles(&self) -> usize {
        self.bvh.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bvh.is_empty()
    }

    /// Returns true if a ray from `origin` along `direction` hits a
    /// triangle that is not excluded, farther than epsilon.
    pub fn query(&self, origin: Point, direction: Vector, exclude: Exclusion) -> bool {
        let Some(ray) = Ray::new(origin, direction) else {
            return false;
        };
        self.bvh
            .any_hit(&ray, self.epsilon, |i| !self.owners[i].is_excluded(&exclude))
    }

    /// Casts one ray per origin along a shared direction.
    pub fn query_batch(&self, origins: &[Point], direction: Vector, exclude: Exclusion) -> Vec<bool> {
        origins
            .par_iter()
            .map(|&origin| self.query(origin, direction, exclude))
            .collect()
    }

    /// Nearest accepted hit, with its distance and owner.
    pub fn cast_ray(&self, origin: Point, direction: Vector, exclude: Exclusion) -> Option<RayHit> {
        let ray = Ray::new(origin, direction)?;
        let (t, i) = self
            .bvh
            .closest_hit(&ray, self.epsilon, |i| !self.owners[i].is_excluded(&exclude))?;
        let owner = self.owners[i];
        Some(RayHit {
            t,
            group: owner.group,
            surface: owner.surface,
        })
    }
}
