use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::SurfaceId;
use crate::{Point, Vector};

/// Shadow value of one sample point.
///
/// `shadow` is the number of sampled hours in which the point was shadowed
/// or the sun was down, divided by the number of days. It is an average
/// count per day, so it can exceed 1 when more than one hour is sampled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowPoint {
    pub coordinates: Point,
    pub normal: Vector,
    pub shadow: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceShadow {
    pub id: SurfaceId,
    /// Semantic type name, `"unknown"` if unlabeled.
    pub surface_type: String,
    pub outline: Vec<Point>,
    pub points: Vec<ShadowPoint>,
}

impl SurfaceShadow {
    /// Mean shadow value over the surface points.
    pub fn mean_shadow(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points.iter().map(|p| p.shadow).sum::<f64>() / self.points.len() as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingShadow {
    pub building_id: String,
    pub surfaces: Vec<SurfaceShadow>,
}

impl BuildingShadow {
    pub fn num_points(&self) -> usize {
        self.surfaces.iter().map(|s| s.points.len()).sum()
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&SurfaceShadow> {
        self.surfaces.iter().find(|s| s.id == id)
    }
}

/// Unique surface key across the model, `{building}_geom_{g}_surface_{s}`.
pub fn surface_key(building_id: &str, id: SurfaceId) -> String {
    format!("{}_{}", building_id, id)
}

/// Flat output record, one per sample point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShadowRecord {
    pub building_id: String,
    /// Surface key as built by `surface_key`.
    pub surface: String,
    pub point: [f64; 3],
    pub shadow: f64,
    pub surface_type: String,
}

/// Result of a shadow analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowResult {
    /// Buildings with at least one sampled point, keyed by id.
    pub buildings: BTreeMap<String, BuildingShadow>,
    pub total_days: usize,
}

impl ShadowResult {
    pub fn new(buildings: Vec<BuildingShadow>, total_days: usize) -> Self {
        Self {
            buildings: buildings
                .into_iter()
                .map(|b| (b.building_id.clone(), b))
                .collect(),
            total_days,
        }
    }

    pub fn get(&self, building_id: &str) -> Option<&BuildingShadow> {
        self.buildings.get(building_id)
    }

    pub fn num_points(&self) -> usize {
        self.buildings.values().map(|b| b.num_points()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    /// Flattens the result into records ordered by building, surface and point.
    pub fn records(&self) -> Vec<ShadowRecord> {
        let mut records = Vec::with_capacity(self.num_points());
        for building in self.buildings.values() {
            for surface in &building.surfaces {
                let name = surface_key(&building.building_id, surface.id);
                for p in &surface.points {
                    records.push(ShadowRecord {
                        building_id: building.building_id.clone(),
                        surface: name.clone(),
                        point: p.coordinates.to_array(),
                        shadow: p.shadow,
                        surface_type: surface.surface_type.clone(),
                    });
                }
            }
        }
        records
    }
}
