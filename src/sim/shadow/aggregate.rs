//! Per-point shadow aggregation.
//!
//! Every sample point is tested against every entry of the sun table.
//! A sample counts when the sun is down (or behind the surface, if the
//! facing filter is on) or when the ray toward the sun is blocked.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use log::debug;
use rayon::prelude::*;

use crate::error::ShadowError;
use crate::sim::shadow::config::SelfShadowing;
use crate::sim::shadow::result::{BuildingShadow, ShadowPoint, SurfaceShadow};
use crate::sim::shadow::sampler::{BuildingSamples, SurfaceSamples};
use crate::sim::shadow::scene::{Exclusion, OccluderScene};
use crate::sim::shadow::sun_table::{facing, SunTable};
use crate::Point;

/// Shared flag for stopping a run between buildings.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    pub self_shadowing: SelfShadowing,
    pub facing_filter: bool,
}

/// Per-point tally of shadowed-or-dark samples of one surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowCounter {
    counts: Vec<u32>,
}

impl ShadowCounter {
    pub fn new(num_points: usize) -> Self {
        Self {
            counts: vec![0; num_points],
        }
    }

    /// Counts one sample for every point (sun down or behind the surface).
    pub fn add_all(&mut self) {
        self.counts.iter_mut().for_each(|c| *c += 1);
    }

    /// Counts one sample for each point whose ray was blocked.
    pub fn add_hits(&mut self, blocked: &[bool]) {
        for (c, &hit) in self.counts.iter_mut().zip(blocked) {
            if hit {
                *c += 1;
            }
        }
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Counts divided by the number of days, or zeros when there are none.
    pub fn fractions(&self, total_days: usize) -> Vec<f64> {
        if total_days == 0 {
            return vec![0.0; self.counts.len()];
        }
        self.counts
            .iter()
            .map(|&c| c as f64 / total_days as f64)
            .collect()
    }
}

/// Number of shadowed-or-dark samples for each point of a surface.
pub fn count_shadowed(
    surface: &SurfaceSamples,
    exclude: Exclusion,
    table: &SunTable,
    scene: &OccluderScene,
    facing_filter: bool,
) -> ShadowCounter {
    let origins: Vec<Point> = surface.points.iter().map(|p| p.position).collect();
    let mut counter = ShadowCounter::new(origins.len());

    for (_, _, direction) in table.iter() {
        let direction = if facing_filter {
            facing(direction, &surface.normal)
        } else {
            direction
        };
        match direction {
            None => counter.add_all(),
            Some(dir) => counter.add_hits(&scene.query_batch(&origins, dir, exclude)),
        }
    }

    counter
}

/// Computes shadow values of all points of one building.
pub fn aggregate_building(
    samples: &BuildingSamples,
    table: &SunTable,
    scene: &OccluderScene,
    options: &AggregateOptions,
) -> BuildingShadow {
    let group = scene.group_of(&samples.building_id).unwrap_or(samples.index);
    let total_days = table.total_days();

    let surfaces = samples
        .surfaces
        .iter()
        .map(|surface| {
            let exclude = match options.self_shadowing {
                SelfShadowing::ExcludeBuilding => Exclusion::Group(group),
                SelfShadowing::ExcludeSurface => Exclusion::Surface(group, surface.id),
            };
            let counter = count_shadowed(surface, exclude, table, scene, options.facing_filter);
            let points = surface
                .points
                .iter()
                .zip(counter.fractions(total_days))
                .map(|(p, shadow)| ShadowPoint {
                    coordinates: p.position,
                    normal: p.normal,
                    shadow,
                })
                .collect();
            SurfaceShadow {
                id: surface.id,
                surface_type: surface
                    .kind
                    .as_ref()
                    .map_or("unknown", |k| k.as_str())
                    .to_string(),
                outline: surface.outline.clone(),
                points,
            }
        })
        .collect();

    BuildingShadow {
        building_id: samples.building_id.clone(),
        surfaces,
    }
}

/// Aggregates all buildings in parallel.
///
/// Buildings without sample points are left out. The cancel flag is
/// checked before each building; once set, the run fails with
/// `ShadowError::Cancelled`.
pub fn aggregate_model(
    samples: &[BuildingSamples],
    table: &SunTable,
    scene: &OccluderScene,
    options: &AggregateOptions,
    cancel: &CancelFlag,
) -> Result<Vec<BuildingShadow>> {
    samples
        .par_iter()
        .filter(|b| !b.is_empty())
        .map(|b| {
            if cancel.is_cancelled() {
                return Err(ShadowError::Cancelled.into());
            }
            let shadow = aggregate_building(b, table, scene, options);
            debug!(
                "Building {}: {} surfaces, {} points",
                b.building_id,
                shadow.surfaces.len(),
                shadow.num_points()
            );
            for surface in &shadow.surfaces {
                debug!(
                    "  {} ({}): mean shadow {:.3}",
                    surface.id,
                    surface.surface_type,
                    surface.mean_shadow()
                );
            }
            Ok(shadow)
        })
        .collect()
}
