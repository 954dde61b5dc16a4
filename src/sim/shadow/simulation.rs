use anyhow::Result;
use log::{info, warn};

use crate::crs::CoordinateTransform;
use crate::model::CityModel;

use super::aggregate::{aggregate_model, AggregateOptions, CancelFlag};
use super::config::ShadowConfig;
use super::result::ShadowResult;
use super::sampler::{sample_model, BuildingSamples, SamplingLimits};
use super::scene::OccluderScene;
use super::sun_table::{resolve_location, Location, SunTable};

/// Shadow analysis of a whole city model.
///
/// Construction does all preparation (location, sun table, sampling and
/// the occluder scene); `run` only casts rays.
pub struct ShadowSimulation {
    config: ShadowConfig,
    location: Option<Location>,
    table: SunTable,
    samples: Vec<BuildingSamples>,
    scene: OccluderScene,
}

impl ShadowSimulation {
    pub fn new(
        model: &CityModel,
        config: ShadowConfig,
        transform: &dyn CoordinateTransform,
    ) -> Result<Self> {
        config.validate()?;
        let location = resolve_location(model, &config, transform)?;
        match location.time_zone {
            Some(tz) => info!(
                "Location: lat {:.4}, lon {:.4}, {}",
                location.latitude, location.longitude, tz
            ),
            None => info!(
                "Location: lat {:.4}, lon {:.4}, UTC{:+}",
                location.latitude, location.longitude, location.utc_offset_hours
            ),
        }

        let table = SunTable::build(
            &location,
            config.start_date,
            config.end_date,
            config.hour_step,
        )?;
        info!(
            "Sun table: {} days, {} samples, {} without sun",
            table.total_days(),
            table.num_samples(),
            table.num_no_sun()
        );

        let mut sim = Self::with_sun_table(model, config, table)?;
        sim.location = Some(location);
        Ok(sim)
    }

    /// Prepares a run with a precomputed sun table.
    pub fn with_sun_table(model: &CityModel, config: ShadowConfig, table: SunTable) -> Result<Self> {
        config.validate()?;
        let limits = SamplingLimits {
            max_area: config.max_area,
            max_points: config.max_points,
        };
        let samples = sample_model(model, config.spacing, &limits);

        let skipped: usize = samples.iter().map(|b| b.diagnostics.len()).sum();
        if skipped > 0 {
            warn!("{} surfaces could not be sampled", skipped);
        }
        let empty = samples.iter().filter(|b| b.is_empty()).count();
        if empty > 0 {
            warn!("{} buildings have no sample points", empty);
        }
        info!(
            "Sampled {} points on {} buildings",
            samples.iter().map(|b| b.num_points()).sum::<usize>(),
            samples.len() - empty
        );

        let scene = OccluderScene::build(model).with_epsilon(config.epsilon);
        info!("Occluder scene: {} triangles", scene.num_triangles());

        Ok(Self {
            config,
            location: None,
            table,
            samples,
            scene,
        })
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Resolved location, if the sun table was computed here.
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn sun_table(&self) -> &SunTable {
        &self.table
    }

    pub fn samples(&self) -> &[BuildingSamples] {
        &self.samples
    }

    pub fn scene(&self) -> &OccluderScene {
        &self.scene
    }

    /// Computes shadow values for all sample points.
    pub fn run(&self, cancel: &CancelFlag) -> Result<ShadowResult> {
        let options = AggregateOptions {
            self_shadowing: self.config.self_shadowing,
            facing_filter: self.config.facing_filter,
        };
        let buildings = aggregate_model(&self.samples, &self.table, &self.scene, &options, cancel)?;
        let result = ShadowResult::new(buildings, self.table.total_days());
        info!(
            "Shadow analysis done: {} buildings, {} points",
            result.buildings.len(),
            result.num_points()
        );
        Ok(result)
    }
}
