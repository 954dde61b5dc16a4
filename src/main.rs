use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::{info, warn};
use std::path::PathBuf;

use cityshadow::crs::default_transform;
use cityshadow::io::{read_cityjson, write_results_json};
use cityshadow::sim::shadow::{CancelFlag, SelfShadowing, ShadowConfig, ShadowSimulation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SelfShadowingArg {
    Building,
    Surface,
}

impl From<SelfShadowingArg> for SelfShadowing {
    fn from(arg: SelfShadowingArg) -> Self {
        match arg {
            SelfShadowingArg::Building => SelfShadowing::ExcludeBuilding,
            SelfShadowingArg::Surface => SelfShadowing::ExcludeSurface,
        }
    }
}

/// Estimates how often points on building surfaces are in shadow.
#[derive(Debug, Parser)]
#[command(name = "cityshadow", version, about)]
struct Args {
    /// CityJSON city model
    #[arg(short, long)]
    input: PathBuf,
    /// JSON run configuration; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// First day, YYYY-MM-DD
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last day (inclusive), YYYY-MM-DD
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Grid spacing on surfaces
    #[arg(long)]
    spacing: Option<f64>,
    #[arg(long)]
    hour_step: Option<u32>,
    /// Local clock offset from UTC in hours [default: 0, i.e. UTC]
    #[arg(long, allow_hyphen_values = true)]
    utc_offset: Option<f64>,
    /// IANA time zone, e.g. Europe/Amsterdam; overrides --utc-offset and
    /// follows daylight saving time
    #[arg(long)]
    time_zone: Option<String>,
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lon: Option<f64>,
    #[arg(long)]
    max_points: Option<usize>,
    #[arg(long, value_enum)]
    self_shadowing: Option<SelfShadowingArg>,
    /// Count hours when the sun is behind a surface as shadowed
    #[arg(long)]
    facing_filter: bool,
    #[arg(short, long, default_value = "all_surface_points_with_shadow.json")]
    output: PathBuf,
}

impl Args {
    /// Merges the command line over the configuration file (or defaults).
    fn to_config(&self) -> Result<ShadowConfig> {
        let mut config = match &self.config {
            Some(path) => ShadowConfig::from_json_file(path)?,
            None => ShadowConfig::new(),
        };
        if let Some(start) = self.start {
            config.start_date = start;
        }
        if let Some(end) = self.end {
            config.end_date = end;
        }
        if let Some(spacing) = self.spacing {
            config.spacing = spacing;
        }
        if let Some(step) = self.hour_step {
            config.hour_step = step;
        }
        if let Some(offset) = self.utc_offset {
            config.utc_offset_hours = offset;
        }
        if self.time_zone.is_some() {
            config.time_zone = self.time_zone.clone();
        }
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            config.latitude = Some(lat);
            config.longitude = Some(lon);
        }
        if self.max_points.is_some() {
            config.max_points = self.max_points;
        }
        if let Some(mode) = self.self_shadowing {
            config.self_shadowing = mode.into();
        }
        if self.facing_filter {
            config.facing_filter = true;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.to_config()?;

    let model = read_cityjson(&args.input)?;
    info!(
        "Loaded {} buildings, {} surfaces ({})",
        model.buildings.len(),
        model.num_surfaces(),
        model.reference_system
    );

    let transform = default_transform();
    let sim = ShadowSimulation::new(&model, config, transform.as_ref())?;
    if sim.scene().is_empty() {
        warn!("Occluder scene is empty, only night hours will count");
    }

    let result = sim.run(&CancelFlag::new())?;
    write_results_json(&args.output, &result)?;
    info!(
        "Wrote {} points to {}",
        result.num_points(),
        args.output.display()
    );
    Ok(())
}
