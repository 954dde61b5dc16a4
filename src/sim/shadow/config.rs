use crate::error::ShadowError;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Which part of the sample point's own building is ignored by its rays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfShadowing {
    /// The whole building is transparent to its own sample points.
    #[default]
    ExcludeBuilding,
    /// Only the surface a point lies on is ignored; other walls and roofs
    /// of the same building can shadow it.
    ExcludeSurface,
}

/// Configuration for a shadow analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Grid spacing on each surface, in model units.
    pub spacing: f64,
    /// First day of the analysis (inclusive).
    pub start_date: NaiveDate,
    /// Last day of the analysis (inclusive).
    pub end_date: NaiveDate,
    /// Step between sampled hours.
    pub hour_step: u32,
    /// Offset of local clock time from UTC, in hours. Defaults to 0 (UTC)
    /// and is ignored when `time_zone` is set.
    pub utc_offset_hours: f64,
    /// IANA time zone name, e.g. `Europe/Amsterdam`. Follows daylight
    /// saving time, unlike the fixed offset.
    pub time_zone: Option<String>,
    /// Explicit location. When both are set, the model CRS is not used.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Surfaces with a larger area are not sampled.
    pub max_area: f64,
    /// Surfaces whose estimated grid exceeds this are not sampled.
    pub max_points: Option<usize>,
    /// Hits closer than this to the ray origin are ignored.
    pub epsilon: f64,
    pub self_shadowing: SelfShadowing,
    /// Treat hours when the sun is behind a surface as shadowed.
    pub facing_filter: bool,
}

impl ShadowConfig {
    pub fn new() -> Self {
        Self {
            spacing: 2.0,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap_or_default(),
            hour_step: 1,
            utc_offset_hours: 0.0,
            time_zone: None,
            latitude: None,
            longitude: None,
            max_area: 1e8,
            max_points: None,
            epsilon: 1e-6,
            self_shadowing: SelfShadowing::ExcludeBuilding,
            facing_filter: false,
        }
    }

    /// Reads a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ShadowError::NotFound(path.to_path_buf()).into());
        }
        let file = File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse configuration from: {}", path.display()))?;
        Ok(config)
    }

    /// Checks that the configuration describes a meaningful run.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> anyhow::Error { ShadowError::InvalidConfig(msg).into() };

        if !(self.spacing > 0.0) || !self.spacing.is_finite() {
            return Err(invalid(format!("spacing must be positive, got {}", self.spacing)));
        }
        if self.end_date < self.start_date {
            return Err(invalid(format!(
                "end date {} is before start date {}",
                self.end_date, self.start_date
            )));
        }
        if self.hour_step == 0 || self.hour_step > 24 {
            return Err(invalid(format!(
                "hour step must be between 1 and 24, got {}",
                self.hour_step
            )));
        }
        if !(-14.0..=14.0).contains(&self.utc_offset_hours) {
            return Err(invalid(format!(
                "UTC offset {} h is out of range",
                self.utc_offset_hours
            )));
        }
        self.parsed_time_zone()?;
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Err(invalid(format!("location ({}, {}) is out of range", lat, lon)));
                }
            }
            (None, None) => {}
            _ => {
                return Err(invalid(
                    "latitude and longitude must be given together".to_string(),
                ))
            }
        }
        if !(self.max_area > 0.0) {
            return Err(invalid(format!("max area must be positive, got {}", self.max_area)));
        }
        if !(self.epsilon >= 0.0) {
            return Err(invalid(format!("epsilon must not be negative, got {}", self.epsilon)));
        }
        Ok(())
    }

    /// The configured time zone, if any.
    pub fn parsed_time_zone(&self) -> Result<Option<Tz>> {
        self.time_zone
            .as_deref()
            .map(|name| {
                name.parse::<Tz>().map_err(|e| {
                    anyhow::Error::from(ShadowError::InvalidConfig(format!(
                        "unknown time zone '{}': {}",
                        name, e
                    )))
                })
            })
            .transpose()
    }

    /// Number of days in the analysis range.
    pub fn total_days(&self) -> usize {
        ((self.end_date - self.start_date).num_days() + 1).max(0) as usize
    }
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self::new()
    }
}
