//! Sun direction table.
//!
//! For every day of the analysis and every sampled hour of that day the
//! table holds a unit vector pointing toward the sun (east/north/up frame),
//! or `None` when the sun is below the horizon. It is built once per run
//! and only read afterwards.

use crate::crs::CoordinateTransform;
use crate::error::ShadowError;
use crate::model::CityModel;
use crate::sim::shadow::config::ShadowConfig;
use crate::sim::solar::{sunrise_sunset, DaylightWindow, SolarPosition};
use crate::Vector;
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveTime, Offset, TimeZone};
use chrono_tz::Tz;
use std::collections::BTreeMap;

/// Last hour of a day that can be sampled.
const LAST_HOUR: i64 = 23;

/// Geographic location and local clock of the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Used when no time zone is given.
    pub utc_offset_hours: f64,
    /// Named zone; its offset is taken at noon of each day.
    pub time_zone: Option<Tz>,
}

impl Location {
    /// Offset of the local clock from UTC on a given day, in hours.
    pub fn offset_hours(&self, date: NaiveDate) -> f64 {
        match self.time_zone {
            Some(tz) => {
                let noon = date.and_time(NaiveTime::MIN) + Duration::hours(12);
                tz.offset_from_utc_datetime(&noon).fix().local_minus_utc() as f64 / 3600.
            }
            None => self.utc_offset_hours,
        }
    }
}

/// Sampled hour -> direction toward the sun, `None` for no sun.
pub type HourlyDirections = BTreeMap<u32, Option<Vector>>;

#[derive(Debug, Clone, PartialEq)]
pub struct SunTable {
    days: BTreeMap<NaiveDate, HourlyDirections>,
    total_days: usize,
}

impl SunTable {
    /// Computes sun directions for every day in `[start, end]`.
    pub fn build(location: &Location, start: NaiveDate, end: NaiveDate, hour_step: u32) -> Result<Self> {
        if end < start {
            return Err(ShadowError::InvalidConfig(format!(
                "end date {} is before start date {}",
                end, start
            ))
            .into());
        }
        if hour_step == 0 || hour_step > 24 {
            return Err(ShadowError::InvalidConfig(format!(
                "hour step must be between 1 and 24, got {}",
                hour_step
            ))
            .into());
        }

        let mut days = BTreeMap::new();
        for date in start.iter_days().take_while(|d| *d <= end) {
            let offset_hours = location.offset_hours(date);
            let window = sunrise_sunset(location.latitude, location.longitude, date, offset_hours);
            let mut hourly = HourlyDirections::new();
            for hour in sampled_hours(&window, hour_step) {
                let direction = match window {
                    DaylightWindow::PolarNight => None,
                    _ => sun_direction(location, offset_hours, date, hour),
                };
                hourly.insert(hour, direction);
            }
            days.insert(date, hourly);
        }

        let total_days = ((end - start).num_days() + 1) as usize;
        Ok(Self { days, total_days })
    }

    /// Builds a table from precomputed directions.
    pub fn from_days(days: BTreeMap<NaiveDate, HourlyDirections>, total_days: usize) -> Self {
        Self { days, total_days }
    }

    pub fn total_days(&self) -> usize {
        self.total_days
    }

    pub fn days(&self) -> &BTreeMap<NaiveDate, HourlyDirections> {
        &self.days
    }

    /// Direction for a day and hour. The outer `None` means the hour was
    /// not sampled.
    pub fn get(&self, date: NaiveDate, hour: u32) -> Option<Option<Vector>> {
        self.days.get(&date)?.get(&hour).copied()
    }

    /// All samples in date order, hours ascending.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, u32, Option<Vector>)> + '_ {
        self.days
            .iter()
            .flat_map(|(&date, hours)| hours.iter().map(move |(&h, &d)| (date, h, d)))
    }

    pub fn num_samples(&self) -> usize {
        self.days.values().map(|h| h.len()).sum()
    }

    pub fn num_no_sun(&self) -> usize {
        self.iter().filter(|(_, _, d)| d.is_none()).count()
    }
}

/// Restricts a direction to surfaces facing the sun.
///
/// Returns `None` if the sun is below the horizon or behind the surface.
pub fn facing(direction: Option<Vector>, normal: &Vector) -> Option<Vector> {
    direction.filter(|d| normal.dot(d) >= 0.)
}

/// Hours sampled on a day.
///
/// Sunrise and sunset are rounded to the nearest hour (30 minutes rounds
/// up) and clamped to the day. The sunrise hour is then floored to a
/// multiple of `hour_step`. Polar days and nights sample the whole day.
pub fn sampled_hours(window: &DaylightWindow, hour_step: u32) -> Vec<u32> {
    let step = hour_step.max(1) as usize;
    let (first, last) = match *window {
        DaylightWindow::Normal { sunrise, sunset } => {
            let rise = round_to_hour(sunrise).clamp(0, LAST_HOUR) as u32;
            let set = round_to_hour(sunset).clamp(0, LAST_HOUR) as u32;
            ((rise / hour_step.max(1)) * hour_step.max(1), set)
        }
        DaylightWindow::PolarDay | DaylightWindow::PolarNight => (0, LAST_HOUR as u32),
    };
    (first..=last).step_by(step).collect()
}

fn round_to_hour(minutes: f64) -> i64 {
    let total = minutes.floor() as i64;
    let hour = total.div_euclid(60);
    if total.rem_euclid(60) >= 30 {
        hour + 1
    } else {
        hour
    }
}

fn sun_direction(location: &Location, offset_hours: f64, date: NaiveDate, hour: u32) -> Option<Vector> {
    let local = date.and_time(NaiveTime::MIN).and_utc() + Duration::hours(hour as i64);
    let offset = Duration::milliseconds((offset_hours * 3_600_000.).round() as i64);
    let pos = SolarPosition::at(location.latitude, location.longitude, local - offset);
    if pos.is_above_horizon() {
        Some(pos.to_direction())
    } else {
        None
    }
}

/// Determines where the model is.
///
/// An explicit latitude/longitude in the configuration wins. Otherwise the
/// midpoint of the model extent is transformed from the model CRS to
/// geographic coordinates; a failure there aborts the run. A configured
/// time zone name takes precedence over the fixed UTC offset.
pub fn resolve_location(
    model: &CityModel,
    config: &ShadowConfig,
    transform: &dyn CoordinateTransform,
) -> Result<Location> {
    let (latitude, longitude) = match (config.latitude, config.longitude) {
        (Some(lat), Some(lon)) => (lat, lon),
        (None, None) => {
            let (x, y) = model.extent_midpoint();
            let (lon, lat) = transform
                .to_geographic(x, y, &model.reference_system)
                .with_context(|| {
                    format!(
                        "Failed to locate model midpoint ({}, {}) in {}",
                        x, y, model.reference_system
                    )
                })?;
            (lat, lon)
        }
        _ => {
            return Err(ShadowError::InvalidConfig(
                "latitude and longitude must be given together".to_string(),
            )
            .into())
        }
    };

    Ok(Location {
        latitude,
        longitude,
        utc_offset_hours: config.utc_offset_hours,
        time_zone: config.parsed_time_zone()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::ProjTransform;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_equator_equinox() -> Result<()> {
        let loc = Location {
            latitude: 0.0,
            longitude: 0.0,
            utc_offset_hours: 0.0,
            time_zone: None,
        };
        let table = SunTable::build(&loc, date(2025, 3, 20), date(2025, 3, 20), 1)?;
        assert_eq!(table.total_days(), 1);

        let hours: Vec<(u32, Option<Vector>)> =
            table.iter().map(|(_, h, d)| (h, d)).collect();
        assert_eq!(hours.first().map(|h| h.0), Some(6));
        assert_eq!(hours.last().map(|h| h.0), Some(18));

        // No-sun hours only at the two ends of the sampled range
        let sunny: Vec<bool> = hours.iter().map(|(_, d)| d.is_some()).collect();
        let first_sun = sunny.iter().position(|&s| s).unwrap();
        let last_sun = sunny.iter().rposition(|&s| s).unwrap();
        assert!(sunny[first_sun..=last_sun].iter().all(|&s| s));
        assert!(first_sun <= 1 && last_sun + 2 >= sunny.len());

        assert!(table.get(date(2025, 3, 20), 12).flatten().is_some_and(|d| d.dz > 0.99));
        for (_, _, d) in table.iter() {
            if let Some(d) = d {
                assert!((d.length() - 1.0).abs() < 1e-6);
            }
        }
        Ok(())
    }

    #[test]
    fn test_hour_step_and_total_days() -> Result<()> {
        let loc = Location {
            latitude: 51.92,
            longitude: 4.48,
            utc_offset_hours: 1.0,
            time_zone: None,
        };
        let table = SunTable::build(&loc, date(2025, 1, 15), date(2025, 1, 20), 2)?;
        assert_eq!(table.total_days(), 6);
        assert_eq!(table.days().len(), 6);
        for hours in table.days().values() {
            let first = *hours.keys().next().unwrap();
            assert_eq!(first % 2, 0);
            let keys: Vec<u32> = hours.keys().copied().collect();
            assert!(keys.windows(2).all(|w| w[1] - w[0] == 2));
            // Rotterdam in January: sunrise about 08:45, sunset about 17:00
            assert!(first >= 8 && first <= 9);
            assert!(*keys.last().unwrap() <= 17);
        }
        Ok(())
    }

    #[test]
    fn test_polar_night_is_all_no_sun() -> Result<()> {
        let loc = Location {
            latitude: 78.2,
            longitude: 15.6,
            utc_offset_hours: 1.0,
            time_zone: None,
        };
        let table = SunTable::build(&loc, date(2025, 12, 21), date(2025, 12, 22), 3)?;
        assert_eq!(table.num_samples(), 16);
        assert_eq!(table.num_no_sun(), 16);
        Ok(())
    }

    #[test]
    fn test_invalid_range() {
        let loc = Location {
            latitude: 0.0,
            longitude: 0.0,
            utc_offset_hours: 0.0,
            time_zone: None,
        };
        assert!(SunTable::build(&loc, date(2025, 1, 2), date(2025, 1, 1), 1).is_err());
        assert!(SunTable::build(&loc, date(2025, 1, 1), date(2025, 1, 1), 0).is_err());
    }

    #[test]
    fn test_sampled_hours_rounding() {
        // 06:29 -> 6, 18:30 -> 19
        let w = DaylightWindow::Normal {
            sunrise: 6. * 60. + 29.,
            sunset: 18. * 60. + 30.,
        };
        assert_eq!(sampled_hours(&w, 1), (6..=19).collect::<Vec<u32>>());
        // 06:30 -> 7, floored to 6 with a step of 2
        let w = DaylightWindow::Normal {
            sunrise: 6. * 60. + 30.,
            sunset: 17. * 60.,
        };
        assert_eq!(sampled_hours(&w, 2), vec![6, 8, 10, 12, 14, 16]);
        // Sunset after midnight is clamped
        let w = DaylightWindow::Normal {
            sunrise: 3. * 60.,
            sunset: 24. * 60. + 50.,
        };
        assert_eq!(sampled_hours(&w, 1).last(), Some(&23));
        assert_eq!(sampled_hours(&DaylightWindow::PolarDay, 6), vec![0, 6, 12, 18]);
    }

    #[test]
    fn test_named_time_zone() -> Result<()> {
        let loc = Location {
            latitude: 51.92,
            longitude: 4.48,
            utc_offset_hours: 0.0,
            time_zone: Some(chrono_tz::Europe::Amsterdam),
        };
        assert_eq!(loc.offset_hours(date(2025, 1, 15)), 1.0);
        assert_eq!(loc.offset_hours(date(2025, 6, 21)), 2.0);

        // Summer hours are labeled in CEST: 14:00 local is 12:00 UTC
        let table = SunTable::build(&loc, date(2025, 6, 21), date(2025, 6, 21), 1)?;
        let fixed = Location {
            utc_offset_hours: 2.0,
            time_zone: None,
            ..loc
        };
        let expected = SunTable::build(&fixed, date(2025, 6, 21), date(2025, 6, 21), 1)?;
        assert_eq!(table, expected);
        let first = *table.days()[&date(2025, 6, 21)].keys().next().unwrap();
        // Sunrise in Rotterdam about 05:20 CEST
        assert_eq!(first, 5);
        Ok(())
    }

    #[test]
    fn test_facing() {
        let up = Vector::new(0., 0., 1.);
        let north_wall = Vector::new(0., 1., 0.);
        let south_sun = Some(Vector::new(0., -0.5, 0.866));
        assert!(facing(south_sun, &up).is_some());
        assert!(facing(south_sun, &north_wall).is_none());
        assert!(facing(None, &up).is_none());
    }

    #[test]
    fn test_resolve_location() -> Result<()> {
        let model = CityModel {
            vertices: Vec::new(),
            buildings: Vec::new(),
            extent: [28.0, 40.0, 0.0, 30.0, 42.0, 50.0],
            reference_system: "EPSG:4326".to_string(),
        };
        let mut config = ShadowConfig::new();
        config.utc_offset_hours = 3.0;
        let loc = resolve_location(&model, &config, &ProjTransform)?;
        assert!((loc.latitude - 41.0).abs() < 1e-9);
        assert!((loc.longitude - 29.0).abs() < 1e-9);
        assert_eq!(loc.utc_offset_hours, 3.0);
        assert_eq!(loc.time_zone, None);

        config.time_zone = Some("Europe/Istanbul".to_string());
        let loc = resolve_location(&model, &config, &ProjTransform)?;
        assert_eq!(loc.time_zone, Some(chrono_tz::Europe::Istanbul));
        config.time_zone = None;

        config.latitude = Some(10.0);
        config.longitude = Some(20.0);
        let loc = resolve_location(&model, &config, &ProjTransform)?;
        assert_eq!((loc.latitude, loc.longitude), (10.0, 20.0));

        let unknown = CityModel {
            reference_system: "EPSG:999999".to_string(),
            ..model
        };
        let err = resolve_location(&unknown, &ShadowConfig::new(), &ProjTransform).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShadowError>(),
            Some(ShadowError::Transform(_))
        ));
        Ok(())
    }
}
