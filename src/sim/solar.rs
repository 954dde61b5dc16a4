//! Solar position and daylight window.
//!
//! NOAA solar calculator formulas: apparent elevation (with atmospheric
//! refraction), azimuth from north clockwise, and sunrise/sunset for the
//! standard 90.833 degree zenith.

use crate::Vector;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// Zenith angle of sunrise/sunset (refraction and solar disc included).
const SUNRISE_ZENITH: f64 = 90.833;

/// Solar position (azimuth and elevation angles).
#[derive(Debug, Clone, Copy)]
pub struct SolarPosition {
    /// Solar elevation angle in degrees (0 = horizon, 90 = zenith).
    pub elevation: f64,
    /// Solar azimuth angle in degrees from north, clockwise (0=N, 90=E, 180=S, 270=W).
    pub azimuth: f64,
}

impl SolarPosition {
    /// Calculates the apparent solar position at a UTC instant.
    ///
    /// - `latitude`: in degrees (positive north)
    /// - `longitude`: in degrees (positive east)
    pub fn at(latitude: f64, longitude: f64, instant: DateTime<Utc>) -> Self {
        let t = julian_century(julian_day(instant));
        let decl = sun_declination(t);
        let eqtime = eq_of_time(t);

        let midnight = instant.date_naive().and_time(NaiveTime::MIN).and_utc();
        let utc_minutes = (instant - midnight).num_milliseconds() as f64 / 60_000.;
        let true_solar_time = (utc_minutes + eqtime + 4. * longitude).rem_euclid(1440.);
        let mut ha = true_solar_time / 4. - 180.;
        if ha < -180. {
            ha += 360.;
        }

        let zenith = solar_zenith(latitude, decl, ha);
        let azimuth = solar_azimuth(latitude, zenith, decl, ha);
        let elevation = 90. - zenith;

        Self {
            elevation: elevation + refraction(elevation),
            azimuth,
        }
    }

    /// Returns true if the sun is above the horizon.
    pub fn is_above_horizon(&self) -> bool {
        self.elevation > 0.0
    }

    /// Converts solar position to a direction vector (pointing toward the sun).
    pub fn to_direction(&self) -> Vector {
        let el = self.elevation.to_radians();
        let az = self.azimuth.to_radians();

        // Convention: azimuth from north clockwise
        // North = +Y, East = +X
        Vector::new(el.cos() * az.sin(), el.cos() * az.cos(), el.sin())
    }
}

/// Sunrise and sunset of one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DaylightWindow {
    /// Local clock times in minutes after midnight. Values can fall outside
    /// `0..1440` when the time zone is far from the solar meridian.
    Normal { sunrise: f64, sunset: f64 },
    /// The sun does not set.
    PolarDay,
    /// The sun does not rise.
    PolarNight,
}

/// Sunrise and sunset for a local calendar date.
///
/// `utc_offset_hours` is the fixed offset of local clock time from UTC.
pub fn sunrise_sunset(
    latitude: f64,
    longitude: f64,
    date: NaiveDate,
    utc_offset_hours: f64,
) -> DaylightWindow {
    let local_noon = date.and_time(NaiveTime::MIN).and_utc() + Duration::hours(12);
    let noon_utc = local_noon - minutes(utc_offset_hours * 60.);

    // First pass at noon, second pass at the estimated event times
    let Some((sunrise, sunset)) = event_times(latitude, longitude, noon_utc, utc_offset_hours)
    else {
        return polar_kind(latitude, noon_utc);
    };
    let sunrise = refine(latitude, longitude, date, utc_offset_hours, sunrise, true)
        .unwrap_or(sunrise);
    let sunset =
        refine(latitude, longitude, date, utc_offset_hours, sunset, false).unwrap_or(sunset);

    DaylightWindow::Normal { sunrise, sunset }
}

fn minutes(m: f64) -> Duration {
    Duration::milliseconds((m * 60_000.).round() as i64)
}

/// Sunrise/sunset in local minutes using declination and equation of time
/// evaluated at `instant`. `None` if the sun does not cross the horizon.
fn event_times(
    latitude: f64,
    longitude: f64,
    instant: DateTime<Utc>,
    utc_offset_hours: f64,
) -> Option<(f64, f64)> {
    let t = julian_century(julian_day(instant));
    let ha = sunrise_hour_angle(latitude, sun_declination(t))?;
    let noon = solar_noon_minutes(longitude, eq_of_time(t), utc_offset_hours);
    Some((noon - 4. * ha, noon + 4. * ha))
}

fn refine(
    latitude: f64,
    longitude: f64,
    date: NaiveDate,
    utc_offset_hours: f64,
    estimate: f64,
    rising: bool,
) -> Option<f64> {
    let instant = date.and_time(NaiveTime::MIN).and_utc() + minutes(estimate - utc_offset_hours * 60.);
    let (sunrise, sunset) = event_times(latitude, longitude, instant, utc_offset_hours)?;
    Some(if rising { sunrise } else { sunset })
}

fn polar_kind(latitude: f64, noon_utc: DateTime<Utc>) -> DaylightWindow {
    let t = julian_century(julian_day(noon_utc));
    let decl = sun_declination(t);
    // Same hemisphere as the declination means the sun stays up
    if latitude * decl > 0. {
        DaylightWindow::PolarDay
    } else {
        DaylightWindow::PolarNight
    }
}

fn solar_noon_minutes(longitude: f64, eqtime: f64, utc_offset_hours: f64) -> f64 {
    720. - 4. * longitude - eqtime + utc_offset_hours * 60.
}

/// Hour angle of sunrise in degrees, `None` during polar day or night.
fn sunrise_hour_angle(latitude: f64, decl: f64) -> Option<f64> {
    let lat = latitude.to_radians();
    let decl = decl.to_radians();
    let cos_ha = SUNRISE_ZENITH.to_radians().cos() / (lat.cos() * decl.cos())
        - lat.tan() * decl.tan();
    if !(-1.0..=1.0).contains(&cos_ha) {
        return None;
    }
    Some(cos_ha.acos().to_degrees())
}

fn julian_day(instant: DateTime<Utc>) -> f64 {
    instant.timestamp_millis() as f64 / 86_400_000. + 2_440_587.5
}

fn julian_century(jd: f64) -> f64 {
    (jd - 2_451_545.0) / 36_525.0
}

fn geom_mean_long_sun(t: f64) -> f64 {
    (280.46646 + t * (36000.76983 + 0.0003032 * t)).rem_euclid(360.0)
}

fn geom_mean_anomaly_sun(t: f64) -> f64 {
    357.52911 + t * (35999.05029 - 0.0001537 * t)
}

fn eccent_earth_orbit(t: f64) -> f64 {
    0.016708634 - t * (0.000042037 + 0.0000001267 * t)
}

fn sun_eq_of_center(t: f64) -> f64 {
    let m = geom_mean_anomaly_sun(t).to_radians();
    m.sin() * (1.914602 - t * (0.004817 + 0.000014 * t))
        + (2.0 * m).sin() * (0.019993 - 0.000101 * t)
        + (3.0 * m).sin() * 0.000289
}

fn sun_apparent_long(t: f64) -> f64 {
    let true_long = geom_mean_long_sun(t) + sun_eq_of_center(t);
    true_long - 0.00569 - 0.00478 * (125.04 - 1934.136 * t).to_radians().sin()
}

fn obliq_corr(t: f64) -> f64 {
    let e0 = 23.0 + (26.0 + (21.448 - t * (46.8150 + t * (0.00059 - t * 0.001813))) / 60.0) / 60.0;
    e0 + 0.00256 * (125.04 - 1934.136 * t).to_radians().cos()
}

/// Declination in degrees.
fn sun_declination(t: f64) -> f64 {
    let e = obliq_corr(t).to_radians();
    let lambda = sun_apparent_long(t).to_radians();
    (e.sin() * lambda.sin()).asin().to_degrees()
}

/// Equation of time in minutes.
fn eq_of_time(t: f64) -> f64 {
    let e = obliq_corr(t).to_radians();
    let l0 = geom_mean_long_sun(t).to_radians();
    let ecc = eccent_earth_orbit(t);
    let m = geom_mean_anomaly_sun(t).to_radians();
    let y = (e / 2.0).tan().powi(2);

    let etime = y * (2.0 * l0).sin() - 2.0 * ecc * m.sin()
        + 4.0 * ecc * y * m.sin() * (2.0 * l0).cos()
        - 0.5 * y * y * (4.0 * l0).sin()
        - 1.25 * ecc * ecc * (2.0 * m).sin();

    etime.to_degrees() * 4.0
}

fn solar_zenith(lat: f64, decl: f64, ha: f64) -> f64 {
    let lat = lat.to_radians();
    let decl = decl.to_radians();
    let ha = ha.to_radians();
    let cos_zenith = lat.sin() * decl.sin() + lat.cos() * decl.cos() * ha.cos();
    cos_zenith.clamp(-1.0, 1.0).acos().to_degrees()
}

fn solar_azimuth(lat: f64, zenith: f64, decl: f64, ha: f64) -> f64 {
    let lat = lat.to_radians();
    let zenith = zenith.to_radians();
    let decl = decl.to_radians();

    let num = lat.sin() * zenith.cos() - decl.sin();
    let den = lat.cos() * zenith.sin();
    let cos_az = if den.abs() < 1e-10 {
        if num >= 0.0 {
            1.0
        } else {
            -1.0
        }
    } else {
        (num / den).clamp(-1.0, 1.0)
    };

    let az = cos_az.acos().to_degrees();
    if ha > 0.0 {
        (az + 180.0) % 360.0
    } else {
        (540.0 - az) % 360.0
    }
}

/// Atmospheric refraction correction in degrees for a geometric elevation.
fn refraction(elevation: f64) -> f64 {
    if elevation > 85.0 {
        return 0.0;
    }
    let te = elevation.to_radians().tan();
    let arcsec = if elevation > 5.0 {
        58.1 / te - 0.07 / te.powi(3) + 0.000086 / te.powi(5)
    } else if elevation > -0.575 {
        1735.0 + elevation * (-518.2 + elevation * (103.4 + elevation * (-12.79 + elevation * 0.711)))
    } else {
        -20.774 / te
    };
    arcsec / 3600.0
}
