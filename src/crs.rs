//! Coordinate reference system handling.
//!
//! The shadow analysis needs the geographic location (longitude, latitude)
//! of the model. `CoordinateTransform` converts a point from the model CRS
//! to EPSG:4326 in longitude/latitude order; `ProjTransform` delegates to
//! PROJ.

use crate::error::ShadowError;
use anyhow::Result;
use proj::Proj;

/// Converts model coordinates to geographic coordinates.
pub trait CoordinateTransform: Send + Sync {
    /// Returns `(longitude, latitude)` in degrees for point `(x, y)` given
    /// in `crs`.
    fn to_geographic(&self, x: f64, y: f64, crs: &str) -> Result<(f64, f64)>;
}

/// Extracts the EPSG code from a CRS identifier.
///
/// Accepted forms: `EPSG:7415`, `urn:ogc:def:crs:EPSG::7415`,
/// `http(s)://www.opengis.net/def/crs/EPSG/0/7415` and a bare `7415`.
pub fn parse_epsg(crs: &str) -> Option<u32> {
    let crs = crs.trim();
    let code = if let Some(rest) = crs.strip_prefix("EPSG:") {
        rest
    } else if let Some(rest) = crs.strip_prefix("urn:ogc:def:crs:EPSG:") {
        // Version between the colons may be empty
        rest.rsplit(':').next()?
    } else if let Some(rest) = crs
        .strip_prefix("https://www.opengis.net/def/crs/EPSG/")
        .or_else(|| crs.strip_prefix("http://www.opengis.net/def/crs/EPSG/"))
    {
        let (version, code) = rest.split_once('/')?;
        if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        code
    } else {
        crs
    };

    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    code.parse().ok()
}

fn transform_error(msg: String) -> anyhow::Error {
    ShadowError::Transform(msg).into()
}

/// Transform backed by the PROJ library.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjTransform;

impl ProjTransform {
    /// PROJ definition of the source CRS. EPSG identifiers in any accepted
    /// form become `EPSG:<code>`, anything else is passed through.
    fn source_definition(crs: &str) -> String {
        match parse_epsg(crs) {
            Some(code) => format!("EPSG:{}", code),
            None => crs.trim().to_string(),
        }
    }
}

impl CoordinateTransform for ProjTransform {
    fn to_geographic(&self, x: f64, y: f64, crs: &str) -> Result<(f64, f64)> {
        let source = Self::source_definition(crs);
        // new_known_crs normalizes the output to longitude/latitude order
        let proj = Proj::new_known_crs(&source, "EPSG:4326", None)
            .map_err(|e| transform_error(format!("{} -> EPSG:4326: {}", source, e)))?;
        let (lon, lat) = proj
            .convert((x, y))
            .map_err(|e| transform_error(format!("({}, {}) in {}: {}", x, y, source, e)))?;

        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(transform_error(format!(
                "({}, {}) in {} maps outside the globe: ({}, {})",
                x, y, source, lon, lat
            )));
        }
        Ok((lon, lat))
    }
}

/// The transform used by the command line tool.
pub fn default_transform() -> Box<dyn CoordinateTransform> {
    Box::new(ProjTransform)
}
