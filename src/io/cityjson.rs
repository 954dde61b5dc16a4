//! CityJSON reader.
//!
//! Reads `Building` city objects into a `CityModel`. Vertices are
//! decoded with the optional `transform` (scale and translate), geometry
//! boundaries are resolved into `Geometry` variants and semantic surface
//! values are attached to the matching surfaces.

use crate::error::ShadowError;
use crate::model::{Building, CityModel, Geometry, Surface, SurfaceKind};
use crate::Point;
use anyhow::{bail, Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

static NULL: Value = Value::Null;

#[derive(Debug, Deserialize)]
struct RawCityJson {
    #[serde(rename = "CityObjects")]
    city_objects: BTreeMap<String, RawCityObject>,
    vertices: Vec<[f64; 3]>,
    #[serde(default)]
    transform: Option<RawTransform>,
    #[serde(default)]
    metadata: Option<RawMetadata>,
}

#[derive(Debug, Deserialize)]
struct RawTransform {
    scale: [f64; 3],
    translate: [f64; 3],
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(rename = "geographicalExtent", default)]
    geographical_extent: Option<Vec<f64>>,
    #[serde(rename = "referenceSystem", default)]
    reference_system: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCityObject {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    geometry: Vec<RawGeometry>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    boundaries: Value,
    #[serde(default)]
    semantics: Option<RawSemantics>,
}

#[derive(Debug, Deserialize)]
struct RawSemantics {
    #[serde(default)]
    surfaces: Vec<RawSemanticSurface>,
    #[serde(default)]
    values: Value,
}

#[derive(Debug, Deserialize)]
struct RawSemanticSurface {
    #[serde(rename = "type")]
    kind: String,
}

/// Reads a city model from a CityJSON file.
///
/// Fails with `ShadowError::NotFound` if the file does not exist and with
/// `ShadowError::InvalidMetadata` if the extent or the reference system is
/// missing or malformed.
pub fn read_cityjson(path: &Path) -> Result<CityModel> {
    if !path.exists() {
        return Err(ShadowError::NotFound(path.to_path_buf()).into());
    }
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let raw: RawCityJson = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse CityJSON from: {}", path.display()))?;

    convert(raw).with_context(|| format!("Failed to load city model: {}", path.display()))
}

/// Parses a city model from a CityJSON string.
pub fn from_cityjson_str(json: &str) -> Result<CityModel> {
    let raw: RawCityJson = serde_json::from_str(json).context("Failed to parse CityJSON")?;
    convert(raw)
}

fn convert(raw: RawCityJson) -> Result<CityModel> {
    let metadata = raw
        .metadata
        .ok_or_else(|| ShadowError::InvalidMetadata("metadata is missing".to_string()))?;

    let extent: [f64; 6] = match metadata.geographical_extent.as_deref() {
        Some(&[a, b, c, d, e, f]) => [a, b, c, d, e, f],
        _ => {
            return Err(ShadowError::InvalidMetadata(
                "geographicalExtent is missing or does not have 6 values".to_string(),
            )
            .into())
        }
    };

    let reference_system = match metadata.reference_system {
        Some(crs) if !crs.trim().is_empty() => crs.trim().to_string(),
        _ => {
            return Err(
                ShadowError::InvalidMetadata("referenceSystem is missing".to_string()).into(),
            )
        }
    };

    let vertices: Vec<Point> = match &raw.transform {
        Some(t) => raw
            .vertices
            .iter()
            .map(|v| {
                Point::new(
                    v[0] * t.scale[0] + t.translate[0],
                    v[1] * t.scale[1] + t.translate[1],
                    v[2] * t.scale[2] + t.translate[2],
                )
            })
            .collect(),
        None => raw
            .vertices
            .iter()
            .map(|v| Point::new(v[0], v[1], v[2]))
            .collect(),
    };

    let mut buildings = Vec::new();
    for (id, obj) in raw.city_objects {
        if obj.kind != "Building" {
            continue;
        }
        let mut geometries = Vec::new();
        let mut invalid = 0;
        for (i, geom) in obj.geometry.iter().enumerate() {
            match parse_geometry(geom, vertices.len()) {
                Ok(Some(g)) => geometries.push(g),
                Ok(None) => debug!("Skipping {} geometry of building {}", geom.kind, id),
                Err(e) => {
                    warn!("Skipping invalid geometry {} of building {}: {:#}", i, id, e);
                    invalid += 1;
                }
            }
        }
        if invalid > 0 && geometries.is_empty() {
            warn!("Skipping building {}: no valid geometry", id);
            continue;
        }
        buildings.push(Building {
            id,
            kind: obj.kind,
            geometries,
        });
    }

    if buildings.is_empty() {
        return Err(ShadowError::InvalidMetadata("no buildings found".to_string()).into());
    }

    Ok(CityModel {
        vertices,
        buildings,
        extent,
        reference_system,
    })
}

/// Resolves one geometry object. Returns `None` for unsupported types.
fn parse_geometry(geom: &RawGeometry, num_vertices: usize) -> Result<Option<Geometry>> {
    let semantics = geom.semantics.as_ref();
    let kind_of = |value: &Value| -> Option<SurfaceKind> {
        let idx = value.as_u64()? as usize;
        let sem = semantics?.surfaces.get(idx)?;
        Some(SurfaceKind::from_semantic(&sem.kind))
    };
    let values = semantics.map(|s| &s.values).unwrap_or(&NULL);

    let geometry = match geom.kind.as_str() {
        "MultiSurface" | "CompositeSurface" => Geometry::MultiSurface {
            surfaces: parse_surfaces(&geom.boundaries, values, &kind_of, num_vertices)?,
        },
        "Solid" => Geometry::Solid {
            shells: parse_shells(&geom.boundaries, values, &kind_of, num_vertices)?,
        },
        "MultiSolid" | "CompositeSolid" => {
            let solids = as_array(&geom.boundaries, "solid list")?;
            let mut shells = Vec::new();
            for (i, solid) in solids.iter().enumerate() {
                let vals = values.get(i).unwrap_or(&NULL);
                shells.extend(parse_shells(solid, vals, &kind_of, num_vertices)?);
            }
            Geometry::Solid { shells }
        }
        other => {
            warn!("Unsupported geometry type: {}", other);
            return Ok(None);
        }
    };
    Ok(Some(geometry))
}

fn parse_shells<F>(
    boundaries: &Value,
    values: &Value,
    kind_of: &F,
    num_vertices: usize,
) -> Result<Vec<Vec<Surface>>>
where
    F: Fn(&Value) -> Option<SurfaceKind>,
{
    let shells = as_array(boundaries, "shell list")?;
    shells
        .iter()
        .enumerate()
        .map(|(i, shell)| {
            let vals = values.get(i).unwrap_or(&NULL);
            parse_surfaces(shell, vals, kind_of, num_vertices)
        })
        .collect()
}

fn parse_surfaces<F>(
    boundaries: &Value,
    values: &Value,
    kind_of: &F,
    num_vertices: usize,
) -> Result<Vec<Surface>>
where
    F: Fn(&Value) -> Option<SurfaceKind>,
{
    let surfaces = as_array(boundaries, "surface list")?;
    let mut out = Vec::with_capacity(surfaces.len());
    for (i, surface) in surfaces.iter().enumerate() {
        let mut rings = Vec::new();
        for ring in as_array(surface, "ring list")? {
            rings.push(parse_ring(ring, num_vertices)?);
        }
        let kind = values.get(i).and_then(kind_of);
        out.push(Surface::new(rings, kind));
    }
    Ok(out)
}

fn parse_ring(ring: &Value, num_vertices: usize) -> Result<Vec<usize>> {
    let mut indices = Vec::new();
    for v in as_array(ring, "ring")? {
        let Some(idx) = v.as_u64() else {
            bail!("vertex index is not a non-negative integer: {}", v);
        };
        let idx = idx as usize;
        if idx >= num_vertices {
            bail!("vertex index {} out of range ({} vertices)", idx, num_vertices);
        }
        indices.push(idx);
    }
    Ok(indices)
}

fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    match value.as_array() {
        Some(arr) => Ok(arr),
        None => bail!("expected {} to be an array", what),
    }
}
