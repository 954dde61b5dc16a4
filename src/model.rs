//! In-memory city model.
//!
//! Geometry shape and surface semantics are resolved once when the model
//! is loaded. Rings refer to the shared vertex table by index.

use crate::Point;
use std::fmt;

/// Semantic surface type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceKind {
    Roof,
    Wall,
    Ground,
    Other(String),
}

impl SurfaceKind {
    pub fn from_semantic(name: &str) -> Self {
        match name {
            "RoofSurface" => SurfaceKind::Roof,
            "WallSurface" => SurfaceKind::Wall,
            "GroundSurface" => SurfaceKind::Ground,
            other => SurfaceKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SurfaceKind::Roof => "RoofSurface",
            SurfaceKind::Wall => "WallSurface",
            SurfaceKind::Ground => "GroundSurface",
            SurfaceKind::Other(name) => name,
        }
    }
}

/// Outer ring followed by zero or more hole rings.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub rings: Vec<Vec<usize>>,
    pub kind: Option<SurfaceKind>,
}

impl Surface {
    pub fn new(rings: Vec<Vec<usize>>, kind: Option<SurfaceKind>) -> Self {
        Self { rings, kind }
    }

    pub fn outer(&self) -> Option<&[usize]> {
        self.rings.first().map(|r| r.as_slice())
    }

    pub fn holes(&self) -> &[Vec<usize>] {
        if self.rings.len() > 1 {
            &self.rings[1..]
        } else {
            &[]
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rings.first().map_or(true, |r| r.is_empty())
    }

    pub fn is_ground(&self) -> bool {
        self.kind == Some(SurfaceKind::Ground)
    }

    /// Semantic type name, `"unknown"` if unlabeled.
    pub fn type_name(&self) -> &str {
        self.kind.as_ref().map_or("unknown", |k| k.as_str())
    }
}

/// Boundary representation of one building geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Independent surfaces (also used for composite surfaces).
    MultiSurface { surfaces: Vec<Surface> },
    /// Closed shells; the first one is the exterior.
    Solid { shells: Vec<Vec<Surface>> },
}

impl Geometry {
    /// All surfaces in a stable order. The position in this order is the
    /// surface index used in `SurfaceId`.
    pub fn surfaces(&self) -> Box<dyn Iterator<Item = &Surface> + '_> {
        match self {
            Geometry::MultiSurface { surfaces } => Box::new(surfaces.iter()),
            Geometry::Solid { shells } => Box::new(shells.iter().flatten()),
        }
    }

    pub fn num_surfaces(&self) -> usize {
        match self {
            Geometry::MultiSurface { surfaces } => surfaces.len(),
            Geometry::Solid { shells } => shells.iter().map(|s| s.len()).sum(),
        }
    }
}

/// Identifies a surface within a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId {
    pub geometry: usize,
    pub surface: usize,
}

impl SurfaceId {
    pub fn new(geometry: usize, surface: usize) -> Self {
        Self { geometry, surface }
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "geom_{}_surface_{}", self.geometry, self.surface)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    pub id: String,
    /// City object type, e.g. `Building`.
    pub kind: String,
    pub geometries: Vec<Geometry>,
}

impl Building {
    /// Iterates over all surfaces of all geometries with their identifiers.
    pub fn surfaces(&self) -> impl Iterator<Item = (SurfaceId, &Surface)> + '_ {
        self.geometries.iter().enumerate().flat_map(|(g, geom)| {
            geom.surfaces()
                .enumerate()
                .map(move |(s, surface)| (SurfaceId::new(g, s), surface))
        })
    }
}

#[derive(Debug, Clone)]
pub struct CityModel {
    pub vertices: Vec<Point>,
    pub buildings: Vec<Building>,
    /// `[minx, miny, minz, maxx, maxy, maxz]`
    pub extent: [f64; 6],
    pub reference_system: String,
}

impl CityModel {
    /// Midpoint of the geographical extent in the model's CRS.
    pub fn extent_midpoint(&self) -> (f64, f64) {
        let [minx, miny, _, maxx, maxy, _] = self.extent;
        ((minx + maxx) / 2., (miny + maxy) / 2.)
    }

    /// Resolves vertex indices to points. Unknown indices are skipped.
    pub fn ring_points(&self, ring: &[usize]) -> Vec<Point> {
        ring.iter()
            .filter_map(|&i| self.vertices.get(i).copied())
            .collect()
    }

    pub fn building(&self, id: &str) -> Option<&Building> {
        self.buildings.iter().find(|b| b.id == id)
    }

    pub fn num_surfaces(&self) -> usize {
        self.buildings
            .iter()
            .flat_map(|b| b.geometries.iter())
            .map(|g| g.num_surfaces())
            .sum()
    }
}
