//! Surface sampling.
//!
//! Every non-ground surface is projected onto its own plane, covered with a
//! regular grid and the grid nodes strictly inside the polygon (holes
//! removed) are mapped back to 3D.

use crate::error::SkipReason;
use crate::geom::polygon2d::Polygon2d;
use crate::geom::projection::{fit_plane, project_to_2d, PlaneBasis};
use crate::model::{CityModel, Surface, SurfaceId, SurfaceKind};
use crate::{Point, Vector};
use log::{debug, warn};
use rayon::prelude::*;

/// Size filters applied before a surface is sampled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingLimits {
    pub max_area: f64,
    pub max_points: Option<usize>,
}

impl Default for SamplingLimits {
    fn default() -> Self {
        Self {
            max_area: 1e8,
            max_points: None,
        }
    }
}

/// A point on a surface where shadowing is evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub position: Point,
    /// Unit normal of the owning surface.
    pub normal: Vector,
}

/// Sample points of one surface.
#[derive(Debug, Clone)]
pub struct SurfaceSamples {
    pub id: SurfaceId,
    pub kind: Option<SurfaceKind>,
    pub normal: Vector,
    /// Outer ring in model coordinates.
    pub outline: Vec<Point>,
    pub points: Vec<SamplePoint>,
}

/// A surface that was skipped and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceDiagnostic {
    pub surface: SurfaceId,
    pub reason: SkipReason,
}

/// Sampling output of one building.
#[derive(Debug, Clone)]
pub struct BuildingSamples {
    /// Index of the building in the model.
    pub index: usize,
    pub building_id: String,
    /// Non-empty surfaces only.
    pub surfaces: Vec<SurfaceSamples>,
    pub diagnostics: Vec<SurfaceDiagnostic>,
}

impl BuildingSamples {
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn num_points(&self) -> usize {
        self.surfaces.iter().map(|s| s.points.len()).sum()
    }
}

/// Grid coordinates `floor(min) + i * spacing` below `ceil(max)`.
pub fn grid_axis(min: f64, max: f64, spacing: f64) -> Vec<f64> {
    let start = min.floor();
    let stop = max.ceil();
    if !(spacing > 0.) || !(stop > start) {
        return Vec::new();
    }
    let n = ((stop - start) / spacing).ceil() as usize;
    (0..n).map(|i| start + i as f64 * spacing).collect()
}

/// Samples one projected polygon.
///
/// Grid nodes on the outer or a hole boundary are not sampled. Oversized
/// and undersized polygons give an error reason rather than points.
pub fn sample_surface(
    polygon: &Polygon2d,
    basis: &PlaneBasis,
    spacing: f64,
    limits: &SamplingLimits,
) -> Result<Vec<SamplePoint>, SkipReason> {
    let area = polygon.area();
    if area > limits.max_area {
        return Err(SkipReason::Oversized { area });
    }

    let (minx, miny, maxx, maxy) = polygon.bounds().ok_or(SkipReason::Empty)?;
    if maxx - minx < spacing || maxy - miny < spacing {
        return Err(SkipReason::Undersized);
    }

    if let Some(cap) = limits.max_points {
        let estimated = ((maxx - minx) * (maxy - miny) / (spacing * spacing)).ceil() as usize;
        if estimated > cap {
            return Err(SkipReason::TooManyPoints { estimated });
        }
    }

    let xs = grid_axis(minx, maxx, spacing);
    let ys = grid_axis(miny, maxy, spacing);

    let mut points = Vec::new();
    for &y in &ys {
        for &x in &xs {
            if polygon.contains(x, y) {
                points.push(SamplePoint {
                    position: basis.unproject(x, y),
                    normal: basis.normal,
                });
            }
        }
    }
    Ok(points)
}

/// Projects and samples one model surface.
fn sample_model_surface(
    model: &CityModel,
    id: SurfaceId,
    surface: &Surface,
    spacing: f64,
    limits: &SamplingLimits,
) -> Result<SurfaceSamples, SkipReason> {
    let outline = model.ring_points(surface.outer().ok_or(SkipReason::Empty)?);
    let plane = fit_plane(&outline)?;
    let projection = project_to_2d(&outline, plane.normal).ok_or(SkipReason::InvalidProjection)?;

    // Holes share the outer ring's origin and basis
    let holes: Vec<Vec<(f64, f64)>> = surface
        .holes()
        .iter()
        .filter_map(|ring| projection.basis.project_ring(&model.ring_points(ring)))
        .collect();

    let polygon = Polygon2d::new(projection.points, holes);
    polygon.validate().map_err(SkipReason::InvalidPolygon)?;

    let points = sample_surface(&polygon, &projection.basis, spacing, limits)?;

    Ok(SurfaceSamples {
        id,
        kind: surface.kind.clone(),
        normal: plane.normal,
        outline,
        points,
    })
}

/// Samples all surfaces of one building.
///
/// Ground and empty surfaces are skipped silently. Other failures are
/// recorded as diagnostics and do not affect sibling surfaces; size filter
/// skips are logged at debug level, broken geometry at warn level. Surfaces
/// that yield no points are left out.
pub fn sample_building(
    model: &CityModel,
    index: usize,
    spacing: f64,
    limits: &SamplingLimits,
) -> BuildingSamples {
    let mut out = BuildingSamples {
        index,
        building_id: String::new(),
        surfaces: Vec::new(),
        diagnostics: Vec::new(),
    };
    let Some(building) = model.buildings.get(index) else {
        return out;
    };
    out.building_id = building.id.clone();

    for (id, surface) in building.surfaces() {
        if surface.is_ground() || surface.is_empty() {
            continue;
        }
        match sample_model_surface(model, id, surface, spacing, limits) {
            Ok(samples) if samples.points.is_empty() => {}
            Ok(samples) => out.surfaces.push(samples),
            Err(reason) => {
                if reason.is_size_filter() {
                    debug!("Skipping {} of building {}: {}", id, building.id, reason);
                } else {
                    warn!("Skipping {} of building {}: {}", id, building.id, reason);
                }
                out.diagnostics.push(SurfaceDiagnostic {
                    surface: id,
                    reason,
                });
            }
        }
    }

    out
}

/// Samples all buildings in parallel. Output follows the model order.
pub fn sample_model(
    model: &CityModel,
    spacing: f64,
    limits: &SamplingLimits,
) -> Vec<BuildingSamples> {
    (0..model.buildings.len())
        .into_par_iter()
        .map(|i| sample_building(model, i, spacing, limits))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Building, Geometry};

    fn square_basis() -> PlaneBasis {
        PlaneBasis::from_normal(Point::new(0., 0., 0.), Vector::new(0., 0., 1.)).unwrap()
    }

    fn square(side: f64) -> Polygon2d {
        Polygon2d::new(vec![(0., 0.), (side, 0.), (side, side), (0., side)], vec![])
    }

    #[test]
    fn test_grid_axis() {
        assert_eq!(grid_axis(0., 10., 4.), vec![0., 4., 8.]);
        assert_eq!(grid_axis(0.5, 8., 4.), vec![0., 4.]);
        assert_eq!(grid_axis(-1.2, 1.1, 1.), vec![-2., -1., 0., 1.]);
        assert!(grid_axis(0., 10., 0.).is_empty());
    }

    #[test]
    fn test_square_roof_spacing_4() {
        let points = sample_surface(&square(10.), &square_basis(), 4., &SamplingLimits::default())
            .unwrap();
        let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.position.x, p.position.y)).collect();
        // Nodes on x = 0 or y = 0 lie on the boundary
        assert_eq!(coords, vec![(4., 4.), (8., 4.), (4., 8.), (8., 8.)]);
        for p in &points {
            assert_eq!(p.position.z, 0.);
            assert!(p.normal.is_close(&Vector::new(0., 0., 1.)));
        }
    }

    #[test]
    fn test_hole_removes_points() {
        let poly = Polygon2d::new(
            vec![(0., 0.), (10., 0.), (10., 10.), (0., 10.)],
            vec![vec![(3., 3.), (5., 3.), (5., 5.), (3., 5.)]],
        );
        let points =
            sample_surface(&poly, &square_basis(), 1., &SamplingLimits::default()).unwrap();
        // 9 x 9 interior nodes minus the one node strictly inside the hole
        // and the 8 nodes on its boundary
        assert_eq!(points.len(), 81 - 9);
        assert!(!points
            .iter()
            .any(|p| (p.position.x - 4.).abs() < 1e-9 && (p.position.y - 4.).abs() < 1e-9));
    }

    #[test]
    fn test_size_filters() {
        let basis = square_basis();
        let small = sample_surface(&square(3.), &basis, 4., &SamplingLimits::default());
        assert_eq!(small.unwrap_err(), SkipReason::Undersized);

        let limits = SamplingLimits {
            max_area: 50.,
            max_points: None,
        };
        assert!(matches!(
            sample_surface(&square(10.), &basis, 1., &limits),
            Err(SkipReason::Oversized { .. })
        ));

        let limits = SamplingLimits {
            max_area: 1e8,
            max_points: Some(10),
        };
        assert!(matches!(
            sample_surface(&square(10.), &basis, 1., &limits),
            Err(SkipReason::TooManyPoints { estimated: 100 })
        ));
    }

    #[test]
    fn test_points_lie_on_tilted_plane() {
        let ring = vec![
            Point::new(10.0, 0.0, 5.0),
            Point::new(20.0, 0.0, 5.0),
            Point::new(20.0, 6.0, 9.0),
            Point::new(10.0, 6.0, 9.0),
        ];
        let plane = fit_plane(&ring).unwrap();
        let proj = project_to_2d(&ring, plane.normal).unwrap();
        let poly = Polygon2d::new(proj.points, vec![]);
        let points = sample_surface(&poly, &proj.basis, 1., &SamplingLimits::default()).unwrap();
        assert!(!points.is_empty());
        for p in &points {
            assert!(plane.distance(p.position).abs() < 1e-6);
            let (x, y) = proj.basis.project(p.position);
            assert!(poly.contains(x, y));
            // On a grid node
            assert!((x - x.round()).abs() < 1e-9 && (y - y.round()).abs() < 1e-9);
        }
    }

    fn box_model() -> CityModel {
        // 10 x 10 x 6 box; ground, roof, one wall and one degenerate surface
        let vertices = vec![
            Point::new(0., 0., 0.),
            Point::new(10., 0., 0.),
            Point::new(10., 10., 0.),
            Point::new(0., 10., 0.),
            Point::new(0., 0., 6.),
            Point::new(10., 0., 6.),
            Point::new(10., 10., 6.),
            Point::new(0., 10., 6.),
        ];
        let ground = Surface::new(vec![vec![0, 3, 2, 1]], Some(SurfaceKind::Ground));
        let roof = Surface::new(vec![vec![4, 5, 6, 7]], Some(SurfaceKind::Roof));
        let wall = Surface::new(vec![vec![0, 1, 5, 4]], Some(SurfaceKind::Wall));
        let broken = Surface::new(vec![vec![0, 0, 1]], Some(SurfaceKind::Wall));
        let empty = Surface::new(vec![], None);
        CityModel {
            vertices,
            buildings: vec![Building {
                id: "box".to_string(),
                kind: "Building".to_string(),
                geometries: vec![Geometry::Solid {
                    shells: vec![vec![ground, roof, wall, broken, empty]],
                }],
            }],
            extent: [0., 0., 0., 10., 10., 6.],
            reference_system: "EPSG:4326".to_string(),
        }
    }

    #[test]
    fn test_sample_building() {
        let model = box_model();
        let samples = sample_building(&model, 0, 2., &SamplingLimits::default());
        assert_eq!(samples.building_id, "box");

        let ids: Vec<String> = samples.surfaces.iter().map(|s| s.id.to_string()).collect();
        assert_eq!(ids, vec!["geom_0_surface_1", "geom_0_surface_2"]);
        assert_eq!(samples.diagnostics.len(), 1);
        assert_eq!(samples.diagnostics[0].surface, SurfaceId::new(0, 3));
        assert_eq!(samples.diagnostics[0].reason, SkipReason::DegenerateGeometry);

        // Roof: 4 x 4 interior nodes at z = 6
        let roof = &samples.surfaces[0];
        assert_eq!(roof.points.len(), 16);
        assert!(roof.points.iter().all(|p| (p.position.z - 6.).abs() < 1e-12));
        assert_eq!(roof.outline.len(), 4);

        // Wall lies in y = 0 and faces -y
        let wall = &samples.surfaces[1];
        assert!(wall.normal.is_close(&Vector::new(0., -1., 0.)));
        assert!(wall.points.iter().all(|p| p.position.y.abs() < 1e-12));
    }

    #[test]
    fn test_sample_model_order() {
        let mut model = box_model();
        let mut second = model.buildings[0].clone();
        second.id = "box2".to_string();
        model.buildings.push(second);
        let all = sample_model(&model, 2., &SamplingLimits::default());
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].building_id, "box");
        assert_eq!(all[1].building_id, "box2");
        assert_eq!(all[0].num_points(), all[1].num_points());
    }
}
