use anyhow::Result;
use approx::assert_relative_eq;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tempfile::tempdir;

use cityshadow::crs::{default_transform, ProjTransform};
use cityshadow::io::{from_cityjson_str, read_cityjson, write_results_json};
use cityshadow::model::SurfaceId;
use cityshadow::sim::shadow::sun_table::HourlyDirections;
use cityshadow::sim::shadow::{
    CancelFlag, SelfShadowing, ShadowConfig, ShadowSimulation, SunTable,
};
use cityshadow::{ShadowError, Vector};

/// Axis-aligned box building: ground, roof, then south, east, north and
/// west walls. Returns the city object and its vertices.
fn box_building(base: usize, min: [f64; 3], max: [f64; 3]) -> (Value, Vec<[f64; 3]>) {
    let mut vertices = Vec::new();
    for z in [min[2], max[2]] {
        vertices.push([min[0], min[1], z]);
        vertices.push([max[0], min[1], z]);
        vertices.push([max[0], max[1], z]);
        vertices.push([min[0], max[1], z]);
    }
    let face = |idx: [usize; 4]| json!([idx.iter().map(|i| base + i).collect::<Vec<_>>()]);
    let object = json!({
        "type": "Building",
        "geometry": [{
            "type": "Solid",
            "lod": "2",
            "boundaries": [[
                face([0, 3, 2, 1]),
                face([4, 5, 6, 7]),
                face([0, 1, 5, 4]),
                face([1, 2, 6, 5]),
                face([2, 3, 7, 6]),
                face([3, 0, 4, 7])
            ]],
            "semantics": {
                "surfaces": [
                    {"type": "GroundSurface"},
                    {"type": "RoofSurface"},
                    {"type": "WallSurface"}
                ],
                "values": [[0, 1, 2, 2, 2, 2]]
            }
        }]
    });
    (object, vertices)
}

fn city_json(boxes: &[(&str, [f64; 3], [f64; 3])]) -> String {
    let mut objects = serde_json::Map::new();
    let mut vertices: Vec<[f64; 3]> = Vec::new();
    for (id, min, max) in boxes {
        let (object, verts) = box_building(vertices.len(), *min, *max);
        objects.insert(id.to_string(), object);
        vertices.extend(verts);
    }
    json!({
        "type": "CityJSON",
        "version": "1.1",
        "metadata": {
            "geographicalExtent": [-60.0, -12.0, 0.0, 70.0, 10.0, 100.0],
            "referenceSystem": "https://www.opengis.net/def/crs/EPSG/0/7415"
        },
        "CityObjects": objects,
        "vertices": vertices
    })
    .to_string()
}

fn flat_roof_json() -> String {
    json!({
        "type": "CityJSON",
        "version": "1.1",
        "metadata": {
            "geographicalExtent": [0.0, 0.0, 5.0, 10.0, 10.0, 5.0],
            "referenceSystem": "EPSG:4326"
        },
        "CityObjects": {
            "roof": {
                "type": "Building",
                "geometry": [{
                    "type": "MultiSurface",
                    "lod": "2",
                    "boundaries": [[[0, 1, 2, 3]]],
                    "semantics": {"surfaces": [{"type": "RoofSurface"}], "values": [0]}
                }]
            }
        },
        "vertices": [[0, 0, 5], [10, 0, 5], [10, 10, 5], [0, 10, 5]]
    })
    .to_string()
}

/// Rotterdam in mid January.
fn winter_config() -> ShadowConfig {
    ShadowConfig {
        latitude: Some(51.92),
        longitude: Some(4.48),
        utc_offset_hours: 1.0,
        start_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2025, 1, 16).unwrap(),
        ..ShadowConfig::new()
    }
}

#[test]
fn flat_roof_in_daylight_is_never_shadowed() -> Result<()> {
    let model = from_cityjson_str(&flat_roof_json())?;
    let day = NaiveDate::from_ymd_opt(2025, 6, 21).unwrap();
    let hours: HourlyDirections = BTreeMap::from([
        (11, Some(Vector::new(0.3, -0.5, 0.8))),
        (12, Some(Vector::new(0., -0.4, 0.9))),
    ]);
    let table = SunTable::from_days(BTreeMap::from([(day, hours)]), 1);

    let config = ShadowConfig {
        spacing: 4.0,
        ..ShadowConfig::new()
    };
    let sim = ShadowSimulation::with_sun_table(&model, config, table)?;
    let result = sim.run(&CancelFlag::new())?;

    let roof = result.get("roof").unwrap();
    assert_eq!(roof.num_points(), 4);
    let surface = roof.surface(SurfaceId::new(0, 0)).unwrap();
    assert_eq!(surface.surface_type, "RoofSurface");
    assert_eq!(surface.outline.len(), 4);
    for p in &surface.points {
        assert_eq!(p.shadow, 0.0);
        assert_eq!(p.coordinates.z, 5.0);
    }
    Ok(())
}

#[test]
fn tower_shadows_low_building() -> Result<()> {
    let model = from_cityjson_str(&city_json(&[
        ("low", [0., 0., 0.], [10., 10., 3.]),
        ("tower", [-60., -12., 0.], [70., -2., 100.]),
    ]))?;
    let sim = ShadowSimulation::new(&model, winter_config(), &ProjTransform)?;
    let result = sim.run(&CancelFlag::new())?;

    let table = sim.sun_table();
    let days = table.total_days() as f64;
    assert_eq!(table.total_days(), 2);
    let every_sample = table.num_samples() as f64 / days;
    let no_sun = table.num_no_sun() as f64 / days;
    assert!(every_sample > no_sun);

    // Winter sun stays low in the south: the whole low roof is covered
    let low_roof = result.get("low").unwrap().surface(SurfaceId::new(0, 1)).unwrap();
    assert!(!low_roof.points.is_empty());
    for p in &low_roof.points {
        assert_eq!(p.shadow, every_sample);
    }

    // Nothing is above the tower roof, only night hours count
    let tower_roof = result.get("tower").unwrap().surface(SurfaceId::new(0, 1)).unwrap();
    for p in &tower_roof.points {
        assert_eq!(p.shadow, no_sun);
    }

    // Ground surfaces are never sampled
    assert!(result.get("low").unwrap().surface(SurfaceId::new(0, 0)).is_none());
    Ok(())
}

#[test]
fn self_shadowing_modes() -> Result<()> {
    let model = from_cityjson_str(&city_json(&[("box", [0., 0., 0.], [10., 10., 6.])]))?;
    let north_wall = SurfaceId::new(0, 4);

    let sim = ShadowSimulation::new(&model, winter_config(), &ProjTransform)?;
    let table = sim.sun_table();
    let days = table.total_days() as f64;
    let every_sample = table.num_samples() as f64 / days;
    let no_sun = table.num_no_sun() as f64 / days;

    // Whole building excluded: a lone building only sees night hours
    let result = sim.run(&CancelFlag::new())?;
    let wall = result.get("box").unwrap().surface(north_wall).unwrap();
    assert!(wall.points.iter().all(|p| p.shadow == no_sun));

    // Own surface excluded: rays from the north wall pass through the box
    let config = ShadowConfig {
        self_shadowing: SelfShadowing::ExcludeSurface,
        ..winter_config()
    };
    let sim = ShadowSimulation::new(&model, config, &ProjTransform)?;
    let result = sim.run(&CancelFlag::new())?;
    let wall = result.get("box").unwrap().surface(north_wall).unwrap();
    assert!(wall.points.iter().all(|p| p.shadow == every_sample));

    // Same outcome with the facing filter and the whole building excluded
    let config = ShadowConfig {
        facing_filter: true,
        ..winter_config()
    };
    let sim = ShadowSimulation::new(&model, config, &ProjTransform)?;
    let result = sim.run(&CancelFlag::new())?;
    let wall = result.get("box").unwrap().surface(north_wall).unwrap();
    assert!(wall.points.iter().all(|p| p.shadow == every_sample));
    Ok(())
}

#[test]
fn runs_are_identical() -> Result<()> {
    let model = from_cityjson_str(&city_json(&[
        ("a", [0., 0., 0.], [10., 10., 8.]),
        ("b", [14., -6., 0.], [24., 4., 25.]),
    ]))?;
    let sim = ShadowSimulation::new(&model, winter_config(), &ProjTransform)?;
    let first = sim.run(&CancelFlag::new())?;
    let second = sim.run(&CancelFlag::new())?;

    let bits = |r: &cityshadow::ShadowResult| -> Vec<u64> {
        r.records().iter().map(|rec| rec.shadow.to_bits()).collect()
    };
    assert!(first.num_points() > 0);
    assert_eq!(bits(&first), bits(&second));
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn cancelled_run_fails() -> Result<()> {
    let model = from_cityjson_str(&flat_roof_json())?;
    let sim = ShadowSimulation::new(&model, winter_config(), &ProjTransform)?;
    let cancel = CancelFlag::new();
    cancel.cancel();
    let err = sim.run(&cancel).unwrap_err();
    assert!(matches!(err.downcast_ref::<ShadowError>(), Some(ShadowError::Cancelled)));
    Ok(())
}

#[test]
fn files_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    let model_path = dir.path().join("model.city.json");
    let config_path = dir.path().join("config.json");
    let output_path = dir.path().join("points.json");

    std::fs::write(
        &model_path,
        city_json(&[
            ("low", [0., 0., 0.], [10., 10., 3.]),
            ("tower", [-60., -12., 0.], [70., -2., 100.]),
        ]),
    )?;
    std::fs::write(
        &config_path,
        r#"{
            "spacing": 2.0,
            "start_date": "2025-01-15",
            "end_date": "2025-01-15",
            "hour_step": 2,
            "utc_offset_hours": 1.0,
            "latitude": 51.92,
            "longitude": 4.48
        }"#,
    )?;

    let model = read_cityjson(&model_path)?;
    let config = ShadowConfig::from_json_file(&config_path)?;
    let transform = default_transform();
    let sim = ShadowSimulation::new(&model, config, transform.as_ref())?;
    let result = sim.run(&CancelFlag::new())?;
    write_results_json(&output_path, &result)?;

    let records: Vec<Value> = serde_json::from_str(&std::fs::read_to_string(&output_path)?)?;
    assert_eq!(records.len(), result.num_points());
    let hours = sim.sun_table().num_samples() as f64;
    for rec in &records {
        let shadow = rec["shadow"].as_f64().unwrap();
        assert!((0.0..=hours).contains(&shadow));
        assert_eq!(rec["point"].as_array().map(|p| p.len()), Some(3));
    }
    // One day: the low roof is shadowed in every sampled hour
    let low_roof: Vec<&Value> = records
        .iter()
        .filter(|r| r["building_id"] == "low" && r["surface_type"] == "RoofSurface")
        .collect();
    assert!(!low_roof.is_empty());
    for rec in low_roof {
        assert_relative_eq!(rec["shadow"].as_f64().unwrap(), hours);
    }
    Ok(())
}

#[test]
fn missing_model_is_not_found() {
    let err = read_cityjson(std::path::Path::new("/nonexistent/model.city.json")).unwrap_err();
    assert!(matches!(err.downcast_ref::<ShadowError>(), Some(ShadowError::NotFound(_))));
}

/// Same boxes, with the extent placed in central Rotterdam (Dutch RD New).
fn rotterdam_city_json(boxes: &[(&str, [f64; 3], [f64; 3])]) -> Result<String> {
    let mut doc: Value = serde_json::from_str(&city_json(boxes))?;
    doc["metadata"]["geographicalExtent"] = json!([91990.0, 436990.0, 0.0, 92010.0, 437010.0, 10.0]);
    Ok(doc.to_string())
}

#[test]
fn location_from_model_crs() -> Result<()> {
    let model = from_cityjson_str(&rotterdam_city_json(&[("box", [0., 0., 0.], [10., 10., 6.])])?)?;
    let config = ShadowConfig {
        start_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        time_zone: Some("Europe/Amsterdam".to_string()),
        ..ShadowConfig::new()
    };
    let transform = default_transform();
    let sim = ShadowSimulation::new(&model, config, transform.as_ref())?;
    let location = sim.location().unwrap();
    assert!((location.latitude - 51.92).abs() < 0.05);
    assert!((location.longitude - 4.48).abs() < 0.05);

    // Same day with explicit coordinates gives the same sun table
    let explicit = ShadowConfig {
        latitude: Some(location.latitude),
        longitude: Some(location.longitude),
        utc_offset_hours: 1.0,
        start_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        ..ShadowConfig::new()
    };
    let other = ShadowSimulation::new(&model, explicit, &ProjTransform)?;
    assert_eq!(sim.sun_table(), other.sun_table());
    Ok(())
}

#[test]
fn unknown_model_crs_fails() -> Result<()> {
    let mut doc: Value = serde_json::from_str(&city_json(&[("box", [0., 0., 0.], [10., 10., 6.])]))?;
    doc["metadata"]["referenceSystem"] = json!("EPSG:999999");
    let model = from_cityjson_str(&doc.to_string())?;
    let err = ShadowSimulation::new(&model, ShadowConfig::new(), &ProjTransform)
        .err()
        .unwrap();
    assert!(matches!(err.downcast_ref::<ShadowError>(), Some(ShadowError::Transform(_))));
    Ok(())
}

#[test]
fn records_carry_surface_keys() -> Result<()> {
    let model = from_cityjson_str(&city_json(&[("low", [0., 0., 0.], [10., 10., 3.])]))?;
    let sim = ShadowSimulation::new(&model, winter_config(), &ProjTransform)?;
    let records = sim.run(&CancelFlag::new())?.records();
    assert!(!records.is_empty());
    for rec in &records {
        assert!(rec.surface.starts_with("low_geom_0_surface_"));
    }
    assert!(records
        .iter()
        .any(|r| r.surface == "low_geom_0_surface_1" && r.surface_type == "RoofSurface"));
    Ok(())
}
