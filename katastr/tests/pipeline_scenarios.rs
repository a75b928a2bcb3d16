//! Scénarios complets du pipeline sur une source en mémoire

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cuzk_shp::{Feature, FieldDescriptor, FieldType, FieldValue, Layer, Projection};
use geo::{polygon, Geometry};
use katastr::reproject_lite::{SmartReprojector, EPSG_SJTSK, EPSG_WGS84};
use katastr::{
    export_to, CadastreSource, Config, Dataset, DisplayAttribute, ExportFormat, FailurePolicy,
    KatastrError, Pipeline, Progress, SelectionStatus, Session, TargetCrs, UnitLayers,
};

const PRAHA_1: i64 = 727024;
const JOSEFOV: i64 = 727181;
const BRNO_MESTO: i64 = 610003;
/// Présente dans l'annuaire, archive absente
const MISSING: i64 = 999999;

/// Source en mémoire qui journalise chaque téléchargement
#[derive(Debug, Default)]
struct MemorySource {
    directories: HashMap<Dataset, Layer>,
    units: HashMap<i64, UnitLayers>,
    fetches: Mutex<Vec<String>>,
}

impl MemorySource {
    fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    fn count(&self, name: &str) -> usize {
        self.fetches().iter().filter(|f| *f == name).count()
    }
}

impl CadastreSource for MemorySource {
    async fn directory_layer(&self, dataset: Dataset) -> katastr::Result<Layer> {
        self.fetches.lock().unwrap().push(dataset.name().to_string());
        self.directories
            .get(&dataset)
            .cloned()
            .ok_or_else(|| KatastrError::HttpStatus {
                url: format!("memory://{}.zip", dataset.name()),
                status: 404,
            })
    }

    async fn unit_layers(&self, unit_code: i64) -> katastr::Result<UnitLayers> {
        self.fetches.lock().unwrap().push(unit_code.to_string());
        self.units
            .get(&unit_code)
            .cloned()
            .ok_or_else(|| KatastrError::HttpStatus {
                url: format!("memory://{}.zip", unit_code),
                status: 404,
            })
    }
}

fn descriptor(name: &str) -> FieldDescriptor {
    FieldDescriptor {
        name: name.to_string(),
        field_type: FieldType::Character,
        length: 64,
        decimals: 0,
    }
}

fn layer(name: &str, columns: &[&str], rows: Vec<(Option<Geometry>, Vec<FieldValue>)>) -> Layer {
    Layer {
        name: name.to_string(),
        fields: columns.iter().map(|c| descriptor(c)).collect(),
        features: rows
            .into_iter()
            .enumerate()
            .map(|(i, (geometry, values))| Feature {
                record: i as u32 + 1,
                geometry,
                properties: columns
                    .iter()
                    .map(|c| c.to_string())
                    .zip(values)
                    .collect(),
            })
            .collect(),
        projection: Some(Projection::SJTSK),
    }
}

fn text(s: &str) -> FieldValue {
    FieldValue::Character(s.to_string())
}

fn num(n: f64) -> FieldValue {
    FieldValue::Numeric(n)
}

/// Carré de 10 m en S-JTSK autour du centre de Prague
fn square(offset: f64) -> Geometry {
    let x = -743_000.0 + offset;
    let y = -1_043_000.0 + offset;
    Geometry::Polygon(polygon![
        (x: x, y: y),
        (x: x + 10.0, y: y),
        (x: x + 10.0, y: y + 10.0),
        (x: x, y: y + 10.0),
        (x: x, y: y),
    ])
}

/// (ID_2, druh pozemku, způsob využití, TEXT_KM)
type ParcelRow<'a> = (&'a str, f64, Option<f64>, &'a str);

fn unit(code: i64, parcels: &[ParcelRow<'_>], orphan_geometries: &[&str]) -> UnitLayers {
    let mut shapes: Vec<(Option<Geometry>, Vec<FieldValue>)> = parcels
        .iter()
        .enumerate()
        .map(|(i, (id, ..))| {
            (
                Some(square(i as f64 * 20.0)),
                vec![text(id), num(code as f64)],
            )
        })
        .collect();
    shapes.extend(
        orphan_geometries
            .iter()
            .map(|id| (Some(square(500.0)), vec![text(id), num(code as f64)])),
    );

    let details = parcels
        .iter()
        .map(|(id, land_type, land_use, label)| {
            (
                None,
                vec![
                    text(id),
                    num(*land_type),
                    land_use.map(num).unwrap_or(FieldValue::Null),
                    text(label),
                    num(1.0),
                    num(150.0),
                ],
            )
        })
        .collect();

    UnitLayers {
        geometries: layer("PARCELY_KN_P", &["ID_2", "KATUZE_KOD"], shapes),
        details: layer(
            "PARCELY_KN_DEF",
            &["ID_2", "DRUPOZ_KOD", "ZPVYPA_KOD", "TEXT_KM", "STAV_PARC", "VYMERA_PAR"],
            details,
        ),
    }
}

fn source() -> MemorySource {
    let mut directories = HashMap::new();
    directories.insert(
        Dataset::UnitDirectory,
        layer(
            "SC_SEZNAMKUKRA_DOTAZ",
            &["KU_KOD", "KU_NAZEV", "OBEC_KOD", "OBEC_NAZEV"],
            vec![
                (None, vec![num(727024.0), text("Praha 1"), num(500054.0), text("Praha")]),
                (None, vec![num(727181.0), text("Josefov"), num(500054.0), text("Praha")]),
                (None, vec![num(999999.0), text("Chybějící"), num(500054.0), text("Praha")]),
                (None, vec![num(610003.0), text("Město Brno"), num(582786.0), text("Brno")]),
            ],
        ),
    );
    let code_columns = ["KOD", "NAZEV", "ZKRATKA"];
    directories.insert(
        Dataset::LandTypes,
        layer(
            "SC_D_POZEMKU",
            &code_columns,
            vec![
                (None, vec![text("2"), text("orná půda"), text("orná")]),
                (None, vec![text("13"), text("zastavěná plocha a nádvoří"), text("zast. pl.")]),
                (None, vec![text("14"), text("ostatní plocha"), text("ostat.pl.")]),
            ],
        ),
    );
    directories.insert(
        Dataset::LandUses,
        layer(
            "SC_ZP_VYUZITI_POZ",
            &code_columns,
            vec![
                (None, vec![text("17"), text("silnice"), FieldValue::Null]),
                (None, vec![text("19"), text("zeleň"), FieldValue::Null]),
            ],
        ),
    );

    let mut units = HashMap::new();
    units.insert(
        PRAHA_1,
        unit(
            PRAHA_1,
            &[
                ("2207730101", 13.0, None, "1"),
                ("2207731101", 14.0, Some(17.0), "1001/2"),
                ("2207732101", 14.0, Some(19.0), "1002"),
                ("2207733101", 2.0, None, "1003"),
            ],
            &["2207739999"],
        ),
    );
    units.insert(
        JOSEFOV,
        unit(
            JOSEFOV,
            &[("2207810101", 13.0, None, "5"), ("2207811101", 14.0, Some(17.0), "6")],
            &[],
        ),
    );
    units.insert(
        BRNO_MESTO,
        unit(BRNO_MESTO, &[("3107810101", 2.0, None, "77")], &[]),
    );

    MemorySource {
        directories,
        units,
        fetches: Mutex::new(Vec::new()),
    }
}

fn pipeline_with(config: Config) -> Pipeline<MemorySource> {
    Pipeline::new(source(), config)
}

fn pipeline() -> Pipeline<MemorySource> {
    pipeline_with(Config::default())
}

#[tokio::test]
async fn test_praha_scenario() {
    let mut session = Session::new(pipeline());

    let labels = session.load_directory().await.unwrap();
    assert!(labels.contains(&"Praha (500054)".to_string()));

    let names = session.choose_municipalities(&["Praha (500054)"]);
    assert!(names.contains(&"Praha 1".to_string()));
    assert_eq!(session.choose_units(&["Praha 1"]), vec![PRAHA_1]);

    session.choose_attribute(DisplayAttribute::LandTypeName);
    let set = session.refresh(|_| {}).await.unwrap();
    assert_eq!(set.len(), 4);
    assert_eq!(set.display.len(), 4);
    assert!(set.parcels.iter().all(|p| p.municipality_code == Some(500054)));
    assert_eq!(set.report.status, SelectionStatus::Success);
    assert_eq!(set.report.by_unit[&PRAHA_1].missing_detail, 1);

    let legend = session.legend().unwrap();
    assert!(!legend.is_empty());
    assert_eq!(legend.entries[0].category, "zastavěná plocha a nádvoří");

    let layer = session.map_layer().unwrap();
    assert!(layer.show_layer_control);
    assert!((14.0..15.0).contains(&layer.center.x));
    assert!((49.5..50.5).contains(&layer.center.y));

    let table = session.table().unwrap();
    assert_eq!(table.len(), 4);
    assert!(table.column_index("STAV_PARC").is_none());
}

#[tokio::test]
async fn test_zero_units_fetches_nothing() {
    let pipeline = pipeline();
    let mut calls = 0;
    let set = pipeline
        .build_unified_set(&[], |_| calls += 1)
        .await
        .unwrap();

    assert!(set.is_empty());
    assert_eq!(set.report.status, SelectionStatus::Empty);
    assert_eq!(calls, 0);
    assert!(pipeline.source().fetches().is_empty());

    // Même comportement via la session: ni carte ni export
    let mut session = Session::new(pipeline);
    session.load_directory().await.unwrap();
    session.choose_municipalities(&["Praha (500054)"]);
    assert!(session.choose_units::<&str>(&[]).is_empty());

    let set = session.refresh(|_| {}).await.unwrap();
    assert!(set.is_empty());
    assert!(session.map_layer().is_none());
    assert!(session.legend().is_none());
    assert!(session
        .export(ExportFormat::GeoJson, TargetCrs::Wgs84)
        .await
        .unwrap()
        .is_none());
    assert_eq!(session.pipeline().source().fetches(), vec!["SC_SEZNAMKUKRA_DOTAZ"]);
}

#[tokio::test]
async fn test_every_joined_land_type_resolves() {
    let pipeline = pipeline();
    let land_types = pipeline.load_land_type_directory().await.unwrap();

    for code in [PRAHA_1, JOSEFOV, BRNO_MESTO] {
        let joined = pipeline.fetch_and_join(code).await.unwrap();
        assert!(!joined.parcels.is_empty());
        for parcel in &joined.parcels {
            let entry = land_types.get(parcel.land_type_code).unwrap();
            assert_eq!(entry.name, parcel.land_type_name);
        }
    }
}

#[tokio::test]
async fn test_unit_order_does_not_change_records() {
    let summary = |set: &katastr::UnifiedParcelSet| {
        let mut records: Vec<(String, String, String)> = set
            .parcels
            .iter()
            .map(|p| {
                (
                    p.id.clone(),
                    p.land_type_name.clone(),
                    p.land_use_display().to_string(),
                )
            })
            .collect();
        records.sort();
        records
    };

    let ab = pipeline()
        .build_unified_set(&[PRAHA_1, JOSEFOV], |_| {})
        .await
        .unwrap();
    let ba = pipeline()
        .build_unified_set(&[JOSEFOV, PRAHA_1], |_| {})
        .await
        .unwrap();

    assert_eq!(ab.len(), 6);
    assert_eq!(summary(&ab), summary(&ba));
    assert_eq!(ab.unit_codes, vec![PRAHA_1, JOSEFOV]);
    assert_eq!(ba.unit_codes, vec![JOSEFOV, PRAHA_1]);
}

#[tokio::test]
async fn test_fetch_and_join_is_memoized() {
    let pipeline = pipeline();
    for _ in 0..3 {
        pipeline
            .build_unified_set(&[PRAHA_1, JOSEFOV], |_| {})
            .await
            .unwrap();
    }

    let source = pipeline.source();
    assert_eq!(source.count("727024"), 1);
    assert_eq!(source.count("727181"), 1);
    assert_eq!(source.count("SC_D_POZEMKU"), 1);
    assert_eq!(source.count("SC_ZP_VYUZITI_POZ"), 1);
    assert_eq!(source.count("SC_SEZNAMKUKRA_DOTAZ"), 1);
}

#[tokio::test]
async fn test_progress_follows_submission_order() {
    let pipeline = pipeline();
    let mut steps: Vec<Progress> = Vec::new();
    pipeline
        .build_unified_set(&[JOSEFOV, BRNO_MESTO, PRAHA_1], |p| steps.push(p))
        .await
        .unwrap();

    assert_eq!(
        steps.iter().map(|p| (p.completed, p.unit_code)).collect::<Vec<_>>(),
        vec![(1, JOSEFOV), (2, BRNO_MESTO), (3, PRAHA_1)]
    );
    assert!(steps.iter().all(|p| p.total == 3));
    assert_eq!(steps[2].fraction(), 1.0);
}

#[tokio::test]
async fn test_abort_policy_keeps_cached_units() {
    let pipeline = pipeline();
    let err = pipeline
        .build_unified_set(&[PRAHA_1, MISSING, JOSEFOV], |_| {})
        .await
        .unwrap_err();
    assert!(err.is_network());
    // La unité suivante n'est pas téléchargée
    assert_eq!(pipeline.source().count("727181"), 0);

    let set = pipeline.build_unified_set(&[PRAHA_1], |_| {}).await.unwrap();
    assert_eq!(set.len(), 4);
    assert_eq!(pipeline.source().count("727024"), 1);
}

#[tokio::test]
async fn test_skip_policy_reports_failed_unit() {
    let config = Config {
        failure_policy: FailurePolicy::Skip,
        ..Config::default()
    };
    let pipeline = pipeline_with(config);

    let mut steps = 0;
    let set = pipeline
        .build_unified_set(&[PRAHA_1, MISSING, JOSEFOV], |_| steps += 1)
        .await
        .unwrap();

    assert_eq!(steps, 3);
    assert_eq!(set.len(), 6);
    assert_eq!(set.unit_codes, vec![PRAHA_1, JOSEFOV]);
    assert_eq!(set.report.status, SelectionStatus::PartialSuccess);
    assert_eq!(set.report.failures.len(), 1);
    assert_eq!(set.report.failures[0].unit_code, MISSING);
    assert!(set.report.failures[0].network);
}

#[tokio::test]
async fn test_unit_outside_directory() {
    let err = pipeline()
        .build_unified_set(&[123], |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, KatastrError::UnknownUnit(123)));
}

#[tokio::test]
async fn test_soft_unit_limit_warns_only() {
    let config = Config {
        soft_unit_limit: 1,
        ..Config::default()
    };
    let set = pipeline_with(config)
        .build_unified_set(&[PRAHA_1, JOSEFOV], |_| {})
        .await
        .unwrap();

    assert_eq!(set.len(), 6);
    assert_eq!(set.report.warnings.len(), 1);
    assert!(set.report.warnings[0].contains("2 units"));
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_set() {
    let mut session = Session::new(pipeline());
    session.load_directory().await.unwrap();
    session.choose_municipalities(&["Praha (500054)"]);
    session.choose_units(&["Praha 1"]);
    session.refresh(|_| {}).await.unwrap();

    session.choose_units(&["Praha 1", "Chybějící"]);
    assert!(session.refresh(|_| {}).await.is_err());

    let set = session.current_set().unwrap();
    assert_eq!(set.unit_codes, vec![PRAHA_1]);
    assert!(session.map_layer().is_some());
}

#[tokio::test]
async fn test_changing_municipalities_drops_stale_units() {
    let mut session = Session::new(pipeline());
    session.load_directory().await.unwrap();
    session.choose_municipalities(&["Praha (500054)"]);
    session.choose_units(&["Josefov"]);
    assert_eq!(session.selected_units(), vec![JOSEFOV]);

    let names = session.choose_municipalities(&["Brno (582786)"]);
    assert_eq!(names, vec!["Město Brno".to_string()]);
    assert!(session.selected_units().is_empty());
}

#[tokio::test]
async fn test_export_is_deterministic() {
    let first = pipeline()
        .build_unified_set(&[PRAHA_1, JOSEFOV], |_| {})
        .await
        .unwrap();
    let second = pipeline()
        .build_unified_set(&[PRAHA_1, JOSEFOV], |_| {})
        .await
        .unwrap();
    let viewer = Config::default().viewer_url;

    for format in ExportFormat::ALL {
        for crs in [TargetCrs::Sjtsk, TargetCrs::Wgs84] {
            let a = export_to(&first, format, crs, &viewer).unwrap();
            let b = export_to(&second, format, crs, &viewer).unwrap();
            assert_eq!(a.bytes, b.bytes, "{} / {}", format, crs);
        }
    }
}

#[tokio::test]
async fn test_export_is_cached_per_format_and_crs() {
    let pipeline = pipeline();
    let set = pipeline.build_unified_set(&[PRAHA_1], |_| {}).await.unwrap();

    let a = pipeline.export(&set, ExportFormat::GeoJson, TargetCrs::Wgs84).await.unwrap();
    let b = pipeline.export(&set, ExportFormat::GeoJson, TargetCrs::Wgs84).await.unwrap();
    let c = pipeline.export(&set, ExportFormat::GeoJson, TargetCrs::Sjtsk).await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));

    // Le CRS n'a pas d'effet sur le CSV
    let d = pipeline.export(&set, ExportFormat::Csv, TargetCrs::Wgs84).await.unwrap();
    let e = pipeline.export(&set, ExportFormat::Csv, TargetCrs::Sjtsk).await.unwrap();
    assert!(Arc::ptr_eq(&d, &e));
}

#[tokio::test]
async fn test_edited_set_gets_fresh_export() {
    let pipeline = pipeline();
    let set = pipeline.build_unified_set(&[PRAHA_1], |_| {}).await.unwrap();
    let before = pipeline.export(&set, ExportFormat::Csv, TargetCrs::Sjtsk).await.unwrap();

    let mut edited = set.clone();
    edited.parcels[0].label = Some("999/9".to_string());
    let after = pipeline.export(&edited, ExportFormat::Csv, TargetCrs::Sjtsk).await.unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert_ne!(before.bytes, after.bytes);
    assert!(String::from_utf8_lossy(&after.bytes).contains("999/9"));
    assert!(!String::from_utf8_lossy(&before.bytes).contains("999/9"));
}

fn positions(value: &serde_json::Value, out: &mut Vec<(f64, f64)>) {
    if let Some(items) = value.as_array() {
        match (items.first().and_then(|v| v.as_f64()), items.get(1).and_then(|v| v.as_f64())) {
            (Some(x), Some(y)) => out.push((x, y)),
            _ => items.iter().for_each(|item| positions(item, out)),
        }
    }
}

#[tokio::test]
async fn test_wgs84_geojson_and_csv() {
    let mut session = Session::new(pipeline());
    session.load_directory().await.unwrap();
    session.choose_municipalities(&["Praha (500054)"]);
    session.choose_units(&["Praha 1", "Josefov"]);
    session.refresh(|_| {}).await.unwrap();

    let geojson = session
        .export(ExportFormat::GeoJson, TargetCrs::Wgs84)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(geojson.name, "parcely_kn.geojson");
    assert_eq!(geojson.mime, "application/geo+json");

    let json: serde_json::Value = serde_json::from_slice(&geojson.bytes).unwrap();
    let features = json["features"].as_array().unwrap();
    assert_eq!(features.len(), 6);

    let mut coords = Vec::new();
    for feature in features {
        positions(&feature["geometry"]["coordinates"], &mut coords);
    }
    assert!(!coords.is_empty());
    for (lon, lat) in coords {
        assert!((-180.0..=180.0).contains(&lon), "lon {}", lon);
        assert!((-90.0..=90.0).contains(&lat), "lat {}", lat);
        // Prague
        assert!((14.3..14.6).contains(&lon) && (49.9..50.2).contains(&lat));
    }

    let csv = session
        .export(ExportFormat::Csv, TargetCrs::Wgs84)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(csv.mime, "text/csv");
    let text = std::str::from_utf8(&csv.bytes).unwrap();
    let header = text.lines().next().unwrap();
    assert!(header.split(',').any(|c| c == "ODKAZ_NAHLIZENI"));
    assert!(!header.to_lowercase().contains("geom"));
    assert!(text.contains("https://nahlizenidokn.cuzk.cz/ZobrazObjekt.aspx?typ=Parcela&id=2207730101"));
    assert_eq!(text.lines().count(), 7);
}

#[tokio::test]
async fn test_display_geometry_round_trip() {
    let set = pipeline()
        .build_unified_set(&[PRAHA_1], |_| {})
        .await
        .unwrap();
    let back = SmartReprojector::new(EPSG_WGS84, EPSG_SJTSK).unwrap();

    for (parcel, display) in set.iter_display() {
        let projected = back.transform_geometry(display).unwrap();
        let (Geometry::Polygon(original), Geometry::Polygon(restored)) = (&parcel.geometry, &projected)
        else {
            panic!("expected polygons");
        };
        for (a, b) in original.exterior().coords().zip(restored.exterior().coords()) {
            assert!((a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3);
        }
    }
}

#[tokio::test]
async fn test_outline_attribute_groups_by_municipality() {
    let mut session = Session::new(pipeline());
    session.load_directory().await.unwrap();
    session.choose_municipalities(&["Praha (500054)", "Brno (582786)"]);
    session.choose_units(&["Praha 1", "Město Brno"]);
    session.choose_attribute(DisplayAttribute::MunicipalityCode);
    session.refresh(|_| {}).await.unwrap();

    let legend = session.legend().unwrap();
    let categories: Vec<&str> = legend.entries.iter().map(|e| e.category.as_str()).collect();
    assert_eq!(categories, vec!["500054", "582786"]);
    assert!(!session.map_layer().unwrap().show_layer_control);
}

#[test]
fn test_land_use_placeholder_category() {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let set = runtime
        .block_on(pipeline().build_unified_set(&[PRAHA_1], |_| {}))
        .unwrap();

    let categories = katastr::categorize(&set.parcels, DisplayAttribute::LandUseName);
    assert_eq!(categories, vec![katastr::NO_LAND_USE, "silnice", "zeleň"]);
}
