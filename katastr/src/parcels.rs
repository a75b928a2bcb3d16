//! Jointure des couches de parcelles d'une unité avec les číselníky
//!
//! 1. géométries (`PARCELY_KN_P`) ⋈ détails (`PARCELY_KN_DEF`) sur `ID_2` (interne)
//! 2. ⋈ druhy pozemků sur `DRUPOZ_KOD` (interne)
//! 3. ⟕ způsoby využití sur `ZPVYPA_KOD` (externe gauche)

use std::collections::{BTreeMap, HashMap};

use cuzk_shp::{Feature, FieldValue, Layer};
use geo::Geometry;
use serde::Serialize;

use crate::directory::CodeDirectory;
use crate::error::{KatastrError, Result};
use crate::source::{UnitLayers, DETAIL_LAYER, GEOMETRY_LAYER};

/// Catégorie affichée pour les parcelles sans způsob využití
pub const NO_LAND_USE: &str = "bez uvedení";

pub const PARCEL_ID: &str = "ID_2";
pub const UNIT_CODE: &str = "KATUZE_KOD";
pub const LAND_TYPE_CODE: &str = "DRUPOZ_KOD";
pub const LAND_USE_CODE: &str = "ZPVYPA_KOD";
pub const LABEL: &str = "TEXT_KM";

/// Colonnes portées par les champs typés de `ParcelRecord`
const STRUCTURED_COLUMNS: [&str; 5] = [PARCEL_ID, UNIT_CODE, LAND_TYPE_CODE, LAND_USE_CODE, LABEL];

/// Une parcelle jointe
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelRecord {
    /// ID_2
    pub id: String,
    /// KATUZE_KOD
    pub unit_code: i64,
    /// OBEC_KOD, renseigné lors de la construction de la sélection
    pub municipality_code: Option<i64>,
    pub land_type_code: i64,
    pub land_type_name: String,
    pub land_type_abbreviation: Option<String>,
    pub land_use_code: Option<i64>,
    /// None si le code est absent ou inconnu du číselník
    pub land_use_name: Option<String>,
    pub land_use_abbreviation: Option<String>,
    /// TEXT_KM (numéro de parcelle affiché en infobulle)
    pub label: Option<String>,
    /// Géométrie en S-JTSK (EPSG:5514)
    pub geometry: Geometry,
    /// Autres attributs des deux couches (les détails priment)
    pub attributes: BTreeMap<String, FieldValue>,
}

impl ParcelRecord {
    /// Nom du způsob využití, ou la catégorie de repli
    pub fn land_use_display(&self) -> &str {
        self.land_use_name.as_deref().unwrap_or(NO_LAND_USE)
    }
}

/// Compteurs de la jointure d'une unité
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JoinStats {
    pub geometry_rows: usize,
    pub detail_rows: usize,
    /// Parcelles jointes conservées
    pub joined: usize,
    /// Formes nulles dans PARCELY_KN_P
    pub missing_geometry: usize,
    /// Géométries sans ligne de détail (ID_2 absent de PARCELY_KN_DEF)
    pub missing_detail: usize,
    /// Lignes dont le druh pozemku est absent ou inconnu
    pub unknown_land_type: usize,
    /// Lignes conservées sans způsob využití résolu
    pub unresolved_land_use: usize,
    /// ID_2 répétés dans PARCELY_KN_DEF (première ligne conservée)
    pub duplicate_details: usize,
}

impl JoinStats {
    /// Lignes de géométrie écartées par les jointures internes
    pub fn dropped(&self) -> usize {
        self.missing_geometry + self.missing_detail + self.unknown_land_type
    }
}

/// Résultat de la jointure d'une unité
#[derive(Debug, Clone, Default)]
pub struct JoinedUnit {
    pub unit_code: i64,
    pub parcels: Vec<ParcelRecord>,
    pub stats: JoinStats,
}

/// Joint les couches d'une unité avec les deux číselníky
///
/// L'ordre de sortie suit celui de la couche des géométries.
pub fn join_unit(
    unit_code: i64,
    layers: &UnitLayers,
    land_types: &CodeDirectory,
    land_uses: &CodeDirectory,
) -> Result<JoinedUnit> {
    let geometries = &layers.geometries;
    let details = &layers.details;
    require_column(unit_code, GEOMETRY_LAYER, geometries, PARCEL_ID)?;
    require_column(unit_code, DETAIL_LAYER, details, PARCEL_ID)?;
    for column in [LAND_TYPE_CODE, LAND_USE_CODE] {
        if !details.has_field(column) && !geometries.has_field(column) {
            require_column(unit_code, DETAIL_LAYER, details, column)?;
        }
    }

    let mut stats = JoinStats {
        geometry_rows: geometries.len(),
        detail_rows: details.len(),
        ..JoinStats::default()
    };

    // Index des détails par ID_2 (première occurrence)
    let mut by_id: HashMap<String, &Feature> = HashMap::with_capacity(details.len());
    for feature in &details.features {
        let Some(id) = feature.text(PARCEL_ID) else {
            continue;
        };
        if by_id.contains_key(&id) {
            stats.duplicate_details += 1;
            continue;
        }
        by_id.insert(id, feature);
    }

    let mut parcels = Vec::with_capacity(geometries.len());
    for shape in &geometries.features {
        let Some(geometry) = shape.geometry.clone() else {
            stats.missing_geometry += 1;
            continue;
        };
        let Some(id) = shape.text(PARCEL_ID) else {
            stats.missing_detail += 1;
            continue;
        };
        let Some(detail) = by_id.get(&id).copied() else {
            stats.missing_detail += 1;
            continue;
        };

        let value = |column| pick(detail, shape, column);

        let Some(land_type) = value(LAND_TYPE_CODE)
            .and_then(FieldValue::as_i64)
            .and_then(|code| land_types.get(code))
        else {
            stats.unknown_land_type += 1;
            continue;
        };

        let land_use_code = value(LAND_USE_CODE).and_then(FieldValue::as_i64);
        let land_use = land_use_code.and_then(|code| land_uses.get(code));
        if land_use.is_none() {
            stats.unresolved_land_use += 1;
        }

        let mut attributes = BTreeMap::new();
        for (key, v) in shape.properties.iter().chain(detail.properties.iter()) {
            if !STRUCTURED_COLUMNS.contains(&key.as_str()) {
                attributes.insert(key.clone(), v.clone());
            }
        }

        parcels.push(ParcelRecord {
            id,
            unit_code: value(UNIT_CODE)
                .and_then(FieldValue::as_i64)
                .unwrap_or(unit_code),
            municipality_code: None,
            land_type_code: land_type.code,
            land_type_name: land_type.name.clone(),
            land_type_abbreviation: land_type.abbreviation.clone(),
            land_use_code,
            land_use_name: land_use.map(|e| e.name.clone()),
            land_use_abbreviation: land_use.and_then(|e| e.abbreviation.clone()),
            label: value(LABEL).and_then(FieldValue::as_text),
            geometry,
            attributes,
        });
    }
    stats.joined = parcels.len();

    if stats.dropped() > 0 {
        tracing::warn!(
            unit = unit_code,
            missing_geometry = stats.missing_geometry,
            missing_detail = stats.missing_detail,
            unknown_land_type = stats.unknown_land_type,
            "Parcels dropped by join"
        );
    }
    tracing::debug!(unit = unit_code, joined = stats.joined, stats = ?stats, "Unit joined");

    Ok(JoinedUnit {
        unit_code,
        parcels,
        stats,
    })
}

/// Valeur non nulle d'une colonne, la ligne de détail d'abord
fn pick<'a>(detail: &'a Feature, shape: &'a Feature, column: &str) -> Option<&'a FieldValue> {
    detail
        .get(column)
        .filter(|v| !v.is_null())
        .or_else(|| shape.get(column).filter(|v| !v.is_null()))
}

fn require_column(unit_code: i64, layer_name: &str, layer: &Layer, column: &str) -> Result<()> {
    if layer.has_field(column) {
        Ok(())
    } else {
        Err(KatastrError::schema(
            format!("{}/{}", unit_code, layer_name),
            format!("missing column {}", column),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::CodeEntry;
    use cuzk_shp::{FieldDescriptor, FieldType};
    use geo::polygon;

    fn descriptors(names: &[&str]) -> Vec<FieldDescriptor> {
        names
            .iter()
            .map(|n| FieldDescriptor {
                name: n.to_string(),
                field_type: FieldType::Character,
                length: 20,
                decimals: 0,
            })
            .collect()
    }

    fn props(pairs: &[(&str, FieldValue)]) -> BTreeMap<String, FieldValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn square() -> Geometry {
        Geometry::Polygon(polygon![
            (x: -743_000.0, y: -1_043_000.0),
            (x: -743_000.0, y: -1_042_990.0),
            (x: -742_990.0, y: -1_042_990.0),
            (x: -743_000.0, y: -1_043_000.0),
        ])
    }

    fn shape(record: u32, id: &str) -> Feature {
        Feature {
            record,
            geometry: Some(square()),
            properties: props(&[
                ("ID_2", FieldValue::Character(id.into())),
                ("KATUZE_KOD", FieldValue::Numeric(727024.0)),
            ]),
        }
    }

    fn detail(id: &str, land_type: f64, land_use: Option<f64>, label: &str) -> Feature {
        Feature {
            record: 0,
            geometry: None,
            properties: props(&[
                ("ID_2", FieldValue::Character(id.into())),
                ("DRUPOZ_KOD", FieldValue::Numeric(land_type)),
                (
                    "ZPVYPA_KOD",
                    land_use.map(FieldValue::Numeric).unwrap_or(FieldValue::Null),
                ),
                ("TEXT_KM", FieldValue::Character(label.into())),
                ("STAV_PARC", FieldValue::Numeric(1.0)),
            ]),
        }
    }

    fn directories() -> (CodeDirectory, CodeDirectory) {
        let land_types = CodeDirectory::new(
            "SC_D_POZEMKU",
            [
                CodeEntry {
                    code: 13,
                    name: "zastavěná plocha a nádvoří".into(),
                    abbreviation: Some("zast. pl.".into()),
                },
                CodeEntry {
                    code: 14,
                    name: "ostatní plocha".into(),
                    abbreviation: Some("ostat.pl.".into()),
                },
            ],
        );
        let land_uses = CodeDirectory::new(
            "SC_ZP_VYUZITI_POZ",
            [CodeEntry {
                code: 17,
                name: "silnice".into(),
                abbreviation: None,
            }],
        );
        (land_types, land_uses)
    }

    fn layers(shapes: Vec<Feature>, details: Vec<Feature>) -> UnitLayers {
        UnitLayers {
            geometries: Layer {
                name: GEOMETRY_LAYER.into(),
                fields: descriptors(&["ID_2", "KATUZE_KOD"]),
                features: shapes,
                projection: None,
            },
            details: Layer {
                name: DETAIL_LAYER.into(),
                fields: descriptors(&["ID_2", "DRUPOZ_KOD", "ZPVYPA_KOD", "TEXT_KM", "STAV_PARC"]),
                features: details,
                projection: None,
            },
        }
    }

    #[test]
    fn test_join_resolves_codes() {
        let (land_types, land_uses) = directories();
        let layers = layers(
            vec![shape(1, "100"), shape(2, "200")],
            vec![
                detail("200", 14.0, Some(17.0), "1001/2"),
                detail("100", 13.0, None, "15"),
            ],
        );

        let joined = join_unit(727024, &layers, &land_types, &land_uses).unwrap();
        assert_eq!(joined.parcels.len(), 2);

        // Ordre de la couche des géométries
        let first = &joined.parcels[0];
        assert_eq!(first.id, "100");
        assert_eq!(first.unit_code, 727024);
        assert_eq!(first.land_type_name, "zastavěná plocha a nádvoří");
        assert_eq!(first.land_use_name, None);
        assert_eq!(first.land_use_display(), NO_LAND_USE);
        assert_eq!(first.label.as_deref(), Some("15"));
        assert!(first.attributes.contains_key("STAV_PARC"));
        assert!(!first.attributes.contains_key("ID_2"));

        let second = &joined.parcels[1];
        assert_eq!(second.land_use_name.as_deref(), Some("silnice"));
        assert_eq!(second.land_type_abbreviation.as_deref(), Some("ostat.pl."));

        assert_eq!(joined.stats.unresolved_land_use, 1);
        assert_eq!(joined.stats.dropped(), 0);
    }

    #[test]
    fn test_join_drops_are_counted() {
        let (land_types, land_uses) = directories();
        let mut null_shape = shape(4, "400");
        null_shape.geometry = None;
        let layers = layers(
            vec![shape(1, "100"), shape(2, "200"), shape(3, "300"), null_shape],
            vec![
                detail("100", 13.0, Some(99.0), "1"),
                detail("100", 14.0, None, "1-dup"),
                // Druh pozemku inconnu
                detail("200", 2.0, None, "2"),
                detail("400", 13.0, None, "4"),
            ],
        );

        let joined = join_unit(727024, &layers, &land_types, &land_uses).unwrap();
        assert_eq!(joined.parcels.len(), 1);
        assert_eq!(joined.parcels[0].land_type_code, 13);
        // Code 99 inconnu: conservé, sans nom
        assert_eq!(joined.parcels[0].land_use_code, Some(99));
        assert_eq!(joined.parcels[0].land_use_name, None);

        let stats = joined.stats;
        assert_eq!(stats.geometry_rows, 4);
        assert_eq!(stats.detail_rows, 4);
        assert_eq!(stats.duplicate_details, 1);
        assert_eq!(stats.unknown_land_type, 1);
        assert_eq!(stats.missing_detail, 1);
        assert_eq!(stats.missing_geometry, 1);
        assert_eq!(stats.unresolved_land_use, 1);
        assert_eq!(stats.dropped(), 3);
    }

    #[test]
    fn test_every_joined_land_type_resolves() {
        let (land_types, land_uses) = directories();
        let layers = layers(
            (1..=20).map(|i| shape(i, &i.to_string())).collect(),
            (1..=20)
                .map(|i| detail(&i.to_string(), f64::from(i % 16), None, "x"))
                .collect(),
        );

        let joined = join_unit(727024, &layers, &land_types, &land_uses).unwrap();
        assert!(!joined.parcels.is_empty());
        assert!(joined
            .parcels
            .iter()
            .all(|p| land_types.get(p.land_type_code).is_some()));
    }

    #[test]
    fn test_missing_join_column() {
        let (land_types, land_uses) = directories();
        let mut layers = layers(vec![], vec![]);
        layers.details.fields = descriptors(&["DRUPOZ_KOD"]);

        match join_unit(727024, &layers, &land_types, &land_uses) {
            Err(KatastrError::Schema { dataset, reason }) => {
                assert_eq!(dataset, "727024/PARCELY_KN_DEF");
                assert!(reason.contains("ID_2"));
            }
            other => panic!("Expected Schema error, got {:?}", other),
        }
    }
}
