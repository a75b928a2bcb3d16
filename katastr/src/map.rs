//! Modèle de la couche cartographique (le rendu est laissé au client web)
//!
//! Une couche par catégorie, chaque parcelle portant son style et son
//! infobulle. Sérialisable en FeatureCollection GeoJSON stylée.

use geo::{BoundingRect, Centroid, Coord, Rect};
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use serde::Serialize;
use serde_json::json;

use crate::selection::UnifiedParcelSet;
use crate::style::{DisplayAttribute, Legend};

/// Style d'un polygone de parcelle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelStyle {
    pub fill_color: &'static str,
    pub fill_opacity: f64,
    /// Opacité du contour
    pub opacity: f64,
    /// Couleur du contour
    pub color: &'static str,
    pub weight: u32,
}

impl ParcelStyle {
    pub fn filled(fill_color: &'static str) -> Self {
        Self {
            fill_color,
            fill_opacity: 0.5,
            opacity: 0.2,
            color: "black",
            weight: 1,
        }
    }
}

/// Groupe de parcelles d'une catégorie
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerGroup {
    /// Nom affiché dans le contrôle des couches (pastille HTML + catégorie)
    pub name: String,
    pub category: String,
    pub style: ParcelStyle,
    /// Indices dans `UnifiedParcelSet::parcels`
    pub parcels: Vec<usize>,
}

/// Couche cartographique d'une sélection
#[derive(Debug, Clone, PartialEq)]
pub struct MapLayer {
    pub attribute: DisplayAttribute,
    /// Moyenne des centroïdes (lon, lat)
    pub center: Coord,
    /// Emprise de toutes les parcelles
    pub bounds: Rect,
    pub groups: Vec<LayerGroup>,
    pub show_layer_control: bool,
}

impl MapLayer {
    /// Construit la couche; None pour un ensemble vide
    pub fn build(set: &UnifiedParcelSet, attribute: DisplayAttribute) -> Option<Self> {
        if set.is_empty() || set.display.len() != set.parcels.len() {
            return None;
        }

        let centroids: Vec<Coord> = set
            .display
            .iter()
            .filter_map(|g| g.centroid())
            .map(|p| p.0)
            .collect();
        if centroids.is_empty() {
            return None;
        }
        let n = centroids.len() as f64;
        let center = Coord {
            x: centroids.iter().map(|c| c.x).sum::<f64>() / n,
            y: centroids.iter().map(|c| c.y).sum::<f64>() / n,
        };

        let bounds = set
            .display
            .iter()
            .filter_map(|g| g.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                    (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
                )
            })?;

        let legend = Legend::build(&set.parcels, attribute);
        let mut groups: Vec<LayerGroup> = legend
            .entries
            .iter()
            .map(|entry| LayerGroup {
                name: entry.swatch_html(),
                category: entry.category.clone(),
                style: ParcelStyle::filled(entry.color),
                parcels: Vec::with_capacity(entry.count),
            })
            .collect();

        for (i, parcel) in set.parcels.iter().enumerate() {
            let category = attribute.value_of(parcel);
            if let Some(group) = groups.iter_mut().find(|g| g.category == category) {
                group.parcels.push(i);
            }
        }

        tracing::debug!(
            attribute = attribute.column(),
            groups = groups.len(),
            parcels = set.len(),
            "Map layer built"
        );

        Some(Self {
            attribute,
            center,
            bounds,
            groups,
            show_layer_control: attribute.shows_layer_control(),
        })
    }

    /// FeatureCollection GeoJSON: style et infobulle en propriétés, groupes
    /// et vue initiale en membres étrangers
    pub fn to_geojson(&self, set: &UnifiedParcelSet) -> FeatureCollection {
        let mut features = Vec::with_capacity(set.len());

        for group in &self.groups {
            for &index in &group.parcels {
                let (Some(parcel), Some(geometry)) = (set.parcels.get(index), set.display.get(index))
                else {
                    continue;
                };

                let mut properties = JsonObject::new();
                properties.insert("ID_2".into(), json!(parcel.id));
                properties.insert("tooltip".into(), json!(parcel.label));
                properties.insert("category".into(), json!(group.category));
                properties.insert("fillColor".into(), json!(group.style.fill_color));
                properties.insert("fillOpacity".into(), json!(group.style.fill_opacity));
                properties.insert("opacity".into(), json!(group.style.opacity));
                properties.insert("color".into(), json!(group.style.color));
                properties.insert("weight".into(), json!(group.style.weight));

                features.push(Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(geojson::Value::from(geometry))),
                    id: Some(geojson::feature::Id::String(parcel.id.clone())),
                    properties: Some(properties),
                    foreign_members: None,
                });
            }
        }

        let mut members = JsonObject::new();
        members.insert("attribute".into(), json!(self.attribute.label()));
        members.insert("center".into(), json!([self.center.x, self.center.y]));
        members.insert(
            "groups".into(),
            JsonValue::Array(
                self.groups
                    .iter()
                    .map(|g| json!({ "name": g.name, "category": g.category, "color": g.style.fill_color, "count": g.parcels.len() }))
                    .collect(),
            ),
        );
        members.insert("layerControl".into(), json!(self.show_layer_control));

        FeatureCollection {
            bbox: Some(vec![
                self.bounds.min().x,
                self.bounds.min().y,
                self.bounds.max().x,
                self.bounds.max().y,
            ]),
            features,
            foreign_members: Some(members),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parcels::ParcelRecord;
    use geo::{polygon, Geometry};

    fn parcel(id: &str, land_type: &str, municipality: i64) -> ParcelRecord {
        ParcelRecord {
            id: id.into(),
            unit_code: 727024,
            municipality_code: Some(municipality),
            land_type_code: 0,
            land_type_name: land_type.into(),
            land_type_abbreviation: None,
            land_use_code: None,
            land_use_name: None,
            land_use_abbreviation: None,
            label: Some(format!("{}/1", id)),
            geometry: Geometry::Point(geo::Point::new(0.0, 0.0)),
            attributes: Default::default(),
        }
    }

    fn square(x: f64, y: f64) -> Geometry {
        Geometry::Polygon(polygon![
            (x: x, y: y),
            (x: x + 0.002, y: y),
            (x: x + 0.002, y: y + 0.002),
            (x: x, y: y + 0.002),
            (x: x, y: y),
        ])
    }

    fn set() -> UnifiedParcelSet {
        UnifiedParcelSet {
            unit_codes: vec![727024],
            parcels: vec![
                parcel("1", "zahrada", 500054),
                parcel("2", "ostatní plocha", 500054),
                parcel("3", "zahrada", 500054),
            ],
            display: vec![square(14.418, 50.086), square(14.420, 50.088), square(14.422, 50.090)],
            ..UnifiedParcelSet::default()
        }
    }

    #[test]
    fn test_build_groups_and_view() {
        let set = set();
        let layer = MapLayer::build(&set, DisplayAttribute::LandTypeName).unwrap();

        assert_eq!(layer.groups.len(), 2);
        assert_eq!(layer.groups[0].category, "zahrada");
        assert_eq!(layer.groups[0].parcels, vec![0, 2]);
        assert_eq!(layer.groups[1].style.fill_color, "#aec7e8");
        assert_eq!(layer.groups[0].style.fill_opacity, 0.5);
        assert_eq!(layer.groups[0].style.color, "black");
        assert!(layer.show_layer_control);

        assert!((layer.center.x - 14.421).abs() < 1e-9);
        assert!((layer.center.y - 50.089).abs() < 1e-9);
        assert_eq!(layer.bounds.min(), Coord { x: 14.418, y: 50.086 });
        assert!((layer.bounds.max().x - 14.424).abs() < 1e-12);
    }

    #[test]
    fn test_outline_mode_hides_layer_control() {
        let layer = MapLayer::build(&set(), DisplayAttribute::MunicipalityCode).unwrap();
        assert_eq!(layer.groups.len(), 1);
        assert!(!layer.show_layer_control);
    }

    #[test]
    fn test_empty_set_has_no_layer() {
        assert!(MapLayer::build(&UnifiedParcelSet::empty(), DisplayAttribute::LandTypeName).is_none());
    }

    #[test]
    fn test_to_geojson() {
        let set = set();
        let layer = MapLayer::build(&set, DisplayAttribute::LandTypeName).unwrap();
        let collection = layer.to_geojson(&set);

        assert_eq!(collection.features.len(), 3);
        let json: serde_json::Value = serde_json::from_str(&collection.to_string()).unwrap();
        let first = &json["features"][0];
        assert_eq!(first["properties"]["tooltip"], "1/1");
        assert_eq!(first["properties"]["fillColor"], "#1f77b4");
        assert_eq!(first["geometry"]["type"], "Polygon");
        assert_eq!(json["layerControl"], true);
        assert_eq!(json["groups"][1]["count"], 1);
    }
}
