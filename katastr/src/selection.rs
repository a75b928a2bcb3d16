//! Ensemble unifié des parcelles d'une sélection d'unités

use blake3::Hasher;
use cuzk_shp::FieldValue;
use geo::{Coord, Geometry, Polygon};

use crate::parcels::ParcelRecord;
use crate::report::SelectionReport;

/// Avancement de la construction, émis après chaque unité
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// Dernière unité traitée
    pub unit_code: i64,
}

impl Progress {
    /// Fraction dans [0, 1]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Parcelles concaténées de toutes les unités chargées
///
/// `parcels[i].geometry` est en S-JTSK et sert aux exports; `display[i]` est
/// la même géométrie en WGS 84 pour l'affichage.
#[derive(Debug, Clone, Default)]
pub struct UnifiedParcelSet {
    /// Unités effectivement chargées, dans l'ordre de la sélection
    pub unit_codes: Vec<i64>,
    pub parcels: Vec<ParcelRecord>,
    pub display: Vec<Geometry>,
    pub report: SelectionReport,
}

impl UnifiedParcelSet {
    pub fn empty() -> Self {
        let mut report = SelectionReport::default();
        report.finalize();
        Self {
            report,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    /// Paires (parcelle, géométrie d'affichage)
    pub fn iter_display(&self) -> impl Iterator<Item = (&ParcelRecord, &Geometry)> {
        self.parcels.iter().zip(self.display.iter())
    }

    /// Empreinte blake3 du contenu exporté (clé de cache des exports)
    ///
    /// Couvre les unités, chaque champ et attribut des parcelles et les deux
    /// jeux de géométries: modifier une parcelle change la clé.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Hasher::new();
        hasher.update(b"UNITS");
        hash_len(&mut hasher, self.unit_codes.len());
        for code in &self.unit_codes {
            hasher.update(&code.to_le_bytes());
        }

        hasher.update(b"PARCELS");
        hash_len(&mut hasher, self.parcels.len());
        for parcel in &self.parcels {
            hash_parcel(&mut hasher, parcel);
        }

        hasher.update(b"DISPLAY");
        hash_len(&mut hasher, self.display.len());
        for geometry in &self.display {
            hash_geometry(&mut hasher, geometry);
        }

        hex::encode(&hasher.finalize().as_bytes()[..16])
    }
}

fn hash_len(hasher: &mut Hasher, len: usize) {
    hasher.update(&(len as u64).to_le_bytes());
}

fn hash_str(hasher: &mut Hasher, s: &str) {
    hash_len(hasher, s.len());
    hasher.update(s.as_bytes());
}

fn hash_opt_str(hasher: &mut Hasher, s: Option<&str>) {
    match s {
        Some(s) => {
            hasher.update(&[1]);
            hash_str(hasher, s);
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

fn hash_opt_i64(hasher: &mut Hasher, v: Option<i64>) {
    match v {
        Some(v) => {
            hasher.update(&[1]);
            hasher.update(&v.to_le_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

fn hash_parcel(hasher: &mut Hasher, parcel: &ParcelRecord) {
    hash_str(hasher, &parcel.id);
    hasher.update(&parcel.unit_code.to_le_bytes());
    hash_opt_i64(hasher, parcel.municipality_code);
    hasher.update(&parcel.land_type_code.to_le_bytes());
    hash_str(hasher, &parcel.land_type_name);
    hash_opt_str(hasher, parcel.land_type_abbreviation.as_deref());
    hash_opt_i64(hasher, parcel.land_use_code);
    hash_opt_str(hasher, parcel.land_use_name.as_deref());
    hash_opt_str(hasher, parcel.land_use_abbreviation.as_deref());
    hash_opt_str(hasher, parcel.label.as_deref());

    hash_len(hasher, parcel.attributes.len());
    for (key, value) in &parcel.attributes {
        hash_str(hasher, key);
        match value {
            FieldValue::Character(s) => {
                hasher.update(b"C");
                hash_str(hasher, s);
            }
            FieldValue::Numeric(n) => {
                hasher.update(b"N");
                hasher.update(&n.to_bits().to_le_bytes());
            }
            FieldValue::Date(s) => {
                hasher.update(b"D");
                hash_str(hasher, s);
            }
            FieldValue::Logical(b) => {
                hasher.update(if *b { b"LT" } else { b"LF" });
            }
            FieldValue::Null => {
                hasher.update(b"0");
            }
        }
    }

    hash_geometry(hasher, &parcel.geometry);
}

fn hash_coords<'a>(hasher: &mut Hasher, coords: impl ExactSizeIterator<Item = &'a Coord>) {
    hash_len(hasher, coords.len());
    for c in coords {
        hasher.update(&c.x.to_bits().to_le_bytes());
        hasher.update(&c.y.to_bits().to_le_bytes());
    }
}

fn hash_polygon(hasher: &mut Hasher, polygon: &Polygon) {
    hash_coords(hasher, polygon.exterior().0.iter());
    hash_len(hasher, polygon.interiors().len());
    for interior in polygon.interiors() {
        hash_coords(hasher, interior.0.iter());
    }
}

/// Hash structurel d'une géométrie (type, anneaux, coordonnées exactes)
fn hash_geometry(hasher: &mut Hasher, geometry: &Geometry) {
    match geometry {
        Geometry::Point(p) => {
            hasher.update(b"POINT");
            hash_coords(hasher, std::iter::once(&p.0));
        }
        Geometry::LineString(ls) => {
            hasher.update(b"LINESTRING");
            hash_coords(hasher, ls.0.iter());
        }
        Geometry::Polygon(p) => {
            hasher.update(b"POLYGON");
            hash_polygon(hasher, p);
        }
        Geometry::MultiPoint(mp) => {
            hasher.update(b"MULTIPOINT");
            hash_coords(hasher, mp.0.iter().map(|p| &p.0));
        }
        Geometry::MultiLineString(mls) => {
            hasher.update(b"MULTILINESTRING");
            hash_len(hasher, mls.0.len());
            for ls in &mls.0 {
                hash_coords(hasher, ls.0.iter());
            }
        }
        Geometry::MultiPolygon(mp) => {
            hasher.update(b"MULTIPOLYGON");
            hash_len(hasher, mp.0.len());
            for p in &mp.0 {
                hash_polygon(hasher, p);
            }
        }
        other => {
            hasher.update(format!("{:?}", other).as_bytes());
        }
    }
}
