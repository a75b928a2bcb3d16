//! Vue tabulaire des parcelles (aperçu et colonnes d'export)

use std::collections::BTreeSet;

use cuzk_shp::FieldValue;

use crate::parcels::{ParcelRecord, LABEL, LAND_TYPE_CODE, LAND_USE_CODE, PARCEL_ID, UNIT_CODE};

pub const MUNICIPALITY_CODE: &str = "OBEC_KOD";
pub const LAND_TYPE_NAME: &str = "DRUPOZ_NAZEV";
pub const LAND_TYPE_ABBREVIATION: &str = "DRUPOZ_ZKRATKA";
pub const LAND_USE_NAME: &str = "ZPVYPA_NAZEV";
pub const LAND_USE_ABBREVIATION: &str = "ZPVYPA_ZKRATKA";
/// Lien vers Nahlížení do KN
pub const VIEWER_LINK: &str = "ODKAZ_NAHLIZENI";

/// Attributs bruts masqués dans l'aperçu
const HIDDEN_ATTRIBUTES: [&str; 3] = ["ID", "TYPPPD_KOD", "STAV_PARC"];

/// Jeu de colonnes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLayout {
    /// Aperçu: noms lisibles, sans codes ni abréviations (aussi utilisé par le CSV)
    Overview,
    /// Exports géographiques: tous les attributs joints
    Export,
}

impl TableLayout {
    fn leading_columns(self) -> &'static [&'static str] {
        match self {
            Self::Overview => &[
                PARCEL_ID,
                UNIT_CODE,
                MUNICIPALITY_CODE,
                LAND_TYPE_NAME,
                LAND_USE_NAME,
                LABEL,
            ],
            Self::Export => &[
                PARCEL_ID,
                UNIT_CODE,
                MUNICIPALITY_CODE,
                LAND_TYPE_CODE,
                LAND_TYPE_NAME,
                LAND_TYPE_ABBREVIATION,
                LAND_USE_CODE,
                LAND_USE_NAME,
                LAND_USE_ABBREVIATION,
                LABEL,
            ],
        }
    }

    fn hides(self, attribute: &str) -> bool {
        self == Self::Overview && HIDDEN_ATTRIBUTES.contains(&attribute)
    }
}

/// Cellule typée
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    /// Forme texte (CSV, aperçu); chaîne vide pour une valeur absente
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Integer(n) => n.to_string(),
            Self::Real(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn from_field(value: &FieldValue) -> Self {
        match value {
            FieldValue::Numeric(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 => {
                Self::Integer(*n as i64)
            }
            FieldValue::Numeric(n) if n.is_finite() => Self::Real(*n),
            other => other.as_text().map(Self::Text).unwrap_or(Self::Null),
        }
    }
}

impl From<Option<i64>> for Cell {
    fn from(value: Option<i64>) -> Self {
        value.map(Self::Integer).unwrap_or(Self::Null)
    }
}

impl From<Option<&str>> for Cell {
    fn from(value: Option<&str>) -> Self {
        value
            .filter(|s| !s.is_empty())
            .map(|s| Self::Text(s.to_string()))
            .unwrap_or(Self::Null)
    }
}

/// Type déclaré d'une colonne
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    /// Type SQL (GeoPackage)
    pub fn sql(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }

    /// Le plus petit type qui contient toutes les cellules non nulles
    fn infer<'a>(cells: impl Iterator<Item = &'a Cell>) -> Self {
        let mut kind: Option<Self> = None;
        for cell in cells {
            let next = match cell {
                Cell::Null => continue,
                Cell::Integer(_) => Self::Integer,
                Cell::Real(_) => Self::Real,
                Cell::Text(_) => return Self::Text,
            };
            kind = Some(match (kind, next) {
                (Some(Self::Real), _) | (_, Self::Real) => Self::Real,
                _ => Self::Integer,
            });
        }
        kind.unwrap_or(Self::Text)
    }
}

/// Table typée, une ligne par parcelle
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelTable {
    columns: Vec<String>,
    types: Vec<ColumnType>,
    rows: Vec<Vec<Cell>>,
}

impl ParcelTable {
    pub fn overview(parcels: &[ParcelRecord], viewer_url: &str) -> Self {
        Self::build(parcels, viewer_url, TableLayout::Overview)
    }

    pub fn for_export(parcels: &[ParcelRecord], viewer_url: &str) -> Self {
        Self::build(parcels, viewer_url, TableLayout::Export)
    }

    /// Colonnes fixes, puis union triée des autres attributs, puis le lien
    pub fn build(parcels: &[ParcelRecord], viewer_url: &str, layout: TableLayout) -> Self {
        let leading = layout.leading_columns();

        let extra: BTreeSet<&str> = parcels
            .iter()
            .flat_map(|p| p.attributes.keys().map(String::as_str))
            .filter(|name| !leading.contains(name) && *name != VIEWER_LINK && !layout.hides(name))
            .collect();

        let columns: Vec<String> = leading
            .iter()
            .copied()
            .chain(extra.iter().copied())
            .chain(std::iter::once(VIEWER_LINK))
            .map(String::from)
            .collect();

        let rows: Vec<Vec<Cell>> = parcels
            .iter()
            .map(|parcel| {
                let mut row: Vec<Cell> = leading
                    .iter()
                    .map(|column| structured_value(parcel, column))
                    .collect();
                row.extend(extra.iter().map(|name| {
                    parcel
                        .attributes
                        .get(*name)
                        .map(Cell::from_field)
                        .unwrap_or(Cell::Null)
                }));
                row.push(Cell::Text(format!("{}{}", viewer_url, parcel.id)));
                row
            })
            .collect();

        let types = columns
            .iter()
            .enumerate()
            .map(|(i, name)| match structured_type(name) {
                Some(kind) => kind,
                None => ColumnType::infer(rows.iter().map(|row| &row[i])),
            })
            .collect();

        Self {
            columns,
            types,
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Types des colonnes, dans l'ordre de `columns()`
    pub fn column_types(&self) -> &[ColumnType] {
        &self.types
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[index])
    }

    /// Forme texte d'une cellule; chaîne vide = valeur absente
    pub fn value(&self, row: usize, column: &str) -> Option<String> {
        self.cell(row, column).map(Cell::to_text)
    }
}

fn structured_value(parcel: &ParcelRecord, column: &str) -> Cell {
    match column {
        PARCEL_ID => Cell::Text(parcel.id.clone()),
        UNIT_CODE => Cell::Integer(parcel.unit_code),
        MUNICIPALITY_CODE => parcel.municipality_code.into(),
        LAND_TYPE_CODE => Cell::Integer(parcel.land_type_code),
        LAND_TYPE_NAME => Cell::Text(parcel.land_type_name.clone()),
        LAND_TYPE_ABBREVIATION => parcel.land_type_abbreviation.as_deref().into(),
        LAND_USE_CODE => parcel.land_use_code.into(),
        LAND_USE_NAME => parcel.land_use_name.as_deref().into(),
        LAND_USE_ABBREVIATION => parcel.land_use_abbreviation.as_deref().into(),
        LABEL => parcel.label.as_deref().into(),
        _ => Cell::Null,
    }
}

/// Type fixe des colonnes portées par `ParcelRecord`
fn structured_type(column: &str) -> Option<ColumnType> {
    match column {
        UNIT_CODE | MUNICIPALITY_CODE | LAND_TYPE_CODE | LAND_USE_CODE => Some(ColumnType::Integer),
        PARCEL_ID | LAND_TYPE_NAME | LAND_TYPE_ABBREVIATION | LAND_USE_NAME
        | LAND_USE_ABBREVIATION | LABEL | VIEWER_LINK => Some(ColumnType::Text),
        _ => None,
    }
}
