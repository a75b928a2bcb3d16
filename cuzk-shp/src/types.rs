//! Types de données pour le crate cuzk-shp

use std::collections::BTreeMap;

use geo::Geometry;

/// Une couche lue depuis une archive (paire `.shp` + `.dbf`)
#[derive(Debug, Clone, Default)]
pub struct Layer {
    /// Nom de la couche (nom de fichier sans extension, ex: "PARCELY_KN_P")
    pub name: String,

    /// Descripteurs des champs DBF, dans l'ordre du fichier
    pub fields: Vec<FieldDescriptor>,

    /// Features dans l'ordre des enregistrements
    pub features: Vec<Feature>,

    /// Projection détectée depuis le `.prj` (None si absent ou inconnu)
    pub projection: Option<Projection>,
}

impl Layer {
    /// Vérifie la présence d'un champ (insensible à la casse)
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Retourne le premier champ requis absent de la couche
    pub fn missing_field<'a>(&self, required: &[&'a str]) -> Option<&'a str> {
        required.iter().copied().find(|name| !self.has_field(name))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Une feature avec sa géométrie (optionnelle) et ses attributs
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Numéro d'enregistrement (1-based, comme dans le `.shp`)
    pub record: u32,

    /// Géométrie; None pour une forme nulle ou une table DBF seule
    pub geometry: Option<Geometry>,

    /// Attributs (nom de champ en majuscules -> valeur)
    pub properties: BTreeMap<String, FieldValue>,
}

impl Feature {
    /// Retourne la valeur d'un attribut
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.properties.get(name)
    }

    /// Retourne un attribut sous forme de texte non vide
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(FieldValue::as_text)
    }

    /// Retourne un attribut sous forme d'entier (accepte du texte numérique)
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_i64)
    }
}

/// Valeur d'un champ DBF
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Champ caractère (C), espaces de fin supprimés
    Character(String),
    /// Champ numérique (N, F)
    Numeric(f64),
    /// Date (D) au format YYYYMMDD
    Date(String),
    /// Logique (L)
    Logical(bool),
    /// Valeur vide
    Null,
}

impl FieldValue {
    /// Représentation texte; les numériques entiers s'écrivent sans décimales
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Character(s) | Self::Date(s) if !s.is_empty() => Some(s.clone()),
            Self::Numeric(n) => Some(format_number(*n)),
            Self::Logical(b) => Some(if *b { "T" } else { "F" }.to_string()),
            _ => None,
        }
    }

    /// Conversion en entier: numérique entier ou texte contenant un entier
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Numeric(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            Self::Character(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    fast_float::parse::<f64, _>(s)
                        .ok()
                        .filter(|n| n.fract() == 0.0 && n.is_finite())
                        .map(|n| n as i64)
                })
            }
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Type d'un champ DBF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Character,
    Numeric,
    Float,
    Date,
    Logical,
    /// Types non interprétés (M, B, ...): lus comme texte
    Other(u8),
}

impl From<u8> for FieldType {
    fn from(code: u8) -> Self {
        match code {
            b'C' => Self::Character,
            b'N' => Self::Numeric,
            b'F' => Self::Float,
            b'D' => Self::Date,
            b'L' => Self::Logical,
            other => Self::Other(other),
        }
    }
}

/// Descripteur d'un champ DBF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Nom du champ (majuscules)
    pub name: String,
    pub field_type: FieldType,
    /// Largeur en octets
    pub length: u8,
    pub decimals: u8,
}

/// Informations de projection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    /// Code EPSG
    pub epsg: u32,

    /// Nom court de la projection
    pub name: &'static str,
}

impl Projection {
    /// S-JTSK / Krovak East North
    pub const SJTSK: Projection = Projection {
        epsg: 5514,
        name: "S-JTSK / Krovak East North",
    };

    /// WGS 84 géographique
    pub const WGS84: Projection = Projection {
        epsg: 4326,
        name: "WGS 84",
    };
}

impl Default for Projection {
    fn default() -> Self {
        Self::SJTSK
    }
}
