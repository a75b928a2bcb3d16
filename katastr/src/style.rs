//! Catégorisation des parcelles et attribution des couleurs

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{KatastrError, Result};
use crate::parcels::ParcelRecord;

/// Palette catégorielle tab20
pub const TAB20: [&str; 20] = [
    "#1f77b4", "#aec7e8", "#ff7f0e", "#ffbb78", "#2ca02c", "#98df8a", "#d62728", "#ff9896",
    "#9467bd", "#c5b0d5", "#8c564b", "#c49c94", "#e377c2", "#f7b6d2", "#7f7f7f", "#c7c7c7",
    "#bcbd22", "#dbdb8d", "#17becf", "#9edae5",
];

/// Attribut servant à colorer la carte
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum DisplayAttribute {
    /// Contours seuls: une catégorie par obec
    MunicipalityCode,
    #[default]
    LandTypeName,
    LandUseName,
}

impl DisplayAttribute {
    pub const ALL: [DisplayAttribute; 3] = [
        Self::MunicipalityCode,
        Self::LandTypeName,
        Self::LandUseName,
    ];

    /// Libellé du sélecteur
    pub fn label(&self) -> &'static str {
        match self {
            Self::MunicipalityCode => "Obrysy parcel",
            Self::LandTypeName => "Druh pozemku",
            Self::LandUseName => "Způsob využití pozemku",
        }
    }

    /// Colonne correspondante
    pub fn column(&self) -> &'static str {
        match self {
            Self::MunicipalityCode => "OBEC_KOD",
            Self::LandTypeName => "DRUPOZ_NAZEV",
            Self::LandUseName => "ZPVYPA_NAZEV",
        }
    }

    /// Valeur de catégorie d'une parcelle
    pub fn value_of(&self, parcel: &ParcelRecord) -> String {
        match self {
            Self::MunicipalityCode => parcel
                .municipality_code
                .map(|c| c.to_string())
                .unwrap_or_default(),
            Self::LandTypeName => parcel.land_type_name.clone(),
            Self::LandUseName => parcel.land_use_display().to_string(),
        }
    }

    /// Le contrôle des couches n'a pas de sens pour les contours
    pub fn shows_layer_control(&self) -> bool {
        !matches!(self, Self::MunicipalityCode)
    }
}

impl fmt::Display for DisplayAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DisplayAttribute {
    type Err = KatastrError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.column().eq_ignore_ascii_case(s) || a.label() == s)
            .or(match s.to_ascii_lowercase().as_str() {
                "outline" | "municipality" => Some(Self::MunicipalityCode),
                "land-type" | "land_type" => Some(Self::LandTypeName),
                "land-use" | "land_use" => Some(Self::LandUseName),
                _ => None,
            })
            .ok_or_else(|| {
                KatastrError::Config(format!(
                    "Unknown display attribute: {}. Use: outline, land-type, land-use",
                    s
                ))
            })
    }
}

/// Valeurs distinctes dans l'ordre de première apparition
pub fn categorize(parcels: &[ParcelRecord], attribute: DisplayAttribute) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    parcels
        .iter()
        .map(|p| attribute.value_of(p))
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Couleur de la catégorie `i`: `TAB20[i mod 20]`
pub fn assign_colors<S: AsRef<str>>(categories: &[S]) -> Vec<&'static str> {
    (0..categories.len()).map(|i| TAB20[i % TAB20.len()]).collect()
}

/// Une entrée de légende
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub category: String,
    pub color: &'static str,
    pub count: usize,
}

impl LegendEntry {
    /// Pastille colorée suivie du nom de catégorie
    pub fn swatch_html(&self) -> String {
        format!(
            "<span style='color:{};'>⬤</span> {}",
            self.color, self.category
        )
    }
}

/// Légende complète d'un attribut
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Legend {
    pub attribute: DisplayAttribute,
    pub entries: Vec<LegendEntry>,
}

impl Legend {
    pub fn build(parcels: &[ParcelRecord], attribute: DisplayAttribute) -> Self {
        let categories = categorize(parcels, attribute);
        let colors = assign_colors(&categories);

        let mut counts: HashMap<String, usize> = HashMap::with_capacity(categories.len());
        for parcel in parcels {
            *counts.entry(attribute.value_of(parcel)).or_default() += 1;
        }

        let entries = categories
            .into_iter()
            .zip(colors)
            .map(|(category, color)| LegendEntry {
                count: counts.get(&category).copied().unwrap_or(0),
                category,
                color,
            })
            .collect();

        Self { attribute, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Couleur d'une catégorie
    pub fn color_of(&self, category: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|e| e.category == category)
            .map(|e| e.color)
    }
}
