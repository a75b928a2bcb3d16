//! Configuration du système
//!
//! Ordre de priorité (du plus faible au plus fort): valeurs par défaut,
//! fichier JSON (`--config`), variables d'environnement `KATASTR_*`.

use std::num::NonZeroUsize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KatastrError, Result};

/// Préfixe des variables d'environnement
pub const ENV_PREFIX: &str = "KATASTR_";

/// Marqueur remplacé par le code de l'unité dans `parcel_archive_url`
pub const UNIT_PLACEHOLDER: &str = "{unit}";

/// Comportement quand une unité échoue pendant la construction d'une sélection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// La première unité en échec interrompt la sélection
    #[default]
    Abort,
    /// L'unité en échec est signalée dans le rapport, les autres sont traitées
    Skip,
}

impl FromStr for FailurePolicy {
    type Err = KatastrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(KatastrError::Config(format!(
                "Unknown failure policy: {}. Use: abort, skip",
                other
            ))),
        }
    }
}

/// Configuration principale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Annuaire des katastrální území (SC_SEZNAMKUKRA_DOTAZ)
    pub unit_directory_url: String,

    /// Číselník druhů pozemků (SC_D_POZEMKU)
    pub land_type_url: String,

    /// Číselník způsobů využití pozemků (SC_ZP_VYUZITI_POZ)
    pub land_use_url: String,

    /// Archive par unité; `{unit}` est remplacé par le code KÚ
    pub parcel_archive_url: String,

    /// Préfixe du lien vers Nahlížení do KN, suivi de l'ID_2
    pub viewer_url: String,

    /// Durée de validité du cache (secondes)
    pub cache_ttl_secs: u64,

    /// Nombre maximal d'entrées en cache (les moins récemment utilisées sont évincées)
    pub cache_capacity: usize,

    /// Timeout des requêtes HTTP (secondes)
    pub http_timeout_secs: u64,

    pub user_agent: String,

    /// Au-delà de ce nombre d'unités, un avertissement est émis
    pub soft_unit_limit: usize,

    pub failure_policy: FailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unit_directory_url: "https://www.cuzk.cz/CUZK/media/CiselnikyISKN/SC_SEZNAMKUKRA_DOTAZ/SC_SEZNAMKUKRA_DOTAZ.zip".to_string(),
            land_type_url: "https://cuzk.cz/CUZK/media/CiselnikyISKN/SC_D_POZEMKU/SC_D_POZEMKU.zip".to_string(),
            land_use_url: "https://cuzk.cz/CUZK/media/CiselnikyISKN/SC_ZP_VYUZITI_POZ/SC_ZP_VYUZITI_POZ.zip".to_string(),
            parcel_archive_url: "https://services.cuzk.cz/shp/ku/epsg-5514/{unit}.zip".to_string(),
            viewer_url: "https://nahlizenidokn.cuzk.cz/ZobrazObjekt.aspx?typ=Parcela&id=".to_string(),
            // Les données ČÚZK sont rafraîchies chaque semaine
            cache_ttl_secs: 7 * 24 * 3600,
            cache_capacity: 256,
            http_timeout_secs: 120,
            user_agent: concat!("katastr/", env!("CARGO_PKG_VERSION")).to_string(),
            soft_unit_limit: 5,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl Config {
    /// Charge une configuration depuis un fichier JSON (champs absents = défauts)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KatastrError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| KatastrError::Config(format!("Failed to parse config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Défauts, puis fichier optionnel, puis environnement du processus
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applique les surcharges `KATASTR_*` fournies par `lookup`
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(v) = var("UNIT_DIRECTORY_URL") {
            self.unit_directory_url = v;
        }
        if let Some(v) = var("LAND_TYPE_URL") {
            self.land_type_url = v;
        }
        if let Some(v) = var("LAND_USE_URL") {
            self.land_use_url = v;
        }
        if let Some(v) = var("PARCEL_ARCHIVE_URL") {
            self.parcel_archive_url = v;
        }
        if let Some(v) = var("VIEWER_URL") {
            self.viewer_url = v;
        }
        if let Some(v) = var("USER_AGENT") {
            self.user_agent = v;
        }
        if let Some(v) = var("CACHE_TTL_SECS") {
            self.cache_ttl_secs = parse_number("CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = var("CACHE_CAPACITY") {
            self.cache_capacity = parse_number("CACHE_CAPACITY", &v)?;
        }
        if let Some(v) = var("HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = parse_number("HTTP_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("SOFT_UNIT_LIMIT") {
            self.soft_unit_limit = parse_number("SOFT_UNIT_LIMIT", &v)?;
        }
        if let Some(v) = var("FAILURE_POLICY") {
            self.failure_policy = v.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.parcel_archive_url.contains(UNIT_PLACEHOLDER) {
            return Err(KatastrError::Config(format!(
                "parcel_archive_url must contain {}: {}",
                UNIT_PLACEHOLDER, self.parcel_archive_url
            )));
        }
        if self.cache_capacity == 0 {
            return Err(KatastrError::Config("cache_capacity must be > 0".into()));
        }
        if self.http_timeout_secs == 0 {
            return Err(KatastrError::Config("http_timeout_secs must be > 0".into()));
        }
        Ok(())
    }

    /// URL de l'archive d'une unité
    pub fn parcel_archive_url(&self, unit_code: i64) -> String {
        self.parcel_archive_url
            .replace(UNIT_PLACEHOLDER, &unit_code.to_string())
    }

    /// Lien Nahlížení do KN d'une parcelle
    pub fn viewer_link(&self, parcel_id: &str) -> String {
        format!("{}{}", self.viewer_url, parcel_id)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.cache_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        KatastrError::Config(format!("{}{} is not a number: {}", ENV_PREFIX, name, value))
    })
}
