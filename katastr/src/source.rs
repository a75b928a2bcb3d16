//! Accès aux jeux de données distants du ČÚZK

use bytes::Bytes;
use cuzk_shp::{Layer, LayerOptions, Projection, ShpArchive};

use crate::config::Config;
use crate::error::{KatastrError, Result};

/// Couche des géométries de parcelles dans l'archive d'une unité
pub const GEOMETRY_LAYER: &str = "PARCELY_KN_P";
/// Couche des points de définition (attributs) dans l'archive d'une unité
pub const DETAIL_LAYER: &str = "PARCELY_KN_DEF";

/// Číselníky publiés par le ČÚZK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    /// SC_SEZNAMKUKRA_DOTAZ: katastrální území et obce
    UnitDirectory,
    /// SC_D_POZEMKU: druhy pozemků
    LandTypes,
    /// SC_ZP_VYUZITI_POZ: způsoby využití pozemků
    LandUses,
}

impl Dataset {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UnitDirectory => "SC_SEZNAMKUKRA_DOTAZ",
            Self::LandTypes => "SC_D_POZEMKU",
            Self::LandUses => "SC_ZP_VYUZITI_POZ",
        }
    }

    pub fn url<'a>(&self, config: &'a Config) -> &'a str {
        match self {
            Self::UnitDirectory => &config.unit_directory_url,
            Self::LandTypes => &config.land_type_url,
            Self::LandUses => &config.land_use_url,
        }
    }
}

/// Les deux couches de parcelles d'une unité cadastrale
#[derive(Debug, Clone)]
pub struct UnitLayers {
    pub geometries: Layer,
    pub details: Layer,
}

/// Source des couches brutes
///
/// Implémentée par [`HttpSource`] pour les services ČÚZK; les tests
/// fournissent leur propre implémentation en mémoire.
#[allow(async_fn_in_trait)]
pub trait CadastreSource {
    /// Couche unique d'un číselník
    async fn directory_layer(&self, dataset: Dataset) -> Result<Layer>;

    /// Couches `PARCELY_KN_P` et `PARCELY_KN_DEF` d'une unité
    async fn unit_layers(&self, unit_code: i64) -> Result<UnitLayers>;
}

/// Source HTTP (reqwest) vers services.cuzk.cz et cuzk.cz
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    config: Config,
}

impl HttpSource {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| KatastrError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Télécharge une archive complète en mémoire
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        tracing::debug!(url, "Downloading archive");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KatastrError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| network_error(url, e))?;
        tracing::debug!(url, bytes = body.len(), "Archive downloaded");
        Ok(body)
    }
}

impl CadastreSource for HttpSource {
    async fn directory_layer(&self, dataset: Dataset) -> Result<Layer> {
        let url = dataset.url(&self.config);
        let body = self.fetch(url).await?;

        cuzk_shp::read_single_layer(&body, &LayerOptions::default())
            .map_err(|e| KatastrError::archive(dataset.name(), e))
    }

    async fn unit_layers(&self, unit_code: i64) -> Result<UnitLayers> {
        let url = self.config.parcel_archive_url(unit_code);
        let body = self.fetch(&url).await?;

        let source_name = format!("{}.zip", unit_code);
        let archive =
            ShpArchive::from_bytes(&body).map_err(|e| KatastrError::archive(&source_name, e))?;

        // Le service epsg-5514 ne livre que du S-JTSK
        let options = LayerOptions {
            default_projection: Some(Projection::SJTSK),
            ..LayerOptions::default()
        };
        let geometries = archive
            .read_layer(GEOMETRY_LAYER, &options)
            .map_err(|e| KatastrError::archive(&source_name, e))?;
        let details = archive
            .read_layer(DETAIL_LAYER, &options)
            .map_err(|e| KatastrError::archive(&source_name, e))?;

        Ok(UnitLayers {
            geometries,
            details,
        })
    }
}

fn network_error(url: &str, err: reqwest::Error) -> KatastrError {
    KatastrError::Network {
        url: url.to_string(),
        reason: err.to_string(),
    }
}
