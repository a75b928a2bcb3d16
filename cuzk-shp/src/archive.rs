//! Extraction des archives ČÚZK (.zip contenant des couches shapefile)

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use encoding_rs::Encoding;
use zip::ZipArchive;

use crate::parser;
use crate::types::{Feature, Layer, Projection};
use crate::CuzkShpError;

/// Extensions conservées en mémoire; les autres (SHX, XML, ...) sont ignorées
const KEPT_EXTENSIONS: &[&str] = &["SHP", "DBF", "CPG", "PRJ"];

/// Options de lecture d'une couche
#[derive(Debug, Clone, Copy)]
pub struct LayerOptions {
    /// Encodage utilisé quand ni `.cpg` ni l'octet LDID ne le précisent
    pub fallback_encoding: &'static Encoding,

    /// Projection supposée quand le `.prj` est absent ou inconnu
    pub default_projection: Option<Projection>,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            // Les ciselníky ČÚZK sont publiés en cp1250
            fallback_encoding: encoding_rs::WINDOWS_1250,
            default_projection: None,
        }
    }
}

/// Contenu utile d'une archive, indexé par nom de fichier en majuscules
/// (sans le répertoire: les archives par KÚ rangent tout sous `<kód>/`)
#[derive(Debug, Default)]
pub struct ShpArchive {
    files: BTreeMap<String, Vec<u8>>,
}

impl ShpArchive {
    /// Indexe une archive ZIP en mémoire
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CuzkShpError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut files = BTreeMap::new();

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if entry.is_dir() {
                continue;
            }

            let path = entry.name().replace('\\', "/");
            let basename = path.rsplit('/').next().unwrap_or("").to_uppercase();

            // Extraire l'extension
            let extension = basename.rsplit('.').next().unwrap_or("");
            if !KEPT_EXTENSIONS.contains(&extension) {
                continue;
            }

            // Lire le contenu en mémoire
            let mut content = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut content)?;

            if files.contains_key(&basename) {
                tracing::warn!(file = %path, "Duplicate file name in archive, keeping the first one");
                continue;
            }
            files.insert(basename, content);
        }

        if files.is_empty() {
            return Err(CuzkShpError::InvalidArchive(
                "archive contains no shapefile or dBASE file".into(),
            ));
        }

        Ok(Self { files })
    }

    /// Noms des couches disponibles (fichiers `.dbf`), triés
    pub fn layer_names(&self) -> Vec<String> {
        self.files
            .keys()
            .filter_map(|name| name.strip_suffix(".DBF"))
            .map(str::to_string)
            .collect()
    }

    /// Lit la première couche de l'archive (archives à couche unique)
    pub fn read_first_layer(&self, options: &LayerOptions) -> Result<Layer, CuzkShpError> {
        let name = self
            .layer_names()
            .into_iter()
            .next()
            .ok_or_else(|| CuzkShpError::MissingFile("*.dbf".into()))?;
        self.read_layer(&name, options)
    }

    /// Lit une couche par son nom (insensible à la casse)
    ///
    /// Le `.dbf` est obligatoire; sans `.shp` les features n'ont pas de géométrie.
    pub fn read_layer(&self, name: &str, options: &LayerOptions) -> Result<Layer, CuzkShpError> {
        let stem = name.to_uppercase();

        let dbf = self
            .file(&stem, "DBF")
            .ok_or_else(|| CuzkShpError::MissingFile(format!("{}.dbf", name)))?;

        let encoding = match self.file(&stem, "CPG").map(parser::cpg::parse) {
            Some(Ok(encoding)) => Some(encoding),
            Some(Err(e)) => {
                tracing::warn!(layer = %name, error = %e, "Ignoring .cpg file");
                None
            }
            None => None,
        };

        let table = parser::dbf::parse(dbf, encoding, options.fallback_encoding)
            .map_err(|e| with_file(e, &stem, "dbf"))?;

        let shapes = match self.file(&stem, "SHP") {
            Some(data) => Some(parser::shp::parse(data).map_err(|e| with_file(e, &stem, "shp"))?),
            None => None,
        };

        if let Some(ref shp) = shapes {
            if shp.records.len() != table.records.len() {
                return Err(CuzkShpError::parse_error(
                    format!("{}.shp", stem),
                    format!(
                        "{} shapes but {} attribute records",
                        shp.records.len(),
                        table.records.len()
                    ),
                ));
            }
        }

        let projection = self
            .file(&stem, "PRJ")
            .and_then(parser::prj::parse)
            .or(options.default_projection);

        let mut features = Vec::with_capacity(table.records.len());
        for (idx, record) in table.records.into_iter().enumerate() {
            // Enregistrement supprimé dans le DBF: la forme correspondante est ignorée
            let Some(properties) = record else {
                continue;
            };
            let (number, geometry) = match shapes.as_ref() {
                Some(shp) => {
                    let shape = &shp.records[idx];
                    (shape.record, shape.geometry.clone())
                }
                None => (idx as u32 + 1, None),
            };
            features.push(Feature {
                record: number,
                geometry,
                properties,
            });
        }

        tracing::debug!(
            layer = %stem,
            features = features.len(),
            fields = table.fields.len(),
            "Layer decoded"
        );

        Ok(Layer {
            name: stem,
            fields: table.fields,
            features,
            projection,
        })
    }

    fn file(&self, stem: &str, extension: &str) -> Option<&[u8]> {
        self.files
            .get(&format!("{}.{}", stem, extension))
            .map(Vec::as_slice)
    }
}

/// Remplace le nom générique du fichier dans une erreur de parsing
fn with_file(err: CuzkShpError, stem: &str, extension: &str) -> CuzkShpError {
    match err {
        CuzkShpError::ParseError { reason, .. } => CuzkShpError::ParseError {
            file: format!("{}.{}", stem, extension),
            reason,
        },
        CuzkShpError::UnsupportedShape { shape_type, .. } => CuzkShpError::UnsupportedShape {
            file: format!("{}.{}", stem, extension),
            shape_type,
        },
        other => other,
    }
}
