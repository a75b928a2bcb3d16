//! Export GeoPackage 1.2 (SQLite)
//!
//! Le fichier est écrit dans un répertoire temporaire puis relu en mémoire.
//! Une seule table d'entités `parcely_kn`, géométries au format binaire
//! GeoPackage (en-tête + enveloppe + WKB).

use geo::{BoundingRect, Geometry, Rect};
use rusqlite::{params, Connection};
use wkb::geom_to_wkb;

use super::TargetCrs;
use crate::error::{KatastrError, Result};
use crate::reproject_lite::TOWGS84;
use crate::table::{Cell, ParcelTable};

/// Nom de la table d'entités
pub const FEATURE_TABLE: &str = "parcely_kn";
/// Colonne géométrique
pub const GEOMETRY_COLUMN: &str = "geom";

/// "GPKG" en big-endian
const APPLICATION_ID: i32 = 0x4750_4B47;
/// GeoPackage 1.2.0
const USER_VERSION: i32 = 10200;
/// Horodatage fixe pour une sortie reproductible
const LAST_CHANGE: &str = "2000-01-01T00:00:00.000Z";

const WGS84_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AUTHORITY["EPSG","4326"]]"#;

/// Définition S-JTSK; `{towgs84}` reçoit les paramètres de Helmert appliqués
const SJTSK_WKT_TEMPLATE: &str = r#"PROJCS["S-JTSK / Krovak East North",GEOGCS["S-JTSK",DATUM["System_of_the_Unified_Trigonometrical_Cadastral_Network",SPHEROID["Bessel 1841",6377397.155,299.1528128,AUTHORITY["EPSG","7004"]],TOWGS84[{towgs84}],AUTHORITY["EPSG","6156"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4156"]],PROJECTION["Krovak"],PARAMETER["latitude_of_center",49.5],PARAMETER["longitude_of_center",24.8333333333333],PARAMETER["azimuth",30.2881397527778],PARAMETER["pseudo_standard_parallel_1",78.5],PARAMETER["scale_factor",0.9999],PARAMETER["false_easting",0],PARAMETER["false_northing",0],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AXIS["X",EAST],AXIS["Y",NORTH],AUTHORITY["EPSG","5514"]]"#;

const SCHEMA: &str = r#"
CREATE TABLE gpkg_spatial_ref_sys (
    srs_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL PRIMARY KEY,
    organization TEXT NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition TEXT NOT NULL,
    description TEXT
);
CREATE TABLE gpkg_contents (
    table_name TEXT NOT NULL PRIMARY KEY,
    data_type TEXT NOT NULL,
    identifier TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL,
    min_x DOUBLE,
    min_y DOUBLE,
    max_x DOUBLE,
    max_y DOUBLE,
    srs_id INTEGER,
    CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
CREATE TABLE gpkg_geometry_columns (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    geometry_type_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL,
    z TINYINT NOT NULL,
    m TINYINT NOT NULL,
    CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
    CONSTRAINT uk_gc_table_name UNIQUE (table_name),
    CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
    CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
"#;

/// WKT S-JTSK portant les paramètres de datum réellement utilisés
fn sjtsk_wkt() -> String {
    let towgs84: Vec<String> = TOWGS84.iter().map(f64::to_string).collect();
    SJTSK_WKT_TEMPLATE.replace("{towgs84}", &towgs84.join(","))
}

/// Encode la table et ses géométries en GeoPackage
pub fn to_gpkg_bytes(table: &ParcelTable, geometries: &[Geometry], crs: TargetCrs) -> Result<Vec<u8>> {
    if geometries.len() != table.len() {
        return Err(KatastrError::Export(format!(
            "GeoPackage: {} geometries for {} rows",
            geometries.len(),
            table.len()
        )));
    }

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("parcely_kn.gpkg");

    let mut conn = Connection::open(&path)?;
    write_gpkg(&mut conn, table, geometries, crs)?;
    conn.close().map_err(|(_, e)| KatastrError::from(e))?;

    let bytes = std::fs::read(&path)?;
    tracing::debug!(rows = table.len(), bytes = bytes.len(), "GeoPackage written");
    Ok(bytes)
}

fn write_gpkg(
    conn: &mut Connection,
    table: &ParcelTable,
    geometries: &[Geometry],
    crs: TargetCrs,
) -> Result<()> {
    conn.pragma_update(None, "application_id", APPLICATION_ID)?;
    conn.pragma_update(None, "user_version", USER_VERSION)?;

    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    insert_spatial_ref_systems(&tx)?;

    let column_defs: Vec<String> = table
        .columns()
        .iter()
        .zip(table.column_types())
        .map(|(c, kind)| format!("{} {}", quote_identifier(c), kind.sql()))
        .collect();
    tx.execute_batch(&format!(
        "CREATE TABLE {} (fid INTEGER PRIMARY KEY, {} GEOMETRY, {});",
        quote_identifier(FEATURE_TABLE),
        quote_identifier(GEOMETRY_COLUMN),
        column_defs.join(", ")
    ))?;

    let extent = extent(geometries);
    tx.execute(
        "INSERT INTO gpkg_contents (table_name, data_type, identifier, description, last_change, min_x, min_y, max_x, max_y, srs_id) \
         VALUES (?1, 'features', ?1, '', ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            FEATURE_TABLE,
            LAST_CHANGE,
            extent.map(|r| r.min().x),
            extent.map(|r| r.min().y),
            extent.map(|r| r.max().x),
            extent.map(|r| r.max().y),
            crs.epsg(),
        ],
    )?;
    tx.execute(
        "INSERT INTO gpkg_geometry_columns (table_name, column_name, geometry_type_name, srs_id, z, m) \
         VALUES (?1, ?2, 'GEOMETRY', ?3, 0, 0)",
        params![FEATURE_TABLE, GEOMETRY_COLUMN, crs.epsg()],
    )?;

    let placeholders: Vec<String> = (0..table.columns().len())
        .map(|i| format!("?{}", i + 3))
        .collect();
    let column_names: Vec<String> = table.columns().iter().map(|c| quote_identifier(c)).collect();
    let insert = format!(
        "INSERT INTO {} (fid, {}, {}) VALUES (?1, ?2, {})",
        quote_identifier(FEATURE_TABLE),
        quote_identifier(GEOMETRY_COLUMN),
        column_names.join(", "),
        placeholders.join(", ")
    );

    {
        let mut stmt = tx.prepare(&insert)?;
        for (i, (row, geometry)) in table.rows().iter().zip(geometries).enumerate() {
            let blob = gpkg_geometry(geometry, crs.epsg())?;
            let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(row.len() + 2);
            values.push(rusqlite::types::Value::Integer(i as i64 + 1));
            values.push(rusqlite::types::Value::Blob(blob));
            values.extend(row.iter().map(|cell| match cell {
                Cell::Null => rusqlite::types::Value::Null,
                Cell::Integer(n) => rusqlite::types::Value::Integer(*n),
                Cell::Real(n) => rusqlite::types::Value::Real(*n),
                Cell::Text(text) => rusqlite::types::Value::Text(text.clone()),
            }));
            stmt.execute(rusqlite::params_from_iter(values))?;
        }
    }

    tx.commit()?;
    Ok(())
}

fn insert_spatial_ref_systems(tx: &rusqlite::Transaction<'_>) -> Result<()> {
    let sjtsk = sjtsk_wkt();
    let rows: [(&str, i64, &str, i64, &str, &str); 4] = [
        (
            "Undefined cartesian SRS",
            -1,
            "NONE",
            -1,
            "undefined",
            "undefined cartesian coordinate reference system",
        ),
        (
            "Undefined geographic SRS",
            0,
            "NONE",
            0,
            "undefined",
            "undefined geographic coordinate reference system",
        ),
        ("WGS 84", 4326, "EPSG", 4326, WGS84_WKT, "longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid"),
        ("S-JTSK / Krovak East North", 5514, "EPSG", 5514, &sjtsk, "S-JTSK / Krovak East North"),
    ];

    let mut stmt = tx.prepare(
        "INSERT INTO gpkg_spatial_ref_sys (srs_name, srs_id, organization, organization_coordsys_id, definition, description) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for (name, id, org, org_id, definition, description) in rows {
        stmt.execute(params![name, id, org, org_id, definition, description])?;
    }
    Ok(())
}

/// Géométrie binaire GeoPackage: en-tête "GP", enveloppe XY, puis WKB
pub fn gpkg_geometry(geometry: &Geometry, srs_id: u32) -> Result<Vec<u8>> {
    let wkb = geom_to_wkb(geometry)
        .map_err(|e| KatastrError::Export(format!("Failed to convert geometry to WKB: {:?}", e)))?;

    let mut blob = Vec::with_capacity(8 + 32 + wkb.len());
    blob.extend_from_slice(b"GP");
    blob.push(0);

    match geometry.bounding_rect() {
        Some(rect) => {
            // Little-endian, enveloppe [minx, maxx, miny, maxy]
            blob.push(0b0000_0011);
            blob.extend_from_slice(&(srs_id as i32).to_le_bytes());
            for v in [rect.min().x, rect.max().x, rect.min().y, rect.max().y] {
                blob.extend_from_slice(&v.to_le_bytes());
            }
        }
        None => {
            // Géométrie vide, sans enveloppe
            blob.push(0b0001_0001);
            blob.extend_from_slice(&(srs_id as i32).to_le_bytes());
        }
    }

    blob.extend_from_slice(&wkb);
    Ok(blob)
}

fn extent(geometries: &[Geometry]) -> Option<Rect> {
    geometries
        .iter()
        .filter_map(|g| g.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
            )
        })
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
