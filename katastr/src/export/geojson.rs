//! Export GeoJSON avec geozero (écriture en flux)

use std::io::Write;

use geo::Geometry;
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use super::TargetCrs;
use crate::error::{KatastrError, Result};
use crate::parcels::PARCEL_ID;
use crate::table::{Cell, ParcelTable};

/// Nom de CRS GeoJSON (ordre lon/lat pour WGS 84)
pub fn crs_name(crs: TargetCrs) -> String {
    match crs {
        TargetCrs::Wgs84 => "urn:ogc:def:crs:OGC:1.3:CRS84".to_string(),
        TargetCrs::Sjtsk => format!("urn:ogc:def:crs:EPSG::{}", crs.epsg()),
    }
}

/// Écrit une FeatureCollection: une feature par ligne de la table
///
/// `geometries[i]` accompagne `table.rows()[i]`. Les propriétés suivent
/// l'ordre des colonnes; les nombres restent des nombres JSON et une cellule
/// vide devient `null`.
pub fn write_feature_collection<W: Write>(
    writer: &mut W,
    table: &ParcelTable,
    geometries: &[Geometry],
    crs: TargetCrs,
) -> Result<()> {
    if geometries.len() != table.len() {
        return Err(KatastrError::Export(format!(
            "GeoJSON: {} geometries for {} rows",
            geometries.len(),
            table.len()
        )));
    }

    write!(
        writer,
        r#"{{"type":"FeatureCollection","name":"parcely_kn","crs":{{"type":"name","properties":{{"name":"{}"}}}},"features":["#,
        crs_name(crs)
    )?;

    let id_column = table.column_index(PARCEL_ID);
    for (i, (row, geometry)) in table.rows().iter().zip(geometries).enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        let id = id_column.map(|c| row[c].to_text()).unwrap_or_default();
        write_feature(writer, &id, table.columns(), row, geometry)?;
    }

    write!(writer, "]}}")?;
    writer.flush()?;
    Ok(())
}

pub fn to_geojson_bytes(
    table: &ParcelTable,
    geometries: &[Geometry],
    crs: TargetCrs,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(table.len() * 512 + 128);
    write_feature_collection(&mut buffer, table, geometries, crs)?;
    Ok(buffer)
}

fn write_feature<W: Write>(
    writer: &mut W,
    id: &str,
    columns: &[String],
    row: &[Cell],
    geometry: &Geometry,
) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","id":"{}","#, escape_json(id))?;

    write!(writer, r#""geometry":"#)?;
    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    geometry
        .process_geom(&mut geom_writer)
        .map_err(|e| KatastrError::Export(format!("GeoJSON geometry of {}: {}", id, e)))?;
    writer.write_all(&geom_buf)?;

    write!(writer, r#","properties":{{"#)?;
    for (i, (key, value)) in columns.iter().zip(row).enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write!(writer, r#""{}":"#, escape_json(key))?;
        match value {
            Cell::Null => write!(writer, "null")?,
            Cell::Integer(n) => write!(writer, "{}", n)?,
            Cell::Real(n) => match serde_json::Number::from_f64(*n) {
                Some(number) => write!(writer, "{}", number)?,
                None => write!(writer, "null")?,
            },
            Cell::Text(text) => write!(writer, r#""{}""#, escape_json(text))?,
        }
    }
    write!(writer, "}}}}")?;

    Ok(())
}

/// Échappe une chaîne pour JSON
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}
