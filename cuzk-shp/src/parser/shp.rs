//! Parser pour les fichiers SHP (géométries ESRI Shapefile)
//!
//! Format: en-tête de 100 octets puis enregistrements
//! `[numéro BE i32][longueur BE i32 en mots de 16 bits][contenu LE]`.

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, Point};

use crate::rings::assemble_polygon;
use crate::CuzkShpError;

const FILE_CODE: i32 = 9994;
const HEADER_LEN: usize = 100;
const FILE: &str = "SHP";

/// Types de formes ESRI
pub mod shape_type {
    pub const NULL: i32 = 0;
    pub const POINT: i32 = 1;
    pub const POLYLINE: i32 = 3;
    pub const POLYGON: i32 = 5;
    pub const MULTIPOINT: i32 = 8;
    pub const POINT_Z: i32 = 11;
    pub const POLYLINE_Z: i32 = 13;
    pub const POLYGON_Z: i32 = 15;
    pub const MULTIPOINT_Z: i32 = 18;
    pub const POINT_M: i32 = 21;
    pub const POLYLINE_M: i32 = 23;
    pub const POLYGON_M: i32 = 25;
    pub const MULTIPOINT_M: i32 = 28;
}

/// Un enregistrement du `.shp`
#[derive(Debug, Clone)]
pub struct ShapeRecord {
    /// Numéro d'enregistrement (1-based)
    pub record: u32,
    /// None pour une forme nulle
    pub geometry: Option<Geometry>,
}

/// Fichier SHP décodé
#[derive(Debug, Default)]
pub struct ShpFile {
    /// Type de forme déclaré dans l'en-tête
    pub shape_type: i32,
    /// Emprise déclarée (xmin, ymin, xmax, ymax)
    pub bbox: [f64; 4],
    pub records: Vec<ShapeRecord>,
}

/// Parse un fichier SHP
pub fn parse(data: &[u8]) -> Result<ShpFile, CuzkShpError> {
    if data.len() < HEADER_LEN {
        return Err(CuzkShpError::parse_error(FILE, "file shorter than header"));
    }

    let file_code = read_i32_be(data, 0)?;
    if file_code != FILE_CODE {
        return Err(CuzkShpError::parse_error(
            FILE,
            format!("bad file code {} (expected {})", file_code, FILE_CODE),
        ));
    }

    // Longueur déclarée en mots de 16 bits; on ne lit jamais au-delà des données reçues
    let declared_len = read_word_len(data, 24, "file length")?;
    let end = declared_len.min(data.len());

    let shape_type = read_i32_le(data, 32)?;
    let bbox = [
        read_f64_le(data, 36)?,
        read_f64_le(data, 44)?,
        read_f64_le(data, 52)?,
        read_f64_le(data, 60)?,
    ];

    let mut records = Vec::new();
    let mut pos = HEADER_LEN;
    while pos + 8 <= end {
        let number = read_i32_be(data, pos)?;
        let content_len = read_word_len(data, pos + 4, "record length")?;
        let start = pos + 8;
        let stop = start
            .checked_add(content_len)
            .filter(|&stop| stop <= data.len())
            .ok_or_else(|| {
                CuzkShpError::parse_error(FILE, format!("record {} truncated", number))
            })?;

        let geometry = parse_shape(&data[start..stop], number)?;
        records.push(ShapeRecord {
            record: number.max(0) as u32,
            geometry,
        });
        pos = stop;
    }

    Ok(ShpFile {
        shape_type,
        bbox,
        records,
    })
}

/// Décode le contenu d'un enregistrement
fn parse_shape(content: &[u8], number: i32) -> Result<Option<Geometry>, CuzkShpError> {
    if content.is_empty() {
        return Ok(None);
    }
    let kind = read_i32_le(content, 0)?;

    match kind {
        shape_type::NULL => Ok(None),
        shape_type::POINT | shape_type::POINT_Z | shape_type::POINT_M => {
            let x = read_f64_le(content, 4)?;
            let y = read_f64_le(content, 12)?;
            Ok(Some(Geometry::Point(Point::new(x, y))))
        }
        shape_type::MULTIPOINT | shape_type::MULTIPOINT_Z | shape_type::MULTIPOINT_M => {
            // bbox (32) + numPoints
            let num_points = read_count(content, 36, number)?;
            if 40 + num_points * 16 > content.len() {
                return Err(CuzkShpError::parse_error(
                    FILE,
                    format!("record {}: {} points exceed the record length", number, num_points),
                ));
            }
            let coords = read_points(content, 40, num_points)?;
            let points = coords.into_iter().map(Point::from).collect::<Vec<_>>();
            Ok(Some(Geometry::MultiPoint(MultiPoint::new(points))))
        }
        shape_type::POLYLINE | shape_type::POLYLINE_Z | shape_type::POLYLINE_M => {
            let parts = read_parts(content, number)?;
            let mut lines: Vec<LineString> = parts.into_iter().map(LineString::new).collect();
            if lines.len() == 1 {
                Ok(lines.pop().map(Geometry::LineString))
            } else {
                Ok(Some(Geometry::MultiLineString(MultiLineString::new(lines))))
            }
        }
        shape_type::POLYGON | shape_type::POLYGON_Z | shape_type::POLYGON_M => {
            let parts = read_parts(content, number)?;
            let rings = parts
                .into_iter()
                .filter(|ring| ring.len() >= 4)
                .map(LineString::new)
                .collect::<Vec<_>>();
            Ok(assemble_polygon(rings))
        }
        other => Err(CuzkShpError::UnsupportedShape {
            file: FILE.to_string(),
            shape_type: other,
        }),
    }
}

/// Lit les parts d'une PolyLine/Polygon: bbox (32) + numParts + numPoints + parts + points
fn read_parts(content: &[u8], number: i32) -> Result<Vec<Vec<Coord>>, CuzkShpError> {
    let num_parts = read_count(content, 36, number)?;
    let num_points = read_count(content, 40, number)?;
    let parts_offset = 44;
    let points_offset = parts_offset + num_parts * 4;
    if points_offset + num_points * 16 > content.len() {
        return Err(CuzkShpError::parse_error(
            FILE,
            format!(
                "record {}: {} parts and {} points exceed the record length",
                number, num_parts, num_points
            ),
        ));
    }

    let mut starts = Vec::with_capacity(num_parts);
    for i in 0..num_parts {
        let start = read_count(content, parts_offset + i * 4, number)?;
        if start > num_points {
            return Err(CuzkShpError::parse_error(
                FILE,
                format!("record {}: part index {} out of range", number, start),
            ));
        }
        starts.push(start);
    }

    let points = read_points(content, points_offset, num_points)?;

    let mut parts = Vec::with_capacity(num_parts);
    for (i, &start) in starts.iter().enumerate() {
        let stop = starts.get(i + 1).copied().unwrap_or(num_points);
        if stop < start {
            return Err(CuzkShpError::parse_error(
                FILE,
                format!("record {}: part indices not increasing", number),
            ));
        }
        parts.push(points[start..stop].to_vec());
    }
    Ok(parts)
}

fn read_points(content: &[u8], offset: usize, count: usize) -> Result<Vec<Coord>, CuzkShpError> {
    let mut coords = Vec::with_capacity(count);
    for i in 0..count {
        let at = offset + i * 16;
        coords.push(Coord {
            x: read_f64_le(content, at)?,
            y: read_f64_le(content, at + 8)?,
        });
    }
    Ok(coords)
}

fn read_count(content: &[u8], offset: usize, number: i32) -> Result<usize, CuzkShpError> {
    let value = read_i32_le(content, offset)?;
    usize::try_from(value).map_err(|_| {
        CuzkShpError::parse_error(FILE, format!("record {}: negative count {}", number, value))
    })
}

/// Longueur BE en mots de 16 bits convertie en octets
fn read_word_len(data: &[u8], offset: usize, what: &str) -> Result<usize, CuzkShpError> {
    let words = read_i32_be(data, offset)?;
    usize::try_from(words)
        .ok()
        .and_then(|w| w.checked_mul(2))
        .ok_or_else(|| CuzkShpError::parse_error(FILE, format!("invalid {} {}", what, words)))
}

fn slice<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], CuzkShpError> {
    data.get(offset..offset + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| {
            CuzkShpError::parse_error(FILE, format!("unexpected end of data at offset {}", offset))
        })
}

fn read_i32_be(data: &[u8], offset: usize) -> Result<i32, CuzkShpError> {
    slice::<4>(data, offset).map(i32::from_be_bytes)
}

fn read_i32_le(data: &[u8], offset: usize) -> Result<i32, CuzkShpError> {
    slice::<4>(data, offset).map(i32::from_le_bytes)
}

fn read_f64_le(data: &[u8], offset: usize) -> Result<f64, CuzkShpError> {
    slice::<8>(data, offset).map(f64::from_le_bytes)
}
