//! Constructeurs de fichiers SHP / DBF / ZIP en mémoire pour les tests

use std::io::{Cursor, Write};

use encoding_rs::Encoding;

/// Construit un fichier DBF (dBASE III)
#[derive(Debug, Default)]
pub struct DbfBuilder {
    fields: Vec<(String, u8, u8, u8)>,
    rows: Vec<(bool, Vec<String>)>,
    ldid: u8,
}

impl DbfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn character(mut self, name: &str, length: u8) -> Self {
        self.fields.push((name.to_string(), b'C', length, 0));
        self
    }

    pub fn numeric(mut self, name: &str, length: u8, decimals: u8) -> Self {
        self.fields.push((name.to_string(), b'N', length, decimals));
        self
    }

    pub fn row(mut self, values: &[&str]) -> Self {
        self.rows
            .push((false, values.iter().map(|v| v.to_string()).collect()));
        self
    }

    pub fn deleted_row(mut self, values: &[&str]) -> Self {
        self.rows
            .push((true, values.iter().map(|v| v.to_string()).collect()));
        self
    }

    pub fn ldid(mut self, ldid: u8) -> Self {
        self.ldid = ldid;
        self
    }

    pub fn build_utf8(self) -> Vec<u8> {
        self.build_encoded(encoding_rs::UTF_8)
    }

    pub fn build_encoded(self, encoding: &'static Encoding) -> Vec<u8> {
        let header_len = 32 + 32 * self.fields.len() + 1;
        let record_len = 1 + self.fields.iter().map(|f| f.2 as usize).sum::<usize>();

        let mut out = Vec::new();
        out.push(0x03);
        out.extend_from_slice(&[124, 1, 1]);
        out.extend_from_slice(&(self.rows.len() as u32).to_le_bytes());
        out.extend_from_slice(&(header_len as u16).to_le_bytes());
        out.extend_from_slice(&(record_len as u16).to_le_bytes());
        out.extend_from_slice(&[0u8; 17]);
        out.push(self.ldid);
        out.extend_from_slice(&[0u8; 2]);

        for (name, kind, length, decimals) in &self.fields {
            let mut raw_name = [0u8; 11];
            raw_name[..name.len()].copy_from_slice(name.as_bytes());
            out.extend_from_slice(&raw_name);
            out.push(*kind);
            out.extend_from_slice(&[0u8; 4]);
            out.push(*length);
            out.push(*decimals);
            out.extend_from_slice(&[0u8; 14]);
        }
        out.push(0x0D);

        for (deleted, values) in &self.rows {
            out.push(if *deleted { b'*' } else { b' ' });
            for ((_, kind, length, _), value) in self.fields.iter().zip(values) {
                let width = *length as usize;
                let encoded = encoding.encode(value).0;
                let mut cell = vec![b' '; width];
                let n = encoded.len().min(width);
                if *kind == b'N' {
                    // Numériques alignés à droite
                    cell[width - n..].copy_from_slice(&encoded[..n]);
                } else {
                    cell[..n].copy_from_slice(&encoded[..n]);
                }
                out.extend_from_slice(&cell);
            }
        }
        out.push(0x1A);
        out
    }
}

/// Construit un fichier SHP
#[derive(Debug)]
pub struct ShpBuilder {
    shape_type: i32,
    records: Vec<Vec<u8>>,
}

impl ShpBuilder {
    pub fn polygons() -> Self {
        Self {
            shape_type: 5,
            records: Vec::new(),
        }
    }

    pub fn points() -> Self {
        Self {
            shape_type: 1,
            records: Vec::new(),
        }
    }

    /// Ajoute un Polygon dont chaque élément de `parts` est un anneau
    pub fn polygon(mut self, parts: &[Vec<(f64, f64)>]) -> Self {
        let points: Vec<(f64, f64)> = parts.iter().flatten().copied().collect();
        let (mut xmin, mut ymin, mut xmax, mut ymax) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for &(x, y) in &points {
            xmin = xmin.min(x);
            ymin = ymin.min(y);
            xmax = xmax.max(x);
            ymax = ymax.max(y);
        }

        let mut content = Vec::new();
        content.extend_from_slice(&5i32.to_le_bytes());
        for v in [xmin, ymin, xmax, ymax] {
            content.extend_from_slice(&v.to_le_bytes());
        }
        content.extend_from_slice(&(parts.len() as i32).to_le_bytes());
        content.extend_from_slice(&(points.len() as i32).to_le_bytes());
        let mut start = 0i32;
        for part in parts {
            content.extend_from_slice(&start.to_le_bytes());
            start += part.len() as i32;
        }
        for (x, y) in points {
            content.extend_from_slice(&x.to_le_bytes());
            content.extend_from_slice(&y.to_le_bytes());
        }
        self.records.push(content);
        self
    }

    pub fn point(mut self, x: f64, y: f64) -> Self {
        let mut content = Vec::new();
        content.extend_from_slice(&1i32.to_le_bytes());
        content.extend_from_slice(&x.to_le_bytes());
        content.extend_from_slice(&y.to_le_bytes());
        self.records.push(content);
        self
    }

    pub fn null(mut self) -> Self {
        self.records.push(0i32.to_le_bytes().to_vec());
        self
    }

    pub fn build(self) -> Vec<u8> {
        let body_len: usize = self.records.iter().map(|r| 8 + r.len()).sum();
        let total_len = 100 + body_len;

        let mut out = Vec::with_capacity(total_len);
        out.extend_from_slice(&9994i32.to_be_bytes());
        out.extend_from_slice(&[0u8; 20]);
        out.extend_from_slice(&((total_len / 2) as i32).to_be_bytes());
        out.extend_from_slice(&1000i32.to_le_bytes());
        out.extend_from_slice(&self.shape_type.to_le_bytes());
        out.extend_from_slice(&[0u8; 64]);

        for (i, content) in self.records.iter().enumerate() {
            out.extend_from_slice(&(i as i32 + 1).to_be_bytes());
            out.extend_from_slice(&((content.len() / 2) as i32).to_be_bytes());
            out.extend_from_slice(content);
        }
        out
    }
}

/// Construit une archive ZIP à partir de (chemin, contenu)
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
