//! Parser pour les fichiers DBF (dBASE III, attributs)

use std::collections::BTreeMap;

use encoding_rs::Encoding;

use crate::types::{FieldDescriptor, FieldType, FieldValue};
use crate::CuzkShpError;

const HEADER_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const HEADER_TERMINATOR: u8 = 0x0D;
const DELETED_FLAG: u8 = b'*';

/// Table DBF décodée
#[derive(Debug, Default)]
pub struct DbfTable {
    pub fields: Vec<FieldDescriptor>,

    /// Un élément par enregistrement; None si l'enregistrement est supprimé
    /// (conservé pour rester aligné avec les formes du `.shp`)
    pub records: Vec<Option<BTreeMap<String, FieldValue>>>,

    /// Octet "language driver" de l'en-tête
    pub ldid: u8,
}

/// Parse un fichier DBF
///
/// `encoding` est l'encodage à utiliser pour les champs texte; s'il vaut
/// None, l'octet LDID est consulté, puis `fallback`.
pub fn parse(
    data: &[u8],
    encoding: Option<&'static Encoding>,
    fallback: &'static Encoding,
) -> Result<DbfTable, CuzkShpError> {
    if data.len() < HEADER_LEN {
        return Err(CuzkShpError::parse_error("DBF", "file shorter than header"));
    }

    let num_records = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
    let record_len = u16::from_le_bytes([data[10], data[11]]) as usize;
    let ldid = data[29];

    if header_len > data.len() || header_len < HEADER_LEN + 1 {
        return Err(CuzkShpError::parse_error(
            "DBF",
            format!("invalid header length {}", header_len),
        ));
    }

    let fields = parse_descriptors(&data[HEADER_LEN..header_len])?;

    let declared: usize = 1 + fields.iter().map(|f| f.length as usize).sum::<usize>();
    if declared != record_len {
        return Err(CuzkShpError::parse_error(
            "DBF",
            format!(
                "record length {} does not match field widths {}",
                record_len, declared
            ),
        ));
    }

    let needed = header_len + num_records * record_len;
    if data.len() < needed {
        return Err(CuzkShpError::parse_error(
            "DBF",
            format!(
                "truncated: {} records announced, {} bytes missing",
                num_records,
                needed - data.len()
            ),
        ));
    }

    let encoding = encoding
        .or_else(|| super::cpg::ldid_to_encoding(ldid))
        .unwrap_or(fallback);

    let mut records = Vec::with_capacity(num_records);
    for chunk in data[header_len..needed].chunks_exact(record_len) {
        if chunk[0] == DELETED_FLAG {
            records.push(None);
            continue;
        }

        let mut values = BTreeMap::new();
        let mut offset = 1;
        for field in &fields {
            let end = offset + field.length as usize;
            let value = decode_value(field, &chunk[offset..end], encoding);
            values.insert(field.name.clone(), value);
            offset = end;
        }
        records.push(Some(values));
    }

    Ok(DbfTable {
        fields,
        records,
        ldid,
    })
}

/// Lit les descripteurs de champs jusqu'au terminateur 0x0D
fn parse_descriptors(data: &[u8]) -> Result<Vec<FieldDescriptor>, CuzkShpError> {
    let mut fields = Vec::new();

    for descriptor in data.chunks(DESCRIPTOR_LEN) {
        if descriptor[0] == HEADER_TERMINATOR {
            break;
        }
        if descriptor.len() < DESCRIPTOR_LEN {
            return Err(CuzkShpError::parse_error(
                "DBF",
                "truncated field descriptor",
            ));
        }

        // Nom sur 11 octets, terminé par NUL
        let raw_name = &descriptor[..11];
        let name_len = memchr::memchr(0, raw_name).unwrap_or(raw_name.len());
        let name = String::from_utf8_lossy(&raw_name[..name_len])
            .trim()
            .to_uppercase();
        if name.is_empty() {
            return Err(CuzkShpError::parse_error("DBF", "empty field name"));
        }

        fields.push(FieldDescriptor {
            name,
            field_type: FieldType::from(descriptor[11]),
            length: descriptor[16],
            decimals: descriptor[17],
        });
    }

    Ok(fields)
}

/// Décode la valeur brute d'un champ
fn decode_value(field: &FieldDescriptor, raw: &[u8], encoding: &'static Encoding) -> FieldValue {
    match field.field_type {
        FieldType::Numeric | FieldType::Float => {
            let text = String::from_utf8_lossy(raw);
            let text = text.trim_matches(|c: char| c == ' ' || c == '\0');
            if text.is_empty() || text.bytes().all(|b| b == b'*' || b == b'?') {
                return FieldValue::Null;
            }
            match fast_float::parse::<f64, _>(text) {
                Ok(n) => FieldValue::Numeric(n),
                Err(_) => {
                    tracing::debug!(field = %field.name, value = %text, "Unparsable numeric value");
                    FieldValue::Null
                }
            }
        }
        FieldType::Logical => match raw.first() {
            Some(b'T' | b't' | b'Y' | b'y') => FieldValue::Logical(true),
            Some(b'F' | b'f' | b'N' | b'n') => FieldValue::Logical(false),
            _ => FieldValue::Null,
        },
        FieldType::Date => {
            let text = decode_text(raw, encoding);
            if text.is_empty() {
                FieldValue::Null
            } else {
                FieldValue::Date(text)
            }
        }
        FieldType::Character | FieldType::Other(_) => {
            let text = decode_text(raw, encoding);
            if text.is_empty() {
                FieldValue::Null
            } else {
                FieldValue::Character(text)
            }
        }
    }
}

/// Décode un champ texte et supprime le remplissage
fn decode_text(raw: &[u8], encoding: &'static Encoding) -> String {
    let decoded = if encoding == encoding_rs::UTF_8 {
        // Validation UTF-8 SIMD, repli sur le décodage avec remplacement
        match simdutf8::basic::from_utf8(raw) {
            Ok(s) => std::borrow::Cow::Borrowed(s),
            Err(_) => String::from_utf8_lossy(raw),
        }
    } else {
        encoding.decode_without_bom_handling(raw).0
    };
    decoded
        .trim_end_matches(|c: char| c == ' ' || c == '\0')
        .trim_start()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::DbfBuilder;

    #[test]
    fn test_parse_character_and_numeric() {
        let data = DbfBuilder::new()
            .character("NAZEV", 20)
            .numeric("KOD", 4, 0)
            .row(&["orná půda", "2"])
            .row(&["zahrada", " 5"])
            .build_utf8();

        let table = parse(&data, Some(encoding_rs::UTF_8), encoding_rs::WINDOWS_1250).unwrap();

        assert_eq!(table.fields.len(), 2);
        assert_eq!(table.records.len(), 2);
        let first = table.records[0].as_ref().unwrap();
        assert_eq!(
            first.get("NAZEV"),
            Some(&FieldValue::Character("orná půda".into()))
        );
        assert_eq!(first.get("KOD"), Some(&FieldValue::Numeric(2.0)));
        let second = table.records[1].as_ref().unwrap();
        assert_eq!(second.get("KOD"), Some(&FieldValue::Numeric(5.0)));
    }

    #[test]
    fn test_windows_1250_from_ldid() {
        let data = DbfBuilder::new()
            .character("OBEC_NAZEV", 20)
            .row(&["Plzeň"])
            .ldid(0xC8)
            .build_encoded(encoding_rs::WINDOWS_1250);

        // Aucun encodage explicite, repli volontairement faux: le LDID doit gagner
        let table = parse(&data, None, encoding_rs::UTF_8).unwrap();
        let record = table.records[0].as_ref().unwrap();
        assert_eq!(
            record.get("OBEC_NAZEV"),
            Some(&FieldValue::Character("Plzeň".into()))
        );
    }

    #[test]
    fn test_fallback_encoding() {
        let data = DbfBuilder::new()
            .character("KU_NAZEV", 20)
            .row(&["Staré Město"])
            .build_encoded(encoding_rs::WINDOWS_1250);

        let table = parse(&data, None, encoding_rs::WINDOWS_1250).unwrap();
        let record = table.records[0].as_ref().unwrap();
        assert_eq!(
            record.get("KU_NAZEV"),
            Some(&FieldValue::Character("Staré Město".into()))
        );
    }

    #[test]
    fn test_blank_numeric_is_null() {
        let data = DbfBuilder::new()
            .numeric("ZPVYPA_KOD", 4, 0)
            .row(&[""])
            .build_utf8();

        let table = parse(&data, Some(encoding_rs::UTF_8), encoding_rs::UTF_8).unwrap();
        let record = table.records[0].as_ref().unwrap();
        assert_eq!(record.get("ZPVYPA_KOD"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_deleted_records_keep_alignment() {
        let data = DbfBuilder::new()
            .character("ID_2", 12)
            .row(&["1"])
            .deleted_row(&["2"])
            .row(&["3"])
            .build_utf8();

        let table = parse(&data, Some(encoding_rs::UTF_8), encoding_rs::UTF_8).unwrap();
        assert_eq!(table.records.len(), 3);
        assert!(table.records[1].is_none());
        assert!(table.records[2].is_some());
    }

    #[test]
    fn test_truncated_file_is_error() {
        let mut data = DbfBuilder::new()
            .character("ID_2", 12)
            .row(&["1"])
            .row(&["2"])
            .build_utf8();
        data.truncate(data.len() - 10);

        assert!(parse(&data, None, encoding_rs::UTF_8).is_err());
    }

    #[test]
    fn test_too_short_is_error() {
        assert!(parse(b"\x03abc", None, encoding_rs::UTF_8).is_err());
    }
}
