//! Détection de l'encodage des attributs (fichier `.cpg` et octet LDID du DBF)

use encoding_rs::Encoding;

use crate::CuzkShpError;

/// Parse le contenu d'un fichier `.cpg` (ex: "UTF-8", "1250", "cp1250")
pub fn parse(data: &[u8]) -> Result<&'static Encoding, CuzkShpError> {
    let label = std::str::from_utf8(data).unwrap_or("").trim();
    if label.is_empty() {
        return Err(CuzkShpError::UnsupportedEncoding("<empty .cpg>".into()));
    }
    label_to_encoding(label).ok_or_else(|| CuzkShpError::UnsupportedEncoding(label.to_string()))
}

/// Mappe un label de code page ESRI vers un encodage
fn label_to_encoding(label: &str) -> Option<&'static Encoding> {
    let upper = label.to_uppercase();
    // Les code pages numériques ESRI ("1250", "88592") ne sont pas des labels WHATWG
    let normalized = match upper.as_str() {
        "1250" | "CP1250" | "ANSI 1250" => "windows-1250",
        "1252" | "CP1252" | "ANSI 1252" => "windows-1252",
        "88591" | "8859-1" => "iso-8859-1",
        "88592" | "8859-2" => "iso-8859-2",
        "65001" | "UTF8" => "utf-8",
        _ => label,
    };
    Encoding::for_label(normalized.as_bytes())
}

/// Mappe l'octet "language driver" (offset 29 de l'en-tête DBF)
///
/// Seuls les drivers rencontrés dans les données ČÚZK sont reconnus;
/// 0x00 et 0x57 ne désignent pas d'encodage précis.
pub fn ldid_to_encoding(ldid: u8) -> Option<&'static Encoding> {
    match ldid {
        0xC8 => Some(encoding_rs::WINDOWS_1250),
        0x03 => Some(encoding_rs::WINDOWS_1252),
        // 0x64 / 0x87 (DOS 852) n'existent pas dans encoding_rs
        _ => None,
    }
}
