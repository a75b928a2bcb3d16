//! Parser pour les fichiers PRJ (projection, WKT ESRI)

use memchr::memmem;

use crate::types::Projection;

/// Motifs WKT reconnus, dans l'ordre de priorité
const PROJECTIONS: &[(&[u8], Projection)] = &[
    (b"KROVAK", Projection::SJTSK),
    (b"S-JTSK", Projection::SJTSK),
    (b"S_JTSK", Projection::SJTSK),
    (b"GCS_WGS_1984", Projection::WGS84),
    (b"\"WGS 84\"", Projection::WGS84),
];

/// Parse un fichier PRJ pour extraire la projection
///
/// Retourne None si aucun motif connu n'est trouvé: le `.prj` est
/// informatif, l'appelant décide de la projection par défaut.
pub fn parse(data: &[u8]) -> Option<Projection> {
    let upper = data.to_ascii_uppercase();

    // Un PROJCS géographique WGS84 contient aussi "WGS_1984" dans son GEOGCS:
    // on ne le considère WGS84 que s'il n'y a pas de PROJCS.
    let projected = memmem::find(&upper, b"PROJCS").is_some();

    for &(pattern, projection) in PROJECTIONS {
        if projected && projection == Projection::WGS84 {
            continue;
        }
        // Recherche SIMD du motif
        if memmem::find(&upper, &pattern.to_ascii_uppercase()).is_some() {
            return Some(projection);
        }
    }

    None
}
