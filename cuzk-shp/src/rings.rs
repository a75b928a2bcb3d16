//! Assemblage des anneaux d'un Polygon shapefile
//!
//! Convention ESRI: anneaux extérieurs en sens horaire, trous en sens
//! anti-horaire. Un enregistrement peut contenir plusieurs extérieurs.

use geo::{Area, Geometry, Intersects, LineString, MultiPolygon, Point, Polygon, Winding};

/// Construit un Polygon ou MultiPolygon à partir des anneaux d'un enregistrement
///
/// Les trous sont rattachés au plus petit extérieur qui contient leur premier
/// sommet; un trou sans extérieur devient lui-même un extérieur.
pub fn assemble_polygon(rings: Vec<LineString>) -> Option<Geometry> {
    let mut exteriors: Vec<LineString> = Vec::new();
    let mut holes: Vec<LineString> = Vec::new();

    for mut ring in rings {
        close_ring(&mut ring);
        if ring.is_cw() {
            exteriors.push(ring);
        } else if ring.is_ccw() {
            holes.push(ring);
        } else {
            // Anneau dégénéré (aire nulle)
            tracing::debug!(points = ring.0.len(), "Dropping degenerate ring");
        }
    }

    let mut polygons: Vec<(Polygon, Vec<LineString>)> = exteriors
        .into_iter()
        .map(|ext| (Polygon::new(ext, vec![]), Vec::new()))
        .collect();

    for hole in holes {
        let Some(first) = hole.0.first().copied() else {
            continue;
        };
        let probe = Point::from(first);

        let owner = polygons
            .iter()
            .enumerate()
            .filter(|(_, (poly, _))| poly.intersects(&probe))
            .min_by(|(_, (a, _)), (_, (b, _))| {
                a.unsigned_area()
                    .partial_cmp(&b.unsigned_area())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(idx, _)| idx);

        match owner {
            Some(idx) => polygons[idx].1.push(hole),
            None => {
                // Trou orphelin: traité comme extérieur (orientation inversée)
                tracing::debug!("Orphan hole promoted to exterior");
                let mut ring = hole;
                ring.0.reverse();
                polygons.push((Polygon::new(ring, vec![]), Vec::new()));
            }
        }
    }

    let mut assembled: Vec<Polygon> = polygons
        .into_iter()
        .map(|(poly, interiors)| {
            let (exterior, _) = poly.into_inner();
            Polygon::new(exterior, interiors)
        })
        .collect();

    match assembled.len() {
        0 => None,
        1 => assembled.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(MultiPolygon::new(assembled))),
    }
}

/// Ferme un anneau si le dernier sommet diffère du premier
fn close_ring(ring: &mut LineString) {
    if let (Some(&first), Some(&last)) = (ring.0.first(), ring.0.last()) {
        if first != last {
            ring.0.push(first);
        }
    }
}
