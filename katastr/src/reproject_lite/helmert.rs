//! Changement de datum S-JTSK (Bessel 1841) ↔ WGS84
//!
//! Transformation de Helmert à 7 paramètres, convention "position vector".

use super::ellipsoid::{from_geocentric, to_geocentric, Bessel1841, Geocentric, WGS84};

const ARC_SECOND: f64 = std::f64::consts::PI / (180.0 * 3600.0);

/// Paramètres S-JTSK → WGS84 au format WKT `TOWGS84`:
/// dx, dy, dz (m), rx, ry, rz (secondes d'arc), ds (ppm)
pub const TOWGS84: [f64; 7] = [570.8, 85.7, 462.8, 4.998, 1.587, 5.261, 3.56];

const TX: f64 = TOWGS84[0];
const TY: f64 = TOWGS84[1];
const TZ: f64 = TOWGS84[2];
const RX: f64 = TOWGS84[3] * ARC_SECOND;
const RY: f64 = TOWGS84[4] * ARC_SECOND;
const RZ: f64 = TOWGS84[5] * ARC_SECOND;
const SCALE: f64 = TOWGS84[6] * 1e-6;

fn rotate(p: Geocentric) -> Geocentric {
    Geocentric {
        x: p.x - RZ * p.y + RY * p.z,
        y: RZ * p.x + p.y - RX * p.z,
        z: -RY * p.x + RX * p.y + p.z,
    }
}

/// Géocentrique S-JTSK → géocentrique WGS84
pub fn sjtsk_to_wgs84(p: Geocentric) -> Geocentric {
    let r = rotate(p);
    Geocentric {
        x: TX + (1.0 + SCALE) * r.x,
        y: TY + (1.0 + SCALE) * r.y,
        z: TZ + (1.0 + SCALE) * r.z,
    }
}

/// Géocentrique WGS84 → géocentrique S-JTSK (inversion exacte par point fixe)
pub fn wgs84_to_sjtsk(p: Geocentric) -> Geocentric {
    let target = Geocentric {
        x: (p.x - TX) / (1.0 + SCALE),
        y: (p.y - TY) / (1.0 + SCALE),
        z: (p.z - TZ) / (1.0 + SCALE),
    };
    // target = q + Ω·q; les rotations (~1e-5 rad) font converger en 3-4 pas
    let mut q = target;
    for _ in 0..5 {
        let r = rotate(q);
        q = Geocentric {
            x: target.x - (r.x - q.x),
            y: target.y - (r.y - q.y),
            z: target.z - (r.z - q.z),
        };
    }
    q
}

/// (lon, lat) Bessel → (lon, lat) WGS84, radians, hauteur ellipsoïdale nulle
pub fn bessel_to_wgs84(lon: f64, lat: f64) -> (f64, f64) {
    let p = sjtsk_to_wgs84(to_geocentric::<Bessel1841>(lon, lat, 0.0));
    let (lon, lat, _) = from_geocentric::<WGS84>(p);
    (lon, lat)
}

/// (lon, lat) WGS84 → (lon, lat) Bessel, radians
///
/// La hauteur WGS84 est ajustée pour que le point retombe sur l'ellipsoïde
/// de Bessel (h = 0), ce qui rend l'aller-retour avec `bessel_to_wgs84` exact.
pub fn wgs84_to_bessel(lon: f64, lat: f64) -> (f64, f64) {
    let mut h = 0.0;
    let mut result = (lon, lat);
    for _ in 0..4 {
        let p = wgs84_to_sjtsk(to_geocentric::<WGS84>(lon, lat, h));
        let (b_lon, b_lat, b_h) = from_geocentric::<Bessel1841>(p);
        result = (b_lon, b_lat);
        if b_h.abs() < 1e-6 {
            break;
        }
        h -= b_h;
    }
    result
}
