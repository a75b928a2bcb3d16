//! Définitions des ellipsoïdes et conversions géodésiques ↔ géocentriques

/// Paramètres d'un ellipsoïde de référence
pub trait Ellipsoid {
    /// Demi-grand axe en mètres
    const A: f64;
    /// Aplatissement
    const F: f64;
    /// Première excentricité au carré
    const E2: f64 = 2.0 * Self::F - Self::F * Self::F;
}

/// Ellipsoïde WGS84
pub struct WGS84;

impl Ellipsoid for WGS84 {
    const A: f64 = 6378137.0;
    const F: f64 = 1.0 / 298.257223563;
}

impl WGS84 {
    /// Première excentricité
    pub const E: f64 = 0.0818191908426215; // sqrt(E2)
}

/// Ellipsoïde de Bessel 1841 (datum S-JTSK)
pub struct Bessel1841;

impl Ellipsoid for Bessel1841 {
    const A: f64 = 6377397.155;
    const F: f64 = 1.0 / 299.1528128;
}

impl Bessel1841 {
    /// Première excentricité
    pub const E: f64 = 0.0816968312225275; // sqrt(E2)
}

/// Coordonnées géocentriques cartésiennes (mètres)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geocentric {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// (lon, lat en radians, h en mètres) → géocentrique
pub fn to_geocentric<E: Ellipsoid>(lon: f64, lat: f64, h: f64) -> Geocentric {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let n = E::A / (1.0 - E::E2 * sin_lat * sin_lat).sqrt();
    Geocentric {
        x: (n + h) * cos_lat * lon.cos(),
        y: (n + h) * cos_lat * lon.sin(),
        z: (n * (1.0 - E::E2) + h) * sin_lat,
    }
}

/// Géocentrique → (lon, lat en radians, h en mètres), par itération sur la latitude
pub fn from_geocentric<E: Ellipsoid>(p: Geocentric) -> (f64, f64, f64) {
    let r = p.x.hypot(p.y);
    let lon = p.y.atan2(p.x);
    let mut lat = p.z.atan2(r * (1.0 - E::E2));
    let mut h = 0.0;

    for _ in 0..10 {
        let sin_lat = lat.sin();
        let n = E::A / (1.0 - E::E2 * sin_lat * sin_lat).sqrt();
        h = r / lat.cos() - n;
        let next = p.z.atan2(r * (1.0 - E::E2 * n / (n + h)));
        let converged = (next - lat).abs() < 1e-14;
        lat = next;
        if converged {
            break;
        }
    }

    (lon, lat, h)
}
