//! Projection Křovák (S-JTSK / Krovak East North, EPSG:5514)
//!
//! Conique conforme oblique sur l'ellipsoïde de Bessel 1841. Les formules
//! travaillent en (southing, westing) positifs; EPSG:5514 expose
//! X = -westing (est), Y = -southing (nord).

use std::f64::consts::FRAC_PI_4;

use super::ellipsoid::{Bessel1841, Ellipsoid};

/// Latitude du centre de projection (49°30')
const PHI_C: f64 = 49.5;
/// Longitude d'origine (24°50' à l'est de Greenwich)
const LAMBDA_0: f64 = 24.0 + 50.0 / 60.0;
/// Azimut de la ligne centrale (30°17'17.30311")
const ALPHA_C: f64 = 30.0 + 17.0 / 60.0 + 17.30311 / 3600.0;
/// Latitude du parallèle pseudo-standard (78°30')
const PHI_P: f64 = 78.5;
/// Facteur d'échelle sur le parallèle pseudo-standard
const K_P: f64 = 0.9999;

/// Constantes dérivées de la projection
#[derive(Debug, Clone, Copy)]
pub struct Krovak {
    b: f64,
    t0: f64,
    n: f64,
    r0: f64,
    lambda_0: f64,
    sin_alpha: f64,
    cos_alpha: f64,
    tan_p: f64,
}

impl Default for Krovak {
    fn default() -> Self {
        Self::new()
    }
}

impl Krovak {
    pub fn new() -> Self {
        let e2 = Bessel1841::E2;
        let e = Bessel1841::E;
        let phi_c = PHI_C.to_radians();
        let phi_p = PHI_P.to_radians();
        let sin_c = phi_c.sin();

        let a = Bessel1841::A * (1.0 - e2).sqrt() / (1.0 - e2 * sin_c * sin_c);
        let b = (1.0 + e2 * phi_c.cos().powi(4) / (1.0 - e2)).sqrt();
        let gamma_0 = (sin_c / b).asin();
        let t0 = (FRAC_PI_4 + gamma_0 / 2.0).tan()
            * ((1.0 + e * sin_c) / (1.0 - e * sin_c)).powf(e * b / 2.0)
            / (FRAC_PI_4 + phi_c / 2.0).tan().powf(b);
        let n = phi_p.sin();
        let r0 = K_P * a / phi_p.tan();
        let alpha = ALPHA_C.to_radians();

        Self {
            b,
            t0,
            n,
            r0,
            lambda_0: LAMBDA_0.to_radians(),
            sin_alpha: alpha.sin(),
            cos_alpha: alpha.cos(),
            tan_p: (FRAC_PI_4 + phi_p / 2.0).tan(),
        }
    }

    /// (lon, lat) Bessel en radians → (X, Y) EPSG:5514
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let e = Bessel1841::E;
        let sin_lat = lat.sin();

        let u = 2.0
            * ((self.t0 * (lat / 2.0 + FRAC_PI_4).tan().powf(self.b)
                / ((1.0 + e * sin_lat) / (1.0 - e * sin_lat)).powf(e * self.b / 2.0))
            .atan()
                - FRAC_PI_4);
        let v = self.b * (self.lambda_0 - lon);

        let t = (self.cos_alpha * u.sin() + self.sin_alpha * u.cos() * v.cos()).asin();
        let d = (u.cos() * v.sin() / t.cos()).asin();
        let theta = self.n * d;
        let r = self.r0 * self.tan_p.powf(self.n) / (t / 2.0 + FRAC_PI_4).tan().powf(self.n);

        let southing = r * theta.cos();
        let westing = r * theta.sin();
        (-westing, -southing)
    }

    /// (X, Y) EPSG:5514 → (lon, lat) Bessel en radians
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let e = Bessel1841::E;
        let southing = -y;
        let westing = -x;

        let r = southing.hypot(westing);
        let theta = westing.atan2(southing);
        let d = theta / self.n;
        let t = 2.0 * (((self.r0 / r).powf(1.0 / self.n) * self.tan_p).atan() - FRAC_PI_4);

        let u = (self.cos_alpha * t.sin() - self.sin_alpha * t.cos() * d.cos()).asin();
        let v = (t.cos() * d.sin() / u.cos()).asin();
        let lon = self.lambda_0 - v / self.b;

        // Latitude par itération (converge en quelques pas)
        let base = self.t0.powf(-1.0 / self.b) * (u / 2.0 + FRAC_PI_4).tan().powf(1.0 / self.b);
        let mut lat = u;
        for _ in 0..15 {
            let sin_lat = lat.sin();
            let next = 2.0
                * ((base * ((1.0 + e * sin_lat) / (1.0 - e * sin_lat)).powf(e / 2.0)).atan()
                    - FRAC_PI_4);
            let converged = (next - lat).abs() < 1e-14;
            lat = next;
            if converged {
                break;
            }
        }

        (lon, lat)
    }
}
