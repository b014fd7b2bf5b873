//! Low-precision lunar position and illumination.

use super::coords::Equatorial;
use crate::models::ModifiedJulianDate;

/// Fundamental lunar arguments in radians at a Julian day.
struct LunarArguments {
    /// Mean longitude
    lp: f64,
    /// Mean elongation from the Sun
    d: f64,
    /// Solar mean anomaly
    m: f64,
    /// Lunar mean anomaly
    mp: f64,
    /// Argument of latitude
    f: f64,
    t: f64,
}

fn lunar_arguments(jd: f64) -> LunarArguments {
    let t = (jd - 2451545.0) / 36525.0;
    let deg = |v: f64| v.rem_euclid(360.0).to_radians();
    LunarArguments {
        lp: deg(218.3164477 + 481267.88123421 * t),
        d: deg(297.8501921 + 445267.1114034 * t),
        m: deg(357.5291092 + 35999.0502909 * t),
        mp: deg(134.9633964 + 477198.8675055 * t),
        f: deg(93.2720950 + 483202.0175233 * t),
        t,
    }
}

/// Geocentric equatorial position of the Moon.
///
/// Largest periodic terms only; accurate to a few tenths of a degree,
/// ample for a separation constraint quoted in whole degrees.
pub fn moon_equatorial(jd: f64) -> Equatorial {
    let a = lunar_arguments(jd);

    let lon_deg = a.lp.to_degrees()
        + 6.288774 * a.mp.sin()
        + 1.274027 * (2.0 * a.d - a.mp).sin()
        + 0.658314 * (2.0 * a.d).sin()
        + 0.213618 * (2.0 * a.mp).sin()
        - 0.185116 * a.m.sin()
        - 0.114332 * (2.0 * a.f).sin();

    let lat_deg = 5.128122 * a.f.sin()
        + 0.280602 * (a.mp + a.f).sin()
        + 0.277693 * (a.mp - a.f).sin();

    let eps = (23.439291 - 0.0130042 * a.t).to_radians();
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();

    let ra = (lon.sin() * eps.cos() - lat.tan() * eps.sin()).atan2(lon.cos());
    let dec = (lat.sin() * eps.cos() + lat.cos() * eps.sin() * lon.sin()).asin();

    Equatorial {
        ra_deg: ra.to_degrees().rem_euclid(360.0),
        dec_deg: dec.to_degrees(),
    }
}

/// Illuminated fraction of the lunar disk, [0, 1].
pub fn moon_illumination(jd: f64) -> f64 {
    let a = lunar_arguments(jd);
    // Phase angle from the mean elongation with the leading periodic
    // corrections.
    let i_deg = 180.0 - a.d.to_degrees() - 6.289 * a.mp.sin() + 2.100 * a.m.sin()
        - 1.274 * (2.0 * a.d - a.mp).sin()
        - 0.658 * (2.0 * a.d).sin();
    let i = i_deg.to_radians();
    ((1.0 + i.cos()) / 2.0).clamp(0.0, 1.0)
}

/// Illumination at an MJD instant, as a percentage.
pub fn moon_illumination_pct(at: ModifiedJulianDate) -> f64 {
    moon_illumination(at.to_jd()) * 100.0
}
