//! Low-precision solar position and altitude.

use super::coords::{altitude_deg, hour_angle_hours, Equatorial};
use super::time::lst_at;
use super::ObserverSite;
use crate::models::ModifiedJulianDate;

/// Apparent equatorial position of the Sun at a Julian day.
///
/// Truncated solar theory, good to well under a hundredth of a degree;
/// twilight boundaries move by under a second of time at that level.
pub fn sun_equatorial(jd: f64) -> Equatorial {
    let t = (jd - 2451545.0) / 36525.0;

    // Mean longitude and mean anomaly (degrees)
    let l0 = 280.46646 + 36000.76983 * t + 0.0003032 * t * t;
    let m = 357.52911 + 35999.05029 * t - 0.0001537 * t * t;
    let mr = m.to_radians();

    // Equation of center
    let c = (1.914602 - 0.004817 * t - 0.000014 * t * t) * mr.sin()
        + (0.019993 - 0.000101 * t) * (2.0 * mr).sin()
        + 0.000289 * (3.0 * mr).sin();

    let true_long = l0 + c;
    let omega = (125.04 - 1934.136 * t).to_radians();
    let lambda = (true_long - 0.00569 - 0.00478 * omega.sin()).to_radians();

    let eps = (23.439291 - 0.0130042 * t + 0.00256 * omega.cos()).to_radians();

    let ra = (eps.cos() * lambda.sin()).atan2(lambda.cos());
    let dec = (eps.sin() * lambda.sin()).asin();

    Equatorial {
        ra_deg: ra.to_degrees().rem_euclid(360.0),
        dec_deg: dec.to_degrees(),
    }
}

/// Solar altitude above the horizon at the site, in degrees.
pub fn sun_altitude_deg(site: &ObserverSite, at: ModifiedJulianDate) -> f64 {
    let sun = sun_equatorial(at.to_jd());
    let lst = lst_at(at, site.longitude_deg);
    let ha = hour_angle_hours(lst, sun.ra_deg);
    altitude_deg(site.latitude_deg, sun.dec_deg, ha)
}

/// RC twilight-flat exposure time, stepped by the current solar altitude.
/// The IFU arm takes half again as long.
pub fn twilight_flat_exptime_s(sun_alt_deg: f64, ifu_arm: bool) -> f64 {
    let exptime = if (-12.0..=-10.0).contains(&sun_alt_deg) {
        180.0
    } else if (-10.0..=-8.0).contains(&sun_alt_deg) {
        120.0
    } else if (-8.0..=-6.0).contains(&sun_alt_deg) {
        60.0
    } else if (-6.0..=-4.0).contains(&sun_alt_deg) {
        10.0
    } else {
        1.0
    };
    if ifu_arm {
        exptime * 1.5
    } else {
        exptime
    }
}
