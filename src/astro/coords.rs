//! Equatorial/horizontal coordinate transforms, airmass, and separations.

use serde::{Deserialize, Serialize};

/// Equatorial coordinates in degrees (ICRS).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Equatorial {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

impl Equatorial {
    pub fn new(ra_deg: f64, dec_deg: f64) -> Self {
        Self { ra_deg, dec_deg }
    }
}

/// Hour angle of a target in hours, [0, 24), given the local sidereal time.
pub fn hour_angle_hours(lst_hours: f64, ra_deg: f64) -> f64 {
    (lst_hours - ra_deg / 15.0).rem_euclid(24.0)
}

/// Map an hour angle in [0, 24) to the signed east/west convention
/// (-12, 12], negative east of the meridian.
pub fn signed_hour_angle(ha_hours: f64) -> f64 {
    if ha_hours > 12.0 {
        ha_hours - 24.0
    } else {
        ha_hours
    }
}

/// Topocentric altitude in degrees for a target at the given hour angle.
pub fn altitude_deg(latitude_deg: f64, dec_deg: f64, ha_hours: f64) -> f64 {
    let lat = latitude_deg.to_radians();
    let dec = dec_deg.to_radians();
    let ha = (ha_hours * 15.0).to_radians();
    let sin_alt = lat.sin() * dec.sin() + lat.cos() * dec.cos() * ha.cos();
    sin_alt.clamp(-1.0, 1.0).asin().to_degrees()
}

/// Plane-parallel airmass (sec z) for a given altitude.
///
/// Below the horizon this goes negative or blows up; callers check the
/// altitude constraint first and treat any value above the hard ceiling
/// as unobservable.
pub fn airmass_secz(alt_deg: f64) -> f64 {
    let sin_alt = alt_deg.to_radians().sin();
    if sin_alt.abs() < 1e-9 {
        f64::INFINITY
    } else {
        1.0 / sin_alt
    }
}

/// Great-circle separation between two equatorial positions in degrees.
pub fn angular_separation_deg(a: &Equatorial, b: &Equatorial) -> f64 {
    let ra1 = a.ra_deg.to_radians();
    let dec1 = a.dec_deg.to_radians();
    let ra2 = b.ra_deg.to_radians();
    let dec2 = b.dec_deg.to_radians();

    // Vincenty form, stable at small and large separations.
    let d_ra = ra2 - ra1;
    let num = ((dec2.cos() * d_ra.sin()).powi(2)
        + (dec1.cos() * dec2.sin() - dec1.sin() * dec2.cos() * d_ra.cos()).powi(2))
    .sqrt();
    let den = dec1.sin() * dec2.sin() + dec1.cos() * dec2.cos() * d_ra.cos();
    num.atan2(den).to_degrees()
}

/// The absolute hour angle (hours) at which a target crosses the given
/// altitude, or `None` when it never does from this latitude
/// (circumpolar or never-rising).
pub fn horizon_crossing_ha_hours(latitude_deg: f64, dec_deg: f64, alt_deg: f64) -> Option<f64> {
    let lat = latitude_deg.to_radians();
    let dec = dec_deg.to_radians();
    let cos_h = (alt_deg.to_radians().sin() - lat.sin() * dec.sin()) / (lat.cos() * dec.cos());
    if !(-1.0..=1.0).contains(&cos_h) {
        return None;
    }
    Some(cos_h.acos().to_degrees() / 15.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transit_altitude_matches_colatitude() {
        // At transit (HA 0) altitude = 90 - |lat - dec|
        let alt = altitude_deg(33.0, 20.0, 0.0);
        assert!((alt - (90.0 - 13.0)).abs() < 1e-9);
    }

    #[test]
    fn zenith_target_has_unit_airmass() {
        let alt = altitude_deg(33.0, 33.0, 0.0);
        assert!((alt - 90.0).abs() < 1e-9);
        assert!((airmass_secz(alt) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn airmass_grows_toward_horizon() {
        assert!(airmass_secz(20.0) > airmass_secz(40.0));
        // sec z = 2 at 30 degrees altitude
        assert!((airmass_secz(30.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn hour_angle_wraps() {
        let ha = hour_angle_hours(1.0, 45.0); // LST 1h, RA 3h
        assert!((ha - 22.0).abs() < 1e-9);
        assert!((signed_hour_angle(ha) - (-2.0)).abs() < 1e-9);
    }

    #[test]
    fn separation_basic_cases() {
        let a = Equatorial::new(10.0, 0.0);
        let b = Equatorial::new(25.0, 0.0);
        assert!((angular_separation_deg(&a, &b) - 15.0).abs() < 1e-9);

        let p = Equatorial::new(0.0, 90.0);
        let q = Equatorial::new(123.0, -90.0);
        assert!((angular_separation_deg(&p, &q) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn horizon_crossing_cases() {
        // Equatorial target from mid-northern latitude crosses 15 degrees.
        let h = horizon_crossing_ha_hours(33.0, 0.0, 15.0).unwrap();
        assert!(h > 0.0 && h < 12.0);
        // Circumpolar target never reaches down to 15 degrees.
        assert!(horizon_crossing_ha_hours(33.0, 80.0, 15.0).is_none());
        // Far-southern target never rises above 15 degrees from +33.
        assert!(horizon_crossing_ha_hours(33.0, -60.0, 15.0).is_none());
    }
}
