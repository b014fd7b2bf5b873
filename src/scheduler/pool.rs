//! Per-pass ephemeris evaluation of the candidate pool.

use chrono::{DateTime, Utc};

use crate::astro::coords::{
    airmass_secz, altitude_deg, horizon_crossing_ha_hours, hour_angle_hours, signed_hour_angle,
};
use crate::astro::time::lst_at;
use crate::astro::ObserverSite;
use crate::models::{Candidate, ModifiedJulianDate, TargetEphemeris};

/// One sidereal hour in solar hours.
const SIDEREAL_TO_SOLAR: f64 = 0.997_269_566_3;

/// Recompute a candidate's sky state for a window opening at `at` and
/// lasting its estimated sequence duration.
pub fn evaluate_at(
    candidate: &mut Candidate,
    at: DateTime<Utc>,
    site: &ObserverSite,
    min_altitude_deg: f64,
) {
    let start_obs = ModifiedJulianDate::from_datetime(at);
    let end_obs = start_obs.add_seconds(candidate.summary.total_s as f64);

    let ra = candidate.request.ra_deg;
    let dec = candidate.request.dec_deg;

    let start_ha = hour_angle_hours(lst_at(start_obs, site.longitude_deg), ra);
    let end_ha = hour_angle_hours(lst_at(end_obs, site.longitude_deg), ra);

    let start_alt = altitude_deg(site.latitude_deg, dec, start_ha);
    let end_alt = altitude_deg(site.latitude_deg, dec, end_ha);

    let (rise_time, set_time) =
        match horizon_crossing_ha_hours(site.latitude_deg, dec, min_altitude_deg) {
            Some(h) => {
                let signed = signed_hour_angle(start_ha);
                // Hours until the target's hour angle reaches +h (set) or
                // wraps around to -h (rise), sidereal rate.
                let to_set = (h - signed).rem_euclid(24.0) * SIDEREAL_TO_SOLAR;
                let to_rise = (-h - signed).rem_euclid(24.0) * SIDEREAL_TO_SOLAR;
                (
                    Some(start_obs.add_seconds(to_rise * 3600.0)),
                    Some(start_obs.add_seconds(to_set * 3600.0)),
                )
            }
            // Circumpolar or never-rising: no crossing to report.
            None => (None, None),
        };

    candidate.eph = TargetEphemeris {
        start_obs,
        end_obs,
        start_alt_deg: start_alt,
        end_alt_deg: end_alt,
        start_airmass: airmass_secz(start_alt),
        end_airmass: airmass_secz(end_alt),
        start_ha_hr: start_ha,
        end_ha_hr: end_ha,
        rise_time,
        set_time,
    };
}

/// Refresh every candidate in the pool against the same hypothetical
/// start time.
pub fn refresh_pool(
    pool: &mut [Candidate],
    at: DateTime<Utc>,
    site: &ObserverSite,
    min_altitude_deg: f64,
) {
    for candidate in pool.iter_mut() {
        evaluate_at(candidate, at, site, min_altitude_deg);
    }
}
