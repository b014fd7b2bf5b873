//! The observability predicate.
//!
//! A candidate is observable when every constraint holds at both ends of
//! its hypothetical observing window. Altitude, airmass, and the
//! hour-angle exclusion band are checked at the window start and end;
//! lunar constraints are checked at the start only, since the moon moves
//! little over one sequence.

use crate::astro::coords::{angular_separation_deg, Equatorial};
use crate::astro::moon::{moon_equatorial, moon_illumination_pct};
use crate::config::ConstraintSettings;
use crate::models::{ObservationRequest, TargetEphemeris};

/// Which constraint a candidate failed. Reported for high-priority
/// targets so operators can see why the queue skipped them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintViolation {
    Altitude,
    Airmass,
    HourAngle,
    MoonSeparation,
    MoonIllumination,
}

impl std::fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConstraintViolation::Altitude => "altitude",
            ConstraintViolation::Airmass => "airmass",
            ConstraintViolation::HourAngle => "hour angle",
            ConstraintViolation::MoonSeparation => "moon separation",
            ConstraintViolation::MoonIllumination => "moon illumination",
        };
        f.write_str(s)
    }
}

/// Site-wide observing limits, resolved from configuration once per run.
#[derive(Debug, Clone, Copy)]
pub struct ObservingConstraints {
    pub min_altitude_deg: f64,
    pub airmass_min: f64,
    pub airmass_max: f64,
    pub airmass_hard_limit: f64,
    pub moon_sep_base_deg: f64,
    pub moon_illum_knee_pct: f64,
    pub ha_exclusion_lo_hr: f64,
    pub ha_exclusion_hi_hr: f64,
}

impl From<&ConstraintSettings> for ObservingConstraints {
    fn from(s: &ConstraintSettings) -> Self {
        Self {
            min_altitude_deg: s.min_altitude_deg,
            airmass_min: s.airmass_min,
            airmass_max: s.airmass_max,
            airmass_hard_limit: s.airmass_hard_limit,
            moon_sep_base_deg: s.moon_sep_base_deg,
            moon_illum_knee_pct: s.moon_illum_knee_pct,
            ha_exclusion_lo_hr: s.ha_exclusion_lo_hr,
            ha_exclusion_hi_hr: s.ha_exclusion_hi_hr,
        }
    }
}

impl Default for ObservingConstraints {
    fn default() -> Self {
        (&ConstraintSettings::default()).into()
    }
}

/// Minimum acceptable moon separation in degrees for the given lunar
/// illumination percentage. Above the knee the floor grows one degree
/// per illumination point.
pub fn min_moon_separation_deg(illum_pct: f64, cons: &ObservingConstraints) -> f64 {
    if illum_pct > cons.moon_illum_knee_pct {
        cons.moon_sep_base_deg + (illum_pct - cons.moon_illum_knee_pct)
    } else {
        cons.moon_sep_base_deg
    }
}

/// All constraints the candidate fails over its window. Empty means
/// observable.
pub fn violations(
    request: &ObservationRequest,
    eph: &TargetEphemeris,
    cons: &ObservingConstraints,
) -> Vec<ConstraintViolation> {
    let mut failed = Vec::new();

    if eph.start_alt_deg < cons.min_altitude_deg || eph.end_alt_deg < cons.min_altitude_deg {
        failed.push(ConstraintViolation::Altitude);
    }

    // Per-request airmass ceilings never loosen the site ceiling.
    let airmass_max = request.max_airmass.min(cons.airmass_max);
    let nominal = |am: f64| (cons.airmass_min..=airmass_max).contains(&am);
    let hard = |am: f64| am <= cons.airmass_hard_limit && am > 0.0;
    if !nominal(eph.start_airmass)
        || !nominal(eph.end_airmass)
        || !hard(eph.start_airmass)
        || !hard(eph.end_airmass)
    {
        failed.push(ConstraintViolation::Airmass);
    }

    let excluded = |ha: f64| ha > cons.ha_exclusion_lo_hr && ha < cons.ha_exclusion_hi_hr;
    if excluded(eph.start_ha_hr) || excluded(eph.end_ha_hr) {
        failed.push(ConstraintViolation::HourAngle);
    }

    let jd = eph.start_obs.to_jd();
    let illum_pct = moon_illumination_pct(eph.start_obs);
    if illum_pct / 100.0 > request.max_moon_illum {
        failed.push(ConstraintViolation::MoonIllumination);
    }
    let moon = moon_equatorial(jd);
    let target = Equatorial::new(request.ra_deg, request.dec_deg);
    let sep = angular_separation_deg(&target, &moon);
    let required = request
        .min_moon_dist_deg
        .max(min_moon_separation_deg(illum_pct, cons));
    if sep < required {
        failed.push(ConstraintViolation::MoonSeparation);
    }

    failed
}

/// True when the candidate satisfies every constraint over its window.
pub fn is_observable(
    request: &ObservationRequest,
    eph: &TargetEphemeris,
    cons: &ObservingConstraints,
) -> bool {
    violations(request, eph, cons).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModifiedJulianDate, RawSequence, RequestStatus, TargetKind};
    use chrono::{TimeZone, Utc};

    fn request() -> ObservationRequest {
        ObservationRequest {
            req_id: 1,
            obj_id: 10,
            name: "test".into(),
            ra_deg: 150.0,
            dec_deg: 20.0,
            equinox: 2000.0,
            kind: TargetKind::Fixed,
            motion: None,
            priority: 5,
            max_airmass: 2.5,
            min_moon_dist_deg: 0.0,
            max_moon_illum: 1.0,
            inidate: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            enddate: Utc.with_ymd_and_hms(2026, 12, 31, 0, 0, 0).unwrap(),
            sequence: RawSequence::new(&["1r"], &[300], 1),
            status: RequestStatus::Pending,
            program: None,
        }
    }

    fn good_eph() -> TargetEphemeris {
        // New moon (2026-01-18) so lunar constraints are quiet.
        let t = ModifiedJulianDate::from_datetime(
            Utc.with_ymd_and_hms(2026, 1, 19, 6, 0, 0).unwrap(),
        );
        TargetEphemeris {
            start_obs: t,
            end_obs: t.add_seconds(600.0),
            start_alt_deg: 60.0,
            end_alt_deg: 58.0,
            start_airmass: 1.15,
            end_airmass: 1.18,
            start_ha_hr: 23.0,
            end_ha_hr: 23.2,
            rise_time: None,
            set_time: None,
        }
    }

    #[test]
    fn clean_candidate_is_observable() {
        assert!(is_observable(&request(), &good_eph(), &ObservingConstraints::default()));
    }

    #[test]
    fn endpoint_checks_are_symmetric() {
        let cons = ObservingConstraints::default();
        let req = request();

        // Setting target: fine at the start, past the ceiling at the end.
        let mut eph = good_eph();
        eph.end_alt_deg = 14.0;
        eph.end_airmass = 3.9;
        let v = violations(&req, &eph, &cons);
        assert!(v.contains(&ConstraintViolation::Altitude));
        assert!(v.contains(&ConstraintViolation::Airmass));

        // Rising target: bad at the start, fine at the end.
        let mut eph = good_eph();
        eph.start_alt_deg = 12.0;
        eph.start_airmass = 4.1;
        let v = violations(&req, &eph, &cons);
        assert!(v.contains(&ConstraintViolation::Altitude));
        assert!(v.contains(&ConstraintViolation::Airmass));
    }

    #[test]
    fn hour_angle_band_excludes_either_endpoint() {
        let cons = ObservingConstraints::default();
        let req = request();

        let mut eph = good_eph();
        eph.start_ha_hr = 6.0;
        assert!(violations(&req, &eph, &cons).contains(&ConstraintViolation::HourAngle));

        let mut eph = good_eph();
        eph.end_ha_hr = 18.0;
        assert!(violations(&req, &eph, &cons).contains(&ConstraintViolation::HourAngle));

        // The band is open: exactly on the edge passes.
        let mut eph = good_eph();
        eph.start_ha_hr = 5.25;
        eph.end_ha_hr = 18.75;
        assert!(!violations(&req, &eph, &cons).contains(&ConstraintViolation::HourAngle));
    }

    #[test]
    fn moon_separation_floor_grows_when_bright() {
        let cons = ObservingConstraints::default();
        assert_eq!(min_moon_separation_deg(50.0, &cons), 5.0);
        assert_eq!(min_moon_separation_deg(75.0, &cons), 5.0);
        assert!((min_moon_separation_deg(90.0, &cons) - 20.0).abs() < 1e-9);
        assert!((min_moon_separation_deg(100.0, &cons) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn target_on_the_full_moon_is_rejected() {
        let cons = ObservingConstraints::default();
        // Full moon 2026-01-03; park the target right on top of it.
        let t = ModifiedJulianDate::from_datetime(
            Utc.with_ymd_and_hms(2026, 1, 3, 10, 0, 0).unwrap(),
        );
        let moon = crate::astro::moon::moon_equatorial(t.to_jd());
        let mut req = request();
        req.ra_deg = moon.ra_deg;
        req.dec_deg = moon.dec_deg;
        let mut eph = good_eph();
        eph.start_obs = t;
        eph.end_obs = t.add_seconds(600.0);
        assert!(violations(&req, &eph, &cons).contains(&ConstraintViolation::MoonSeparation));
    }

    #[test]
    fn per_request_moon_illumination_cap() {
        let cons = ObservingConstraints::default();
        let mut req = request();
        req.max_moon_illum = 0.2;
        // Full moon window.
        let t = ModifiedJulianDate::from_datetime(
            Utc.with_ymd_and_hms(2026, 1, 3, 10, 0, 0).unwrap(),
        );
        let mut eph = good_eph();
        eph.start_obs = t;
        assert!(violations(&req, &eph, &cons).contains(&ConstraintViolation::MoonIllumination));
    }
}
