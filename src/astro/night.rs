//! Observing-night boundaries.
//!
//! A [`NightWindow`] names the twilight crossings bracketing one observing
//! night. It is computed once per night from the site ephemeris and is
//! read-only afterwards; boundaries are monotonically increasing.

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};

use super::sun::sun_altitude_deg;
use super::ObserverSite;
use crate::models::ModifiedJulianDate;

/// Solar depression angles for the standard twilights, degrees.
pub const CIVIL_TWILIGHT_DEG: f64 = -6.0;
pub const NAUTICAL_TWILIGHT_DEG: f64 = -12.0;
pub const ASTRONOMICAL_TWILIGHT_DEG: f64 = -18.0;

/// Named time boundaries for one observing night.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NightWindow {
    pub evening_civil: DateTime<Utc>,
    pub evening_nautical: DateTime<Utc>,
    pub evening_astronomical: DateTime<Utc>,
    pub morning_astronomical: DateTime<Utc>,
    pub morning_nautical: DateTime<Utc>,
    pub morning_civil: DateTime<Utc>,
}

impl NightWindow {
    /// Compute the boundaries of the night containing (or following) the
    /// reference instant.
    ///
    /// The search is anchored at the most recent local solar noon, so a
    /// process restarted mid-night recovers the same window it started
    /// the night with.
    pub fn for_night(site: &ObserverSite, reference: DateTime<Utc>) -> Result<Self> {
        let anchor = most_recent_local_noon(site, reference);

        let evening_civil = find_crossing(site, anchor, CIVIL_TWILIGHT_DEG, Direction::Setting)?;
        let evening_nautical =
            find_crossing(site, evening_civil, NAUTICAL_TWILIGHT_DEG, Direction::Setting)?;
        let evening_astronomical = find_crossing(
            site,
            evening_nautical,
            ASTRONOMICAL_TWILIGHT_DEG,
            Direction::Setting,
        )?;
        let morning_astronomical = find_crossing(
            site,
            evening_astronomical,
            ASTRONOMICAL_TWILIGHT_DEG,
            Direction::Rising,
        )?;
        let morning_nautical = find_crossing(
            site,
            morning_astronomical,
            NAUTICAL_TWILIGHT_DEG,
            Direction::Rising,
        )?;
        let morning_civil =
            find_crossing(site, morning_nautical, CIVIL_TWILIGHT_DEG, Direction::Rising)?;

        Ok(Self {
            evening_civil,
            evening_nautical,
            evening_astronomical,
            morning_astronomical,
            morning_nautical,
            morning_civil,
        })
    }

    /// All boundaries in order, for logging.
    pub fn boundaries(&self) -> [(&'static str, DateTime<Utc>); 6] {
        [
            ("evening_civil", self.evening_civil),
            ("evening_nautical", self.evening_nautical),
            ("evening_astronomical", self.evening_astronomical),
            ("morning_astronomical", self.morning_astronomical),
            ("morning_nautical", self.morning_nautical),
            ("morning_civil", self.morning_civil),
        ]
    }

    pub fn is_monotonic(&self) -> bool {
        self.boundaries().windows(2).all(|w| w[0].1 < w[1].1)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Direction {
    Setting,
    Rising,
}

/// The most recent local solar noon at or before `reference`.
fn most_recent_local_noon(site: &ObserverSite, reference: DateTime<Utc>) -> DateTime<Utc> {
    let noon_offset_s = ((12.0 - site.longitude_deg / 15.0) * 3600.0).round() as i64;
    let midnight = reference
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc();
    let noon = midnight + Duration::seconds(noon_offset_s.rem_euclid(86400));
    if noon <= reference {
        noon
    } else {
        noon - Duration::days(1)
    }
}

/// Find the next crossing of the given solar altitude after `from`,
/// searching up to 24 hours ahead in one-minute steps with linear
/// refinement between brackets.
fn find_crossing(
    site: &ObserverSite,
    from: DateTime<Utc>,
    horizon_deg: f64,
    direction: Direction,
) -> Result<DateTime<Utc>> {
    const STEP_S: f64 = 60.0;
    const LIMIT_STEPS: usize = 24 * 60;

    let start = ModifiedJulianDate::from_datetime(from);
    let mut prev = sun_altitude_deg(site, start);

    for step in 1..=LIMIT_STEPS {
        let t = start.add_seconds(STEP_S * step as f64);
        let alt = sun_altitude_deg(site, t);
        let crossed = match direction {
            Direction::Setting => prev >= horizon_deg && alt < horizon_deg,
            Direction::Rising => prev <= horizon_deg && alt > horizon_deg,
        };
        if crossed {
            // Linear refinement within the bracketing minute.
            let frac = if (alt - prev).abs() > 1e-12 {
                (horizon_deg - prev) / (alt - prev)
            } else {
                0.0
            };
            let refined = t.add_seconds(-STEP_S + STEP_S * frac.clamp(0.0, 1.0));
            return Ok(refined.to_datetime());
        }
        prev = alt;
    }

    bail!(
        "sun never crosses {} deg within 24h of {} at this site",
        horizon_deg,
        from
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn palomar_winter_night_is_ordered_and_long() {
        let site = ObserverSite::palomar();
        let reference = Utc.with_ymd_and_hms(2026, 1, 15, 22, 0, 0).unwrap();
        let window = NightWindow::for_night(&site, reference).unwrap();

        assert!(window.is_monotonic());

        // Winter astronomical night at +33 latitude runs ten hours or more.
        let dark = window.morning_astronomical - window.evening_astronomical;
        assert!(dark.num_hours() >= 9, "dark = {:?}", dark);

        // Evening civil twilight falls in the local evening (UT next 00-03h).
        let h = window.evening_civil.format("%H").to_string();
        let hour: u32 = h.parse().unwrap();
        assert!((0..=3).contains(&hour), "evening civil at {}", window.evening_civil);
    }

    #[test]
    fn restart_mid_night_recovers_the_same_window() {
        let site = ObserverSite::palomar();
        let before = Utc.with_ymd_and_hms(2026, 1, 15, 22, 0, 0).unwrap();
        // 09:00 UT is the middle of the same Palomar night.
        let mid_night = Utc.with_ymd_and_hms(2026, 1, 16, 9, 0, 0).unwrap();

        let w1 = NightWindow::for_night(&site, before).unwrap();
        let w2 = NightWindow::for_night(&site, mid_night).unwrap();
        let delta = (w1.morning_nautical - w2.morning_nautical).num_seconds().abs();
        assert!(delta < 120, "windows differ by {}s", delta);
    }

    #[test]
    fn summer_night_is_shorter_than_winter_night() {
        let site = ObserverSite::palomar();
        let winter = NightWindow::for_night(
            &site,
            Utc.with_ymd_and_hms(2026, 1, 15, 22, 0, 0).unwrap(),
        )
        .unwrap();
        let summer = NightWindow::for_night(
            &site,
            Utc.with_ymd_and_hms(2026, 7, 15, 22, 0, 0).unwrap(),
        )
        .unwrap();

        let winter_dark = winter.morning_astronomical - winter.evening_astronomical;
        let summer_dark = summer.morning_astronomical - summer.evening_astronomical;
        assert!(winter_dark > summer_dark);
    }
}
