//! Spectrophotometric standard stars.

use chrono::{DateTime, Utc};

use crate::astro::coords::{altitude_deg, hour_angle_hours, Equatorial};
use crate::astro::time::lst_at;
use crate::astro::ObserverSite;
use crate::models::ModifiedJulianDate;

/// A calibration standard from the built-in list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardStar {
    pub name: &'static str,
    pub ra_deg: f64,
    pub dec_deg: f64,
    /// Spectrograph exposure time in seconds.
    pub exptime_s: u32,
}

impl StandardStar {
    pub fn target(&self) -> Equatorial {
        Equatorial::new(self.ra_deg, self.dec_deg)
    }
}

/// The observatory's standard set. RA coverage is spread around the sky
/// so one of these is always reasonably placed.
pub const STANDARDS: &[StandardStar] = &[
    StandardStar { name: "G191-B2B", ra_deg: 76.3776, dec_deg: 52.8311, exptime_s: 180 },
    StandardStar { name: "Feige34", ra_deg: 159.9031, dec_deg: 43.1026, exptime_s: 180 },
    StandardStar { name: "HZ44", ra_deg: 200.8970, dec_deg: 36.1333, exptime_s: 240 },
    StandardStar { name: "BD+33d2642", ra_deg: 237.9968, dec_deg: 32.9479, exptime_s: 180 },
    StandardStar { name: "BD+28d4211", ra_deg: 327.7958, dec_deg: 28.8639, exptime_s: 180 },
    StandardStar { name: "Feige110", ra_deg: 349.9934, dec_deg: -5.1656, exptime_s: 240 },
];

/// The standard currently closest to the zenith, or `None` when none is
/// above the minimum altitude (should not happen with this list, but the
/// caller still checks).
pub fn closest_to_zenith(
    site: &ObserverSite,
    at: DateTime<Utc>,
    min_altitude_deg: f64,
) -> Option<StandardStar> {
    let lst = lst_at(ModifiedJulianDate::from_datetime(at), site.longitude_deg);
    STANDARDS
        .iter()
        .map(|s| {
            let ha = hour_angle_hours(lst, s.ra_deg);
            (s, altitude_deg(site.latitude_deg, s.dec_deg, ha))
        })
        .filter(|(_, alt)| *alt >= min_altitude_deg)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(s, _)| *s)
}
