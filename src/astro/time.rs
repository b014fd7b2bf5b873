//! Julian day and sidereal time.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::models::ModifiedJulianDate;

/// Julian day number for a UTC instant.
pub fn julian_day(dt: &DateTime<Utc>) -> f64 {
    let year = dt.year();
    let month = dt.month();
    let day = dt.day();

    let (y, m) = if month <= 2 {
        (year - 1, month + 12)
    } else {
        (year, month)
    };

    let a = y / 100;
    let b = 2 - a + a / 4;

    let jd = (365.25 * (y as f64 + 4716.0)).floor()
        + (30.6001 * (m as f64 + 1.0)).floor()
        + day as f64
        + b as f64
        - 1524.5;

    let time_fraction = (dt.hour() as f64
        + dt.minute() as f64 / 60.0
        + dt.second() as f64 / 3600.0
        + dt.nanosecond() as f64 / 3.6e12)
        / 24.0;

    jd + time_fraction
}

/// Local sidereal time in hours, [0, 24).
///
/// GMST polynomial referenced to J2000; east-positive longitude.
pub fn local_sidereal_time_hours(jd: f64, longitude_deg: f64) -> f64 {
    let t = (jd - 2451545.0) / 36525.0;

    // Greenwich Mean Sidereal Time in degrees
    let gmst = 280.46061837
        + 360.98564736629 * (jd - 2451545.0)
        + 0.000387933 * t * t
        - t * t * t / 38710000.0;

    let lst = (gmst + longitude_deg).rem_euclid(360.0);
    lst / 15.0
}

/// Local sidereal time at an MJD instant.
pub fn lst_at(mjd: ModifiedJulianDate, longitude_deg: f64) -> f64 {
    local_sidereal_time_hours(mjd.to_jd(), longitude_deg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_julian_day_j2000() {
        // J2000.0 epoch: 2000-01-01 12:00:00 UTC = JD 2451545.0
        let dt = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert!((julian_day(&dt) - 2451545.0).abs() < 1e-6);
    }

    #[test]
    fn test_julian_day_mjd_epoch() {
        // MJD 0 = 1858-11-17 00:00:00 UTC = JD 2400000.5
        let dt = Utc.with_ymd_and_hms(1858, 11, 17, 0, 0, 0).unwrap();
        assert!((julian_day(&dt) - 2400000.5).abs() < 1e-6);
    }

    #[test]
    fn test_lst_range() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 20, 6, 0, 0).unwrap();
        let lst = local_sidereal_time_hours(julian_day(&dt), -116.865);
        assert!((0.0..24.0).contains(&lst));
    }

    #[test]
    fn test_lst_longitude_offset() {
        // 15 degrees east = one sidereal hour later
        let dt = Utc.with_ymd_and_hms(2026, 1, 15, 3, 0, 0).unwrap();
        let jd = julian_day(&dt);
        let greenwich = local_sidereal_time_hours(jd, 0.0);
        let east = local_sidereal_time_hours(jd, 15.0);
        let diff = (east - greenwich).rem_euclid(24.0);
        assert!((diff - 1.0).abs() < 1e-9);
    }
}
