use serde::*;

/// Modified Julian Date representation.
/// MJD 0 = 1858-11-17 00:00:00 UTC
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ModifiedJulianDate(f64);

impl ModifiedJulianDate {
    /// Create a new MJD value.
    pub fn new(v: f64) -> Self {
        Self(v)
    }

    /// Raw MJD value as f64.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// The corresponding Julian Date.
    pub fn to_jd(&self) -> f64 {
        self.0 + 2400000.5
    }

    /// Advance by a number of seconds.
    pub fn add_seconds(&self, seconds: f64) -> Self {
        Self(self.0 + seconds / 86400.0)
    }

    /// Seconds from `self` to `other` (positive when `other` is later).
    pub fn seconds_until(&self, other: ModifiedJulianDate) -> f64 {
        (other.0 - self.0) * 86400.0
    }

    /// Convert to Unix timestamp (seconds since 1970-01-01 00:00:00 UTC).
    pub fn to_unix_timestamp(&self) -> f64 {
        (self.0 - 40587.0) * 86400.0
    }

    /// Create from Unix timestamp (seconds since 1970-01-01 00:00:00 UTC).
    pub fn from_unix_timestamp(timestamp: f64) -> Self {
        Self::new(timestamp / 86400.0 + 40587.0)
    }

    /// Convert to chrono DateTime<Utc>.
    ///
    /// Rounded to the nearest nanosecond: an f64 MJD resolves to about a
    /// microsecond in the current era, and truncation would pull exact
    /// wall-clock seconds one second early.
    pub fn to_datetime(&self) -> chrono::DateTime<chrono::Utc> {
        let total_nanos = (self.to_unix_timestamp() * 1e9).round() as i64;
        let secs = total_nanos.div_euclid(1_000_000_000);
        let nanos = total_nanos.rem_euclid(1_000_000_000) as u32;
        chrono::DateTime::from_timestamp(secs, nanos).unwrap_or(chrono::DateTime::UNIX_EPOCH)
    }

    /// Create from chrono DateTime<Utc>.
    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self::from_unix_timestamp(dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 / 1e9)
    }
}

impl From<f64> for ModifiedJulianDate {
    fn from(v: f64) -> Self {
        ModifiedJulianDate::new(v)
    }
}

#[cfg(test)]
mod tests {
    use super::ModifiedJulianDate;

    #[test]
    fn test_mjd_new() {
        let mjd = ModifiedJulianDate::new(50000.0);
        assert_eq!(mjd.value(), 50000.0);
    }

    #[test]
    fn test_mjd_to_jd() {
        let mjd = ModifiedJulianDate::new(51544.5);
        assert!((mjd.to_jd() - 2451545.0).abs() < 1e-9);
    }

    #[test]
    fn test_mjd_to_unix_timestamp() {
        // MJD 40587.0 corresponds to the Unix epoch (1970-01-01)
        let mjd = ModifiedJulianDate::new(40587.0);
        assert!((mjd.to_unix_timestamp()).abs() < 1.0);
    }

    #[test]
    fn test_mjd_roundtrip_unix() {
        let original = ModifiedJulianDate::new(59000.5);
        let timestamp = original.to_unix_timestamp();
        let roundtrip = ModifiedJulianDate::from_unix_timestamp(timestamp);
        assert!((original.value() - roundtrip.value()).abs() < 1e-9);
    }

    #[test]
    fn test_mjd_add_seconds() {
        let mjd = ModifiedJulianDate::new(60000.0);
        let later = mjd.add_seconds(86400.0);
        assert!((later.value() - 60001.0).abs() < 1e-9);
        assert!((mjd.seconds_until(later) - 86400.0).abs() < 1e-6);
    }

    #[test]
    fn test_mjd_datetime_roundtrip() {
        let dt = chrono::DateTime::parse_from_rfc3339("2026-01-15T06:30:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let mjd = ModifiedJulianDate::from_datetime(dt);
        let back = mjd.to_datetime();
        assert_eq!(back.timestamp(), dt.timestamp());
    }

    #[test]
    fn test_mjd_ordering() {
        let mjd1 = ModifiedJulianDate::new(50000.0);
        let mjd2 = ModifiedJulianDate::new(51000.0);
        assert!(mjd1 < mjd2);
    }
}
