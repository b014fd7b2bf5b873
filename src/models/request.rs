//! Observation request and candidate types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sequence::{compute_sequence, RawSequence, SequenceSummary};
use super::time::ModifiedJulianDate;

/// Requests at or below this priority are "filler": once the selector
/// reaches one, the remaining pool is ordered by hour angle alone.
pub const FILLER_PRIORITY_MAX: i32 = 2;

/// Persisted lifecycle state of a request, owned by the request store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Active,
    Completed,
    Failure,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Active => "ACTIVE",
            RequestStatus::Completed => "COMPLETED",
            RequestStatus::Failure => "FAILURE",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target motion class. Only fixed targets receive full constraint
/// checking; the others are rare and vetted upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Fixed,
    Periodic,
    Ephemeris,
}

/// Rate fields carried by non-sidereal targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonSiderealMotion {
    pub ra_rate: f64,
    pub dec_rate: f64,
    pub epoch: f64,
    pub motion_flag: String,
}

/// A pending unit of work from the request store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRequest {
    pub req_id: i64,
    pub obj_id: i64,
    pub name: String,
    /// ICRS coordinates in degrees.
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub equinox: f64,
    pub kind: TargetKind,
    #[serde(default)]
    pub motion: Option<NonSiderealMotion>,
    /// Higher observed first; `<= 2` is filler.
    pub priority: i32,
    pub max_airmass: f64,
    pub min_moon_dist_deg: f64,
    /// Maximum acceptable lunar illumination fraction [0, 1].
    pub max_moon_illum: f64,
    pub inidate: DateTime<Utc>,
    pub enddate: DateTime<Utc>,
    pub sequence: RawSequence,
    pub status: RequestStatus,
    #[serde(default)]
    pub program: Option<String>,
}

impl ObservationRequest {
    pub fn is_filler(&self) -> bool {
        self.priority <= FILLER_PRIORITY_MAX
    }
}

/// Transient per-evaluation sky state for a candidate, recomputed every
/// scheduling pass relative to a hypothetical start time. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetEphemeris {
    pub start_obs: ModifiedJulianDate,
    pub end_obs: ModifiedJulianDate,
    pub start_alt_deg: f64,
    pub end_alt_deg: f64,
    pub start_airmass: f64,
    pub end_airmass: f64,
    /// Hour angle in hours, [0, 24).
    pub start_ha_hr: f64,
    pub end_ha_hr: f64,
    /// Next rise/set through the minimum-altitude horizon, if the target
    /// crosses it at all from this latitude.
    pub rise_time: Option<ModifiedJulianDate>,
    pub set_time: Option<ModifiedJulianDate>,
}

/// A request plus its duration estimate and per-pass ephemeris, as held in
/// the in-memory candidate pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub request: ObservationRequest,
    pub summary: SequenceSummary,
    pub eph: TargetEphemeris,
}

impl Candidate {
    /// Build a candidate from a store row, computing its duration estimate.
    pub fn new(request: ObservationRequest) -> Self {
        let summary = compute_sequence(&request.sequence);
        Self {
            request,
            summary,
            eph: TargetEphemeris::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn fixed_request(req_id: i64, priority: i32) -> ObservationRequest {
        ObservationRequest {
            req_id,
            obj_id: req_id * 10,
            name: format!("ZTF-test-{}", req_id),
            ra_deg: 150.0,
            dec_deg: 20.0,
            equinox: 2000.0,
            kind: TargetKind::Fixed,
            motion: None,
            priority,
            max_airmass: 2.5,
            min_moon_dist_deg: 30.0,
            max_moon_illum: 1.0,
            inidate: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            enddate: Utc.with_ymd_and_hms(2026, 12, 31, 0, 0, 0).unwrap(),
            sequence: RawSequence::new(&["1ifu"], &[1800], 1),
            status: RequestStatus::Pending,
            program: None,
        }
    }

    #[test]
    fn filler_threshold() {
        assert!(fixed_request(1, 2).is_filler());
        assert!(fixed_request(1, -1).is_filler());
        assert!(!fixed_request(1, 3).is_filler());
    }

    #[test]
    fn candidate_computes_duration() {
        let c = Candidate::new(fixed_request(7, 5));
        assert!(c.summary.ifu);
        assert_eq!(c.summary.total_s, 1800 + 47);
    }

    #[test]
    fn status_round_trips_screaming_case() {
        let json = serde_json::to_string(&RequestStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
        let back: RequestStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RequestStatus::Completed);
    }
}
