//! Pool ordering.
//!
//! The normal queue is sorted by priority with ephemeris tiebreakers.
//! Once the walk down the ranked pool reaches a filler target the
//! remaining tail is re-sorted once by hour angle alone, so low-value
//! time goes to whatever is furthest west and about to be lost.

use std::cmp::Ordering;

use crate::models::Candidate;

/// A sortable attribute of a pool candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Priority,
    StartAltitude,
    SetTime,
    StartHourAngle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// The default queue order: best targets first.
pub const DEFAULT_ORDER: &[(SortKey, SortOrder)] = &[
    (SortKey::Priority, SortOrder::Descending),
    (SortKey::StartAltitude, SortOrder::Descending),
];

fn key_value(c: &Candidate, key: SortKey) -> f64 {
    match key {
        SortKey::Priority => f64::from(c.request.priority),
        SortKey::StartAltitude => c.eph.start_alt_deg,
        // Circumpolar targets never set; treat them as setting last.
        SortKey::SetTime => c.eph.set_time.map_or(f64::INFINITY, |t| t.value()),
        SortKey::StartHourAngle => c.eph.start_ha_hr,
    }
}

fn compare(a: &Candidate, b: &Candidate, keys: &[(SortKey, SortOrder)]) -> Ordering {
    for &(key, order) in keys {
        let (x, y) = (key_value(a, key), key_value(b, key));
        let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        let ord = match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Stable-sort the pool by the given keys.
pub fn rank(pool: &mut [Candidate], keys: &[(SortKey, SortOrder)]) {
    pool.sort_by(|a, b| compare(a, b, keys));
}

/// Re-sort the tail of the pool starting at `from` by descending hour
/// angle. Called at most once per selection pass, when the walk first
/// reaches a filler candidate.
pub fn reorder_tail_by_hour_angle(pool: &mut [Candidate], from: usize) {
    if from >= pool.len() {
        return;
    }
    pool[from..].sort_by(|a, b| {
        b.eph
            .start_ha_hr
            .partial_cmp(&a.eph.start_ha_hr)
            .unwrap_or(Ordering::Equal)
    });
}
