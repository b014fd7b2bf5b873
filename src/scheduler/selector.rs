//! Target selection: the ranked walk down the candidate pool.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::observability::{violations, ObservingConstraints};
use super::pool::refresh_pool;
use super::ranker::{rank, reorder_tail_by_hour_angle, SortKey, SortOrder};
use crate::astro::coords::Equatorial;
use crate::astro::ObserverSite;
use crate::models::{Candidate, SequenceSummary, TargetKind, FILLER_PRIORITY_MAX};

use super::observability::ConstraintViolation;

/// Why a high-priority candidate was passed over, surfaced to operators.
#[derive(Debug, Clone)]
pub struct RejectionReason {
    pub req_id: i64,
    pub name: String,
    pub priority: i32,
    pub failed: Vec<ConstraintViolation>,
}

/// The chosen target for the next observation.
#[derive(Debug, Clone)]
pub struct Selection {
    pub req_id: i64,
    pub obj_id: i64,
    pub name: String,
    pub target: Equatorial,
    pub summary: SequenceSummary,
    pub priority: i32,
}

/// Outcome of one selection pass over the pool.
#[derive(Debug, Clone, Default)]
pub struct SelectorOutcome {
    pub selection: Option<Selection>,
    /// Rejections for candidates at or above this reporting threshold.
    pub rejections: Vec<RejectionReason>,
}

/// Priority at or above which rejection reasons are reported.
const REJECTION_REPORT_PRIORITY: i32 = 4;

/// Walk the ranked pool and return the first observable fixed target.
///
/// The pool is refreshed against `at` and ranked in place. The first time
/// the walk reaches a filler candidate the unvisited tail (including that
/// candidate) is re-sorted by descending hour angle, once per pass.
/// Non-fixed targets are skipped without constraint checks; they are
/// vetted upstream.
pub fn next_observable_target(
    pool: &mut Vec<Candidate>,
    at: DateTime<Utc>,
    site: &ObserverSite,
    cons: &ObservingConstraints,
    order: &[(SortKey, SortOrder)],
) -> SelectorOutcome {
    refresh_pool(pool, at, site, cons.min_altitude_deg);
    rank(pool, order);

    let mut outcome = SelectorOutcome::default();
    let mut fallback_done = false;

    let mut i = 0;
    while i < pool.len() {
        if !fallback_done && pool[i].request.priority <= FILLER_PRIORITY_MAX {
            reorder_tail_by_hour_angle(pool, i);
            fallback_done = true;
            // Re-examine the slot now holding the westernmost filler.
            continue;
        }

        let candidate = &pool[i];
        if candidate.request.kind != TargetKind::Fixed {
            debug!(
                req_id = candidate.request.req_id,
                "skipping non-fixed target"
            );
            i += 1;
            continue;
        }

        let failed = violations(&candidate.request, &candidate.eph, cons);
        if failed.is_empty() {
            outcome.selection = Some(Selection {
                req_id: candidate.request.req_id,
                obj_id: candidate.request.obj_id,
                name: candidate.request.name.clone(),
                target: Equatorial::new(candidate.request.ra_deg, candidate.request.dec_deg),
                summary: candidate.summary.clone(),
                priority: candidate.request.priority,
            });
            return outcome;
        }

        if candidate.request.priority >= REJECTION_REPORT_PRIORITY {
            outcome.rejections.push(RejectionReason {
                req_id: candidate.request.req_id,
                name: candidate.request.name.clone(),
                priority: candidate.request.priority,
                failed,
            });
        }
        i += 1;
    }

    outcome
}
