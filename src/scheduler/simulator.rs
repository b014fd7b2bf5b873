//! Offline night simulation.
//!
//! Runs the selection loop against a virtual clock, consuming the pool
//! without touching hardware or the request store. Used for planning and
//! for exercising the scheduler end to end in tests.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::observability::ObservingConstraints;
use super::ranker::DEFAULT_ORDER;
use super::selector::next_observable_target;
use crate::astro::ObserverSite;
use crate::config::TimingSettings;
use crate::models::Candidate;

/// Dwell charged for focus and standard-star blocks.
const SETUP_BLOCK_S: i64 = 300;

/// One entry in a simulated night plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedSlot {
    Science {
        at: DateTime<Utc>,
        req_id: i64,
        name: String,
        priority: i32,
        duration_s: i64,
    },
    Focus {
        at: DateTime<Utc>,
        duration_s: i64,
    },
    /// A standard-star block, either a lead-in or a gap with nothing
    /// observable.
    Standard {
        at: DateTime<Utc>,
        duration_s: i64,
    },
}

impl PlannedSlot {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            PlannedSlot::Science { at, .. }
            | PlannedSlot::Focus { at, .. }
            | PlannedSlot::Standard { at, .. } => *at,
        }
    }
}

/// The ordered plan produced by [`simulate_night`].
#[derive(Debug, Clone, Default)]
pub struct NightPlan {
    pub slots: Vec<PlannedSlot>,
}

impl NightPlan {
    pub fn science_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, PlannedSlot::Science { .. }))
            .count()
    }

    pub fn science_ids(&self) -> Vec<i64> {
        self.slots
            .iter()
            .filter_map(|s| match s {
                PlannedSlot::Science { req_id, .. } => Some(*req_id),
                _ => None,
            })
            .collect()
    }
}

/// Simulate one night of scheduling over `[start, end)`.
///
/// Each selected observation consumes its estimated duration plus the
/// slew overhead; an empty selection records a placeholder standard
/// block, matching what the live loop does with the gap. Selected
/// requests leave the pool, so the plan never repeats a target.
#[allow(clippy::too_many_arguments)]
pub fn simulate_night(
    mut pool: Vec<Candidate>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    include_focus: bool,
    include_standard: bool,
    site: &ObserverSite,
    cons: &ObservingConstraints,
    timing: &TimingSettings,
) -> NightPlan {
    let mut plan = NightPlan::default();
    let mut current = start;
    let mut focus_pending = include_focus;
    let mut standard_pending = include_standard;

    while current < end {
        if focus_pending {
            plan.slots.push(PlannedSlot::Focus {
                at: current,
                duration_s: SETUP_BLOCK_S,
            });
            current += Duration::seconds(SETUP_BLOCK_S);
            focus_pending = false;
            continue;
        }
        if standard_pending {
            plan.slots.push(PlannedSlot::Standard {
                at: current,
                duration_s: SETUP_BLOCK_S,
            });
            current += Duration::seconds(SETUP_BLOCK_S);
            standard_pending = false;
            continue;
        }

        let outcome = next_observable_target(&mut pool, current, site, cons, DEFAULT_ORDER);
        match outcome.selection {
            Some(sel) => {
                let duration_s = sel.summary.total_s;
                plan.slots.push(PlannedSlot::Science {
                    at: current,
                    req_id: sel.req_id,
                    name: sel.name.clone(),
                    priority: sel.priority,
                    duration_s,
                });
                pool.retain(|c| c.request.req_id != sel.req_id);
                current += Duration::seconds(duration_s + i64::from(timing.slew_overhead_s));
            }
            None => {
                plan.slots.push(PlannedSlot::Standard {
                    at: current,
                    duration_s: SETUP_BLOCK_S,
                });
                current += Duration::seconds(SETUP_BLOCK_S);
            }
        }
    }

    info!(
        science = plan.science_count(),
        slots = plan.slots.len(),
        "night simulation complete"
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ObservationRequest, RawSequence, RequestStatus, TargetKind};
    use chrono::TimeZone;

    fn request(req_id: i64, priority: i32, ra_deg: f64, dec_deg: f64) -> ObservationRequest {
        ObservationRequest {
            req_id,
            obj_id: req_id,
            name: format!("sim-{}", req_id),
            ra_deg,
            dec_deg,
            equinox: 2000.0,
            kind: TargetKind::Fixed,
            motion: None,
            priority,
            max_airmass: 2.8,
            min_moon_dist_deg: 0.0,
            max_moon_illum: 1.0,
            inidate: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            enddate: Utc.with_ymd_and_hms(2026, 12, 31, 0, 0, 0).unwrap(),
            sequence: RawSequence::new(&["1r"], &[553], 1),
            status: RequestStatus::Pending,
            program: None,
        }
    }

    fn lst_deg_at(at: DateTime<Utc>) -> f64 {
        let site = ObserverSite::palomar();
        crate::astro::time::lst_at(
            crate::models::ModifiedJulianDate::from_datetime(at),
            site.longitude_deg,
        ) * 15.0
    }

    #[test]
    fn plan_is_ordered_and_never_repeats_a_target() {
        let site = ObserverSite::palomar();
        // Dark, moonless stretch of the 2026-01-19 night.
        let start = Utc.with_ymd_and_hms(2026, 1, 19, 5, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 19, 8, 0, 0).unwrap();
        let lst = lst_deg_at(start);

        let pool = vec![
            Candidate::new(request(1, 5, lst.rem_euclid(360.0), 30.0)),
            Candidate::new(request(2, 9, (lst + 10.0).rem_euclid(360.0), 40.0)),
            Candidate::new(request(3, 7, (lst - 10.0).rem_euclid(360.0), 20.0)),
        ];

        let plan = simulate_night(
            pool,
            start,
            end,
            true,
            true,
            &site,
            &ObservingConstraints::default(),
            &TimingSettings::default(),
        );

        // Focus and standard blocks lead the plan.
        assert!(matches!(plan.slots[0], PlannedSlot::Focus { .. }));
        assert!(matches!(plan.slots[1], PlannedSlot::Standard { .. }));

        // All three targets scheduled exactly once, priority order.
        assert_eq!(plan.science_ids(), vec![2, 3, 1]);

        // Slots are time-ordered and stay inside the window.
        for pair in plan.slots.windows(2) {
            assert!(pair[0].at() < pair[1].at());
        }
        assert!(plan.slots.last().unwrap().at() < end);
    }

    #[test]
    fn virtual_clock_charges_overheads() {
        let site = ObserverSite::palomar();
        let start = Utc.with_ymd_and_hms(2026, 1, 19, 6, 0, 0).unwrap();
        let end = start + Duration::seconds(700);
        let lst = lst_deg_at(start);

        let pool = vec![Candidate::new(request(1, 5, lst.rem_euclid(360.0), 33.0))];
        let plan = simulate_night(
            pool,
            start,
            end,
            false,
            false,
            &site,
            &ObservingConstraints::default(),
            &TimingSettings::default(),
        );

        // 553 + 47 = 600s of observing, then a 60s slew charge leaves 40s,
        // only enough for a placeholder standard block.
        assert!(matches!(plan.slots[0], PlannedSlot::Science { duration_s: 600, .. }));
        assert!(matches!(plan.slots[1], PlannedSlot::Standard { .. }));
        assert_eq!(plan.slots[1].at(), start + Duration::seconds(660));
    }

    #[test]
    fn empty_pool_fills_the_window_with_standards() {
        let site = ObserverSite::palomar();
        let start = Utc.with_ymd_and_hms(2026, 1, 19, 6, 0, 0).unwrap();
        let end = start + Duration::seconds(900);

        let plan = simulate_night(
            Vec::new(),
            start,
            end,
            false,
            false,
            &site,
            &ObservingConstraints::default(),
            &TimingSettings::default(),
        );
        assert_eq!(plan.slots.len(), 3);
        assert!(plan
            .slots
            .iter()
            .all(|s| matches!(s, PlannedSlot::Standard { duration_s: 300, .. })));
    }
}
