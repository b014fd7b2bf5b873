//! Exposure-sequence parsing and duration estimation.
//!
//! A request's exposure plan arrives from the request store as a list of
//! tokens of the form `"<repeat><filter>"` (`"3r"`, `"1ifu"`) paired with a
//! parallel list of per-token exposure times, plus a whole-sequence repeat
//! count. [`compute_sequence`] turns that raw shape into a typed
//! [`ExposurePlan`] and a wall-clock [`SequenceSummary`].
//!
//! Every RC frame costs its nominal exposure time plus a fixed readout tax,
//! summed per frame: each filter/repeat produces a distinct full readout
//! cycle, so the tax is never amortized.

use serde::{Deserialize, Serialize};

/// Per-frame camera readout overhead in seconds, charged on every RC frame.
pub const READOUT_OVERHEAD_S: i64 = 47;

/// IFU exposure value used by the request store as a long-exposure sentinel.
pub const IFU_LONG_SENTINEL_S: i64 = 60;
/// Exposure time the sentinel stands for.
pub const IFU_LONG_EXPTIME_S: i64 = 1800;

/// Photometric filters accepted on the imaging arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RcFilter {
    R,
    G,
    I,
    U,
}

impl RcFilter {
    /// Parse the trailing filter character of a sequence token.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'r' => Some(RcFilter::R),
            'g' => Some(RcFilter::G),
            'i' => Some(RcFilter::I),
            'u' => Some(RcFilter::U),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            RcFilter::R => 'r',
            RcFilter::G => 'g',
            RcFilter::I => 'i',
            RcFilter::U => 'u',
        }
    }
}

/// One accepted imaging step: a filter, its per-exposure time, and how many
/// frames to take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStep {
    pub filter: RcFilter,
    pub exptime_s: i64,
    pub repeat: u32,
}

/// The ordered imaging component of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPlan {
    pub steps: Vec<FilterStep>,
    /// Whole-sequence repeat count.
    pub seq_repeats: u32,
}

/// Typed exposure plan for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExposurePlan {
    /// Nothing to expose (still carries fixed overhead in the summary).
    NoSequence,
    IfuOnly { exptime_s: i64 },
    RcOnly(FilterPlan),
    Combined { ifu_exptime_s: i64, rc: FilterPlan },
}

/// Wall-clock estimate for a request's full exposure sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceSummary {
    pub plan: ExposurePlan,
    pub ifu: bool,
    pub ifu_exptime_s: i64,
    pub ifu_total_s: i64,
    pub rc: bool,
    pub rc_total_s: i64,
    /// Total wall-clock seconds for the whole sequence.
    pub total_s: i64,
}

/// Raw sequence specification as stored with the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSequence {
    /// Tokens of the form `"<repeat><filter>"`, e.g. `"3r"`, `"1ifu"`.
    pub tokens: Vec<String>,
    /// Per-token exposure times in seconds, parallel to `tokens`.
    pub exptimes: Vec<i64>,
    /// Whole-sequence repeat count.
    pub seq_repeats: u32,
}

impl RawSequence {
    pub fn new(tokens: &[&str], exptimes: &[i64], seq_repeats: u32) -> Self {
        Self {
            tokens: tokens.iter().map(|s| s.to_string()).collect(),
            exptimes: exptimes.to_vec(),
            seq_repeats,
        }
    }
}

/// Split a non-IFU token into its repeat count and filter character.
///
/// Tokens that do not parse (no digits, unknown filter) yield `None` and
/// are skipped by the caller; a malformed step never aborts the sequence.
fn parse_filter_token(token: &str) -> Option<(u32, char)> {
    let flt = token.chars().last()?;
    let digits: String = token
        .chars()
        .take(token.chars().count().saturating_sub(1))
        .collect();
    let repeat: u32 = digits.parse().ok()?;
    Some((repeat, flt))
}

/// Compute the typed exposure plan and total duration for a raw sequence.
///
/// Semantics preserved from the production queue:
/// - at most one `ifu` token is expected; exposure 0 means no IFU
///   component, and the sentinel value 60 is reinterpreted as 1800 s;
/// - when the sequence has no imaging component at all, the IFU total
///   carries one fixed readout overhead (and only then);
/// - imaging steps outside the known filter set, [0, 1000] s exposure, or
///   [1, 100] repeats are silently dropped;
/// - the grand total is taken as an absolute value to guard against
///   negative sentinel values leaking out of the store.
pub fn compute_sequence(raw: &RawSequence) -> SequenceSummary {
    let repeat = i64::from(raw.seq_repeats.max(1));

    let mut ifu = false;
    let mut ifu_exptime = 0i64;
    let mut rest: Vec<(&str, i64)> = Vec::new();

    for (token, &exptime) in raw.tokens.iter().zip(raw.exptimes.iter()) {
        if token.contains("ifu") {
            ifu = true;
            ifu_exptime = exptime;
            if ifu_exptime == 0 {
                ifu = false;
            } else if ifu_exptime == IFU_LONG_SENTINEL_S {
                ifu_exptime = IFU_LONG_EXPTIME_S;
            }
        } else {
            rest.push((token.as_str(), exptime));
        }
    }

    // No imaging component: the IFU (or bare) total absorbs one fixed
    // readout overhead.
    if rest.is_empty() {
        let ifu_total = ifu_exptime + READOUT_OVERHEAD_S;
        let plan = if ifu {
            ExposurePlan::IfuOnly {
                exptime_s: ifu_exptime,
            }
        } else {
            ExposurePlan::NoSequence
        };
        return SequenceSummary {
            plan,
            ifu,
            ifu_exptime_s: ifu_exptime,
            ifu_total_s: ifu_total,
            rc: false,
            rc_total_s: 0,
            total_s: ifu_total.abs(),
        };
    }

    let ifu_total = if ifu { ifu_exptime } else { 0 };

    let mut steps: Vec<FilterStep> = Vec::new();
    let mut rc_total = 0i64;
    for (token, exptime) in rest {
        let Some((flt_repeat, flt_char)) = parse_filter_token(token) else {
            continue;
        };
        let Some(filter) = RcFilter::from_char(flt_char) else {
            continue;
        };
        if !(0..=1000).contains(&exptime) {
            continue;
        }
        if !(1..=100).contains(&flt_repeat) {
            continue;
        }
        rc_total += (exptime + READOUT_OVERHEAD_S) * i64::from(flt_repeat);
        steps.push(FilterStep {
            filter,
            exptime_s: exptime,
            repeat: flt_repeat,
        });
    }

    let rc = !steps.is_empty();
    let rc_total = rc_total * repeat;
    let plan = match (ifu, rc) {
        (true, true) => ExposurePlan::Combined {
            ifu_exptime_s: ifu_exptime,
            rc: FilterPlan {
                steps,
                seq_repeats: raw.seq_repeats.max(1),
            },
        },
        (true, false) => ExposurePlan::IfuOnly {
            exptime_s: ifu_exptime,
        },
        (false, true) => ExposurePlan::RcOnly(FilterPlan {
            steps,
            seq_repeats: raw.seq_repeats.max(1),
        }),
        (false, false) => ExposurePlan::NoSequence,
    };

    SequenceSummary {
        plan,
        ifu,
        ifu_exptime_s: ifu_exptime,
        ifu_total_s: ifu_total,
        rc,
        rc_total_s: rc_total,
        total_s: (ifu_total + rc_total).abs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ifu_long_sentinel_maps_to_1800() {
        let raw = RawSequence::new(&["1ifu"], &[60], 1);
        let summary = compute_sequence(&raw);
        assert!(summary.ifu);
        assert_eq!(summary.ifu_exptime_s, 1800);
        assert_eq!(summary.total_s, 1800 + READOUT_OVERHEAD_S);
        assert_eq!(
            summary.plan,
            ExposurePlan::IfuOnly { exptime_s: 1800 }
        );
    }

    #[test]
    fn ifu_zero_exposure_means_no_ifu() {
        let raw = RawSequence::new(&["1ifu"], &[0], 1);
        let summary = compute_sequence(&raw);
        assert!(!summary.ifu);
        assert_eq!(summary.plan, ExposurePlan::NoSequence);
        // Bare sequences still carry the fixed overhead.
        assert_eq!(summary.total_s, READOUT_OVERHEAD_S);
    }

    #[test]
    fn plain_ifu_exposure_used_as_is() {
        let raw = RawSequence::new(&["1ifu"], &[2250], 1);
        let summary = compute_sequence(&raw);
        assert_eq!(summary.ifu_exptime_s, 2250);
        assert_eq!(summary.total_s, 2250 + READOUT_OVERHEAD_S);
    }

    #[test]
    fn rc_total_sums_readout_per_frame() {
        // 3 frames in r at 120 s, 2 frames in g at 90 s.
        let raw = RawSequence::new(&["3r", "2g"], &[120, 90], 1);
        let summary = compute_sequence(&raw);
        assert!(summary.rc);
        assert!(!summary.ifu);
        assert_eq!(summary.rc_total_s, (120 + 47) * 3 + (90 + 47) * 2);
        assert_eq!(summary.total_s, summary.rc_total_s);
    }

    #[test]
    fn seq_repeats_multiply_rc_total() {
        let raw = RawSequence::new(&["2r"], &[100], 3);
        let summary = compute_sequence(&raw);
        assert_eq!(summary.rc_total_s, (100 + 47) * 2 * 3);
    }

    #[test]
    fn combined_plan_has_no_ifu_overhead() {
        // The fixed IFU overhead applies only when there is no RC
        // component at all.
        let raw = RawSequence::new(&["1ifu", "1r"], &[300, 60], 1);
        let summary = compute_sequence(&raw);
        assert_eq!(summary.ifu_total_s, 300);
        assert_eq!(summary.rc_total_s, 60 + 47);
        assert_eq!(summary.total_s, 300 + 60 + 47);
        match summary.plan {
            ExposurePlan::Combined { ifu_exptime_s, ref rc } => {
                assert_eq!(ifu_exptime_s, 300);
                assert_eq!(rc.steps.len(), 1);
            }
            ref other => panic!("expected combined plan, got {:?}", other),
        }
    }

    #[test]
    fn invalid_steps_are_silently_excluded() {
        // exposure out of [0, 1000], repeat out of [1, 100], unknown filter
        let raw = RawSequence::new(&["1r", "1g", "150i", "1z"], &[1500, 100, 60, 60], 1);
        let summary = compute_sequence(&raw);
        assert_eq!(summary.rc_total_s, 100 + 47);
        match summary.plan {
            ExposurePlan::RcOnly(ref plan) => assert_eq!(plan.steps.len(), 1),
            ref other => panic!("expected rc-only plan, got {:?}", other),
        }
    }

    #[test]
    fn malformed_tokens_are_skipped_not_fatal() {
        let raw = RawSequence::new(&["r", "abc", "2r"], &[100, 100, 100], 1);
        let summary = compute_sequence(&raw);
        assert_eq!(summary.rc_total_s, (100 + 47) * 2);
    }

    #[test]
    fn empty_sequence_is_overhead_only() {
        let raw = RawSequence::default();
        let summary = compute_sequence(&raw);
        assert_eq!(summary.plan, ExposurePlan::NoSequence);
        assert_eq!(summary.total_s, READOUT_OVERHEAD_S);
    }

    proptest! {
        /// Appending any valid filter step strictly increases the imaging
        /// total, and totals never go negative.
        #[test]
        fn adding_a_step_strictly_increases_total(
            base_reps in proptest::collection::vec(1u32..=5, 0..4),
            exptime in 0i64..=1000,
            repeat in 1u32..=100,
            seq_repeats in 1u32..=3,
        ) {
            let mut tokens: Vec<String> =
                base_reps.iter().map(|r| format!("{}r", r)).collect();
            let mut exptimes: Vec<i64> = base_reps.iter().map(|_| 60).collect();

            let before = compute_sequence(&RawSequence {
                tokens: tokens.clone(),
                exptimes: exptimes.clone(),
                seq_repeats,
            });

            tokens.push(format!("{}g", repeat));
            exptimes.push(exptime);
            let after = compute_sequence(&RawSequence {
                tokens,
                exptimes,
                seq_repeats,
            });

            prop_assert!(before.total_s >= 0);
            prop_assert!(after.rc_total_s > before.rc_total_s);
            // The bare-sequence fixed overhead makes the grand total
            // comparable only once an imaging component already exists.
            if !base_reps.is_empty() {
                prop_assert!(after.total_s > before.total_s);
            }
        }
    }
}
