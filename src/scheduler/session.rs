//! Per-night in-memory session state.

use std::collections::HashSet;

/// Counters and the completed-request cache for one night. Reset when
/// the process starts; the on-disk milestones carry state across
/// restarts instead.
#[derive(Debug, Default)]
pub struct SchedulerSession {
    done: HashSet<i64>,
    pub science_count: u32,
    pub standard_count: u32,
    pub focus_count: u32,
    pub loop_count: u64,
}

impl SchedulerSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed science request. Returns false when it was
    /// already recorded this session.
    pub fn record_science(&mut self, req_id: i64) -> bool {
        let fresh = self.done.insert(req_id);
        if fresh {
            self.science_count += 1;
        }
        fresh
    }

    pub fn is_done(&self, req_id: i64) -> bool {
        self.done.contains(&req_id)
    }

    pub fn done_count(&self) -> usize {
        self.done.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn science_records_once() {
        let mut s = SchedulerSession::new();
        assert!(s.record_science(42));
        assert!(!s.record_science(42));
        assert_eq!(s.science_count, 1);
        assert!(s.is_done(42));
        assert!(!s.is_done(7));
    }
}
