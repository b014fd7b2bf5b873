//! On-disk night milestones.
//!
//! Each completed phase of the night drops a sentinel file in the status
//! directory. A process restarted mid-night checks them and resumes
//! after the last completed phase instead of redoing calibrations or
//! twilight flats. The files are removed at the end of the night.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A once-per-night phase tracked on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    Calibrations,
    TwilightFlats,
    StandardStar,
}

impl Milestone {
    fn file_name(&self) -> &'static str {
        match self {
            Milestone::Calibrations => "calib_done.txt",
            Milestone::TwilightFlats => "twilights_done.txt",
            Milestone::StandardStar => "standard_done.txt",
        }
    }
}

/// The cached focus solution, persisted so a restart does not trigger a
/// second sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocusResult {
    /// Inside air temperature at the time of the sweep, degrees C.
    pub focus_temp: f64,
    /// Best focus position found.
    pub focus_pos: f64,
    pub focus_time: DateTime<Utc>,
}

const FOCUS_FILE: &str = "focus_done.json";

/// Handle on the status directory holding the night's sentinel files.
#[derive(Debug, Clone)]
pub struct NightMilestones {
    status_dir: PathBuf,
}

impl NightMilestones {
    pub fn new(status_dir: &Path) -> Result<Self> {
        fs::create_dir_all(status_dir)
            .with_context(|| format!("cannot create status dir {}", status_dir.display()))?;
        Ok(Self {
            status_dir: status_dir.to_path_buf(),
        })
    }

    fn path(&self, milestone: Milestone) -> PathBuf {
        self.status_dir.join(milestone.file_name())
    }

    pub fn is_done(&self, milestone: Milestone) -> bool {
        self.path(milestone).exists()
    }

    pub fn mark_done(&self, milestone: Milestone) -> Result<()> {
        let path = self.path(milestone);
        fs::write(&path, format!("{}\n", Utc::now().to_rfc3339()))
            .with_context(|| format!("cannot write sentinel {}", path.display()))?;
        info!(sentinel = %path.display(), "milestone recorded");
        Ok(())
    }

    /// The cached focus solution from earlier tonight, if any. A
    /// corrupt file is treated as absent so the sweep simply reruns.
    pub fn focus_done(&self) -> Option<FocusResult> {
        let path = self.status_dir.join(FOCUS_FILE);
        let text = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable focus sentinel, ignoring");
                None
            }
        }
    }

    pub fn mark_focus_done(&self, result: &FocusResult) -> Result<()> {
        let path = self.status_dir.join(FOCUS_FILE);
        let text = serde_json::to_string_pretty(result).context("serialize focus result")?;
        fs::write(&path, text)
            .with_context(|| format!("cannot write focus sentinel {}", path.display()))?;
        Ok(())
    }

    /// Remove every sentinel at the end of the night so the next night
    /// starts clean.
    pub fn clear_all(&self) -> Result<()> {
        for milestone in [
            Milestone::Calibrations,
            Milestone::TwilightFlats,
            Milestone::StandardStar,
        ] {
            let path = self.path(milestone);
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("cannot remove {}", path.display()))?;
            }
        }
        let focus = self.status_dir.join(FOCUS_FILE);
        if focus.exists() {
            fs::remove_file(&focus).with_context(|| format!("cannot remove {}", focus.display()))?;
        }
        info!("night sentinels cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn milestones_round_trip_on_disk() {
        let dir = tempdir().unwrap();
        let m = NightMilestones::new(dir.path()).unwrap();

        assert!(!m.is_done(Milestone::Calibrations));
        m.mark_done(Milestone::Calibrations).unwrap();
        assert!(m.is_done(Milestone::Calibrations));
        assert!(!m.is_done(Milestone::TwilightFlats));

        // A second handle on the same directory sees the same state.
        let m2 = NightMilestones::new(dir.path()).unwrap();
        assert!(m2.is_done(Milestone::Calibrations));

        m.clear_all().unwrap();
        assert!(!m2.is_done(Milestone::Calibrations));
    }

    #[test]
    fn focus_sentinel_round_trips() {
        let dir = tempdir().unwrap();
        let m = NightMilestones::new(dir.path()).unwrap();
        assert!(m.focus_done().is_none());

        let result = FocusResult {
            focus_temp: 8.5,
            focus_pos: 16.44,
            focus_time: Utc::now(),
        };
        m.mark_focus_done(&result).unwrap();
        let back = m.focus_done().unwrap();
        assert_eq!(back.focus_pos, result.focus_pos);
        assert_eq!(back.focus_temp, result.focus_temp);
    }

    #[test]
    fn corrupt_focus_sentinel_reads_as_absent() {
        let dir = tempdir().unwrap();
        let m = NightMilestones::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("focus_done.json"), "not json").unwrap();
        assert!(m.focus_done().is_none());
    }
}
