//! Operator manual-command queue.
//!
//! Operators drop JSON files into the manual directory; the night loop
//! picks them up between observations, executes them, and deletes the
//! files. Malformed files are reported and removed so they cannot wedge
//! the queue.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

fn default_repeat() -> u32 {
    1
}

/// A command dropped by an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ManualCommand {
    /// Run a standard-star observation now; a named star overrides the
    /// closest-to-zenith choice.
    Standard {
        #[serde(default)]
        name: Option<String>,
    },
    /// Rerun the focus sweep.
    Focus,
    /// Observe fixed coordinates with an explicit sequence.
    Observe {
        name: String,
        ra_deg: f64,
        dec_deg: f64,
        #[serde(default)]
        obs_seq: Vec<String>,
        #[serde(default)]
        exptimes: Vec<i64>,
        #[serde(default = "default_repeat")]
        seq_repeats: u32,
    },
}

/// One file found in the manual directory.
#[derive(Debug)]
pub struct ManualEntry {
    pub path: PathBuf,
    pub command: ManualCommand,
}

/// Handle on the manual-command directory.
#[derive(Debug, Clone)]
pub struct ManualQueue {
    dir: PathBuf,
}

impl ManualQueue {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create manual dir {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Parse every pending command file, oldest name first. Unparseable
    /// files are deleted with a warning.
    pub fn scan(&self) -> Result<Vec<ManualEntry>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("cannot read manual dir {}", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();
        paths.sort();

        let mut entries = Vec::new();
        for path in paths {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable manual command");
                    continue;
                }
            };
            match serde_json::from_str::<ManualCommand>(&text) {
                Ok(command) => entries.push(ManualEntry { path, command }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "malformed manual command, removing");
                    let _ = fs::remove_file(&path);
                }
            }
        }
        Ok(entries)
    }

    /// Remove a consumed command file.
    pub fn consume(&self, entry: &ManualEntry) -> Result<()> {
        fs::remove_file(&entry.path)
            .with_context(|| format!("cannot remove {}", entry.path.display()))
    }

    /// Drop every pending command, consumed or not. Run on supervisor
    /// restart so a bad command cannot crash-loop the night.
    pub fn clear_all(&self) -> Result<()> {
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("cannot read manual dir {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(&path)
                    .with_context(|| format!("cannot remove {}", path.display()))?;
            }
        }
        Ok(())
    }
}
