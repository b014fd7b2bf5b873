//! Hardware command surface.
//!
//! The scheduler never talks wire protocols directly: the telescope
//! control system and the camera daemons sit behind [`ObservatoryControl`]
//! and [`ExposureService`]. Production implementations live with the
//! instrument plumbing; [`mock`] provides scripted stand-ins for tests.

pub mod mock;
pub mod remote;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures surfaced by telescope or camera commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    #[error("command timed out after {0}s")]
    Timeout(u64),
    #[error("controller fault: {0}")]
    Fault(String),
    #[error("malformed controller response: {0}")]
    Protocol(String),
}

pub type HardwareResult<T> = Result<T, HardwareError>;

/// Which camera arm an exposure uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraArm {
    Ifu,
    Rc,
}

/// Shutter behavior for an exposure. Closed-shutter frames are biases
/// and darks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterMode {
    Normal,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomeCommand {
    Open,
    Close,
}

/// Calibration lamps in the dome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lamp {
    Hg,
    Cd,
    Xe,
    Halogen,
}

impl Lamp {
    pub fn name(&self) -> &'static str {
        match self {
            Lamp::Hg => "hg",
            Lamp::Cd => "cd",
            Lamp::Xe => "xe",
            Lamp::Halogen => "halogen",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LampState {
    On,
    Off,
}

/// A fixed telescope/dome parking position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StowProfile {
    pub ha_deg: f64,
    pub dec_deg: f64,
    pub dome_az_deg: f64,
}

impl StowProfile {
    /// End-of-night stow.
    pub fn end_of_night() -> Self {
        Self {
            ha_deg: 0.0,
            dec_deg: 109.0,
            dome_az_deg: 220.0,
        }
    }

    /// Pointing used while the arc lamps run.
    pub fn calibrations() -> Self {
        Self {
            ha_deg: 0.0,
            dec_deg: 109.0,
            dome_az_deg: 40.0,
        }
    }
}

/// A pointing command, sidereal or with tracking rates.
#[derive(Debug, Clone, PartialEq)]
pub struct TelescopeMove {
    pub name: String,
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub equinox: f64,
    pub ra_rate: f64,
    pub dec_rate: f64,
    pub motion_flag: Option<String>,
    pub epoch: Option<f64>,
}

impl TelescopeMove {
    /// A sidereal-rate move to fixed coordinates.
    pub fn fixed(name: &str, ra_deg: f64, dec_deg: f64) -> Self {
        Self {
            name: name.to_string(),
            ra_deg,
            dec_deg,
            equinox: 2000.0,
            ra_rate: 0.0,
            dec_rate: 0.0,
            motion_flag: None,
            epoch: None,
        }
    }
}

/// One exposure command to a camera daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureRequest {
    pub arm: CameraArm,
    pub shutter: ShutterMode,
    pub exptime_s: f64,
    pub object: String,
}

/// What the camera reports back after an exposure completes.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureOutcome {
    pub elapsed: Duration,
    /// Path of the written frame.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomeShutterState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservatoryStatus {
    pub dome_shutter: DomeShutterState,
}

/// Weather telemetry used by the focus model and the fault gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherReport {
    pub inside_air_temp_c: f64,
    pub outside_air_temp_c: f64,
    pub wind_speed_kph: f64,
}

/// A raised fault flag from the control system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultFlag {
    Telescope,
    Weather,
    /// Informational during twilight; the loop opens the dome itself.
    DomeNotOpen,
    Other(String),
}

/// The control system's current fault set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultSummary {
    pub faults: Vec<FaultFlag>,
}

impl FaultSummary {
    /// True when no fault blocks observing. A closed dome does not
    /// block; the loop handles that itself.
    pub fn clear_to_observe(&self) -> bool {
        self.faults
            .iter()
            .all(|f| matches!(f, FaultFlag::DomeNotOpen))
    }
}

/// Telescope, dome, and facility commands.
#[async_trait]
pub trait ObservatoryControl: Send + Sync {
    async fn telescope_move(&self, mv: &TelescopeMove) -> HardwareResult<()>;
    /// Small offset from the current pointing, arcseconds.
    async fn telescope_offset(&self, d_ra_as: f64, d_dec_as: f64) -> HardwareResult<()>;
    /// Drive the telescope secondary to a focus position.
    async fn set_focus(&self, position: f64) -> HardwareResult<()>;
    async fn dome(&self, command: DomeCommand) -> HardwareResult<()>;
    async fn stow(&self, profile: StowProfile) -> HardwareResult<()>;
    async fn arclamp(&self, lamp: Lamp, state: LampState) -> HardwareResult<()>;
    async fn status(&self) -> HardwareResult<ObservatoryStatus>;
    async fn weather(&self) -> HardwareResult<WeatherReport>;
    async fn faults(&self) -> HardwareResult<FaultSummary>;
}

/// Camera exposures. One implementation per arm pair; the request names
/// the arm.
#[async_trait]
pub trait ExposureService: Send + Sync {
    async fn take_exposure(&self, request: &ExposureRequest) -> HardwareResult<ExposureOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dome_not_open_does_not_block_observing() {
        let clear = FaultSummary::default();
        assert!(clear.clear_to_observe());

        let dome = FaultSummary {
            faults: vec![FaultFlag::DomeNotOpen],
        };
        assert!(dome.clear_to_observe());

        let weather = FaultSummary {
            faults: vec![FaultFlag::DomeNotOpen, FaultFlag::Weather],
        };
        assert!(!weather.clear_to_observe());
    }

    #[test]
    fn stow_profiles() {
        let stow = StowProfile::end_of_night();
        assert_eq!(stow.dec_deg, 109.0);
        assert_eq!(stow.dome_az_deg, 220.0);
        assert_eq!(StowProfile::calibrations().dome_az_deg, 40.0);
    }
}
