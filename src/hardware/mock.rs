//! Scripted hardware stand-ins for tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    CameraArm, DomeCommand, DomeShutterState, ExposureOutcome, ExposureRequest, ExposureService,
    FaultSummary, HardwareError, HardwareResult, Lamp, LampState, ObservatoryControl,
    ObservatoryStatus, ShutterMode, StowProfile, TelescopeMove, WeatherReport,
};

/// Records every command it receives; faults and weather are settable
/// from the test.
#[derive(Debug)]
pub struct MockObservatory {
    calls: Mutex<Vec<String>>,
    dome_open: Mutex<bool>,
    faults: Mutex<VecDeque<FaultSummary>>,
    weather: Mutex<WeatherReport>,
}

impl Default for MockObservatory {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            dome_open: Mutex::new(false),
            faults: Mutex::new(VecDeque::new()),
            weather: Mutex::new(WeatherReport {
                inside_air_temp_c: 10.0,
                outside_air_temp_c: 5.0,
                wind_speed_kph: 8.0,
            }),
        }
    }
}

impl MockObservatory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Queue fault summaries returned by successive `faults()` calls;
    /// once drained, the mock reports all-clear.
    pub fn push_faults(&self, summary: FaultSummary) {
        self.faults.lock().push_back(summary);
    }

    pub fn set_inside_temp(&self, temp_c: f64) {
        self.weather.lock().inside_air_temp_c = temp_c;
    }

    pub fn dome_is_open(&self) -> bool {
        *self.dome_open.lock()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ObservatoryControl for MockObservatory {
    async fn telescope_move(&self, mv: &TelescopeMove) -> HardwareResult<()> {
        self.record(format!("move:{}", mv.name));
        Ok(())
    }

    async fn telescope_offset(&self, d_ra_as: f64, d_dec_as: f64) -> HardwareResult<()> {
        self.record(format!("offset:{:.1},{:.1}", d_ra_as, d_dec_as));
        Ok(())
    }

    async fn set_focus(&self, position: f64) -> HardwareResult<()> {
        self.record(format!("focus:{:.3}", position));
        Ok(())
    }

    async fn dome(&self, command: DomeCommand) -> HardwareResult<()> {
        *self.dome_open.lock() = command == DomeCommand::Open;
        self.record(format!("dome:{:?}", command));
        Ok(())
    }

    async fn stow(&self, profile: StowProfile) -> HardwareResult<()> {
        self.record(format!(
            "stow:{:.0},{:.0},{:.0}",
            profile.ha_deg, profile.dec_deg, profile.dome_az_deg
        ));
        Ok(())
    }

    async fn arclamp(&self, lamp: Lamp, state: LampState) -> HardwareResult<()> {
        self.record(format!("lamp:{}:{:?}", lamp.name(), state));
        Ok(())
    }

    async fn status(&self) -> HardwareResult<ObservatoryStatus> {
        let shutter = if *self.dome_open.lock() {
            DomeShutterState::Open
        } else {
            DomeShutterState::Closed
        };
        Ok(ObservatoryStatus {
            dome_shutter: shutter,
        })
    }

    async fn weather(&self) -> HardwareResult<WeatherReport> {
        Ok(*self.weather.lock())
    }

    async fn faults(&self) -> HardwareResult<FaultSummary> {
        Ok(self.faults.lock().pop_front().unwrap_or_default())
    }
}

/// Instant exposures with synthetic frame paths. Tests can queue errors
/// and supply a FWHM profile for focus sweeps.
#[derive(Debug, Default)]
pub struct MockCamera {
    exposures: Mutex<Vec<ExposureRequest>>,
    errors: Mutex<VecDeque<HardwareError>>,
    counter: AtomicU64,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exposures(&self) -> Vec<ExposureRequest> {
        self.exposures.lock().clone()
    }

    pub fn exposure_count(&self, arm: CameraArm) -> usize {
        self.exposures
            .lock()
            .iter()
            .filter(|e| e.arm == arm)
            .count()
    }

    pub fn bias_count(&self) -> usize {
        self.exposures
            .lock()
            .iter()
            .filter(|e| e.shutter == ShutterMode::Closed && e.exptime_s == 0.0)
            .count()
    }

    /// Fail the next exposure with the given error.
    pub fn push_error(&self, error: HardwareError) {
        self.errors.lock().push_back(error);
    }
}

#[async_trait]
impl ExposureService for MockCamera {
    async fn take_exposure(&self, request: &ExposureRequest) -> HardwareResult<ExposureOutcome> {
        if let Some(error) = self.errors.lock().pop_front() {
            return Err(error);
        }
        self.exposures.lock().push(request.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(ExposureOutcome {
            elapsed: Duration::from_secs_f64(request.exptime_s),
            path: PathBuf::from(format!("/tmp/mock-frames/frame_{:06}.fits", n)),
        })
    }
}
