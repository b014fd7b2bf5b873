//! The stateful observing night.
//!
//! [`ObservingLoop::run`] drives one night end to end: afternoon
//! calibrations, evening twilight flats, the science loop between the
//! nautical twilights, morning flats, and shutdown. Progress through the
//! once-per-night phases is recorded on disk ([`NightMilestones`]) so a
//! supervisor restart resumes where the previous process died instead of
//! redoing the early phases.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Timelike, Utc};
use tracing::{error, info, warn};

use super::clock::Clock;
use super::focus::{best_focus, sweep_positions, temp_to_focus, ImageQuality};
use super::milestones::{FocusResult, Milestone, NightMilestones};
use super::observability::ObservingConstraints;
use super::ranker::DEFAULT_ORDER;
use super::selector::{next_observable_target, Selection};
use super::session::SchedulerSession;
use super::standards::{closest_to_zenith, StandardStar, STANDARDS};
use crate::astro::night::NightWindow;
use crate::astro::sun::{sun_altitude_deg, twilight_flat_exptime_s};
use crate::astro::time::lst_at;
use crate::astro::ObserverSite;
use crate::config::ObservatoryConfig;
use crate::db::RequestRepository;
use crate::hardware::{
    CameraArm, DomeCommand, DomeShutterState, ExposureRequest, ExposureService, Lamp, LampState,
    ObservatoryControl, ShutterMode, StowProfile, TelescopeMove,
};
use crate::manual::{ManualCommand, ManualQueue};
use crate::models::{Candidate, ExposurePlan, FilterPlan, ModifiedJulianDate, RawSequence,
    RequestStatus, SequenceSummary,
};

/// UT hour before which the afternoon startup waits. Corresponds to the
/// late local afternoon at the reference site.
const CALIB_GATE_UT_HOUR: u32 = 14;

/// Bias frames taken per arm during calibrations.
const BIAS_FRAMES: u32 = 10;
/// Arc and dome-flat exposure times in seconds.
const HG_EXPTIME_S: f64 = 35.0;
const CD_EXPTIME_S: f64 = 30.0;
const HALOGEN_EXPTIME_S: f64 = 30.0;
const DOME_FLAT_FRAMES: u32 = 5;

/// Settle time between twilight-flat frames.
const FLAT_SETTLE_S: u64 = 5;

/// Fixed declinations for the sky fields used by flats and the focus
/// sweep. RA comes from the sidereal time so the field sits near the
/// meridian.
const TWILIGHT_FIELD_DEC_DEG: f64 = 33.33;
const FOCUS_FIELD_DEC_DEG: f64 = 23.33;
/// The focus field leads the meridian by one hour so it stays high for
/// the whole sweep.
const FOCUS_FIELD_LEAD_HR: f64 = 1.0;

/// Wait applied when the remaining dark time is too short for the
/// selected sequence.
const SHORT_NIGHT_WAIT_S: u64 = 600;

/// IFU exposures at least this long get RC guide frames underneath.
const GUIDE_MIN_IFU_S: i64 = 300;
const GUIDE_FRAME_S: f64 = 30.0;
const GUIDE_CADENCE_S: u64 = 60;

/// Per-run switches, mostly from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Leave the night sentinels in place at shutdown.
    pub skip_cleanup: bool,
    /// Use this inside temperature for the focus model instead of the
    /// weather feed.
    pub temperature_override: Option<f64>,
    /// Force all calibration lamps off before starting. Set on
    /// supervisor restarts, when a lamp may have been left burning.
    pub lamps_off_on_start: bool,
}

/// One night of autonomous observing.
pub struct ObservingLoop {
    config: ObservatoryConfig,
    site: ObserverSite,
    cons: ObservingConstraints,
    repo: Arc<dyn RequestRepository>,
    control: Arc<dyn ObservatoryControl>,
    camera: Arc<dyn ExposureService>,
    quality: Arc<dyn ImageQuality>,
    clock: Arc<dyn Clock>,
    milestones: NightMilestones,
    manual: ManualQueue,
    session: SchedulerSession,
    options: RunOptions,
    focus: Option<FocusResult>,
}

impl ObservingLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ObservatoryConfig,
        repo: Arc<dyn RequestRepository>,
        control: Arc<dyn ObservatoryControl>,
        camera: Arc<dyn ExposureService>,
        quality: Arc<dyn ImageQuality>,
        clock: Arc<dyn Clock>,
        options: RunOptions,
    ) -> Result<Self> {
        let milestones = NightMilestones::new(&config.paths.status_dir)?;
        let manual = ManualQueue::new(&config.paths.manual_dir)?;
        let site = config.observer_site();
        let cons = ObservingConstraints::from(&config.constraints);
        Ok(Self {
            config,
            site,
            cons,
            repo,
            control,
            camera,
            quality,
            clock,
            milestones,
            manual,
            session: SchedulerSession::new(),
            options,
            focus: None,
        })
    }

    pub fn session(&self) -> &SchedulerSession {
        &self.session
    }

    /// Run one full night. Returns when the night is over; errors
    /// propagate to the supervisor, which restarts after a backoff.
    pub async fn run(&mut self) -> Result<()> {
        self.repo
            .health_check()
            .await
            .context("request store unreachable")?;

        if self.options.lamps_off_on_start {
            self.all_lamps_off().await;
        }

        // Afternoon gate: hold until the UT date rolls over into the
        // local evening before touching the instrument.
        while self.clock.now_utc().hour() >= CALIB_GATE_UT_HOUR {
            self.clock.sleep(Duration::from_secs(60)).await;
        }

        // Computed after the gate: an afternoon start must resolve the
        // coming night, not the one that just ended.
        let window = NightWindow::for_night(&self.site, self.clock.now_utc())?;
        for (name, at) in window.boundaries() {
            info!(boundary = name, at = %at, "night boundary");
        }

        if !self.milestones.is_done(Milestone::Calibrations) {
            self.run_calibrations().await?;
            self.milestones.mark_done(Milestone::Calibrations)?;
        } else {
            info!("calibrations already done tonight, skipping");
        }

        self.wait_until(window.evening_civil).await;

        if !self.milestones.is_done(Milestone::TwilightFlats) {
            self.twilight_flats(window.evening_nautical).await?;
            self.milestones.mark_done(Milestone::TwilightFlats)?;
        } else {
            info!("twilight flats already done tonight, skipping");
        }

        self.wait_until(window.evening_nautical).await;
        self.science_loop(&window).await?;

        // Morning flats run from the end of science until civil twilight.
        self.twilight_flats(window.morning_civil).await?;

        self.shutdown().await?;
        info!(
            science = self.session.science_count,
            standards = self.session.standard_count,
            focus_runs = self.session.focus_count,
            passes = self.session.loop_count,
            "night complete"
        );
        Ok(())
    }

    /// The science loop between the nautical twilights.
    async fn science_loop(&mut self, window: &NightWindow) -> Result<()> {
        let end = window.morning_nautical;
        while self.clock.now_utc() < end {
            self.session.loop_count += 1;

            if !self.conditions_cleared().await {
                warn!("faults raised, holding");
                self.clock
                    .sleep(Duration::from_secs(self.config.timing.fault_poll_s))
                    .await;
                continue;
            }
            self.ensure_dome_open().await?;

            if self.focus.is_none() {
                self.establish_focus().await?;
            }

            if !self.milestones.is_done(Milestone::StandardStar) {
                self.run_standard(None).await?;
                continue;
            }

            if self.drain_manual_queue().await? {
                continue;
            }

            let now = self.clock.now_utc();
            let rows = self
                .repo
                .fetch_pending(now)
                .await
                .context("fetching pending requests")?;
            let mut pool: Vec<Candidate> = rows.into_iter().map(Candidate::new).collect();

            let outcome = next_observable_target(&mut pool, now, &self.site, &self.cons, DEFAULT_ORDER);
            for rejection in &outcome.rejections {
                let failed: Vec<String> =
                    rejection.failed.iter().map(|f| f.to_string()).collect();
                warn!(
                    req_id = rejection.req_id,
                    name = %rejection.name,
                    priority = rejection.priority,
                    failed = ?failed,
                    "high-priority target not observable"
                );
            }

            match outcome.selection {
                Some(sel) => {
                    if self.session.is_done(sel.req_id) {
                        // The store still returned a request we already
                        // finished; push the terminal status again.
                        warn!(req_id = sel.req_id, "store returned a completed request");
                        self.repo
                            .update_request(sel.req_id, RequestStatus::Completed)
                            .await?;
                        continue;
                    }
                    let end_obs = now + chrono::Duration::seconds(sel.summary.total_s);
                    if end_obs > end {
                        // Not enough dark time left; burn the remainder
                        // on a standard instead of truncating a science
                        // sequence.
                        info!(req_id = sel.req_id, "sequence would cross morning twilight");
                        self.run_standard(None).await?;
                        self.clock.sleep(Duration::from_secs(SHORT_NIGHT_WAIT_S)).await;
                        continue;
                    }
                    self.check_focus_drift().await;
                    self.observe_science(&sel).await?;
                }
                None => {
                    // Empty slot: spend it on a standard rather than
                    // tracking nothing.
                    info!("nothing observable, observing a standard");
                    self.run_standard(None).await?;
                    self.clock
                        .sleep(Duration::from_secs(u64::from(self.config.timing.idle_slot_s)))
                        .await;
                }
            }
        }
        Ok(())
    }

    /// Observe one selected request, updating the store around the
    /// exposures. Hardware failures mark the request `FAILURE` and keep
    /// the night going.
    async fn observe_science(&mut self, sel: &Selection) -> Result<()> {
        info!(req_id = sel.req_id, name = %sel.name, priority = sel.priority, "observing");
        self.repo
            .update_request(sel.req_id, RequestStatus::Active)
            .await?;

        let mv = TelescopeMove::fixed(&sel.name, sel.target.ra_deg, sel.target.dec_deg);
        if let Err(e) = self.control.telescope_move(&mv).await {
            error!(req_id = sel.req_id, error = %e, "slew failed");
            self.repo
                .update_request(sel.req_id, RequestStatus::Failure)
                .await?;
            return Ok(());
        }

        match self.run_sequence(&sel.name, &sel.summary).await {
            Ok(()) => {
                self.repo
                    .update_request(sel.req_id, RequestStatus::Completed)
                    .await?;
                self.session.record_science(sel.req_id);
                // Settle before the next selection pass.
                self.clock
                    .sleep(Duration::from_secs(u64::from(self.config.timing.slew_overhead_s)))
                    .await;
            }
            Err(e) => {
                error!(req_id = sel.req_id, error = %e, "exposure sequence failed");
                self.repo
                    .update_request(sel.req_id, RequestStatus::Failure)
                    .await?;
            }
        }
        Ok(())
    }

    /// Execute the exposures of a typed plan, IFU first, then imaging.
    async fn run_sequence(&self, object: &str, summary: &SequenceSummary) -> Result<()> {
        match &summary.plan {
            ExposurePlan::NoSequence => {
                warn!(object, "request carries no exposures");
                Ok(())
            }
            ExposurePlan::IfuOnly { exptime_s } => self.ifu_exposure(object, *exptime_s).await,
            ExposurePlan::RcOnly(rc) => self.rc_exposures(object, rc).await,
            ExposurePlan::Combined { ifu_exptime_s, rc } => {
                self.ifu_exposure(object, *ifu_exptime_s).await?;
                self.rc_exposures(object, rc).await
            }
        }
    }

    /// One spectrograph exposure, with RC guide frames underneath when
    /// the integration is long enough to drift.
    async fn ifu_exposure(&self, object: &str, exptime_s: i64) -> Result<()> {
        let request = ExposureRequest {
            arm: CameraArm::Ifu,
            shutter: ShutterMode::Normal,
            exptime_s: exptime_s as f64,
            object: object.to_string(),
        };
        if exptime_s >= GUIDE_MIN_IFU_S {
            let guider = tokio::spawn(guide_task(
                self.camera.clone(),
                self.clock.clone(),
                object.to_string(),
            ));
            let result = self.camera.take_exposure(&request).await;
            guider.abort();
            result?;
        } else {
            self.camera.take_exposure(&request).await?;
        }
        Ok(())
    }

    async fn rc_exposures(&self, object: &str, plan: &FilterPlan) -> Result<()> {
        for _ in 0..plan.seq_repeats.max(1) {
            for step in &plan.steps {
                for _ in 0..step.repeat {
                    let request = ExposureRequest {
                        arm: CameraArm::Rc,
                        shutter: ShutterMode::Normal,
                        exptime_s: step.exptime_s as f64,
                        object: format!("{}_{}", object, step.filter.as_char()),
                    };
                    self.camera.take_exposure(&request).await?;
                }
            }
        }
        Ok(())
    }

    /// Afternoon biases, arcs, and dome flats, taken stowed with the
    /// dome closed.
    async fn run_calibrations(&mut self) -> Result<()> {
        info!("starting afternoon calibrations");
        self.control.stow(StowProfile::calibrations()).await?;

        for arm in [CameraArm::Rc, CameraArm::Ifu] {
            for _ in 0..BIAS_FRAMES {
                let request = ExposureRequest {
                    arm,
                    shutter: ShutterMode::Closed,
                    exptime_s: 0.0,
                    object: "bias".to_string(),
                };
                self.camera.take_exposure(&request).await?;
            }
        }

        self.arc_block(Lamp::Hg, self.config.timing.hg_warmup_s, HG_EXPTIME_S)
            .await?;
        self.arc_block(Lamp::Cd, self.config.timing.cd_warmup_s, CD_EXPTIME_S)
            .await?;

        self.control.arclamp(Lamp::Halogen, LampState::On).await?;
        for _ in 0..DOME_FLAT_FRAMES {
            let request = ExposureRequest {
                arm: CameraArm::Rc,
                shutter: ShutterMode::Normal,
                exptime_s: HALOGEN_EXPTIME_S,
                object: "dome_flat".to_string(),
            };
            self.camera.take_exposure(&request).await?;
        }
        self.control.arclamp(Lamp::Halogen, LampState::Off).await?;

        info!("calibrations complete");
        Ok(())
    }

    async fn arc_block(&self, lamp: Lamp, warmup_s: u64, exptime_s: f64) -> Result<()> {
        self.control.arclamp(lamp, LampState::On).await?;
        self.clock.sleep(Duration::from_secs(warmup_s)).await;
        let request = ExposureRequest {
            arm: CameraArm::Ifu,
            shutter: ShutterMode::Normal,
            exptime_s,
            object: format!("arc_{}", lamp.name()),
        };
        let result = self.camera.take_exposure(&request).await;
        // The lamp goes off even when the exposure failed.
        self.control.arclamp(lamp, LampState::Off).await?;
        result?;
        Ok(())
    }

    /// RA (degrees) of a field `lead_hr` hours ahead of the meridian.
    fn meridian_field_ra_deg(&self, lead_hr: f64) -> f64 {
        let lst = lst_at(
            ModifiedJulianDate::from_datetime(self.clock.now_utc()),
            self.site.longitude_deg,
        );
        ((lst + lead_hr) * 15.0).rem_euclid(360.0)
    }

    /// Sky flats on the imaging arm until `end`, exposure time stepped
    /// by the solar altitude.
    async fn twilight_flats(&mut self, end: DateTime<Utc>) -> Result<()> {
        info!(until = %end, "twilight flats");
        let mut pointed = false;
        while self.clock.now_utc() < end {
            if !self.conditions_cleared().await {
                self.clock
                    .sleep(Duration::from_secs(self.config.timing.fault_poll_s))
                    .await;
                continue;
            }
            self.ensure_dome_open().await?;
            if !pointed {
                let ra = self.meridian_field_ra_deg(0.0);
                self.control
                    .telescope_move(&TelescopeMove::fixed(
                        "twilight_field",
                        ra,
                        TWILIGHT_FIELD_DEC_DEG,
                    ))
                    .await?;
                pointed = true;
            }

            let now = ModifiedJulianDate::from_datetime(self.clock.now_utc());
            let sun_alt = sun_altitude_deg(&self.site, now);
            let request = ExposureRequest {
                arm: CameraArm::Rc,
                shutter: ShutterMode::Normal,
                exptime_s: twilight_flat_exptime_s(sun_alt, false),
                object: "twilight_flat".to_string(),
            };
            if let Err(e) = self.camera.take_exposure(&request).await {
                warn!(error = %e, "twilight flat failed, continuing");
            }
            self.clock.sleep(Duration::from_secs(FLAT_SETTLE_S)).await;
        }
        Ok(())
    }

    /// Establish tonight's focus: reuse the on-disk solution when one
    /// exists, otherwise sweep.
    async fn establish_focus(&mut self) -> Result<()> {
        if let Some(cached) = self.milestones.focus_done() {
            info!(position = cached.focus_pos, "reusing tonight's focus solution");
            self.control.set_focus(cached.focus_pos).await?;
            self.focus = Some(cached);
            return Ok(());
        }
        self.run_focus_sweep().await
    }

    /// Sweep the secondary around the temperature-modeled focus and move
    /// to the best fit.
    async fn run_focus_sweep(&mut self) -> Result<()> {
        let temp = match self.options.temperature_override {
            Some(t) => t,
            None => self.control.weather().await?.inside_air_temp_c,
        };
        info!(temp, "running focus sweep");

        let ra = self.meridian_field_ra_deg(FOCUS_FIELD_LEAD_HR);
        self.control
            .telescope_move(&TelescopeMove::fixed("focus_field", ra, FOCUS_FIELD_DEC_DEG))
            .await?;

        let mut samples = Vec::new();
        for position in sweep_positions(temp, &self.config.focus) {
            self.control.set_focus(position).await?;
            let request = ExposureRequest {
                arm: CameraArm::Rc,
                shutter: ShutterMode::Normal,
                exptime_s: f64::from(self.config.focus.sweep_exptime_s),
                object: "focus_sweep".to_string(),
            };
            let outcome = self.camera.take_exposure(&request).await?;
            match self.quality.fwhm(&outcome.path) {
                Ok(fwhm) => samples.push((position, fwhm)),
                Err(e) => warn!(position, error = %e, "no FWHM from sweep frame"),
            }
        }

        let best = best_focus(&samples)
            .unwrap_or_else(|| temp_to_focus(temp) + self.config.focus.rc_focus_offset);
        info!(best, samples = samples.len(), "focus sweep complete");
        self.control.set_focus(best).await?;

        let result = FocusResult {
            focus_temp: temp,
            focus_pos: best,
            focus_time: self.clock.now_utc(),
        };
        self.milestones.mark_focus_done(&result)?;
        self.focus = Some(result);
        self.session.focus_count += 1;
        Ok(())
    }

    /// Advisory check: a large temperature drift since the sweep means
    /// the focus model no longer holds.
    async fn check_focus_drift(&self) {
        let Some(focus) = self.focus else { return };
        let Ok(weather) = self.control.weather().await else {
            return;
        };
        let drift = (weather.inside_air_temp_c - focus.focus_temp).abs();
        if drift > self.config.focus.drift_threshold {
            warn!(
                drift,
                since = %focus.focus_time,
                "temperature has drifted since the focus sweep; consider a manual refocus"
            );
        }
    }

    /// Observe a standard star. A named star overrides the
    /// closest-to-zenith choice.
    async fn run_standard(&mut self, name: Option<&str>) -> Result<()> {
        let star: Option<StandardStar> = match name {
            Some(n) => STANDARDS.iter().find(|s| s.name == n).copied(),
            None => closest_to_zenith(&self.site, self.clock.now_utc(), self.cons.min_altitude_deg),
        };
        let Some(star) = star else {
            warn!(requested = ?name, "no suitable standard star");
            return Ok(());
        };

        info!(star = star.name, "observing standard");
        // One attempt per night: the milestone is recorded even when the
        // attempt fails, so a flaky standard cannot stall the queue.
        self.milestones.mark_done(Milestone::StandardStar)?;

        let mv = TelescopeMove::fixed(star.name, star.ra_deg, star.dec_deg);
        if let Err(e) = self.control.telescope_move(&mv).await {
            error!(star = star.name, error = %e, "slew to standard failed");
            return Ok(());
        }
        if let Err(e) = self
            .ifu_exposure(star.name, i64::from(star.exptime_s))
            .await
        {
            error!(star = star.name, error = %e, "standard exposure failed");
            return Ok(());
        }
        self.session.standard_count += 1;
        Ok(())
    }

    /// Execute and consume pending operator commands. Returns true when
    /// any command ran, so the caller restarts its pass.
    async fn drain_manual_queue(&mut self) -> Result<bool> {
        let entries = self.manual.scan()?;
        if entries.is_empty() {
            return Ok(false);
        }
        for entry in &entries {
            info!(path = %entry.path.display(), command = ?entry.command, "manual command");
            match &entry.command {
                ManualCommand::Standard { name } => {
                    self.run_standard(name.as_deref()).await?;
                }
                ManualCommand::Focus => {
                    self.run_focus_sweep().await?;
                }
                ManualCommand::Observe {
                    name,
                    ra_deg,
                    dec_deg,
                    obs_seq,
                    exptimes,
                    seq_repeats,
                } => {
                    let tokens: Vec<&str> = obs_seq.iter().map(String::as_str).collect();
                    let raw = RawSequence::new(&tokens, exptimes, *seq_repeats);
                    let summary = crate::models::compute_sequence(&raw);
                    let mv = TelescopeMove::fixed(name, *ra_deg, *dec_deg);
                    if let Err(e) = self.control.telescope_move(&mv).await {
                        error!(name = %name, error = %e, "manual slew failed");
                    } else if let Err(e) = self.run_sequence(name, &summary).await {
                        error!(name = %name, error = %e, "manual sequence failed");
                    }
                }
            }
            self.manual.consume(entry)?;
        }
        Ok(true)
    }

    /// True when no raised fault blocks observing. A failed fault query
    /// counts as blocked; never open up blind.
    async fn conditions_cleared(&self) -> bool {
        match self.control.faults().await {
            Ok(summary) => summary.clear_to_observe(),
            Err(e) => {
                warn!(error = %e, "fault query failed");
                false
            }
        }
    }

    async fn ensure_dome_open(&self) -> Result<()> {
        let status = self.control.status().await?;
        if status.dome_shutter == DomeShutterState::Closed {
            info!("opening dome");
            self.control.dome(DomeCommand::Open).await?;
        }
        Ok(())
    }

    async fn all_lamps_off(&self) {
        for lamp in [Lamp::Hg, Lamp::Cd, Lamp::Xe, Lamp::Halogen] {
            if let Err(e) = self.control.arclamp(lamp, LampState::Off).await {
                warn!(lamp = lamp.name(), error = %e, "could not turn lamp off");
            }
        }
    }

    /// Close, stow, and clear the night's on-disk state.
    async fn shutdown(&mut self) -> Result<()> {
        info!("closing for the day");
        self.control.dome(DomeCommand::Close).await?;
        self.clock.sleep(Duration::from_secs(120)).await;
        self.control.stow(StowProfile::end_of_night()).await?;

        if self.options.skip_cleanup {
            info!("leaving night sentinels in place");
        } else {
            self.milestones.clear_all()?;
            self.manual.clear_all()?;
        }
        Ok(())
    }

    /// Sleep in fault-poll chunks until `at`.
    async fn wait_until(&self, at: DateTime<Utc>) {
        loop {
            let now = self.clock.now_utc();
            if now >= at {
                return;
            }
            let remaining = (at - now)
                .to_std()
                .unwrap_or_else(|_| Duration::from_secs(0));
            let chunk = remaining.min(Duration::from_secs(self.config.timing.fault_poll_s));
            self.clock.sleep(chunk).await;
        }
    }
}

/// Short imaging frames taken while a long spectrograph integration
/// runs, for offline drift monitoring. Aborted when the integration
/// completes.
async fn guide_task(
    camera: Arc<dyn ExposureService>,
    clock: Arc<dyn Clock>,
    object: String,
) {
    loop {
        clock.sleep(Duration::from_secs(GUIDE_CADENCE_S)).await;
        let request = ExposureRequest {
            arm: CameraArm::Rc,
            shutter: ShutterMode::Normal,
            exptime_s: GUIDE_FRAME_S,
            object: format!("guide_{}", object),
        };
        if let Err(e) = camera.take_exposure(&request).await {
            warn!(error = %e, "guide frame failed");
        }
    }
}
