//! Observing engine binary.
//!
//! Runs the autonomous observing night under a supervisor loop: when the
//! night loop fails it is restarted after a backoff, with the
//! calibration lamps forced off and the manual queue cleared, and the
//! on-disk milestones let the new process resume where the old one died.
//!
//! # Usage
//!
//! ```bash
//! # Run tonight's schedule
//! nightwatch-observe --config /etc/nightwatch.toml
//!
//! # Print a simulated plan for tonight and exit
//! nightwatch-observe --plan
//!
//! # One-shot dome commands
//! nightwatch-observe --open
//! nightwatch-observe --close
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use nightwatch::astro::night::NightWindow;
use nightwatch::config::ObservatoryConfig;
use nightwatch::db::{LocalRepository, RequestRepository};
use nightwatch::hardware::remote::{RemoteCamera, RemoteObservatory};
use nightwatch::hardware::{DomeCommand, ObservatoryControl};
use nightwatch::manual::ManualQueue;
use nightwatch::models::Candidate;
use nightwatch::scheduler::focus::SidecarQuality;
use nightwatch::scheduler::observability::ObservingConstraints;
use nightwatch::scheduler::{
    simulate_night, NightMilestones, ObservingLoop, PlannedSlot, RunOptions, SystemClock,
};

/// Restart backoff after a night-loop failure.
const SUPERVISOR_BACKOFF_S: u64 = 60;

#[derive(Debug, Parser)]
#[command(name = "nightwatch-observe", about = "Robotic observing night engine")]
struct Cli {
    /// Configuration file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Clear the night sentinels and manual queue before starting.
    #[arg(long)]
    reset: bool,

    /// Open the dome and exit.
    #[arg(long)]
    open: bool,

    /// Close the dome and exit.
    #[arg(long)]
    close: bool,

    /// Inside temperature for the focus model, overriding the weather
    /// feed.
    #[arg(long)]
    temperature: Option<f64>,

    /// Leave the night sentinels in place at shutdown.
    #[arg(long)]
    no_clean: bool,

    /// Print a simulated plan for tonight and exit.
    #[arg(long)]
    plan: bool,
}

fn load_repository(config: &ObservatoryConfig) -> Arc<LocalRepository> {
    let snapshot = config.paths.target_dir.join("targets.json");
    match LocalRepository::from_snapshot(&snapshot) {
        Ok(repo) => {
            info!(path = %snapshot.display(), requests = repo.len(), "loaded target snapshot");
            Arc::new(repo)
        }
        Err(e) => {
            warn!(path = %snapshot.display(), error = %e, "no target snapshot, starting empty");
            Arc::new(LocalRepository::new())
        }
    }
}

async fn print_plan(config: &ObservatoryConfig, repo: &dyn RequestRepository) -> anyhow::Result<()> {
    let site = config.observer_site();
    let now = chrono::Utc::now();
    let window = NightWindow::for_night(&site, now)?;

    let rows = repo.fetch_pending(now).await?;
    let pool: Vec<Candidate> = rows.into_iter().map(Candidate::new).collect();
    info!(requests = pool.len(), "simulating tonight");

    let plan = simulate_night(
        pool,
        window.evening_nautical,
        window.morning_nautical,
        true,
        true,
        &site,
        &ObservingConstraints::from(&config.constraints),
        &config.timing,
    );
    for slot in &plan.slots {
        match slot {
            PlannedSlot::Science {
                at,
                req_id,
                name,
                priority,
                duration_s,
            } => info!(%at, req_id, name = %name, priority, duration_s, "science"),
            PlannedSlot::Focus { at, duration_s } => info!(%at, duration_s, "focus"),
            PlannedSlot::Standard { at, duration_s } => info!(%at, duration_s, "standard"),
        }
    }
    info!(science = plan.science_count(), "plan complete");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ObservatoryConfig::from_file(path)?,
        None => ObservatoryConfig::default(),
    };
    info!(site = %config.site.name, "starting observing engine");

    let control = Arc::new(RemoteObservatory::new(
        &config.hardware.ocs_addr,
        Duration::from_secs(config.hardware.command_timeout_s),
    ));

    if cli.open {
        control.dome(DomeCommand::Open).await?;
        info!("dome open commanded");
        return Ok(());
    }
    if cli.close {
        control.dome(DomeCommand::Close).await?;
        info!("dome close commanded");
        return Ok(());
    }

    let repo = load_repository(&config);

    if cli.plan {
        return print_plan(&config, repo.as_ref()).await;
    }

    if cli.reset {
        NightMilestones::new(&config.paths.status_dir)?.clear_all()?;
        ManualQueue::new(&config.paths.manual_dir)?.clear_all()?;
        info!("night state reset");
    }

    let camera = Arc::new(RemoteCamera::new(
        &config.hardware.camera_addr,
        Duration::from_secs(config.hardware.exposure_grace_s),
    ));
    let clock = Arc::new(SystemClock);
    let quality = Arc::new(SidecarQuality);

    let mut options = RunOptions {
        skip_cleanup: cli.no_clean,
        temperature_override: cli.temperature,
        lamps_off_on_start: false,
    };

    loop {
        let mut night = ObservingLoop::new(
            config.clone(),
            repo.clone(),
            control.clone(),
            camera.clone(),
            quality.clone(),
            clock.clone(),
            options.clone(),
        )?;
        match night.run().await {
            Ok(()) => break,
            Err(e) => {
                error!(error = %e, "night loop failed, restarting");
                // Restart hygiene: no lamp left burning, no poisoned
                // command waiting in the manual queue.
                options.lamps_off_on_start = true;
                if let Err(e) = ManualQueue::new(&config.paths.manual_dir)
                    .and_then(|q| q.clear_all())
                {
                    warn!(error = %e, "could not clear manual queue");
                }
                tokio::time::sleep(Duration::from_secs(SUPERVISOR_BACKOFF_S)).await;
            }
        }
    }

    info!("observing engine exiting");
    Ok(())
}
