//! Observatory configuration.
//!
//! A single [`ObservatoryConfig`] is constructed at process start (from a
//! TOML file or defaults) and passed by reference into every component.
//! Nothing in the crate reads configuration from globals.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::astro::ObserverSite;

/// Top-level configuration for one observatory deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservatoryConfig {
    #[serde(default)]
    pub site: SiteSettings,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub constraints: ConstraintSettings,
    #[serde(default)]
    pub timing: TimingSettings,
    #[serde(default)]
    pub focus: FocusSettings,
    #[serde(default)]
    pub hardware: HardwareSettings,
}

/// Addresses and timeouts for the control-system and camera daemons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareSettings {
    pub ocs_addr: String,
    pub camera_addr: String,
    /// Timeout for ordinary control commands.
    pub command_timeout_s: u64,
    /// Grace added on top of the exposure time before an exposure
    /// command is declared lost.
    pub exposure_grace_s: u64,
}

impl Default for HardwareSettings {
    fn default() -> Self {
        Self {
            ocs_addr: "127.0.0.1:9001".to_string(),
            camera_addr: "127.0.0.1:9002".to_string(),
            command_timeout_s: 30,
            exposure_grace_s: 120,
        }
    }
}

/// Observing site geographic parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSettings {
    pub name: String,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub elevation_m: f64,
}

impl Default for SiteSettings {
    fn default() -> Self {
        // Palomar Mountain, the reference deployment.
        Self {
            name: "Palomar".to_string(),
            latitude_deg: 33.3563,
            longitude_deg: -116.8650,
            elevation_m: 1712.0,
        }
    }
}

/// Directories for night-state sentinels, manual command files, and
/// target snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    pub status_dir: PathBuf,
    pub manual_dir: PathBuf,
    pub target_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            status_dir: PathBuf::from("/data/nightwatch/status"),
            manual_dir: PathBuf::from("/data/nightwatch/manual"),
            target_dir: PathBuf::from("/data/nightwatch/targets"),
        }
    }
}

/// Default observing constraints applied to every candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintSettings {
    /// Minimum target altitude in degrees.
    pub min_altitude_deg: f64,
    /// Nominal acceptable airmass range.
    pub airmass_min: f64,
    pub airmass_max: f64,
    /// Hard airmass ceiling applied at both window endpoints.
    pub airmass_hard_limit: f64,
    /// Base minimum moon separation in degrees.
    pub moon_sep_base_deg: f64,
    /// Lunar illumination percentage above which the minimum separation
    /// grows linearly.
    pub moon_illum_knee_pct: f64,
    /// Hour-angle exclusion band in hours: targets with HA strictly inside
    /// (lo, hi) at either window endpoint are rejected. Site-specific; do
    /// not reinterpret without consulting the operators.
    pub ha_exclusion_lo_hr: f64,
    pub ha_exclusion_hi_hr: f64,
}

impl Default for ConstraintSettings {
    fn default() -> Self {
        Self {
            min_altitude_deg: 15.0,
            airmass_min: 1.0,
            airmass_max: 2.8,
            airmass_hard_limit: 3.5,
            moon_sep_base_deg: 5.0,
            moon_illum_knee_pct: 75.0,
            ha_exclusion_lo_hr: 5.25,
            ha_exclusion_hi_hr: 18.75,
        }
    }
}

/// Fixed overheads and dwell times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Slew/setup overhead added per simulated observation.
    pub slew_overhead_s: u32,
    /// Virtual-clock advance when nothing is observable.
    pub idle_slot_s: u32,
    /// Fault polling cadence for the night loop.
    pub fault_poll_s: u64,
    /// Arc lamp warm-up dwells in seconds.
    pub hg_warmup_s: u64,
    pub cd_warmup_s: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            slew_overhead_s: 60,
            idle_slot_s: 300,
            fault_poll_s: 60,
            hg_warmup_s: 120,
            cd_warmup_s: 420,
        }
    }
}

/// Focus sweep and drift parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusSettings {
    /// Instrument-specific offset added to the modeled RC focus.
    pub rc_focus_offset: f64,
    /// Half-width of the focus sweep around the modeled position.
    pub sweep_half_width: f64,
    /// Step between sweep positions.
    pub sweep_step: f64,
    /// Exposure time per sweep position in seconds.
    pub sweep_exptime_s: u32,
    /// Temperature delta (degrees C) beyond which a refocus is recommended.
    pub drift_threshold: f64,
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self {
            rc_focus_offset: 0.0,
            sweep_half_width: 0.4,
            sweep_step: 0.1,
            sweep_exptime_s: 30,
            drift_threshold: 1.0,
        }
    }
}

impl Default for ObservatoryConfig {
    fn default() -> Self {
        Self {
            site: SiteSettings::default(),
            paths: PathSettings::default(),
            constraints: ConstraintSettings::default(),
            timing: TimingSettings::default(),
            focus: FocusSettings::default(),
            hardware: HardwareSettings::default(),
        }
    }
}

impl ObservatoryConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("cannot parse config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// The observing site as used by the ephemeris routines.
    pub fn observer_site(&self) -> ObserverSite {
        ObserverSite {
            latitude_deg: self.site.latitude_deg,
            longitude_deg: self.site.longitude_deg,
            elevation_m: self.site.elevation_m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_palomar() {
        let config = ObservatoryConfig::default();
        assert_eq!(config.site.name, "Palomar");
        assert!((config.site.latitude_deg - 33.3563).abs() < 1e-6);
        assert_eq!(config.timing.slew_overhead_s, 60);
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let config = ObservatoryConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back: ObservatoryConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.site.name, config.site.name);
        assert_eq!(
            back.constraints.ha_exclusion_hi_hr,
            config.constraints.ha_exclusion_hi_hr
        );
    }

    #[test]
    fn partial_toml_uses_section_defaults() {
        let text = r#"
            [site]
            name = "La Palma"
            latitude_deg = 28.7624
            longitude_deg = -17.8892
            elevation_m = 2396.0
        "#;
        let config: ObservatoryConfig = toml::from_str(text).unwrap();
        assert_eq!(config.site.name, "La Palma");
        assert_eq!(config.constraints.min_altitude_deg, 15.0);
    }
}
