//! Line-delimited JSON clients for the control-system and camera
//! daemons.
//!
//! Each command opens a fresh connection, sends one JSON object, and
//! reads one JSON reply line: `{"ok": true, "data": ...}` or
//! `{"ok": false, "error": "..."}`. Connections are not reused; the
//! daemons drop idle sockets and a per-command connect keeps reconnect
//! logic out of the scheduler.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{
    CameraArm, DomeCommand, DomeShutterState, ExposureOutcome, ExposureRequest, ExposureService,
    FaultFlag, FaultSummary, HardwareError, HardwareResult, Lamp, LampState, ObservatoryControl,
    ObservatoryStatus, ShutterMode, StowProfile, TelescopeMove, WeatherReport,
};

fn io_fault(e: std::io::Error) -> HardwareError {
    HardwareError::Fault(e.to_string())
}

/// Send one command and read one reply line within the deadline.
async fn call(addr: &str, cmd: &str, params: Value, deadline: Duration) -> HardwareResult<Value> {
    let exchange = async {
        let stream = TcpStream::connect(addr).await.map_err(io_fault)?;
        let (read_half, mut write_half) = stream.into_split();

        let mut line = serde_json::to_string(&json!({ "cmd": cmd, "params": params }))
            .map_err(|e| HardwareError::Protocol(e.to_string()))?;
        line.push('\n');
        write_half.write_all(line.as_bytes()).await.map_err(io_fault)?;

        let mut reader = BufReader::new(read_half);
        let mut response = String::new();
        let n = reader.read_line(&mut response).await.map_err(io_fault)?;
        if n == 0 {
            return Err(HardwareError::Protocol("connection closed mid-reply".into()));
        }
        let value: Value = serde_json::from_str(response.trim())
            .map_err(|e| HardwareError::Protocol(e.to_string()))?;

        if value.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            Ok(value.get("data").cloned().unwrap_or(Value::Null))
        } else {
            let message = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unspecified")
                .to_string();
            Err(HardwareError::Fault(message))
        }
    };
    timeout(deadline, exchange)
        .await
        .map_err(|_| HardwareError::Timeout(deadline.as_secs()))?
}

fn require_f64(data: &Value, key: &str) -> HardwareResult<f64> {
    data.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| HardwareError::Protocol(format!("missing field {}", key)))
}

/// Telescope/dome/facility client.
#[derive(Debug, Clone)]
pub struct RemoteObservatory {
    addr: String,
    command_timeout: Duration,
}

impl RemoteObservatory {
    pub fn new(addr: &str, command_timeout: Duration) -> Self {
        Self {
            addr: addr.to_string(),
            command_timeout,
        }
    }

    async fn command(&self, cmd: &str, params: Value) -> HardwareResult<Value> {
        call(&self.addr, cmd, params, self.command_timeout).await
    }
}

#[async_trait]
impl ObservatoryControl for RemoteObservatory {
    async fn telescope_move(&self, mv: &TelescopeMove) -> HardwareResult<()> {
        self.command(
            "move",
            json!({
                "name": mv.name,
                "ra_deg": mv.ra_deg,
                "dec_deg": mv.dec_deg,
                "equinox": mv.equinox,
                "ra_rate": mv.ra_rate,
                "dec_rate": mv.dec_rate,
                "motion_flag": mv.motion_flag,
                "epoch": mv.epoch,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn telescope_offset(&self, d_ra_as: f64, d_dec_as: f64) -> HardwareResult<()> {
        self.command("offset", json!({ "d_ra_as": d_ra_as, "d_dec_as": d_dec_as }))
            .await
            .map(|_| ())
    }

    async fn set_focus(&self, position: f64) -> HardwareResult<()> {
        self.command("focus", json!({ "position": position }))
            .await
            .map(|_| ())
    }

    async fn dome(&self, command: DomeCommand) -> HardwareResult<()> {
        let action = match command {
            DomeCommand::Open => "open",
            DomeCommand::Close => "close",
        };
        self.command("dome", json!({ "action": action })).await.map(|_| ())
    }

    async fn stow(&self, profile: StowProfile) -> HardwareResult<()> {
        self.command(
            "stow",
            json!({
                "ha_deg": profile.ha_deg,
                "dec_deg": profile.dec_deg,
                "dome_az_deg": profile.dome_az_deg,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn arclamp(&self, lamp: Lamp, state: LampState) -> HardwareResult<()> {
        let on = state == LampState::On;
        self.command("lamp", json!({ "lamp": lamp.name(), "on": on }))
            .await
            .map(|_| ())
    }

    async fn status(&self) -> HardwareResult<ObservatoryStatus> {
        let data = self.command("status", json!({})).await?;
        let open = data
            .get("dome_open")
            .and_then(Value::as_bool)
            .ok_or_else(|| HardwareError::Protocol("missing field dome_open".into()))?;
        Ok(ObservatoryStatus {
            dome_shutter: if open {
                DomeShutterState::Open
            } else {
                DomeShutterState::Closed
            },
        })
    }

    async fn weather(&self) -> HardwareResult<WeatherReport> {
        let data = self.command("weather", json!({})).await?;
        Ok(WeatherReport {
            inside_air_temp_c: require_f64(&data, "inside_air_temp_c")?,
            outside_air_temp_c: require_f64(&data, "outside_air_temp_c")?,
            wind_speed_kph: require_f64(&data, "wind_speed_kph")?,
        })
    }

    async fn faults(&self) -> HardwareResult<FaultSummary> {
        let data = self.command("faults", json!({})).await?;
        let names = data
            .get("faults")
            .and_then(Value::as_array)
            .ok_or_else(|| HardwareError::Protocol("missing field faults".into()))?;
        let faults = names
            .iter()
            .filter_map(Value::as_str)
            .map(|name| match name {
                "telescope" => FaultFlag::Telescope,
                "weather" => FaultFlag::Weather,
                "dome_not_open" => FaultFlag::DomeNotOpen,
                other => FaultFlag::Other(other.to_string()),
            })
            .collect();
        Ok(FaultSummary { faults })
    }
}

/// Camera daemon client. The exposure deadline scales with the
/// requested exposure time.
#[derive(Debug, Clone)]
pub struct RemoteCamera {
    addr: String,
    grace: Duration,
}

impl RemoteCamera {
    pub fn new(addr: &str, grace: Duration) -> Self {
        Self {
            addr: addr.to_string(),
            grace,
        }
    }
}

#[async_trait]
impl ExposureService for RemoteCamera {
    async fn take_exposure(&self, request: &ExposureRequest) -> HardwareResult<ExposureOutcome> {
        let arm = match request.arm {
            CameraArm::Ifu => "ifu",
            CameraArm::Rc => "rc",
        };
        let shutter = match request.shutter {
            ShutterMode::Normal => "normal",
            ShutterMode::Closed => "closed",
        };
        let deadline = Duration::from_secs_f64(request.exptime_s) + self.grace;
        let data = call(
            &self.addr,
            "expose",
            json!({
                "arm": arm,
                "shutter": shutter,
                "exptime_s": request.exptime_s,
                "object": request.object,
            }),
            deadline,
        )
        .await?;

        let path = data
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| HardwareError::Protocol("missing field path".into()))?;
        let elapsed = require_f64(&data, "elapsed_s")?;
        Ok(ExposureOutcome {
            elapsed: Duration::from_secs_f64(elapsed.max(0.0)),
            path: path.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Serve canned reply lines, one per accepted connection.
    async fn scripted_daemon(replies: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            for reply in replies {
                let (stream, _) = listener.accept().await.unwrap();
                let (read_half, mut write_half) = stream.into_split();
                let mut reader = BufReader::new(read_half);
                let mut request = String::new();
                reader.read_line(&mut request).await.unwrap();
                // Every request must be one parseable JSON line.
                let value: Value = serde_json::from_str(request.trim()).unwrap();
                assert!(value.get("cmd").is_some());
                write_half
                    .write_all(format!("{}\n", reply).as_bytes())
                    .await
                    .unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn ok_reply_round_trips() {
        let addr = scripted_daemon(vec![r#"{"ok": true}"#]).await;
        let obs = RemoteObservatory::new(&addr, Duration::from_secs(2));
        obs.dome(DomeCommand::Open).await.unwrap();
    }

    #[tokio::test]
    async fn daemon_error_becomes_a_fault() {
        let addr = scripted_daemon(vec![r#"{"ok": false, "error": "dome motor stalled"}"#]).await;
        let obs = RemoteObservatory::new(&addr, Duration::from_secs(2));
        let err = obs.dome(DomeCommand::Open).await.unwrap_err();
        assert_eq!(err, HardwareError::Fault("dome motor stalled".into()));
    }

    #[tokio::test]
    async fn weather_and_faults_parse() {
        let addr = scripted_daemon(vec![
            r#"{"ok": true, "data": {"inside_air_temp_c": 9.5, "outside_air_temp_c": 4.0, "wind_speed_kph": 12.0}}"#,
            r#"{"ok": true, "data": {"faults": ["weather", "dome_not_open", "ups"]}}"#,
        ])
        .await;
        let obs = RemoteObservatory::new(&addr, Duration::from_secs(2));

        let weather = obs.weather().await.unwrap();
        assert_eq!(weather.inside_air_temp_c, 9.5);

        let faults = obs.faults().await.unwrap();
        assert!(!faults.clear_to_observe());
        assert!(faults.faults.contains(&FaultFlag::Other("ups".into())));
    }

    #[tokio::test]
    async fn garbage_reply_is_a_protocol_error() {
        let addr = scripted_daemon(vec!["not json at all"]).await;
        let obs = RemoteObservatory::new(&addr, Duration::from_secs(2));
        let err = obs.status().await.unwrap_err();
        assert!(matches!(err, HardwareError::Protocol(_)));
    }

    #[tokio::test]
    async fn exposure_reply_parses() {
        let addr = scripted_daemon(vec![
            r#"{"ok": true, "data": {"path": "/data/frames/x.fits", "elapsed_s": 61.2}}"#,
        ])
        .await;
        let cam = RemoteCamera::new(&addr, Duration::from_secs(5));
        let outcome = cam
            .take_exposure(&ExposureRequest {
                arm: CameraArm::Rc,
                shutter: ShutterMode::Normal,
                exptime_s: 60.0,
                object: "x".into(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.path.to_str().unwrap(), "/data/frames/x.fits");
    }

    #[tokio::test]
    async fn unreachable_daemon_times_out_or_faults() {
        // Nothing listens here.
        let obs = RemoteObservatory::new("127.0.0.1:1", Duration::from_millis(300));
        assert!(obs.dome(DomeCommand::Close).await.is_err());
    }
}
