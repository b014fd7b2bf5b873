//! RC focus model and sweep fitting.

use std::path::Path;

use crate::config::FocusSettings;

/// Modeled focus position at 0 C, telescope secondary units.
const FOCUS_AT_0C: f64 = 16.65;
/// Focus drift per degree C of inside air temperature.
const FOCUS_SLOPE_PER_C: f64 = -0.021;

/// Extracts an image-quality figure from a frame on disk. The production
/// implementation calls the reduction pipeline; tests supply a table.
pub trait ImageQuality: Send + Sync {
    fn fwhm(&self, path: &Path) -> anyhow::Result<f64>;
}

/// Reads the FWHM sidecar the reduction pipeline writes next to each
/// frame: `frame.fits` pairs with `frame.fwhm.json` containing
/// `{"fwhm": <arcsec>}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SidecarQuality;

impl ImageQuality for SidecarQuality {
    fn fwhm(&self, path: &Path) -> anyhow::Result<f64> {
        let sidecar = path.with_extension("fwhm.json");
        let text = std::fs::read_to_string(&sidecar)
            .map_err(|e| anyhow::anyhow!("no sidecar {}: {}", sidecar.display(), e))?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        value
            .get("fwhm")
            .and_then(serde_json::Value::as_f64)
            .filter(|f| f.is_finite() && *f > 0.0)
            .ok_or_else(|| anyhow::anyhow!("no usable fwhm in {}", sidecar.display()))
    }
}

/// Predicted RC focus position for the inside air temperature, before
/// the instrument offset.
pub fn temp_to_focus(temp_c: f64) -> f64 {
    FOCUS_AT_0C + FOCUS_SLOPE_PER_C * temp_c
}

/// The sweep positions around the modeled focus for the given
/// temperature.
pub fn sweep_positions(temp_c: f64, settings: &FocusSettings) -> Vec<f64> {
    let center = temp_to_focus(temp_c) + settings.rc_focus_offset;
    let mut positions = Vec::new();
    let mut p = center - settings.sweep_half_width;
    let end = center + settings.sweep_half_width + settings.sweep_step / 2.0;
    while p <= end {
        positions.push(p);
        p += settings.sweep_step;
    }
    positions
}

/// Best focus from (position, FWHM) sweep samples.
///
/// Fits a parabola by least squares and returns its vertex when the fit
/// is convex and the vertex lies inside the sampled range; otherwise
/// falls back to the position of the sharpest sample.
pub fn best_focus(samples: &[(f64, f64)]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sharpest = samples
        .iter()
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(p, _)| *p)?;
    if samples.len() < 3 {
        return Some(sharpest);
    }

    // Normal equations for y = a u^2 + b u + c, with u the position
    // centered on the sample mean. Raw positions sit near 16.4, where
    // the uncentered columns are nearly collinear and the vertex comes
    // back with microns of error.
    let n = samples.len() as f64;
    let mean = samples.iter().map(|(x, _)| *x).sum::<f64>() / n;
    let (mut sx, mut sx2, mut sx3, mut sx4) = (0.0, 0.0, 0.0, 0.0);
    let (mut sy, mut sxy, mut sx2y) = (0.0, 0.0, 0.0);
    for &(x, y) in samples {
        let u = x - mean;
        let u2 = u * u;
        sx += u;
        sx2 += u2;
        sx3 += u2 * u;
        sx4 += u2 * u2;
        sy += y;
        sxy += u * y;
        sx2y += u2 * y;
    }

    // Solve the 3x3 system by Cramer's rule.
    let det = |m: [[f64; 3]; 3]| {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    };
    let d = det([[sx4, sx3, sx2], [sx3, sx2, sx], [sx2, sx, n]]);
    if d.abs() < 1e-12 {
        return Some(sharpest);
    }
    let a = det([[sx2y, sx3, sx2], [sxy, sx2, sx], [sy, sx, n]]) / d;
    let b = det([[sx4, sx2y, sx2], [sx3, sxy, sx], [sx2, sy, n]]) / d;

    if a <= 0.0 {
        // Concave or flat fit: the sweep did not bracket focus.
        return Some(sharpest);
    }
    let vertex = mean - b / (2.0 * a);
    let lo = samples.iter().map(|(p, _)| *p).fold(f64::INFINITY, f64::min);
    let hi = samples.iter().map(|(p, _)| *p).fold(f64::NEG_INFINITY, f64::max);
    if (lo..=hi).contains(&vertex) {
        Some(vertex)
    } else {
        Some(sharpest)
    }
}
