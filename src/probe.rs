use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::error_codes::PlayerError;

/// Used when the container reports no usable frame rate.
pub const FALLBACK_FPS: f64 = 30.0;

/// One frame per 100 seconds. Slower rates are clamped up to this.
pub const MIN_FPS: f64 = 0.01;

/// What the player needs to know about the first video stream before decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// `None` for live streams and containers without a duration.
    pub duration: Option<Duration>,
}

impl ProbeInfo {
    pub fn frame_delay(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(MIN_FPS))
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

pub fn probe(ffprobe: &Path, location: &str) -> Result<ProbeInfo> {
    let output = Command::new(ffprobe)
        .args(["-v", "error"])
        .args(["-select_streams", "v:0"])
        .args([
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate:format=duration",
        ])
        .args(["-of", "json"])
        .arg(location)
        .stdin(Stdio::null())
        .output()
        .map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                anyhow!(PlayerError::decode(format!(
                    "{} was not found on PATH. Install ffmpeg (which ships ffprobe) first",
                    ffprobe.display()
                )))
            } else {
                anyhow!("failed to spawn {}: {error}", ffprobe.display())
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PlayerError::decode(format!(
            "ffprobe failed with status {}: {}",
            output.status,
            stderr.trim()
        ))
        .into());
    }

    let stdout = String::from_utf8(output.stdout).context("ffprobe printed non-utf8 output")?;
    let info = parse_probe_json(&stdout)?;
    log::info!(
        "probed {}: {}x{} @ {:.3} fps, duration {}",
        location,
        info.width,
        info.height,
        info.fps,
        info.duration
            .map(crate::error_codes::format_seconds)
            .unwrap_or_else(|| "unknown".to_owned())
    );
    Ok(info)
}

pub fn parse_probe_json(json: &str) -> Result<ProbeInfo> {
    let parsed: ProbeOutput =
        serde_json::from_str(json).context("failed to parse ffprobe json output")?;
    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| PlayerError::decode("input has no video stream"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => (width, height),
        (width, height) => {
            return Err(PlayerError::InvalidDimensions {
                width: width.unwrap_or(0),
                height: height.unwrap_or(0),
            }
            .into())
        }
    };

    let fps = [stream.avg_frame_rate, stream.r_frame_rate]
        .iter()
        .flatten()
        .find_map(|rate| parse_rate(rate))
        .unwrap_or(FALLBACK_FPS);

    let duration = parsed
        .format
        .and_then(|format| format.duration)
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
        .map(Duration::from_secs_f64);

    Ok(ProbeInfo {
        width,
        height,
        fps,
        duration,
    })
}

/// ffprobe rates look like `30000/1001`; `0/0` means unknown.
fn parse_rate(value: &str) -> Option<f64> {
    let (numerator, denominator) = match value.split_once('/') {
        Some((numerator, denominator)) => (numerator, denominator),
        None => (value, "1"),
    };
    let numerator = numerator.trim().parse::<f64>().ok()?;
    let denominator = denominator.trim().parse::<f64>().ok()?;
    if denominator <= 0.0 {
        return None;
    }
    let fps = numerator / denominator;
    (fps.is_finite() && fps > 0.0).then(|| fps.max(MIN_FPS))
}
