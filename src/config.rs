use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

pub const DEFAULT_SEEK_STEP_SECONDS: f64 = 5.0;
pub const DEFAULT_SEEK_GUARD_SECONDS: f64 = 1.0;
pub const DEFAULT_IDLE_INTERVAL_MS: u64 = 10;

/// External tools the player shells out to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub yt_dlp: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            yt_dlp: PathBuf::from("yt-dlp"),
        }
    }
}

/// Playback tuning. Every field has a default, so an empty file is valid.
///
/// ```yaml
/// tools:
///   ffmpeg: /opt/ffmpeg/bin/ffmpeg
/// seek_step_seconds: 10
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerConfig {
    pub tools: ToolPaths,
    /// Size of one left/right arrow seek.
    pub seek_step_seconds: f64,
    /// Forward seeks are refused unless `position + step + guard < duration`,
    /// so a seek never lands on the very end of the stream and stalls.
    pub seek_guard_seconds: f64,
    /// Sleep used while waiting for the first frame and while paused.
    pub idle_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            seek_step_seconds: DEFAULT_SEEK_STEP_SECONDS,
            seek_guard_seconds: DEFAULT_SEEK_GUARD_SECONDS,
            idle_interval_ms: DEFAULT_IDLE_INTERVAL_MS,
        }
    }
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.seek_step_seconds.is_finite() || self.seek_step_seconds <= 0.0 {
            bail!(
                "seek_step_seconds must be a positive number, got {}",
                self.seek_step_seconds
            );
        }
        if !self.seek_guard_seconds.is_finite() || self.seek_guard_seconds < 0.0 {
            bail!(
                "seek_guard_seconds must be zero or positive, got {}",
                self.seek_guard_seconds
            );
        }
        if self.idle_interval_ms == 0 || self.idle_interval_ms > 1_000 {
            bail!(
                "idle_interval_ms must be within 1..=1000, got {}",
                self.idle_interval_ms
            );
        }
        Ok(())
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

pub fn load_config(path: &Path) -> Result<PlayerConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = parse_config(&contents)
        .with_context(|| format!("invalid config {}", path.display()))?;
    log::debug!("loaded config from {}: {:?}", path.display(), config);
    Ok(config)
}

pub fn parse_config(contents: &str) -> Result<PlayerConfig> {
    // serde_yaml rejects an empty document for a struct; treat it as all defaults.
    if contents.trim().is_empty() {
        return Ok(PlayerConfig::default());
    }
    let config: PlayerConfig = serde_yaml::from_str(contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!("failed to parse yaml at {}: {}", location, error)
    })?;
    config.validate()?;
    Ok(config)
}
