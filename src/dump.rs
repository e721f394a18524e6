//! Single-frame rendering for `--dump-frame`: decode one frame at a timestamp
//! and return the glyph grid without touching the terminal.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::ascii_frame::GlyphGrid;
use crate::ascii_render::render_frame;
use crate::config::PlayerConfig;
use crate::decoding::{FfmpegSource, FrameSource, FrameStatus};
use crate::error_codes::{format_seconds, PlayerError};
use crate::frame::Viewport;

/// Viewport used when stdout is not a terminal.
pub const FALLBACK_TERMINAL: (u16, u16) = (80, 24);

/// Upper bound on waiting for ffprobe and the first decoded frame.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(30);

pub fn dump_frame(
    location: &str,
    at: Duration,
    viewport: Viewport,
    config: &PlayerConfig,
) -> Result<GlyphGrid> {
    let mut source = FfmpegSource::open_at(location, viewport, &config.tools, at)?;
    dump_from_source(&mut source, viewport, config.idle_interval(), FIRST_FRAME_TIMEOUT)
        .with_context(|| format!("failed to dump frame at {}", format_seconds(at)))
}

/// Polls `source` until it yields a frame and renders it.
pub fn dump_from_source(
    source: &mut impl FrameSource,
    viewport: Viewport,
    idle_interval: Duration,
    timeout: Duration,
) -> Result<GlyphGrid> {
    let started = Instant::now();
    loop {
        match source.next_frame()? {
            FrameStatus::Frame(frame) => return Ok(render_frame(frame, viewport)?),
            FrameStatus::EndOfStream => {
                return Err(PlayerError::decode("stream ended before the requested time").into())
            }
            FrameStatus::NotReady | FrameStatus::Paused => {
                if started.elapsed() >= timeout {
                    return Err(PlayerError::decode(format!(
                        "no frame decoded within {}",
                        format_seconds(timeout)
                    ))
                    .into());
                }
                thread::sleep(idle_interval);
            }
        }
    }
}
