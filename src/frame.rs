use std::time::Duration;

use anyhow::{bail, Result};

pub const RGB_CHANNELS: usize = 3;

/// A decoded RGB24 picture together with its timing. Owned by the playback loop
/// for a single render cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    /// How long the frame stays on screen before the next one is due.
    pub delay: Duration,
    /// Presentation timestamp, increasing within one decoder run.
    pub pts: Duration,
}

impl Frame {
    pub fn from_rgb(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        delay: Duration,
        pts: Duration,
    ) -> Result<Self> {
        let expected = rgb_len(width, height);
        if pixels.len() != expected {
            bail!(
                "frame buffer length mismatch for {}x{}: expected {}, got {}",
                width,
                height,
                expected,
                pixels.len()
            );
        }
        Ok(Self {
            width,
            height,
            pixels,
            delay,
            pts,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

/// A frame fitted to the video pane. Lives only for one render cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaledFrame {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl ScaledFrame {
    pub(crate) fn new(width: usize, height: usize, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width * height * RGB_CHANNELS);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn rgb(&self, row: usize, col: usize) -> [u8; 3] {
        let offset = (row * self.width + col) * RGB_CHANNELS;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ]
    }
}

/// Size of the video pane in character cells. Captured once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub rows: u16,
    pub cols: u16,
}

impl Viewport {
    pub const TITLE_ROWS: u16 = 3;
    pub const PROGRESS_ROWS: u16 = 1;

    /// Carves the video pane out of the full terminal: the title bar takes the
    /// top three rows and the progress bar the last one. The last column stays
    /// empty.
    pub fn from_terminal(cols: u16, rows: u16) -> Self {
        Self {
            rows: rows.saturating_sub(Self::TITLE_ROWS + Self::PROGRESS_ROWS),
            cols: cols.saturating_sub(1),
        }
    }

    pub fn top(&self) -> u16 {
        Self::TITLE_ROWS
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * RGB_CHANNELS
}
