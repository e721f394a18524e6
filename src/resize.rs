use crate::error_codes::PlayerError;
use crate::frame::{Frame, ScaledFrame, RGB_CHANNELS};

/// Terminal glyph cells are roughly 2.2 times taller than they are wide.
pub const CHAR_RATIO: f64 = 2.2;

/// Fits a `source_w` x `source_h` picture into a grid of at most `max_w` x
/// `max_h` cells, correcting for the glyph aspect ratio.
///
/// The width is tried first (never wider than the source itself); if the
/// resulting height overflows the pane the height is pinned to `max_h` and the
/// width derived from it instead. Both results are floored and kept within
/// `[1, max]`.
pub fn fit_dimensions(
    source_w: u32,
    source_h: u32,
    max_w: u32,
    max_h: u32,
) -> Result<(u32, u32), PlayerError> {
    if source_w == 0 || source_h == 0 {
        return Err(PlayerError::InvalidDimensions {
            width: source_w,
            height: source_h,
        });
    }
    if max_w == 0 || max_h == 0 {
        return Err(PlayerError::InvalidDimensions {
            width: max_w,
            height: max_h,
        });
    }

    let ratio = f64::from(source_h) / f64::from(source_w) / CHAR_RATIO;
    let mut width = f64::from(max_w.min(source_w));
    let mut height = width * ratio;
    if height > f64::from(max_h) {
        height = f64::from(max_h);
        width = height / ratio;
    }

    let width = (width.floor() as u32).clamp(1, max_w);
    let height = (height.floor() as u32).clamp(1, max_h);
    Ok((width, height))
}

/// Brings a frame to exactly `width` x `height`. Frames already at that size
/// (the decoder normally scales for us) are passed through untouched; anything
/// else is nearest-neighbour sampled.
pub fn resample(frame: Frame, width: usize, height: usize) -> ScaledFrame {
    let source_w = frame.width() as usize;
    let source_h = frame.height() as usize;
    if source_w == width && source_h == height {
        return ScaledFrame::new(width, height, frame.into_pixels());
    }

    let source = frame.pixels();
    let mut pixels = vec![0_u8; width * height * RGB_CHANNELS];
    if source_w == 0 || source_h == 0 {
        return ScaledFrame::new(width, height, pixels);
    }

    for row in 0..height {
        let source_row = (row * source_h / height).min(source_h - 1);
        for col in 0..width {
            let source_col = (col * source_w / width).min(source_w - 1);
            let from = (source_row * source_w + source_col) * RGB_CHANNELS;
            let to = (row * width + col) * RGB_CHANNELS;
            pixels[to..to + RGB_CHANNELS].copy_from_slice(&source[from..from + RGB_CHANNELS]);
        }
    }

    ScaledFrame::new(width, height, pixels)
}
