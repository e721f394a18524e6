use crate::ascii_frame::{GlyphCell, GlyphGrid};
use crate::error_codes::PlayerError;
use crate::frame::{Frame, ScaledFrame, Viewport};
use crate::luma::{ramp, to_glyph_index, to_gray};
use crate::palette::quantize;
use crate::resize::{fit_dimensions, resample};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0001_0000_01b3;

/// Pure per-frame composition: glyph from the gray plane, color from the RGB
/// pixel, bold always on. `gray` must have one entry per pixel of `frame`.
pub fn render_grid(frame: &ScaledFrame, gray: &[u8]) -> Result<GlyphGrid, PlayerError> {
    let width = frame.width();
    let height = frame.height();
    if gray.len() != width * height {
        return Err(PlayerError::RenderOverflow {
            what: "gray plane",
            width: gray.len(),
            height: 1,
            max_width: width * height,
            max_height: 1,
        });
    }

    let ramp = ramp();
    let mut cells = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let luma = gray[row * width + col];
            cells.push(GlyphCell {
                ch: char::from(ramp[to_glyph_index(luma, ramp.len())]),
                color: quantize(frame.rgb(row, col)),
                bold: true,
            });
        }
    }

    Ok(GlyphGrid::from_cells(width, height, cells))
}

/// Full pipeline for one decoded frame: fit to the viewport, resample, derive
/// the gray plane and compose the grid.
pub fn render_frame(frame: Frame, viewport: Viewport) -> Result<GlyphGrid, PlayerError> {
    let (width, height) = fit_dimensions(
        frame.width(),
        frame.height(),
        u32::from(viewport.cols),
        u32::from(viewport.rows),
    )?;
    let scaled = resample(frame, width as usize, height as usize);
    let gray = to_gray(&scaled);
    render_grid(&scaled, &gray)
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Stable fingerprint over characters and colors, used to compare renders.
pub fn grid_hash(grid: &GlyphGrid) -> u64 {
    let mut bytes = Vec::with_capacity(grid.cells().len() * 3);
    for cell in grid.cells() {
        let mut utf8 = [0_u8; 4];
        bytes.extend_from_slice(cell.ch.encode_utf8(&mut utf8).as_bytes());
        bytes.push(cell.color.index() as u8);
        bytes.push(u8::from(cell.bold));
    }
    fnv1a64(&bytes)
}
