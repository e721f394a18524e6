use crate::frame::{ScaledFrame, RGB_CHANNELS};

/// Visual-density ramp, sparse to dense. Calibrated by eye against real
/// footage; keep the order as is.
pub const GLYPH_RAMP: &str =
    " `.-':_,^=;><+!rc*/z?sLTv)J7(|Fi{C}fI31tlu[neoZ5Yxjya]2ESwqkP6h9d4VpOGbUAKXHm8RD#$Bg0MNWQ%&@";

const BT709_R_WEIGHT: u32 = 2126;
const BT709_G_WEIGHT: u32 = 7152;
const BT709_B_WEIGHT: u32 = 722;
const BT709_WEIGHT_SUM: u32 = 10_000;

/// The ramp as bytes; every glyph is single-byte ASCII.
pub fn ramp() -> &'static [u8] {
    GLYPH_RAMP.as_bytes()
}

pub fn bt709_luma_u8(r: u8, g: u8, b: u8) -> u8 {
    let weighted = BT709_R_WEIGHT * u32::from(r)
        + BT709_G_WEIGHT * u32::from(g)
        + BT709_B_WEIGHT * u32::from(b);
    ((weighted + (BT709_WEIGHT_SUM / 2)) / BT709_WEIGHT_SUM) as u8
}

/// Splits 0..=255 into `ramp_len` equal buckets: `floor(gray / (256 / n))`.
pub fn to_glyph_index(gray: u8, ramp_len: usize) -> usize {
    if ramp_len <= 1 {
        return 0;
    }
    (usize::from(gray) * ramp_len / 256).min(ramp_len - 1)
}

pub fn glyph_for(gray: u8) -> char {
    let ramp = ramp();
    char::from(ramp[to_glyph_index(gray, ramp.len())])
}

/// Grayscale plane for a scaled frame, same dimensions, one byte per pixel.
pub fn to_gray(frame: &ScaledFrame) -> Vec<u8> {
    frame
        .pixels()
        .chunks_exact(RGB_CHANNELS)
        .map(|rgb| bt709_luma_u8(rgb[0], rgb[1], rgb[2]))
        .collect()
}
