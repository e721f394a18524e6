pub mod ascii_frame;
pub mod ascii_render;
pub mod config;
pub mod decoding;
pub mod dump;
pub mod error_codes;
pub mod frame;
pub mod luma;
pub mod palette;
pub mod playback;
pub mod probe;
pub mod progress;
pub mod resize;
pub mod screen;
pub mod sources;
