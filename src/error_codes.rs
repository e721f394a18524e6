use std::time::Duration;

use thiserror::Error;

/// Failure taxonomy of the player. Every variant carries a stable code so the
/// binary can report `error[CODE]: message` regardless of how much context
/// was layered on top while the error bubbled up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("invalid dimensions {width}x{height}: width and height must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("decoder failed: {0}")]
    DecodeFailure(String),

    #[error("media duration is unavailable")]
    MetadataUnavailable,

    #[error(
        "render overflow: {what} is {width}x{height} but the pane holds {max_width}x{max_height}"
    )]
    RenderOverflow {
        what: &'static str,
        width: usize,
        height: usize,
        max_width: usize,
        max_height: usize,
    },

    #[error("cannot resolve source: {0}")]
    SourceResolution(String),
}

impl PlayerError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidDimensions { .. } => "INVALID_DIMENSIONS",
            Self::DecodeFailure(_) => "DECODE_FAILURE",
            Self::MetadataUnavailable => "METADATA_UNAVAILABLE",
            Self::RenderOverflow { .. } => "RENDER_OVERFLOW",
            Self::SourceResolution(_) => "SOURCE_RESOLUTION",
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::DecodeFailure(message.into())
    }
}

pub fn find_player_error(error: &anyhow::Error) -> Option<&PlayerError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<PlayerError>())
}

/// One-line report used by `main` once the terminal has been restored.
pub fn describe(error: &anyhow::Error) -> String {
    match find_player_error(error) {
        Some(player_error) => format!("error[{}]: {error:#}", player_error.code()),
        None => format!("error: {error:#}"),
    }
}

pub(crate) fn format_seconds(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn code_survives_context_layers() {
        let error = Err::<(), _>(PlayerError::decode("ffmpeg exited with status 1"))
            .context("while reading frame 12")
            .context("playback stopped")
            .unwrap_err();

        let found = find_player_error(&error).expect("player error should be in the chain");
        assert_eq!(found.code(), "DECODE_FAILURE");
        assert!(describe(&error).starts_with("error[DECODE_FAILURE]: playback stopped"));
    }

    #[test]
    fn plain_errors_have_no_code() {
        let error = anyhow::anyhow!("something else");
        assert!(find_player_error(&error).is_none());
        assert_eq!(describe(&error), "error: something else");
    }
}
