use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::ascii_render::render_frame;
use crate::config::PlayerConfig;
use crate::decoding::{FrameSource, FrameStatus};
use crate::error_codes::{format_seconds, PlayerError};
use crate::frame::Frame;
use crate::progress;
use crate::screen::{InputAction, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// Nothing decodable yet; the loop idles without reading input.
    AwaitingMetadata,
    Playing,
    Paused,
    /// Terminal: quit, end of stream, or a fatal error.
    Stopped,
}

/// Everything the loop mutates. Owned by the controller alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackState {
    pub phase: PlaybackPhase,
    pub duration: Option<Duration>,
    pub position: Duration,
}

impl PlaybackState {
    pub fn is_paused(&self) -> bool {
        self.phase == PlaybackPhase::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == PlaybackPhase::Stopped
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    pub seek_step_seconds: f64,
    pub seek_guard_seconds: f64,
    pub idle_interval: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self::from(&PlayerConfig::default())
    }
}

impl From<&PlayerConfig> for PlaybackSettings {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            seek_step_seconds: config.seek_step_seconds,
            seek_guard_seconds: config.seek_guard_seconds,
            idle_interval: config.idle_interval(),
        }
    }
}

/// Time source for frame pacing.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// A forward seek is only issued when it lands comfortably before the end;
/// seeking onto the last second of a stream stalls the decoder.
pub fn can_seek_forward(
    position: Duration,
    duration: Option<Duration>,
    settings: &PlaybackSettings,
) -> bool {
    let Some(total) = duration else {
        return false;
    };
    position.as_secs_f64() + settings.seek_step_seconds + settings.seek_guard_seconds
        < total.as_secs_f64()
}

pub struct PlaybackController<S, T, C = SystemClock> {
    source: S,
    screen: T,
    clock: C,
    title: String,
    settings: PlaybackSettings,
    state: PlaybackState,
}

impl<S: FrameSource, T: Screen> PlaybackController<S, T, SystemClock> {
    pub fn new(source: S, screen: T, title: impl Into<String>, settings: PlaybackSettings) -> Self {
        Self::with_clock(source, screen, SystemClock, title, settings)
    }
}

impl<S: FrameSource, T: Screen, C: Clock> PlaybackController<S, T, C> {
    pub fn with_clock(
        source: S,
        screen: T,
        clock: C,
        title: impl Into<String>,
        settings: PlaybackSettings,
    ) -> Self {
        Self {
            source,
            screen,
            clock,
            title: title.into(),
            settings,
            state: PlaybackState {
                phase: PlaybackPhase::AwaitingMetadata,
                duration: None,
                position: Duration::ZERO,
            },
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn screen(&self) -> &T {
        &self.screen
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Runs until quit or end of stream. Any error stops playback and is
    /// returned to the caller.
    pub fn run(&mut self) -> Result<()> {
        self.screen
            .draw_title(&self.title, self.state.is_paused())
            .context("failed to draw title bar")?;
        while !self.state.is_stopped() {
            if let Err(error) = self.step() {
                self.transition(PlaybackPhase::Stopped);
                return Err(error);
            }
        }
        Ok(())
    }

    /// One cycle of the loop, including its pacing sleep.
    pub fn step(&mut self) -> Result<()> {
        match self.state.phase {
            PlaybackPhase::Stopped => Ok(()),
            PlaybackPhase::AwaitingMetadata => self.step_awaiting(),
            PlaybackPhase::Playing => self.step_playing(),
            PlaybackPhase::Paused => self.step_paused(),
        }
    }

    fn step_awaiting(&mut self) -> Result<()> {
        self.refresh_duration();
        match self.next_frame()? {
            FrameStatus::NotReady => {
                self.clock.sleep(self.settings.idle_interval);
                Ok(())
            }
            FrameStatus::Frame(frame) => {
                if self.state.duration.is_none() {
                    log::info!("{}; progress bar disabled", PlayerError::MetadataUnavailable);
                }
                self.transition(PlaybackPhase::Playing);
                self.render_cycle(frame)
            }
            FrameStatus::Paused => self.source_paused(),
            FrameStatus::EndOfStream => {
                self.transition(PlaybackPhase::Stopped);
                Ok(())
            }
        }
    }

    fn step_playing(&mut self) -> Result<()> {
        match self.next_frame()? {
            FrameStatus::Frame(frame) => self.render_cycle(frame),
            FrameStatus::EndOfStream => {
                self.transition(PlaybackPhase::Stopped);
                Ok(())
            }
            FrameStatus::Paused => self.source_paused(),
            // Decoder briefly behind, typically right after a seek.
            FrameStatus::NotReady => {
                self.clock.sleep(self.settings.idle_interval);
                self.handle_input()
            }
        }
    }

    fn step_paused(&mut self) -> Result<()> {
        let acted = self.handle_input_paused()?;
        if !acted && self.state.is_paused() {
            self.clock.sleep(self.settings.idle_interval);
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Result<FrameStatus> {
        self.source
            .next_frame()
            .with_context(|| format!("decoding stopped at {}", format_seconds(self.state.position)))
    }

    fn refresh_duration(&mut self) {
        if self.state.duration.is_none() {
            self.state.duration = self.source.metadata().duration;
        }
    }

    fn render_cycle(&mut self, frame: Frame) -> Result<()> {
        let started = self.clock.now();
        let delay = frame.delay;
        self.refresh_duration();
        self.state.position = self.source.position();

        let viewport = self.screen.viewport();
        let grid = render_frame(frame, viewport)?;
        self.screen.draw_video(&grid)?;

        if let Some(total) = self.state.duration {
            // The bar spans the picture, not the whole pane.
            let bar = progress::render(self.state.position, total, grid.width());
            self.screen.draw_progress(&bar)?;
        }

        self.handle_input()?;
        if !self.state.is_stopped() {
            let elapsed = self.clock.now().saturating_duration_since(started);
            self.clock.sleep(delay.saturating_sub(elapsed));
        }
        Ok(())
    }

    fn handle_input(&mut self) -> Result<()> {
        let Some(action) = self.screen.poll_input()? else {
            return Ok(());
        };
        match action {
            InputAction::Quit => self.transition(PlaybackPhase::Stopped),
            InputAction::TogglePause => self.set_paused(true)?,
            InputAction::SeekBack => {
                self.source.seek(-self.settings.seek_step_seconds)?;
                self.state.position = self.source.position();
            }
            InputAction::SeekForward => {
                if can_seek_forward(self.state.position, self.state.duration, &self.settings) {
                    self.source.seek(self.settings.seek_step_seconds)?;
                    self.state.position = self.source.position();
                } else {
                    log::debug!(
                        "forward seek refused at {} (duration {:?})",
                        format_seconds(self.state.position),
                        self.state.duration
                    );
                }
            }
        }
        Ok(())
    }

    /// Returns whether a key was acted on.
    fn handle_input_paused(&mut self) -> Result<bool> {
        match self.screen.poll_input()? {
            Some(InputAction::Quit) => {
                self.transition(PlaybackPhase::Stopped);
                Ok(true)
            }
            Some(InputAction::TogglePause) => {
                self.set_paused(false)?;
                Ok(true)
            }
            // Seeking is ignored while paused; nothing would show the new position.
            Some(InputAction::SeekBack | InputAction::SeekForward) | None => Ok(false),
        }
    }

    fn set_paused(&mut self, paused: bool) -> Result<()> {
        self.source.set_pause(paused);
        self.screen.draw_title(&self.title, paused)?;
        self.transition(if paused {
            PlaybackPhase::Paused
        } else {
            PlaybackPhase::Playing
        });
        Ok(())
    }

    /// The source paused on its own; only the indicator needs to follow.
    fn source_paused(&mut self) -> Result<()> {
        if !self.state.is_paused() {
            self.screen.draw_title(&self.title, true)?;
            self.transition(PlaybackPhase::Paused);
        }
        Ok(())
    }

    fn transition(&mut self, phase: PlaybackPhase) {
        if self.state.phase != phase {
            log::debug!("playback {:?} -> {:?}", self.state.phase, phase);
            self.state.phase = phase;
        }
    }
}
