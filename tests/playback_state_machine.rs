use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Result;
use asciivid::ascii_frame::GlyphGrid;
use asciivid::ascii_render::{grid_hash, render_frame};
use asciivid::decoding::{seek_target, FrameSource, FrameStatus, Metadata};
use asciivid::dump::dump_from_source;
use asciivid::error_codes::{find_player_error, PlayerError};
use asciivid::frame::{Frame, Viewport};
use asciivid::playback::{Clock, PlaybackController, PlaybackPhase, PlaybackSettings};
use asciivid::progress;
use asciivid::screen::{InputAction, Screen};

const FRAME_DELAY: Duration = Duration::from_millis(40);
const VIEWPORT: Viewport = Viewport { rows: 6, cols: 39 };

enum Scripted {
    Frame(Duration),
    NotReady,
    Paused,
    Fail(PlayerError),
}

/// A `width` x 2 gradient, for pictures wider than the default fixture.
fn wide_frame_at(width: u32, pts: Duration) -> Frame {
    let pixels = (0..width * 2 * 3).map(|index| (index * 7 % 256) as u8).collect();
    Frame::from_rgb(width, 2, pixels, FRAME_DELAY, pts).expect("fixture frame")
}

fn frame_at(pts: Duration) -> Frame {
    let pixels = vec![
        0, 0, 0, 255, 0, 0, 0, 255, 0, 255, 255, 255, //
        10, 10, 10, 90, 90, 90, 180, 180, 180, 250, 250, 250,
    ];
    Frame::from_rgb(4, 2, pixels, FRAME_DELAY, pts).expect("fixture frame")
}

/// Plays a fixed script, then reports end of stream.
struct FakeSource {
    script: VecDeque<Scripted>,
    duration: Option<Duration>,
    /// `next_frame` calls before the duration becomes visible.
    metadata_after: usize,
    /// Width of the delivered frames; 4 uses the fixed fixture.
    frame_width: u32,
    calls: usize,
    position: Duration,
    seeks: Vec<f64>,
    pauses: Vec<bool>,
}

impl FakeSource {
    fn new(script: Vec<Scripted>, duration: Option<Duration>) -> Self {
        Self {
            script: script.into(),
            duration,
            metadata_after: 0,
            frame_width: 4,
            calls: 0,
            position: Duration::ZERO,
            seeks: Vec::new(),
            pauses: Vec::new(),
        }
    }

    fn frames(count: u64, start: Duration, duration: Option<Duration>) -> Self {
        let script = (0..count)
            .map(|index| Scripted::Frame(start + FRAME_DELAY * index as u32))
            .collect();
        Self::new(script, duration)
    }
}

impl FrameSource for FakeSource {
    fn next_frame(&mut self) -> Result<FrameStatus> {
        self.calls += 1;
        match self.script.pop_front() {
            Some(Scripted::Frame(pts)) => {
                self.position = pts;
                let frame = if self.frame_width == 4 {
                    frame_at(pts)
                } else {
                    wide_frame_at(self.frame_width, pts)
                };
                Ok(FrameStatus::Frame(frame))
            }
            Some(Scripted::NotReady) => Ok(FrameStatus::NotReady),
            Some(Scripted::Paused) => Ok(FrameStatus::Paused),
            Some(Scripted::Fail(error)) => Err(error.into()),
            None => Ok(FrameStatus::EndOfStream),
        }
    }

    fn metadata(&self) -> Metadata {
        Metadata {
            duration: if self.calls > self.metadata_after {
                self.duration
            } else {
                None
            },
        }
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn set_pause(&mut self, paused: bool) {
        self.pauses.push(paused);
    }

    fn seek(&mut self, delta_seconds: f64) -> Result<()> {
        self.seeks.push(delta_seconds);
        self.position = seek_target(self.position, delta_seconds, self.duration);
        Ok(())
    }
}

/// Virtual time shared between the clock and the screen, so drawing can be
/// made to "take" a while.
#[derive(Clone, Default)]
struct VirtualTime(Rc<Cell<Duration>>);

impl VirtualTime {
    fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

struct FakeClock {
    origin: Instant,
    time: VirtualTime,
    sleeps: Vec<Duration>,
}

impl FakeClock {
    fn new(time: VirtualTime) -> Self {
        Self {
            origin: Instant::now(),
            time,
            sleeps: Vec::new(),
        }
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.origin + self.time.0.get()
    }

    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
        self.time.advance(duration);
    }
}

struct FakeScreen {
    inputs: VecDeque<Option<InputAction>>,
    polls: usize,
    titles: Vec<(String, bool)>,
    videos: Vec<GlyphGrid>,
    progress: Vec<String>,
    time: VirtualTime,
    draw_cost: Duration,
}

impl FakeScreen {
    fn new(inputs: Vec<Option<InputAction>>, time: VirtualTime) -> Self {
        Self {
            inputs: inputs.into(),
            polls: 0,
            titles: Vec::new(),
            videos: Vec::new(),
            progress: Vec::new(),
            time,
            draw_cost: Duration::ZERO,
        }
    }
}

impl Screen for FakeScreen {
    fn viewport(&self) -> Viewport {
        VIEWPORT
    }

    fn draw_title(&mut self, title: &str, paused: bool) -> Result<()> {
        self.titles.push((title.to_owned(), paused));
        Ok(())
    }

    fn draw_video(&mut self, grid: &GlyphGrid) -> Result<()> {
        self.time.advance(self.draw_cost);
        self.videos.push(grid.clone());
        Ok(())
    }

    fn draw_progress(&mut self, text: &str) -> Result<()> {
        self.progress.push(text.to_owned());
        Ok(())
    }

    fn poll_input(&mut self) -> Result<Option<InputAction>> {
        self.polls += 1;
        Ok(self.inputs.pop_front().flatten())
    }
}

type Controller = PlaybackController<FakeSource, FakeScreen, FakeClock>;

fn controller(source: FakeSource, inputs: Vec<Option<InputAction>>) -> Controller {
    let time = VirtualTime::default();
    PlaybackController::with_clock(
        source,
        FakeScreen::new(inputs, time.clone()),
        FakeClock::new(time),
        "clip.mp4",
        PlaybackSettings::default(),
    )
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}

#[test]
fn quit_while_playing_stops_after_current_frame() {
    let source = FakeSource::frames(10, Duration::ZERO, Some(secs(60)));
    let mut player = controller(source, vec![None, Some(InputAction::Quit)]);

    player.run().expect("playback");

    assert_eq!(player.state().phase, PlaybackPhase::Stopped);
    assert_eq!(player.screen().videos.len(), 2);
    assert_eq!(player.screen().titles, vec![("clip.mp4".to_owned(), false)]);
}

#[test]
fn end_of_stream_stops_playback() {
    let source = FakeSource::frames(3, Duration::ZERO, Some(secs(60)));
    let mut player = controller(source, Vec::new());

    player.run().expect("playback");

    assert!(player.state().is_stopped());
    assert_eq!(player.screen().videos.len(), 3);
}

#[test]
fn source_reported_pause_shows_the_indicator() {
    let source = FakeSource::new(
        vec![Scripted::Frame(Duration::ZERO), Scripted::Paused],
        Some(secs(60)),
    );
    let mut player = controller(source, vec![None, Some(InputAction::Quit)]);

    player.step().expect("first frame");
    assert_eq!(player.state().phase, PlaybackPhase::Playing);
    player.step().expect("source pause");
    assert_eq!(player.state().phase, PlaybackPhase::Paused);
    assert_eq!(
        player.screen().titles,
        vec![("clip.mp4".to_owned(), true)]
    );
    // The source already knows it is paused.
    assert!(player.source().pauses.is_empty());

    player.step().expect("quit while paused");
    assert!(player.state().is_stopped());
}

#[test]
fn source_pause_before_the_first_frame_shows_the_indicator() {
    let source = FakeSource::new(vec![Scripted::Paused], Some(secs(60)));
    let mut player = controller(source, vec![Some(InputAction::Quit)]);

    player.run().expect("playback");

    assert_eq!(
        player.screen().titles,
        vec![("clip.mp4".to_owned(), false), ("clip.mp4".to_owned(), true)]
    );
    assert!(player.state().is_stopped());
}

#[test]
fn pause_idles_until_quit() {
    let source = FakeSource::frames(10, Duration::ZERO, Some(secs(60)));
    let mut player = controller(
        source,
        vec![Some(InputAction::TogglePause), None, None, Some(InputAction::Quit)],
    );

    player.step().expect("first frame");
    assert_eq!(player.state().phase, PlaybackPhase::Paused);
    assert_eq!(player.source().pauses, vec![true]);
    assert_eq!(
        player.screen().titles.last(),
        Some(&("clip.mp4".to_owned(), true))
    );

    player.run().expect("playback");
    assert!(player.state().is_stopped());
    // Nothing is decoded or drawn while paused.
    assert_eq!(player.screen().videos.len(), 1);
    assert_eq!(player.source().calls, 1);
    let idle = PlaybackSettings::default().idle_interval;
    assert_eq!(&player.clock().sleeps[1..], &[idle, idle]);
}

#[test]
fn pause_toggle_resumes_playback() {
    let source = FakeSource::frames(4, Duration::ZERO, Some(secs(60)));
    let mut player = controller(
        source,
        vec![
            Some(InputAction::TogglePause),
            Some(InputAction::TogglePause),
        ],
    );

    player.run().expect("playback");

    assert_eq!(player.source().pauses, vec![true, false]);
    let flags: Vec<bool> = player.screen().titles.iter().map(|(_, p)| *p).collect();
    assert_eq!(flags, vec![false, true, false]);
    assert_eq!(player.screen().videos.len(), 4);
}

#[test]
fn seeking_is_ignored_while_paused() {
    let source = FakeSource::frames(4, secs(10), Some(secs(60)));
    let mut player = controller(
        source,
        vec![
            Some(InputAction::TogglePause),
            Some(InputAction::SeekForward),
            Some(InputAction::SeekBack),
            Some(InputAction::Quit),
        ],
    );

    player.run().expect("playback");
    assert!(player.source().seeks.is_empty());
}

#[test]
fn forward_seek_near_the_end_is_refused() {
    let source = FakeSource::frames(2, secs(121), Some(secs(125)));
    let mut player = controller(source, vec![Some(InputAction::SeekForward)]);

    player.run().expect("playback");
    assert!(player.source().seeks.is_empty());
}

#[test]
fn forward_seek_with_headroom_is_issued() {
    let source = FakeSource::frames(2, secs(100), Some(secs(125)));
    let mut player = controller(source, vec![Some(InputAction::SeekForward)]);

    player.step().expect("first frame");
    assert_eq!(player.source().seeks, vec![5.0]);
    assert_eq!(player.state().position, secs(105));
}

#[test]
fn forward_seek_without_duration_is_refused() {
    let source = FakeSource::frames(2, secs(1), None);
    let mut player = controller(source, vec![Some(InputAction::SeekForward)]);

    player.run().expect("playback");
    assert!(player.source().seeks.is_empty());
}

#[test]
fn backward_seek_clamps_at_start() {
    let source = FakeSource::frames(2, secs(2), Some(secs(125)));
    let mut player = controller(source, vec![Some(InputAction::SeekBack)]);

    player.step().expect("first frame");
    assert_eq!(player.source().seeks, vec![-5.0]);
    assert_eq!(player.state().position, Duration::ZERO);
}

#[test]
fn progress_bar_tracks_position_and_spans_the_picture() {
    let mut source = FakeSource::frames(1, secs(65), Some(secs(125)));
    source.frame_width = 32;
    let mut player = controller(source, Vec::new());

    player.run().expect("playback");

    let grid_width = player.screen().videos[0].width();
    assert_eq!(grid_width, 32);
    assert!(grid_width < usize::from(VIEWPORT.cols));
    let expected = progress::render(secs(65), secs(125), grid_width);
    assert_eq!(player.screen().progress, vec![expected.clone()]);
    assert_eq!(expected, "01:05 [=========O--------] 02:05");
    assert_eq!(expected.len(), grid_width);
}

#[test]
fn narrow_picture_gets_timestamps_only() {
    let source = FakeSource::frames(1, secs(65), Some(secs(125)));
    let mut player = controller(source, Vec::new());

    player.run().expect("playback");

    assert_eq!(player.screen().videos[0].width(), 4);
    assert_eq!(player.screen().progress, vec!["01:05 02:05".to_owned()]);
}

#[test]
fn progress_bar_is_skipped_without_duration() {
    let source = FakeSource::frames(3, Duration::ZERO, None);
    let mut player = controller(source, Vec::new());

    player.run().expect("playback");

    assert_eq!(player.screen().videos.len(), 3);
    assert!(player.screen().progress.is_empty());
}

#[test]
fn awaiting_metadata_idles_without_reading_input() {
    let mut source = FakeSource::new(
        vec![
            Scripted::NotReady,
            Scripted::NotReady,
            Scripted::Frame(Duration::ZERO),
        ],
        Some(secs(30)),
    );
    source.metadata_after = 2;
    let mut player = controller(source, vec![Some(InputAction::Quit)]);

    player.step().expect("idle");
    player.step().expect("idle");
    assert_eq!(player.state().phase, PlaybackPhase::AwaitingMetadata);
    assert_eq!(player.screen().polls, 0);

    player.step().expect("first frame");
    assert!(player.state().is_stopped(), "quit is read after the first frame");
    assert_eq!(player.state().duration, Some(secs(30)));

    let idle = PlaybackSettings::default().idle_interval;
    // No pacing sleep after a quit.
    assert_eq!(player.clock().sleeps, vec![idle, idle]);
}

#[test]
fn frame_pacing_subtracts_render_time() {
    let source = FakeSource::frames(3, Duration::ZERO, Some(secs(60)));
    let mut player = controller(source, Vec::new());
    player.step().expect("frame");

    let time = VirtualTime::default();
    let mut screen = FakeScreen::new(Vec::new(), time.clone());
    screen.draw_cost = Duration::from_millis(15);
    let mut slow = PlaybackController::with_clock(
        FakeSource::frames(1, Duration::ZERO, Some(secs(60))),
        screen,
        FakeClock::new(time),
        "clip.mp4",
        PlaybackSettings::default(),
    );
    slow.step().expect("frame");

    assert_eq!(player.clock().sleeps, vec![FRAME_DELAY]);
    assert_eq!(slow.clock().sleeps, vec![Duration::from_millis(25)]);
}

#[test]
fn render_slower_than_frame_delay_does_not_sleep() {
    let time = VirtualTime::default();
    let mut screen = FakeScreen::new(Vec::new(), time.clone());
    screen.draw_cost = Duration::from_millis(60);
    let mut player = PlaybackController::with_clock(
        FakeSource::frames(1, Duration::ZERO, Some(secs(60))),
        screen,
        FakeClock::new(time),
        "clip.mp4",
        PlaybackSettings::default(),
    );

    player.step().expect("frame");
    assert_eq!(player.clock().sleeps, vec![Duration::ZERO]);
}

#[test]
fn decode_failure_stops_playback_with_code() {
    let source = FakeSource::new(
        vec![
            Scripted::Frame(Duration::ZERO),
            Scripted::Fail(PlayerError::decode("corrupt packet")),
        ],
        Some(secs(60)),
    );
    let mut player = controller(source, Vec::new());

    let error = player.run().expect_err("decode failure is fatal");
    assert!(player.state().is_stopped());
    assert_eq!(
        find_player_error(&error).map(PlayerError::code),
        Some("DECODE_FAILURE")
    );
    assert!(format!("{error:#}").contains("corrupt packet"));
}

#[test]
fn rendering_the_same_frame_twice_is_identical() {
    let first = render_frame(frame_at(secs(1)), VIEWPORT).expect("render");
    let second = render_frame(frame_at(secs(1)), VIEWPORT).expect("render");
    assert_eq!(first, second);
    assert_eq!(grid_hash(&first), grid_hash(&second));
    assert!(first.width() <= usize::from(VIEWPORT.cols));
    assert!(first.height() <= usize::from(VIEWPORT.rows));
}

#[test]
fn dump_waits_for_first_frame() {
    let mut source = FakeSource::new(
        vec![Scripted::NotReady, Scripted::Frame(secs(3))],
        Some(secs(60)),
    );
    let grid = dump_from_source(
        &mut source,
        VIEWPORT,
        Duration::from_millis(1),
        Duration::from_secs(5),
    )
    .expect("dump");
    assert_eq!(
        grid,
        render_frame(frame_at(secs(3)), VIEWPORT).expect("render")
    );
}

#[test]
fn dump_past_the_end_is_a_decode_failure() {
    let mut source = FakeSource::new(Vec::new(), Some(secs(60)));
    let error = dump_from_source(
        &mut source,
        VIEWPORT,
        Duration::from_millis(1),
        Duration::from_secs(5),
    )
    .expect_err("no frames");
    assert_eq!(
        find_player_error(&error).map(PlayerError::code),
        Some("DECODE_FAILURE")
    );
}
