use std::collections::VecDeque;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::config::ToolPaths;
use crate::error_codes::{format_seconds, PlayerError};
use crate::frame::{rgb_len, Frame, Viewport};
use crate::probe::{probe, ProbeInfo};
use crate::resize::fit_dimensions;

/// Decoded frames buffered between the reader thread and the playback loop.
const FRAME_QUEUE_DEPTH: usize = 4;

/// ffmpeg stderr lines kept for the failure message.
const STDERR_TAIL_LINES: usize = 20;

/// Outcome of asking the decoder for the next frame. Never blocks.
#[derive(Debug)]
pub enum FrameStatus {
    Frame(Frame),
    Paused,
    EndOfStream,
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Metadata {
    pub duration: Option<Duration>,
}

/// The decode collaborator as seen by the playback loop.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<FrameStatus>;
    fn metadata(&self) -> Metadata;
    fn position(&self) -> Duration;
    fn set_pause(&mut self, paused: bool);
    /// Relative seek in seconds; the source clamps the target into the media.
    fn seek(&mut self, delta_seconds: f64) -> Result<()>;
}

/// Plays anything ffmpeg can open. Probing runs on a background thread so the
/// terminal comes up immediately; once the stream geometry is known an ffmpeg
/// child decodes straight to RGB24 at the size of the video pane.
pub struct FfmpegSource {
    location: String,
    ffmpeg: PathBuf,
    viewport: Viewport,
    start: Duration,
    probe: Option<Receiver<Result<ProbeInfo>>>,
    info: Option<ProbeInfo>,
    decoder: Option<FfmpegInput>,
    position: Duration,
    paused: bool,
}

impl FfmpegSource {
    pub fn open(location: &str, viewport: Viewport, tools: &ToolPaths) -> Result<Self> {
        Self::open_at(location, viewport, tools, Duration::ZERO)
    }

    pub fn open_at(
        location: &str,
        viewport: Viewport,
        tools: &ToolPaths,
        start: Duration,
    ) -> Result<Self> {
        let (sender, receiver) = mpsc::sync_channel(1);
        let ffprobe = tools.ffprobe.clone();
        let probe_location = location.to_owned();
        thread::Builder::new()
            .name("asciivid-probe".to_owned())
            .spawn(move || {
                let _ = sender.send(probe(&ffprobe, &probe_location));
            })
            .context("failed to spawn ffprobe thread")?;

        Ok(Self {
            location: location.to_owned(),
            ffmpeg: tools.ffmpeg.clone(),
            viewport,
            start,
            probe: Some(receiver),
            info: None,
            decoder: None,
            position: start,
            paused: false,
        })
    }

    fn poll_probe(&mut self) -> Result<bool> {
        let Some(receiver) = &self.probe else {
            return Ok(self.info.is_some());
        };
        let result = match receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return Ok(false),
            Err(TryRecvError::Disconnected) => {
                Err(anyhow!(PlayerError::decode("ffprobe thread exited without a result")))
            }
        };
        self.probe = None;
        let info = result.with_context(|| format!("failed to probe {}", self.location))?;
        if info.duration.is_none() {
            log::warn!("{}", PlayerError::MetadataUnavailable);
        }
        self.info = Some(info);
        self.restart_decoder(self.start)?;
        Ok(true)
    }

    fn restart_decoder(&mut self, start: Duration) -> Result<()> {
        let info = self
            .info
            .as_ref()
            .ok_or_else(|| anyhow!("decoder restarted before probe finished"))?;
        let frame_delay = info.frame_delay();
        let (width, height) = fit_dimensions(
            info.width,
            info.height,
            u32::from(self.viewport.cols),
            u32::from(self.viewport.rows),
        )?;

        if let Some(previous) = self.decoder.take() {
            previous.finish().context("failed to stop previous ffmpeg decoder")?;
        }

        let decoder = FfmpegInput::spawn(
            &self.ffmpeg,
            &self.location,
            start,
            width,
            height,
            frame_delay,
        )?;
        self.decoder = Some(decoder);
        self.position = start;
        Ok(())
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> Result<FrameStatus> {
        if !self.poll_probe()? {
            return Ok(FrameStatus::NotReady);
        }
        if self.paused {
            return Ok(FrameStatus::Paused);
        }
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(FrameStatus::NotReady);
        };

        match decoder.try_read_frame()? {
            DecoderPoll::Frame(frame) => {
                self.position = frame.pts;
                Ok(FrameStatus::Frame(frame))
            }
            DecoderPoll::Pending => Ok(FrameStatus::NotReady),
            DecoderPoll::Finished => {
                log::info!("end of stream at {}", format_seconds(self.position));
                Ok(FrameStatus::EndOfStream)
            }
        }
    }

    fn metadata(&self) -> Metadata {
        Metadata {
            duration: self.info.as_ref().and_then(|info| info.duration),
        }
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn set_pause(&mut self, paused: bool) {
        // The reader thread stalls on the full queue while paused, which in
        // turn stalls ffmpeg on its stdout pipe.
        self.paused = paused;
    }

    fn seek(&mut self, delta_seconds: f64) -> Result<()> {
        if self.info.is_none() {
            return Ok(());
        }
        let duration = self.metadata().duration;
        let target = seek_target(self.position, delta_seconds, duration);
        log::debug!(
            "seek {:+.1}s: {} -> {}",
            delta_seconds,
            format_seconds(self.position),
            format_seconds(target)
        );
        self.restart_decoder(target)
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            if let Err(error) = decoder.finish() {
                log::warn!("ffmpeg decoder did not shut down cleanly: {error:#}");
            }
        }
    }
}

/// `position + delta`, clamped to `[0, duration]` (or just `>= 0` when the
/// duration is unknown).
pub fn seek_target(position: Duration, delta_seconds: f64, duration: Option<Duration>) -> Duration {
    let mut target = position.as_secs_f64() + delta_seconds;
    if let Some(duration) = duration {
        target = target.min(duration.as_secs_f64());
    }
    if !target.is_finite() || target <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(target)
}

enum DecoderPoll {
    Frame(Frame),
    Pending,
    Finished,
}

/// One ffmpeg child decoding from `start` onwards. Frames are read on one
/// worker thread; stderr is drained on another so a chatty ffmpeg can never
/// block on a full pipe.
struct FfmpegInput {
    receiver: Option<Receiver<Vec<u8>>>,
    worker: Option<JoinHandle<Result<()>>>,
    stderr: Option<JoinHandle<String>>,
    child: Child,
    width: u32,
    height: u32,
    start: Duration,
    frame_delay: Duration,
    frames_read: u32,
}

impl FfmpegInput {
    fn spawn(
        ffmpeg: &Path,
        location: &str,
        start: Duration,
        width: u32,
        height: u32,
        frame_delay: Duration,
    ) -> Result<Self> {
        let size = format!("{}x{}", width, height);
        let (sender, receiver) = mpsc::sync_channel::<Vec<u8>>(FRAME_QUEUE_DEPTH);

        let mut command = Command::new(ffmpeg);
        command
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-nostdin");
        if !start.is_zero() {
            command.arg("-ss").arg(format!("{:.3}", start.as_secs_f64()));
        }
        command
            .arg("-i")
            .arg(location)
            .arg("-an")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s")
            .arg(&size)
            .arg("-sws_flags")
            .arg("area")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                anyhow!(PlayerError::decode(format!(
                    "{} was not found on PATH. Install ffmpeg and verify `ffmpeg -version` works",
                    ffmpeg.display()
                )))
            } else {
                anyhow!("failed to spawn ffmpeg decoder: {error}")
            }
        })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("failed to capture ffmpeg stderr"))?;
        let frame_size = rgb_len(width, height);

        let stderr = thread::Builder::new()
            .name("asciivid-ffmpeg-stderr".to_owned())
            .spawn(move || drain_stderr(stderr))
            .context("failed to spawn ffmpeg stderr thread")?;

        let worker = thread::Builder::new()
            .name("asciivid-ffmpeg-decoder".to_owned())
            .spawn(move || {
                loop {
                    let mut buffer = vec![0u8; frame_size];
                    match stdout.read_exact(&mut buffer) {
                        Ok(()) => {
                            if sender.send(buffer).is_err() {
                                return Ok(());
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
                        Err(e) => return Err(anyhow!("failed to read from ffmpeg: {e}")),
                    }
                }
            })
            .context("failed to spawn ffmpeg reader thread")?;

        log::info!(
            "spawned ffmpeg decoder {} at {} for {}",
            size,
            format_seconds(start),
            location
        );

        Ok(Self {
            receiver: Some(receiver),
            worker: Some(worker),
            stderr: Some(stderr),
            child,
            width,
            height,
            start,
            frame_delay,
            frames_read: 0,
        })
    }

    fn try_read_frame(&mut self) -> Result<DecoderPoll> {
        let Some(receiver) = &self.receiver else {
            return Ok(DecoderPoll::Finished);
        };
        match receiver.try_recv() {
            Ok(pixels) => {
                let pts = self.start + self.frame_delay * self.frames_read;
                self.frames_read = self.frames_read.saturating_add(1);
                let frame = Frame::from_rgb(self.width, self.height, pixels, self.frame_delay, pts)?;
                Ok(DecoderPoll::Frame(frame))
            }
            Err(TryRecvError::Empty) => Ok(DecoderPoll::Pending),
            Err(TryRecvError::Disconnected) => {
                self.receiver = None;
                self.reap()?;
                Ok(DecoderPoll::Finished)
            }
        }
    }

    /// Collects the threads and the child after the stream ran dry, turning a
    /// failed ffmpeg run into a decode failure.
    fn reap(&mut self) -> Result<()> {
        let worker_result = match self.worker.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(anyhow!("ffmpeg reader thread panicked"))),
            None => Ok(()),
        };
        let status = self
            .child
            .wait()
            .context("failed waiting for ffmpeg decoder")?;
        let stderr_tail = match self.stderr.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => String::new(),
        };

        let mut problems = Vec::new();
        if let Err(error) = worker_result {
            problems.push(format!("{error:#}"));
        }
        if !stderr_tail.is_empty() {
            problems.push(stderr_tail);
        }
        let detail = problems.join("\n");

        if !status.success() {
            let message = if detail.is_empty() {
                format!("ffmpeg exited with {status}")
            } else {
                format!("ffmpeg exited with {status}: {detail}")
            };
            return Err(PlayerError::decode(message).into());
        }
        if detail.is_empty() {
            return Ok(());
        }
        if self.frames_read == 0 {
            return Err(PlayerError::decode(format!("ffmpeg produced no frames: {detail}")).into());
        }
        log::warn!("ffmpeg reported problems near end of stream: {detail}");
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        // Dropping the receiver unblocks a worker waiting on a full queue;
        // killing the child unblocks one waiting on ffmpeg.
        self.receiver = None;
        let _ = self.child.kill();
        let _ = self.child.wait();

        if let Some(handle) = self.stderr.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok(_) => Ok(()),
                Err(_) => Err(anyhow!("ffmpeg reader thread panicked")),
            }
        } else {
            Ok(())
        }
    }
}

/// Reads ffmpeg's stderr to the end, logging each line and keeping only the
/// last few for error reports.
fn drain_stderr(stderr: impl Read) -> String {
    let mut reader = BufReader::new(stderr);
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let text = String::from_utf8_lossy(&line).trim().to_owned();
        if text.is_empty() {
            continue;
        }
        log::debug!("ffmpeg: {text}");
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(text);
    }
    Vec::from(tail).join("\n")
}
