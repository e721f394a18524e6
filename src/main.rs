use std::fs::File;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, FromArgMatches, Parser};

use asciivid::config::{load_config, PlayerConfig};
use asciivid::decoding::FfmpegSource;
use asciivid::dump::{dump_frame, FALLBACK_TERMINAL};
use asciivid::error_codes::describe;
use asciivid::frame::Viewport;
use asciivid::playback::{PlaybackController, PlaybackSettings};
use asciivid::screen::{Screen, TerminalScreen};
use asciivid::sources::{resolve, ResolvedSource};

const CONTROLS_HELP: &str = "Controls:\n- Q: Quit\n- Space: Pause\n- Left & right arrows: Seek\n";

#[derive(Debug, Parser)]
#[command(name = "asciivid")]
#[command(about = "Play videos in the terminal as colored ASCII art")]
#[command(after_help = CONTROLS_HELP)]
struct Cli {
    /// Video file, stream URL or YouTube link. Prompted for when omitted.
    input: Option<String>,

    /// YAML file with tool paths and playback tuning.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs here; the terminal is taken over while playing.
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    #[arg(long)]
    ffprobe: Option<PathBuf>,

    #[arg(long = "yt-dlp")]
    yt_dlp: Option<PathBuf>,

    /// Seconds skipped by the left and right arrow keys.
    #[arg(long)]
    seek_step: Option<f64>,

    /// Print the frame at this many seconds as plain text and exit.
    #[arg(long, value_name = "SECS")]
    dump_frame: Option<f64>,
}

fn version() -> &'static str {
    match option_env!("ASCIIVID_GIT_HASH") {
        Some(hash) => Box::leak(format!("{} ({hash})", env!("CARGO_PKG_VERSION")).into_boxed_str()),
        None => env!("CARGO_PKG_VERSION"),
    }
}

fn main() -> ExitCode {
    let matches = Cli::command().version(version()).get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(error) => error.exit(),
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error:#}");
            eprintln!("{}", describe(&error));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.log_file.as_ref())?;
    let config = build_config(&cli)?;

    let input = match cli.input.clone() {
        Some(input) => input,
        None => prompt_for_input()?,
    };
    let source = resolve(&input, &config.tools)?;

    if let Some(seconds) = cli.dump_frame {
        return run_dump(&source, seconds, &config);
    }
    play(&source, &config)
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let mut builder = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            let mut builder =
                env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
            builder.target(env_logger::Target::Pipe(Box::new(file)));
            builder
        }
        // Stderr shares the terminal with the player, so stay quiet unless asked.
        None => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")),
    };
    builder.format_timestamp_millis().init();
    log::debug!("asciivid {}", version());
    Ok(())
}

fn build_config(cli: &Cli) -> Result<PlayerConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PlayerConfig::default(),
    };
    if let Some(ffmpeg) = &cli.ffmpeg {
        config.tools.ffmpeg = ffmpeg.clone();
    }
    if let Some(ffprobe) = &cli.ffprobe {
        config.tools.ffprobe = ffprobe.clone();
    }
    if let Some(yt_dlp) = &cli.yt_dlp {
        config.tools.yt_dlp = yt_dlp.clone();
    }
    if let Some(step) = cli.seek_step {
        config.seek_step_seconds = step;
    }
    config.validate().context("invalid command line options")?;
    Ok(config)
}

fn prompt_for_input() -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{CONTROLS_HELP}\nPath or URL: ")?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read path from stdin")?;
    Ok(line.trim().to_owned())
}

fn run_dump(source: &ResolvedSource, seconds: f64, config: &PlayerConfig) -> Result<()> {
    if !seconds.is_finite() || seconds < 0.0 {
        bail!("--dump-frame must be a non-negative number of seconds, got {seconds}");
    }
    let (cols, rows) = if io::stdout().is_terminal() {
        crossterm::terminal::size().unwrap_or(FALLBACK_TERMINAL)
    } else {
        FALLBACK_TERMINAL
    };
    let grid = dump_frame(
        &source.location,
        Duration::from_secs_f64(seconds),
        Viewport::from_terminal(cols, rows),
        config,
    )?;
    print!("{}", grid.to_text());
    Ok(())
}

fn play(source: &ResolvedSource, config: &PlayerConfig) -> Result<()> {
    let screen = TerminalScreen::enter()?;
    let frames = FfmpegSource::open(&source.location, screen.viewport(), &config.tools)?;
    let mut controller = PlaybackController::new(
        frames,
        screen,
        source.title.clone(),
        PlaybackSettings::from(config),
    );
    let result = controller.run();
    // Dropping the controller kills ffmpeg and restores the terminal before
    // any error reaches stderr.
    drop(controller);
    result
}
