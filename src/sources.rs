use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Result};
use url::Url;

use crate::config::ToolPaths;
use crate::error_codes::PlayerError;

/// `yt-dlp` format selector: the smallest stream carrying both audio and
/// video. Terminal-sized output gains nothing from more pixels.
const YT_DLP_FORMAT: &str = "w";
const STREAM_SCHEMES: &[&str] = &["http", "https", "rtsp", "rtmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    LocalFile,
    YouTube,
    RemoteUrl,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalFile => "file",
            Self::YouTube => "youtube",
            Self::RemoteUrl => "url",
        }
    }
}

/// What the player needs before it starts: something to show in the title bar
/// and something ffmpeg can open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub title: String,
    pub location: String,
    pub kind: SourceKind,
}

pub fn classify(input: &str) -> SourceKind {
    let value = input.trim();
    if value.contains("youtu") {
        return SourceKind::YouTube;
    }
    match Url::parse(value) {
        Ok(url) if STREAM_SCHEMES.contains(&url.scheme()) => SourceKind::RemoteUrl,
        _ => SourceKind::LocalFile,
    }
}

pub fn resolve(input: &str, tools: &ToolPaths) -> Result<ResolvedSource> {
    let value = input.trim();
    if value.is_empty() {
        return Err(PlayerError::SourceResolution("no path or URL given".to_owned()).into());
    }

    let kind = classify(value);
    let resolved = match kind {
        SourceKind::LocalFile => resolve_local(value)?,
        SourceKind::RemoteUrl => ResolvedSource {
            title: url_title(value),
            location: value.to_owned(),
            kind,
        },
        SourceKind::YouTube => resolve_youtube(value, &tools.yt_dlp)?,
    };
    log::info!(
        "resolved {} source '{}' -> {}",
        resolved.kind.as_str(),
        resolved.title,
        resolved.location
    );
    Ok(resolved)
}

fn resolve_local(value: &str) -> Result<ResolvedSource> {
    let path = Path::new(value);
    if !path.is_file() {
        return Err(PlayerError::SourceResolution(format!("no such file: {value}")).into());
    }
    let title = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| value.to_owned());
    Ok(ResolvedSource {
        title,
        location: value.to_owned(),
        kind: SourceKind::LocalFile,
    })
}

fn url_title(value: &str) -> String {
    let Ok(url) = Url::parse(value) else {
        return value.to_owned();
    };
    url.path_segments()
        .and_then(|segments| segments.filter(|segment| !segment.is_empty()).last())
        .map(str::to_owned)
        .or_else(|| url.host_str().map(str::to_owned))
        .unwrap_or_else(|| value.to_owned())
}

fn resolve_youtube(value: &str, yt_dlp: &Path) -> Result<ResolvedSource> {
    eprintln!("Fetching YouTube video...");
    let output = Command::new(yt_dlp)
        .arg("--quiet")
        .arg("--no-warnings")
        .arg("--format")
        .arg(YT_DLP_FORMAT)
        .arg("--get-title")
        .arg("--get-url")
        .arg(value)
        .stdin(Stdio::null())
        .output()
        .map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                anyhow!(PlayerError::SourceResolution(format!(
                    "{} was not found on PATH. Install yt-dlp to play YouTube links",
                    yt_dlp.display()
                )))
            } else {
                anyhow!("failed to spawn {}: {error}", yt_dlp.display())
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PlayerError::SourceResolution(format!(
            "yt-dlp failed with status {}: {}",
            output.status,
            stderr.trim()
        ))
        .into());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let (title, location) = parse_yt_dlp_output(&stdout)?;
    Ok(ResolvedSource {
        title,
        location,
        kind: SourceKind::YouTube,
    })
}

/// yt-dlp prints the title first and the stream URL second. Titles can be
/// blank, URLs cannot.
fn parse_yt_dlp_output(stdout: &str) -> Result<(String, String), PlayerError> {
    let mut lines = stdout.lines().map(str::trim);
    let title = lines.next().unwrap_or_default().to_owned();
    let location = lines
        .find(|line| !line.is_empty())
        .ok_or_else(|| PlayerError::SourceResolution("yt-dlp returned no stream URL".to_owned()))?
        .to_owned();
    let title = if title.is_empty() {
        url_title(&location)
    } else {
        title
    };
    Ok((title, location))
}
