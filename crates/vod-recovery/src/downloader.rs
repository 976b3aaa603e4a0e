//! Handing a recovered manifest to an external transcoder.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{RecoveryError, Result};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Where the manifest to transcode lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSource {
    Url(String),
    File(PathBuf),
}

impl fmt::Display for DownloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Position in a video as `HH:MM:SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timecode(u64);

impl Timecode {
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || RecoveryError::invalid_input(format!("`{input}` is not HH:MM:SS"));
        let mut parts = input.trim().split(':');
        let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        let h: u64 = h.parse().map_err(|_| invalid())?;
        let m: u64 = m.parse().map_err(|_| invalid())?;
        let s: u64 = s.parse().map_err(|_| invalid())?;
        if m >= 60 || s >= 60 {
            return Err(invalid());
        }
        Ok(Self(h * 3600 + m * 60 + s))
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.0 / 3600, self.0 / 60 % 60, self.0 % 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimRange {
    pub start: Timecode,
    pub end: Timecode,
}

impl TrimRange {
    pub fn new(start: Timecode, end: Timecode) -> Result<Self> {
        if end <= start {
            return Err(RecoveryError::invalid_input(format!(
                "trim end {end} is not after start {start}"
            )));
        }
        Ok(Self { start, end })
    }
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub source: DownloadSource,
    /// File name inside the downloader's output directory; `.mp4` is added when missing.
    pub output_filename: String,
    pub trim: Option<TrimRange>,
}

/// Performs the actual transcode of a manifest into a media file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Returns the path of the written file.
    async fn download(&self, request: &DownloadRequest) -> Result<PathBuf>;
}

/// Stream-copies a manifest with the `ffmpeg` binary, without a shell.
#[derive(Debug, Clone)]
pub struct FfmpegDownloader {
    binary_path: String,
    output_dir: PathBuf,
}

impl FfmpegDownloader {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::with_binary("ffmpeg", output_dir)
    }

    pub fn with_binary(binary_path: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn output_path(&self, output_filename: &str) -> PathBuf {
        let path = self.output_dir.join(output_filename);
        if path.extension().is_some() {
            path
        } else {
            path.with_extension("mp4")
        }
    }

    fn build_args(&self, request: &DownloadRequest, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into()];

        // local manifests reference remote segments
        if matches!(request.source, DownloadSource::File(_)) {
            args.extend(["-protocol_whitelist".into(), "file,http,https,tcp,tls".into()]);
        }

        if let Some(trim) = &request.trim {
            args.extend([
                "-ss".into(),
                trim.start.to_string(),
                "-to".into(),
                trim.end.to_string(),
            ]);
        }

        args.extend(["-i".into(), request.source.to_string()]);
        args.extend(["-c".into(), "copy".into()]);
        args.push(output.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl Downloader for FfmpegDownloader {
    async fn download(&self, request: &DownloadRequest) -> Result<PathBuf> {
        if request.output_filename.trim().is_empty() {
            return Err(RecoveryError::invalid_input("output filename is empty"));
        }
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self.output_path(request.output_filename.trim());
        let args = self.build_args(request, &output);

        info!(source = %request.source, output = %output.display(), "Starting ffmpeg");
        debug!(?args, "ffmpeg arguments");

        let mut command = Command::new(&self.binary_path);
        command
            .args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        let result = command
            .output()
            .await
            .map_err(|e| RecoveryError::download(format!("failed to spawn {}: {e}", self.binary_path)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(RecoveryError::download(format!(
                "ffmpeg exited with {}: {last_line}",
                result.status
            )));
        }

        info!(output = %output.display(), "Download finished");
        Ok(output)
    }
}
