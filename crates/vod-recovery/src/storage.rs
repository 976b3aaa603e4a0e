//! On-disk layout of recovered artifacts.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::{RecoveryError, Result};

const MANIFEST_PREFIX: &str = "VodRecovery_";

/// Resolves where manifests, clip logs and downloads live for a
/// `(streamer, videoId)` pair.
#[derive(Debug, Clone)]
pub struct RecoveryStorage {
    base_dir: PathBuf,
}

impl RecoveryStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn manifest_path(&self, streamer_name: &str, video_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("{MANIFEST_PREFIX}{streamer_name}_{video_id}.m3u8"))
    }

    pub fn clip_log_path(&self, streamer_name: &str, video_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("{streamer_name}_{video_id}_log.txt"))
    }

    pub fn clip_download_dir(&self, streamer_name: &str, video_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}_{video_id}", title_case(streamer_name)))
    }

    pub async fn ensure_base_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        Ok(())
    }

    /// Append one line per URL, creating the log if needed.
    pub async fn append_clip_log(
        &self,
        streamer_name: &str,
        video_id: &str,
        urls: &[String],
    ) -> Result<PathBuf> {
        self.ensure_base_dir().await?;
        let path = self.clip_log_path(streamer_name, video_id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        for url in urls {
            file.write_all(url.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        file.flush().await?;
        Ok(path)
    }

    pub async fn read_clip_log(&self, streamer_name: &str, video_id: &str) -> Result<Vec<String>> {
        let path = self.clip_log_path(streamer_name, video_id);
        let contents = tokio::fs::read_to_string(&path).await?;
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn remove_clip_log(&self, streamer_name: &str, video_id: &str) -> Result<()> {
        remove_if_exists(&self.clip_log_path(streamer_name, video_id)).await
    }
}

pub(crate) async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// `camila` -> `Camila`, `some_streamer` -> `Some_Streamer`.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_word_start = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// `…/VodRecovery_camila_123.m3u8` -> `camila_123`, used to name the transcoded output.
pub fn output_stem_from_manifest(path: &Path) -> Result<String> {
    let invalid = || {
        RecoveryError::invalid_input(format!(
            "`{}` is not a VodRecovery_<streamer>_<videoId>.m3u8 file",
            path.display()
        ))
    };
    let file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(invalid)?;
    let stem = file_name
        .strip_prefix(MANIFEST_PREFIX)
        .and_then(|rest| rest.strip_suffix(".m3u8"))
        .ok_or_else(invalid)?;
    let (streamer, video_id) = stem.rsplit_once('_').ok_or_else(invalid)?;
    if streamer.is_empty() || video_id.is_empty() {
        return Err(invalid());
    }
    Ok(format!("{streamer}_{video_id}"))
}
