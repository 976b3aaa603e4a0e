//! Clip address search and download.
//!
//! Clips live on their own origin under names derived from the video id and
//! an offset into the broadcast. Unlike VOD recovery, every confirmed clip is
//! kept: a broadcast may legitimately have many.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::client::build_client;
use crate::config::RecoveryConfig;
use crate::error::{RecoveryError, Result};
use crate::identity::validate_video_id;
use crate::prober::{AvailabilityProber, ProbeProgress};
use crate::storage::{RecoveryStorage, title_case};

/// Seconds searched past the reported end of a broadcast.
pub const OFFSET_SAFETY_MARGIN_SECS: u64 = 2000;

/// Upper bound (exclusive) of the offsets searched for a broadcast.
pub fn max_offset(duration_minutes: u64) -> u64 {
    duration_minutes * 60 + OFFSET_SAFETY_MARGIN_SECS
}

/// Naming families clips have been published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipFormat {
    /// `{id}-offset-{n}.mp4`, even offsets
    Default,
    /// `vod-{id}-offset-{n}.mp4`, even offsets
    Alternate,
    /// `{id}-index-{n:010}.mp4`, every offset
    Legacy,
}

impl ClipFormat {
    pub const ALL: [ClipFormat; 3] = [ClipFormat::Default, ClipFormat::Alternate, ClipFormat::Legacy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Alternate => "alternate",
            Self::Legacy => "legacy",
        }
    }

    pub fn stride(&self) -> usize {
        match self {
            Self::Default | Self::Alternate => 2,
            Self::Legacy => 1,
        }
    }

    fn file_name(&self, video_id: &str, offset: u64) -> String {
        match self {
            Self::Default => format!("{video_id}-offset-{offset}.mp4"),
            Self::Alternate => format!("vod-{video_id}-offset-{offset}.mp4"),
            Self::Legacy => format!("{video_id}-index-{offset:010}.mp4"),
        }
    }
}

impl fmt::Display for ClipFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClipFormat {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "1" => Ok(Self::Default),
            "alternate" | "2" => Ok(Self::Alternate),
            "legacy" | "3" => Ok(Self::Legacy),
            other => Err(RecoveryError::invalid_input(format!(
                "unknown clip format `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClipCandidate {
    pub video_id: String,
    pub offset_seconds: u64,
    pub format: ClipFormat,
    pub url: String,
}

/// Deterministic clip address space for one video.
#[derive(Debug, Clone)]
pub struct ClipAddressGenerator {
    clip_domain: String,
    video_id: String,
    max_offset: u64,
}

impl ClipAddressGenerator {
    pub fn new(clip_domain: &str, video_id: &str, duration_minutes: u64) -> Result<Self> {
        let video_id = validate_video_id(video_id)?;
        if clip_domain.trim().is_empty() {
            return Err(RecoveryError::invalid_input("clip domain is empty"));
        }
        let mut clip_domain = clip_domain.trim().to_string();
        if !clip_domain.ends_with('/') {
            clip_domain.push('/');
        }
        Ok(Self {
            clip_domain,
            video_id,
            max_offset: max_offset(duration_minutes),
        })
    }

    pub fn max_offset(&self) -> u64 {
        self.max_offset
    }

    pub fn family(&self, format: ClipFormat) -> Vec<ClipCandidate> {
        (0..self.max_offset)
            .step_by(format.stride())
            .map(|offset| ClipCandidate {
                video_id: self.video_id.clone(),
                offset_seconds: offset,
                format,
                url: format!("{}{}", self.clip_domain, format.file_name(&self.video_id, offset)),
            })
            .collect()
    }

    /// Union of the selected families, in selection order, each family once.
    pub fn union(&self, formats: &[ClipFormat]) -> Vec<ClipCandidate> {
        let mut seen = Vec::with_capacity(formats.len());
        let mut out = Vec::new();
        for &format in formats {
            if !seen.contains(&format) {
                seen.push(format);
                out.extend(self.family(format));
            }
        }
        out
    }
}

/// Offset encoded in a clip file name (`-offset-N` or `-index-N`).
pub fn extract_offset(clip_url: &str) -> Option<u64> {
    let file_name = clip_url.rsplit('/').next()?;
    let stem = file_name.strip_suffix(".mp4").unwrap_or(file_name);
    let (_, digits) = stem
        .rsplit_once("-offset-")
        .or_else(|| stem.rsplit_once("-index-"))?;
    digits.parse().ok()
}

#[derive(Debug, Clone, Serialize)]
pub struct ClipRecoveryReport {
    pub streamer_name: String,
    pub video_id: String,
    pub probed: usize,
    pub found: Vec<String>,
    /// Log the confirmed URLs were appended to, when there were any.
    pub log_path: Option<PathBuf>,
}

impl ClipRecoveryReport {
    pub fn found_count(&self) -> usize {
        self.found.len()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClipDownloadReport {
    pub directory: PathBuf,
    pub downloaded: Vec<PathBuf>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ClipRecoveryEngine {
    config: Arc<RecoveryConfig>,
    client: Client,
    prober: AvailabilityProber,
    storage: RecoveryStorage,
}

impl ClipRecoveryEngine {
    pub fn new(config: RecoveryConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Self::with_client(config, client)
    }

    pub fn with_client(config: RecoveryConfig, client: Client) -> Result<Self> {
        config.validate()?;
        let prober = AvailabilityProber::new(
            client.clone(),
            config.probe_concurrency,
            config.probe_timeout(),
        );
        let storage = RecoveryStorage::new(config.output_dir.clone());
        Ok(Self {
            config: Arc::new(config),
            client,
            prober,
            storage,
        })
    }

    pub fn storage(&self) -> &RecoveryStorage {
        &self.storage
    }

    pub fn generator(&self, video_id: &str, duration_minutes: u64) -> Result<ClipAddressGenerator> {
        ClipAddressGenerator::new(&self.config.clip_domain, video_id, duration_minutes)
    }

    /// Probe the union of `formats` and log every confirmed clip.
    #[instrument(skip(self, formats, progress))]
    pub async fn recover(
        &self,
        streamer_name: &str,
        video_id: &str,
        duration_minutes: u64,
        formats: &[ClipFormat],
        progress: &dyn ProbeProgress,
    ) -> Result<ClipRecoveryReport> {
        let streamer_name = streamer_name.trim().to_lowercase();
        if streamer_name.is_empty() {
            return Err(RecoveryError::invalid_input("streamer name is empty"));
        }
        if formats.is_empty() {
            return Err(RecoveryError::invalid_input("no clip format selected"));
        }

        let generator = self.generator(video_id, duration_minutes)?;
        let urls: Vec<String> = generator
            .union(formats)
            .into_iter()
            .map(|c| c.url)
            .collect();
        let probed = urls.len();
        info!(candidates = probed, max_offset = generator.max_offset(), "Searching for clips");

        let report = self
            .prober
            .probe_all("Searching for clips", urls, progress)
            .await;
        let found = report.resolved_urls();

        let log_path = if found.is_empty() {
            None
        } else {
            Some(
                self.storage
                    .append_clip_log(&streamer_name, &generator.video_id, &found)
                    .await?,
            )
        };
        info!(found = found.len(), "Clip search finished");

        Ok(ClipRecoveryReport {
            streamer_name,
            video_id: generator.video_id,
            probed,
            found,
            log_path,
        })
    }

    /// Probe a shuffled address space and stop once `limit` clips answered.
    pub async fn sample_random(
        &self,
        video_id: &str,
        duration_minutes: u64,
        formats: &[ClipFormat],
        limit: usize,
    ) -> Result<Vec<String>> {
        if formats.is_empty() {
            return Err(RecoveryError::invalid_input("no clip format selected"));
        }
        let generator = self.generator(video_id, duration_minutes)?;
        let mut urls: Vec<String> = generator
            .union(formats)
            .into_iter()
            .map(|c| c.url)
            .collect();
        urls.shuffle(&mut rand::rng());
        debug!(candidates = urls.len(), limit, "Sampling random clips");

        let found: Vec<String> = self
            .prober
            .probe_stream(urls)
            .filter(|r| std::future::ready(r.success))
            .map(|r| r.resolved_url)
            .take(limit)
            .collect()
            .await;
        Ok(found)
    }

    /// Download every `.mp4` listed in the clip log of `(streamer, video_id)`.
    pub async fn download_clips(
        &self,
        streamer_name: &str,
        video_id: &str,
    ) -> Result<ClipDownloadReport> {
        let urls: Vec<String> = self
            .storage
            .read_clip_log(streamer_name, video_id)
            .await?
            .into_iter()
            .filter(|u| u.ends_with(".mp4"))
            .collect();

        let directory = self.storage.clip_download_dir(streamer_name, video_id);
        let mut report = ClipDownloadReport {
            directory: directory.clone(),
            ..Default::default()
        };
        if urls.is_empty() {
            warn!(streamer_name, video_id, "Clip log is empty");
            return Ok(report);
        }
        tokio::fs::create_dir_all(&directory).await?;

        let prefix = format!("{}_{video_id}", title_case(streamer_name));
        let mut downloads = stream::iter(urls)
            .map(|url| {
                let directory = directory.clone();
                let prefix = prefix.clone();
                async move {
                    let result = self.download_one(&url, &directory, &prefix).await;
                    (url, result)
                }
            })
            .buffer_unordered(self.config.fetch_concurrency.max(1));

        while let Some((url, result)) = downloads.next().await {
            match result {
                Ok(path) => {
                    debug!(url = %url, path = %path.display(), "Clip downloaded");
                    report.downloaded.push(path);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Clip download failed");
                    report.failed.push(url);
                }
            }
        }

        info!(
            downloaded = report.downloaded.len(),
            failed = report.failed.len(),
            directory = %directory.display(),
            "Clip download finished"
        );
        Ok(report)
    }

    async fn download_one(&self, url: &str, directory: &std::path::Path, prefix: &str) -> Result<PathBuf> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RecoveryError::http_status(status, url));
        }
        let offset = extract_offset(response.url().as_str())
            .or_else(|| extract_offset(url))
            .ok_or_else(|| RecoveryError::download(format!("no offset in `{url}`")))?;
        let bytes = response.bytes().await?;
        let path = directory.join(format!("{prefix}_{offset}.mp4"));
        tokio::fs::write(&path, &bytes).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "https://clips-media-assets2.twitch.tv/";

    #[test]
    fn two_hour_broadcast_address_space() {
        assert_eq!(max_offset(120), 9200);
        let generator = ClipAddressGenerator::new(DOMAIN, "123", 120).unwrap();

        let default = generator.family(ClipFormat::Default);
        assert_eq!(default.len(), 4600);
        assert_eq!(default[0].url, format!("{DOMAIN}123-offset-0.mp4"));
        assert_eq!(default.last().unwrap().offset_seconds, 9198);

        let legacy = generator.family(ClipFormat::Legacy);
        assert_eq!(legacy.len(), 9200);
        assert_eq!(legacy[7].url, format!("{DOMAIN}123-index-0000000007.mp4"));

        let alternate = generator.family(ClipFormat::Alternate);
        assert_eq!(alternate[1].url, format!("{DOMAIN}vod-123-offset-2.mp4"));
    }

    #[test]
    fn union_skips_repeated_families() {
        let generator = ClipAddressGenerator::new("https://clips.example", "9", 0).unwrap();
        let all = generator.union(&[ClipFormat::Default, ClipFormat::Legacy, ClipFormat::Default]);
        assert_eq!(all.len(), 1000 + 2000);
        assert!(all[0].url.starts_with("https://clips.example/9-offset-0"));
    }

    #[test]
    fn offsets_from_file_names() {
        assert_eq!(extract_offset("https://c/123-offset-42.mp4"), Some(42));
        assert_eq!(extract_offset("https://c/vod-123-offset-8.mp4"), Some(8));
        assert_eq!(extract_offset("https://c/123-index-0000000017.mp4"), Some(17));
        assert_eq!(extract_offset("https://c/123.mp4"), None);
    }

    #[test]
    fn format_parsing() {
        assert_eq!("Legacy".parse::<ClipFormat>().unwrap(), ClipFormat::Legacy);
        assert_eq!("2".parse::<ClipFormat>().unwrap(), ClipFormat::Alternate);
        assert!("other".parse::<ClipFormat>().is_err());
    }

    #[test]
    fn rejects_non_numeric_video_id() {
        assert!(ClipAddressGenerator::new(DOMAIN, "abc", 10).is_err());
    }
}
