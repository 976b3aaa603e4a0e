//! Manifest reconstruction for recovered VODs.
//!
//! A recovered manifest references its segments relative to the source URL,
//! and muted segments under an `-unmuted` name the CDN no longer serves.
//! Reconstruction rewrites every segment line to an absolute URL numbered by
//! its position, validation probes those URLs, and marking comments out the
//! ones that are gone. No pass ever adds or removes a line.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::build_client;
use crate::config::RecoveryConfig;
use crate::error::{RecoveryError, Result};
use crate::identity::VodPath;
use crate::policy::RecoveryPolicy;
use crate::prober::{AvailabilityProber, ProbeProgress};
use crate::storage::{RecoveryStorage, remove_if_exists};

/// Lines starting with this are tags or comments.
pub const TAG_PREFIX: char = '#';

/// Marker the platform puts in the name of segments whose audio was suppressed.
pub const UNMUTED_MARKER: &str = "unmuted";

const EXTINF: &str = "#EXTINF:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEntry {
    pub raw_line: String,
    pub is_tag: bool,
    pub derived_url: Option<String>,
    pub valid: Option<bool>,
}

impl SegmentEntry {
    fn from_line(line: &str) -> Self {
        Self {
            raw_line: line.to_string(),
            is_tag: line.starts_with(TAG_PREFIX),
            derived_url: None,
            valid: None,
        }
    }

    /// A segment reference, as opposed to a tag or a blank line.
    pub fn is_segment(&self) -> bool {
        !self.is_tag && !self.raw_line.trim().is_empty()
    }

    /// URL this line points at once reconstructed.
    pub fn url(&self) -> &str {
        self.derived_url.as_deref().unwrap_or(self.raw_line.trim())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    entries: Vec<SegmentEntry>,
}

impl Playlist {
    pub fn parse(text: &str) -> Self {
        Self {
            entries: text.lines().map(SegmentEntry::from_line).collect(),
        }
    }

    pub fn entries(&self) -> &[SegmentEntry] {
        &self.entries
    }

    pub fn line_count(&self) -> usize {
        self.entries.len()
    }

    pub fn segments(&self) -> impl Iterator<Item = &SegmentEntry> {
        self.entries.iter().filter(|e| e.is_segment())
    }

    pub fn segment_count(&self) -> usize {
        self.segments().count()
    }

    /// Muted when any segment line carries the unmuted marker.
    pub fn is_muted(&self) -> bool {
        self.segments().any(|e| e.raw_line.contains(UNMUTED_MARKER))
    }

    /// Absolute segment URLs rebuilt from `source_url`.
    ///
    /// The n-th segment line (zero-based, tags skipped) becomes
    /// `{base}{n}-muted.ts` if the manifest is muted and the line carries the
    /// marker, and `{base}{n}.ts` otherwise. Pure: the same input always
    /// yields the same output.
    pub fn rewrite(&self, source_url: &str) -> Result<Self> {
        let base = segment_base(source_url)?;
        let muted = self.is_muted();
        let mut counter = 0usize;

        let entries = self
            .entries
            .iter()
            .map(|entry| {
                if !entry.is_segment() {
                    return entry.clone();
                }
                let url = if muted && entry.raw_line.contains(UNMUTED_MARKER) {
                    format!("{base}{counter}-muted.ts")
                } else {
                    format!("{base}{counter}.ts")
                };
                counter += 1;
                SegmentEntry {
                    raw_line: url.clone(),
                    is_tag: false,
                    derived_url: Some(url),
                    valid: None,
                }
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn segment_urls(&self) -> Vec<String> {
        self.segments().map(|e| e.url().to_string()).collect()
    }

    /// Comment out every segment not in `valid`. Returns how many were marked.
    ///
    /// Already commented segments are tag lines and stay untouched, so a
    /// segment is never un-marked.
    pub fn mark_invalid(&mut self, valid: &HashSet<String>) -> usize {
        let mut marked = 0;
        for entry in self.entries.iter_mut().filter(|e| e.is_segment()) {
            if valid.contains(entry.url()) {
                entry.valid = Some(true);
            } else {
                entry.raw_line = format!("{TAG_PREFIX}{}", entry.raw_line);
                entry.valid = Some(false);
                entry.is_tag = true;
                marked += 1;
            }
        }
        marked
    }

    /// Sum of `#EXTINF` durations in seconds.
    pub fn total_duration_secs(&self) -> f64 {
        self.entries
            .iter()
            .filter_map(|e| e.raw_line.strip_prefix(EXTINF))
            .filter_map(|rest| rest.split(',').next())
            .filter_map(|d| d.trim().parse::<f64>().ok())
            .sum()
    }

    pub fn duration_minutes(&self) -> u64 {
        (self.total_duration_secs() / 60.0).floor() as u64
    }
}

impl fmt::Display for Playlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry.raw_line)?;
        }
        Ok(())
    }
}

/// Source URL with its file name stripped, keeping the trailing slash.
pub fn segment_base(source_url: &str) -> Result<&str> {
    let path_end = source_url.find(['?', '#']).unwrap_or(source_url.len());
    source_url[..path_end]
        .rfind('/')
        .map(|idx| &source_url[..=idx])
        .ok_or_else(|| RecoveryError::invalid_input(format!("`{source_url}` has no path")))
}

#[derive(Debug, Clone)]
pub struct ReconstructedPlaylist {
    pub path: PathBuf,
    pub muted: bool,
    pub playlist: Playlist,
}

impl ReconstructedPlaylist {
    pub fn segment_urls(&self) -> Vec<String> {
        self.playlist.segment_urls()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SegmentValidation {
    pub total: usize,
    pub available: HashSet<String>,
}

impl SegmentValidation {
    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn is_complete(&self) -> bool {
        self.available.len() == self.total
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkReport {
    pub path: PathBuf,
    pub valid: usize,
    pub invalidated: usize,
    pub line_count: usize,
}

/// Outcome of post-processing a freshly recovered manifest.
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistReport {
    pub source_url: String,
    pub muted: bool,
    /// Where the rewritten manifest was kept, if it was.
    pub kept_at: Option<PathBuf>,
    pub duration_minutes: u64,
    pub validation: Option<(usize, usize)>,
}

#[derive(Debug, Clone)]
pub struct PlaylistReconstructor {
    client: Client,
    prober: AvailabilityProber,
    storage: RecoveryStorage,
}

impl PlaylistReconstructor {
    pub fn new(client: Client, prober: AvailabilityProber, storage: RecoveryStorage) -> Self {
        Self {
            client,
            prober,
            storage,
        }
    }

    /// Reconstructor with its own client, writing under `config.output_dir`.
    pub fn from_config(config: &RecoveryConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(config)?;
        let prober = AvailabilityProber::new(
            client.clone(),
            config.probe_concurrency,
            config.probe_timeout(),
        );
        Ok(Self::new(
            client,
            prober,
            RecoveryStorage::new(config.output_dir.clone()),
        ))
    }

    pub fn storage(&self) -> &RecoveryStorage {
        &self.storage
    }

    /// Where the manifest recovered from `source_url` is persisted.
    pub fn manifest_path_for(&self, source_url: &str) -> Result<PathBuf> {
        let vod = VodPath::parse(source_url)?;
        Ok(self.storage.manifest_path(&vod.streamer_name, &vod.video_id))
    }

    pub async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RecoveryError::http_status(status, url));
        }
        Ok(response.text().await?)
    }

    /// Fetch once, rewrite, and persist next to the other manifests.
    pub async fn reconstruct(&self, source_url: &str) -> Result<ReconstructedPlaylist> {
        let path = self.manifest_path_for(source_url)?;
        self.reconstruct_into(source_url, &path).await
    }

    /// Fetch once, rewrite, and persist at `path`, replacing any prior copy.
    pub async fn reconstruct_into(
        &self,
        source_url: &str,
        path: &Path,
    ) -> Result<ReconstructedPlaylist> {
        let body = self.fetch(source_url).await?;
        let original = Playlist::parse(&body);
        let muted = original.is_muted();
        let playlist = original.rewrite(source_url)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, playlist.to_string()).await?;

        info!(
            path = %path.display(),
            muted,
            segments = playlist.segment_count(),
            "Manifest reconstructed"
        );

        Ok(ReconstructedPlaylist {
            path: path.to_path_buf(),
            muted,
            playlist,
        })
    }

    /// Probe every segment URL. Does not touch the manifest.
    pub async fn validate(
        &self,
        segment_urls: Vec<String>,
        progress: &dyn ProbeProgress,
    ) -> SegmentValidation {
        let report = self
            .prober
            .probe_all("Checking segments", segment_urls, progress)
            .await;
        let validation = SegmentValidation {
            total: report.total,
            available: report.requested_urls().into_iter().collect(),
        };
        if !validation.is_complete() {
            warn!(
                available = validation.available_count(),
                total = validation.total,
                "Some segments are unavailable"
            );
        }
        validation
    }

    /// Comment out unavailable segments of the manifest at `path`.
    ///
    /// When no segment of the manifest survives the manifest is deleted and
    /// [`RecoveryError::EmptyPlaylist`] is returned.
    pub async fn mark_invalid_segments(
        &self,
        path: &Path,
        validation: &SegmentValidation,
    ) -> Result<MarkReport> {
        if validation.available.is_empty() {
            remove_if_exists(path).await?;
            return Err(RecoveryError::EmptyPlaylist {
                path: path.to_path_buf(),
            });
        }

        let text = tokio::fs::read_to_string(path).await?;
        let mut playlist = Playlist::parse(&text);
        let line_count = playlist.line_count();
        let invalidated = playlist.mark_invalid(&validation.available);
        debug_assert_eq!(line_count, playlist.line_count());

        let valid = playlist.segment_count();
        if valid == 0 {
            remove_if_exists(path).await?;
            return Err(RecoveryError::EmptyPlaylist {
                path: path.to_path_buf(),
            });
        }

        tokio::fs::write(path, playlist.to_string()).await?;
        info!(path = %path.display(), valid, invalidated, "Invalid segments marked");

        Ok(MarkReport {
            path: path.to_path_buf(),
            valid,
            invalidated,
            line_count,
        })
    }

    /// Reconstruct, validate, and mark in one go.
    pub async fn rebuild_validated(
        &self,
        source_url: &str,
        progress: &dyn ProbeProgress,
    ) -> Result<MarkReport> {
        let reconstructed = self.reconstruct(source_url).await?;
        let validation = self
            .validate(reconstructed.segment_urls(), progress)
            .await;
        self.mark_invalid_segments(&reconstructed.path, &validation)
            .await
    }

    /// Reconstruct and validate without keeping the manifest.
    pub async fn verify(
        &self,
        source_url: &str,
        progress: &dyn ProbeProgress,
    ) -> Result<SegmentValidation> {
        let reconstructed = self.reconstruct(source_url).await?;
        let validation = self
            .validate(reconstructed.segment_urls(), progress)
            .await;
        remove_if_exists(&reconstructed.path).await?;
        Ok(validation)
    }

    /// Post-process a freshly recovered VOD.
    ///
    /// Unmuted VODs need no reconstruction, so their manifest is discarded;
    /// muted ones keep it when the policy asks for unmuting.
    pub async fn process(
        &self,
        source_url: &str,
        policy: &dyn RecoveryPolicy,
        progress: &dyn ProbeProgress,
    ) -> Result<PlaylistReport> {
        let reconstructed = self.reconstruct(source_url).await?;
        let keep = reconstructed.muted && policy.unmute_video();
        if !keep {
            remove_if_exists(&reconstructed.path).await?;
        }
        debug!(muted = reconstructed.muted, keep, "Manifest post-processing");

        let validation = if policy.check_segments() {
            let validation = self
                .validate(reconstructed.segment_urls(), progress)
                .await;
            Some((validation.available_count(), validation.total))
        } else {
            None
        };

        Ok(PlaylistReport {
            source_url: source_url.to_string(),
            muted: reconstructed.muted,
            kept_at: keep.then(|| reconstructed.path.clone()),
            duration_minutes: reconstructed.playlist.duration_minutes(),
            validation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str =
        "https://cdn.example/0123456789abcdef0123_camila_1_2/chunked/index-dvr.m3u8";
    const BASE: &str = "https://cdn.example/0123456789abcdef0123_camila_1_2/chunked/";

    #[test]
    fn muted_scenario() {
        let playlist = Playlist::parse("#EXTM3U\nseg1-unmuted.ts\n#EXT-X-ENDLIST\n");
        assert!(playlist.is_muted());

        let rewritten = playlist.rewrite(SOURCE).unwrap();
        assert_eq!(
            rewritten.to_string(),
            format!("#EXTM3U\n{BASE}0-muted.ts\n#EXT-X-ENDLIST\n")
        );
    }

    #[test]
    fn counter_advances_on_every_segment() {
        let text = "#EXTM3U\n#EXTINF:10.000,\n0.ts\n#EXTINF:10.000,\n1-unmuted.ts\n#EXTINF:4.5,\n2.ts\n";
        let rewritten = Playlist::parse(text).rewrite(SOURCE).unwrap();
        assert_eq!(
            rewritten.segment_urls(),
            vec![
                format!("{BASE}0.ts"),
                format!("{BASE}1-muted.ts"),
                format!("{BASE}2.ts"),
            ]
        );
        assert_eq!(rewritten.line_count(), 7);
        assert!((rewritten.total_duration_secs() - 24.5).abs() < f64::EPSILON);
    }

    #[test]
    fn unmuted_manifest_uses_plain_names() {
        let text = "#EXTM3U\nabc.ts\ndef.ts\n";
        let playlist = Playlist::parse(text);
        assert!(!playlist.is_muted());
        let rewritten = playlist.rewrite(SOURCE).unwrap();
        assert_eq!(
            rewritten.segment_urls(),
            vec![format!("{BASE}0.ts"), format!("{BASE}1.ts")]
        );
    }

    #[test]
    fn marker_in_tags_does_not_mute() {
        let playlist = Playlist::parse("#EXTM3U\n#EXT-X-TWITCH-INFO:unmuted\n0.ts\n");
        assert!(!playlist.is_muted());
    }

    #[test]
    fn rewrite_is_idempotent_from_same_source() {
        let text = "#EXTM3U\n0-unmuted.ts\n1.ts\n\n#EXT-X-ENDLIST";
        let first = Playlist::parse(text).rewrite(SOURCE).unwrap();
        let second = Playlist::parse(text).rewrite(SOURCE).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(first.line_count(), 5);
    }

    #[test]
    fn marking_preserves_line_count_and_is_sticky() {
        let text = format!("#EXTM3U\n{BASE}0.ts\n{BASE}1.ts\n{BASE}2.ts\n#EXT-X-ENDLIST\n");
        let mut playlist = Playlist::parse(&text);
        let before = playlist.line_count();

        let valid: HashSet<String> = [format!("{BASE}0.ts"), format!("{BASE}2.ts")].into();
        assert_eq!(playlist.mark_invalid(&valid), 1);
        assert_eq!(playlist.line_count(), before);
        assert_eq!(playlist.entries()[2].raw_line, format!("#{BASE}1.ts"));

        // a later pass that considers everything valid cannot revive it
        let mut reparsed = Playlist::parse(&playlist.to_string());
        let everything: HashSet<String> = (0..3).map(|i| format!("{BASE}{i}.ts")).collect();
        assert_eq!(reparsed.mark_invalid(&everything), 0);
        assert_eq!(reparsed.line_count(), before);
        assert_eq!(reparsed.entries()[2].raw_line, format!("#{BASE}1.ts"));
    }

    #[test]
    fn segment_base_strips_file_name() {
        assert_eq!(segment_base(SOURCE).unwrap(), BASE);
        assert_eq!(
            segment_base("https://cdn.example/a/index.m3u8?token=x/y").unwrap(),
            "https://cdn.example/a/"
        );
        assert!(segment_base("index.m3u8").is_err());
    }
}
