use std::path::{Path, PathBuf};

use tracing::{info, warn};
use tracker_metadata::{
    SullyGnomeExport, TrackerBroadcast, TrackerMetadataProvider, merge_exports, read_export,
    read_export_as,
};
use vod_recovery::{
    BroadcastIdentity, ClipFormat, ClipRecoveryEngine, DownloadRequest, DownloadSource,
    Downloader, FfmpegDownloader, MetadataProvider, PlaylistReconstructor, PlaylistReport,
    Quality, RecoveredVod, RecoveryPolicy, Timecode, TrimRange, VodPath, VodUrlRecoveryEngine,
    links,
    storage::{output_stem_from_manifest, title_case},
};

use crate::api::{ApiServer, AppState};
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::output::OutputManager;
use crate::policy::PromptPolicy;
use crate::progress::BarProgress;

/// Minutes a tracker may report beyond the playlist before the broadcast counts as split.
const SPLIT_STREAM_THRESHOLD_MINUTES: u64 = 10;

pub struct CommandExecutor {
    config: AppConfig,
    config_path: Option<PathBuf>,
    output: OutputManager,
    progress: BarProgress,
    policy: PromptPolicy,
}

impl CommandExecutor {
    pub fn new(
        config: AppConfig,
        config_path: Option<PathBuf>,
        output: OutputManager,
        interactive: bool,
        quiet: bool,
    ) -> Self {
        let progress = BarProgress::new(output.is_json() || quiet);
        let policy = PromptPolicy::new(config.recovery.policy.clone(), interactive);
        Self {
            config,
            config_path,
            output,
            progress,
            policy,
        }
    }

    fn vod_engine(&self) -> Result<VodUrlRecoveryEngine> {
        Ok(VodUrlRecoveryEngine::new(self.config.recovery.clone())?)
    }

    fn clip_engine(&self) -> Result<ClipRecoveryEngine> {
        Ok(ClipRecoveryEngine::new(self.config.recovery.clone())?)
    }

    fn reconstructor(&self) -> Result<PlaylistReconstructor> {
        Ok(PlaylistReconstructor::from_config(&self.config.recovery)?)
    }

    fn tracker(&self) -> Result<TrackerMetadataProvider> {
        let client = vod_recovery::build_client(&self.config.recovery)?;
        Ok(TrackerMetadataProvider::new(
            client,
            self.config.tracker.clone(),
        ))
    }

    async fn lookup(&self, url: &str) -> Result<TrackerBroadcast> {
        let tracker = self.tracker()?;
        if !tracker.supports(url) {
            return Err(AppError::InvalidInput(format!(
                "`{url}` is not a TwitchTracker, StreamsCharts or SullyGnome stream page"
            )));
        }
        Ok(tracker.lookup(url).await?)
    }

    async fn load_export(&self, csv: &Path, streamer: Option<&str>) -> Result<SullyGnomeExport> {
        Ok(match streamer {
            Some(name) => read_export_as(csv, name).await?,
            None => read_export(csv).await?,
        })
    }

    pub async fn vod(
        &self,
        streamer: Option<String>,
        video_id: Option<String>,
        timestamp: Option<String>,
        url: Option<String>,
        quality: Option<Quality>,
        no_process: bool,
    ) -> Result<()> {
        let (identity, tracker_minutes) = match url {
            Some(url) => {
                let broadcast = self.lookup(&url).await?;
                (broadcast.identity, broadcast.duration_minutes)
            }
            None => {
                let (Some(streamer), Some(video_id), Some(timestamp)) =
                    (streamer, video_id, timestamp)
                else {
                    return Err(AppError::InvalidInput(
                        "streamer, video id and timestamp are required without --url".into(),
                    ));
                };
                (BroadcastIdentity::parse(streamer, video_id, &timestamp)?, None)
            }
        };

        let engine = self.vod_engine()?;
        let outcome = engine.recover(&identity, &self.progress).await?;
        println!("{}", self.output.format_vod_outcome(&outcome, quality)?);

        let Some(vod) = outcome.recovered() else {
            return Ok(());
        };
        if no_process {
            return Ok(());
        }

        let manifest = manifest_for(vod, quality);
        let report = self
            .reconstructor()?
            .process(manifest, &self.policy, &self.progress)
            .await?;
        println!("{}", self.output.format_playlist_report(&report)?);

        if let Some(minutes) = tracker_minutes
            && minutes >= report.duration_minutes + SPLIT_STREAM_THRESHOLD_MINUTES
        {
            warn!(
                tracker_minutes = minutes,
                playlist_minutes = report.duration_minutes,
                "Tracker duration exceeds the playlist"
            );
            let channel = links::streamscharts_channel_streams(identity.streamer_name());
            eprint!("{}", self.output.format_split_warning(&channel));
        }
        Ok(())
    }

    pub async fn vod_bulk(&self, csv: &Path, streamer: Option<&str>) -> Result<()> {
        let export = self.load_export(csv, streamer).await?;
        let engine = self.vod_engine()?;
        let reconstructor = self.reconstructor()?;
        let total = export.records.len();
        let mut recovered = 0;

        info!(streamer = %export.streamer_name, total, "Bulk VOD recovery");
        for record in &export.records {
            let identity =
                match BroadcastIdentity::new(&export.streamer_name, &record.video_id, record.start) {
                    Ok(identity) => identity,
                    Err(e) => {
                        warn!(video_id = %record.video_id, error = %e, "Skipping row");
                        continue;
                    }
                };
            let outcome = engine.recover(&identity, &self.progress).await?;
            println!("{}", self.output.format_vod_outcome(&outcome, None)?);
            let Some(vod) = outcome.recovered() else {
                continue;
            };
            recovered += 1;
            self.process_bulk_vod(&reconstructor, vod).await?;
        }

        println!(
            "{}",
            self.output
                .format_bulk_summary("VODs recovered", recovered, total)?
        );
        Ok(())
    }

    /// Post-process one recovered row. A failure skips the row instead of the batch.
    async fn process_bulk_vod(
        &self,
        reconstructor: &PlaylistReconstructor,
        vod: &RecoveredVod,
    ) -> Result<bool> {
        match reconstructor
            .process(&vod.base_url, &self.policy, &self.progress)
            .await
        {
            Ok(report) => {
                println!("{}", self.output.format_playlist_report(&report)?);
                Ok(true)
            }
            Err(e) => {
                warn!(
                    video_id = %vod.identity.video_id(),
                    error = %e,
                    "Playlist processing failed, skipping"
                );
                Ok(false)
            }
        }
    }

    pub async fn clips(
        &self,
        streamer: Option<String>,
        video_id: Option<String>,
        duration: Option<u64>,
        url: Option<String>,
        formats: &[ClipFormat],
        download: bool,
    ) -> Result<()> {
        let (streamer, video_id, duration) = match url {
            Some(url) => {
                let broadcast = self.lookup(&url).await?;
                let duration = broadcast.duration_minutes.ok_or_else(|| {
                    AppError::InvalidInput(format!(
                        "`{url}` lists no duration, search with --streamer, --video-id and --duration"
                    ))
                })?;
                (
                    broadcast.identity.streamer_name().to_string(),
                    broadcast.identity.video_id().to_string(),
                    duration,
                )
            }
            None => match (streamer, video_id, duration) {
                (Some(s), Some(v), Some(d)) => (s, v, d),
                _ => {
                    return Err(AppError::InvalidInput(
                        "streamer, video id and duration are required without --url".into(),
                    ));
                }
            },
        };

        let engine = self.clip_engine()?;
        let report = engine
            .recover(&streamer, &video_id, duration, formats, &self.progress)
            .await?;
        println!("{}", self.output.format_clip_report(&report)?);

        let found = report.found_count();
        if found == 0 {
            return Ok(());
        }
        if download || self.policy.download_clips(found) {
            self.download_logged_clips(&engine, &report.streamer_name, &report.video_id)
                .await?;
        }
        self.settle_clip_log(&engine, &report.streamer_name, &report.video_id)
            .await?;
        Ok(())
    }

    async fn download_logged_clips(
        &self,
        engine: &ClipRecoveryEngine,
        streamer: &str,
        video_id: &str,
    ) -> Result<usize> {
        let report = engine.download_clips(streamer, video_id).await?;
        println!("{}", self.output.format_download_report(&report)?);
        Ok(report.downloaded.len())
    }

    /// Remove the clip log when the policy says so. Returns whether it was removed.
    async fn settle_clip_log(
        &self,
        engine: &ClipRecoveryEngine,
        streamer: &str,
        video_id: &str,
    ) -> Result<bool> {
        if !self.policy.remove_clip_log() {
            return Ok(false);
        }
        engine.storage().remove_clip_log(streamer, video_id).await?;
        info!(streamer, video_id, "Clip log removed");
        Ok(true)
    }

    pub async fn clips_random(
        &self,
        video_id: &str,
        duration: u64,
        formats: &[ClipFormat],
        limit: usize,
    ) -> Result<()> {
        let urls = self
            .clip_engine()?
            .sample_random(video_id, duration, formats, limit)
            .await?;
        println!("{}", self.output.format_clip_sample(&urls)?);
        Ok(())
    }

    pub async fn clips_bulk(
        &self,
        csv: Option<&Path>,
        merge_dir: Option<&Path>,
        streamer: Option<&str>,
        formats: &[ClipFormat],
        download: bool,
    ) -> Result<()> {
        let export = match (merge_dir, csv) {
            (Some(dir), _) => {
                let streamer = streamer.ok_or_else(|| {
                    AppError::InvalidInput("--streamer is required with --merge-dir".into())
                })?;
                let merged = merge_exports(dir, streamer).await?;
                info!(path = %merged.display(), "Exports merged");
                read_export_as(&merged, streamer).await?
            }
            (None, Some(csv)) => self.load_export(csv, streamer).await?,
            (None, None) => {
                return Err(AppError::InvalidInput("no export given".into()));
            }
        };

        let engine = self.clip_engine()?;
        let total = export.records.len();
        let mut total_probed = 0;
        let mut total_found = 0;
        let mut total_downloaded = 0;

        for record in &export.records {
            let Some(duration) = record.duration_minutes else {
                warn!(video_id = %record.video_id, "Row has no duration, skipping");
                continue;
            };
            let report = match engine
                .recover(
                    &export.streamer_name,
                    &record.video_id,
                    duration,
                    formats,
                    &self.progress,
                )
                .await
            {
                Ok(report) => report,
                Err(e) if e.is_caller_error() => {
                    warn!(video_id = %record.video_id, error = %e, "Skipping row");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            println!("{}", self.output.format_clip_report(&report)?);
            total_probed += report.probed;
            total_found += report.found_count();

            if download && report.found_count() > 0 {
                total_downloaded += self
                    .download_logged_clips(&engine, &report.streamer_name, &report.video_id)
                    .await?;
                self.settle_clip_log(&engine, &report.streamer_name, &report.video_id)
                    .await?;
            }
        }

        info!(broadcasts = total, total_found, "Bulk clip search finished");
        println!(
            "{}",
            self.output
                .format_bulk_summary("Clips found", total_found, total_probed)?
        );
        if download {
            println!(
                "{}",
                self.output
                    .format_bulk_summary("Clips downloaded", total_downloaded, total_found)?
            );
        }
        Ok(())
    }

    pub async fn unmute(&self, url: &str) -> Result<()> {
        let reconstructed = self.reconstructor()?.reconstruct(url).await?;
        let report = PlaylistReport {
            source_url: url.to_string(),
            muted: reconstructed.muted,
            kept_at: Some(reconstructed.path.clone()),
            duration_minutes: reconstructed.playlist.duration_minutes(),
            validation: None,
        };
        println!("{}", self.output.format_playlist_report(&report)?);
        Ok(())
    }

    pub async fn verify(&self, url: &str) -> Result<()> {
        let validation = self
            .reconstructor()?
            .verify(url, &self.progress)
            .await?;
        println!("{}", self.output.format_validation(&validation)?);
        Ok(())
    }

    pub async fn mark(&self, url: &str) -> Result<()> {
        let report = self
            .reconstructor()?
            .rebuild_validated(url, &self.progress)
            .await?;
        println!("{}", self.output.format_mark_report(&report)?);
        Ok(())
    }

    pub async fn download(
        &self,
        url: Option<String>,
        file: Option<PathBuf>,
        output: Option<String>,
        start: Option<String>,
        end: Option<String>,
        ffmpeg: &str,
    ) -> Result<()> {
        let source = match (url, file) {
            (Some(url), _) => DownloadSource::Url(url),
            (None, Some(file)) => DownloadSource::File(file),
            (None, None) => {
                return Err(AppError::InvalidInput("either --url or --file is required".into()));
            }
        };

        let trim = match (start, end) {
            (Some(start), Some(end)) => Some(TrimRange::new(
                Timecode::parse(&start)?,
                Timecode::parse(&end)?,
            )?),
            (None, None) => None,
            _ => {
                return Err(AppError::InvalidInput(
                    "--start and --end must be given together".into(),
                ));
            }
        };

        let output_filename = match output {
            Some(name) => name,
            None => default_output_name(&source),
        };

        let downloader = FfmpegDownloader::with_binary(ffmpeg, &self.config.recovery.output_dir);
        let request = DownloadRequest {
            source,
            output_filename,
            trim,
        };
        info!(source = %request.source, "Starting download");
        let path = downloader.download(&request).await?;
        println!("{}", self.output.format_downloaded_file(&path)?);
        Ok(())
    }

    pub async fn serve(&self, bind: Option<String>, port: Option<u16>) -> Result<()> {
        let mut server_config = self.config.server.clone();
        if let Some(bind) = bind {
            server_config.bind_address = bind;
        }
        if let Some(port) = port {
            server_config.port = port;
        }
        let state = AppState::new(self.vod_engine()?);
        ApiServer::new(server_config, state).run().await
    }

    /// Print the effective configuration, or overwrite the file with defaults.
    pub fn config(&self, show: bool, reset: bool) -> Result<()> {
        if reset {
            let path = AppConfig::reset(self.config_path.as_deref())?;
            println!("Configuration reset: {}", path.display());
            return Ok(());
        }
        if !show {
            info!("No action given, showing the configuration");
        }
        if let Some(path) = self
            .config_path
            .clone()
            .or_else(AppConfig::default_path)
        {
            eprintln!("# {}", path.display());
        }
        print!("{}", self.config.show()?);
        Ok(())
    }
}

/// Manifest to post-process: the requested rendition when confirmed, `chunked` otherwise.
fn manifest_for(vod: &RecoveredVod, quality: Option<Quality>) -> &str {
    quality
        .and_then(|q| vod.url_for(Some(q)))
        .unwrap_or(&vod.base_url)
}

/// `{Streamer}_{videoId}` when the source names its broadcast, `vod` otherwise.
fn default_output_name(source: &DownloadSource) -> String {
    match source {
        DownloadSource::File(path) => output_stem_from_manifest(path)
            .map(|stem| title_case(&stem))
            .unwrap_or_else(|_| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("vod")
                    .to_string()
            }),
        DownloadSource::Url(url) => VodPath::parse(url)
            .map(|vod| format!("{}_{}", title_case(&vod.streamer_name), vod.video_id))
            .unwrap_or_else(|_| "vod".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vod_recovery::ConfirmedQuality;

    #[test]
    fn output_name_from_local_manifest() {
        let source = DownloadSource::File(PathBuf::from("/tmp/VodRecovery_camila_43549753755.m3u8"));
        assert_eq!(default_output_name(&source), "Camila_43549753755");

        let source = DownloadSource::File(PathBuf::from("/tmp/playlist.m3u8"));
        assert_eq!(default_output_name(&source), "playlist");
    }

    #[test]
    fn output_name_from_cdn_url() {
        let source = DownloadSource::Url(
            "https://d2nvs31859zcd8.cloudfront.net/0123456789abcdef0123_camila_43549753755_1706918491/chunked/index-dvr.m3u8"
                .to_string(),
        );
        assert_eq!(default_output_name(&source), "Camila_43549753755");

        let source = DownloadSource::Url("https://example.com/live.m3u8".to_string());
        assert_eq!(default_output_name(&source), "vod");
    }

    #[tokio::test]
    async fn manual_vod_rejects_bad_ids_before_probing() {
        let executor = CommandExecutor::new(
            AppConfig::default(),
            None,
            OutputManager::new(false, true),
            false,
            true,
        );
        let err = executor
            .vod(
                Some("camila".into()),
                Some("12ab".into()),
                Some("2024-02-03 00:01:31".into()),
                None,
                None,
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Recovery(e) if e.is_caller_error()));
    }

    fn executor_in(dir: &Path, remove_log_file: Option<bool>) -> CommandExecutor {
        let mut config = AppConfig::default();
        config.recovery.output_dir = dir.to_path_buf();
        config.recovery.policy.remove_log_file = remove_log_file;
        CommandExecutor::new(config, None, OutputManager::new(false, true), false, true)
    }

    #[test]
    fn requested_rendition_is_post_processed() {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 2, 3)
            .unwrap()
            .and_hms_opt(0, 1, 31)
            .unwrap();
        let chunked = "https://cdn/x/chunked/index-dvr.m3u8";
        let p720 = "https://cdn/x/720p60/index-dvr.m3u8";
        let vod = RecoveredVod {
            identity: BroadcastIdentity::new("camila", "43549753755", start).unwrap(),
            base_url: chunked.to_string(),
            candidates_probed: 60,
            candidates_found: 1,
            qualities: vec![
                ConfirmedQuality {
                    quality: Quality::Chunked,
                    url: chunked.to_string(),
                },
                ConfirmedQuality {
                    quality: Quality::P720p60,
                    url: p720.to_string(),
                },
            ],
        };

        assert_eq!(manifest_for(&vod, Some(Quality::P720p60)), p720);
        assert_eq!(manifest_for(&vod, Some(Quality::P1080p60)), chunked);
        assert_eq!(manifest_for(&vod, None), chunked);
    }

    #[tokio::test]
    async fn unreachable_bulk_manifest_skips_the_row() {
        let dir = tempfile::TempDir::new().unwrap();
        let executor = executor_in(dir.path(), None);
        let start = chrono::NaiveDate::from_ymd_opt(2024, 2, 3)
            .unwrap()
            .and_hms_opt(0, 1, 31)
            .unwrap();
        let base_url =
            "http://127.0.0.1:9/0123456789abcdef0123_camila_43549753755_1706918491/chunked/index-dvr.m3u8";
        let vod = RecoveredVod {
            identity: BroadcastIdentity::new("camila", "43549753755", start).unwrap(),
            base_url: base_url.to_string(),
            candidates_probed: 60,
            candidates_found: 1,
            qualities: Vec::new(),
        };

        let reconstructor = executor.reconstructor().unwrap();
        let processed = executor.process_bulk_vod(&reconstructor, &vod).await.unwrap();
        assert!(!processed);
    }

    #[tokio::test]
    async fn clip_log_is_removed_without_a_download() {
        let dir = tempfile::TempDir::new().unwrap();
        let executor = executor_in(dir.path(), Some(true));
        let engine = executor.clip_engine().unwrap();
        let log = engine
            .storage()
            .append_clip_log("camila", "43549753755", &["https://clips/a.mp4".to_string()])
            .await
            .unwrap();

        assert!(executor.settle_clip_log(&engine, "camila", "43549753755").await.unwrap());
        assert!(!log.exists());
    }

    #[tokio::test]
    async fn clip_log_is_kept_by_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let executor = executor_in(dir.path(), None);
        let engine = executor.clip_engine().unwrap();
        let log = engine
            .storage()
            .append_clip_log("camila", "43549753755", &["https://clips/a.mp4".to_string()])
            .await
            .unwrap();

        assert!(!executor.settle_clip_log(&engine, "camila", "43549753755").await.unwrap());
        assert!(log.exists());
    }
}
