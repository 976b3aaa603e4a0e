//! Recovery of unlisted Twitch VOD and clip URLs
//!
//! Archived broadcasts stay on the CDN at addresses derived from the
//! streamer, the video id and the start second, long after every public page
//! stops linking them. This crate regenerates those addresses, probes them
//! with bounded concurrency and rebuilds the playlists of the survivors.
//!
//! ## Component Overview
//!
//! - `candidate`: deterministic VOD address generation
//! - `prober`: bounded-concurrency existence checks with progress callbacks
//! - `vod`: search, winner selection and quality resolution
//! - `playlist`: manifest rewrite, segment validation and invalid-segment marking
//! - `clip`: clip address families, clip search and clip download
//! - `metadata`, `downloader`, `policy`: seams for the collaborators the
//!   engines consume but do not implement
//! - `storage`: on-disk layout of manifests, clip logs and downloads

pub mod candidate;
pub mod client;
pub mod clip;
pub mod config;
pub mod downloader;
pub mod error;
pub mod identity;
pub mod links;
pub mod metadata;
pub mod playlist;
pub mod policy;
pub mod prober;
pub mod proxy;
pub mod storage;
pub mod vod;

pub use candidate::{CandidateAddressGenerator, CandidateUrl};
pub use client::{build_client, install_rustls_provider};
pub use clip::{
    ClipAddressGenerator, ClipCandidate, ClipDownloadReport, ClipFormat, ClipRecoveryEngine,
    ClipRecoveryReport,
};
pub use config::{DomainList, PolicyConfig, RecoveryConfig};
pub use downloader::{
    DownloadRequest, DownloadSource, Downloader, FfmpegDownloader, Timecode, TrimRange,
};
pub use error::{RecoveryError, Result};
pub use identity::{BroadcastIdentity, VodPath};
pub use links::AlternateLink;
pub use metadata::MetadataProvider;
pub use playlist::{
    MarkReport, Playlist, PlaylistReconstructor, PlaylistReport, SegmentEntry, SegmentValidation,
};
pub use policy::{ConfiguredPolicy, RecoveryPolicy};
pub use prober::{AvailabilityProber, NoProgress, ProbeMethod, ProbeProgress, ProbeReport, ProbeResult};
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
pub use storage::RecoveryStorage;
pub use vod::{ConfirmedQuality, Quality, RecoveredVod, VodRecoveryOutcome, VodUrlRecoveryEngine};
