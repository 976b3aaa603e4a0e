//! Broadcast identity and the CDN path naming convention.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RecoveryError, Result};

/// Format used by the metadata sources and the HTTP surface.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Who streamed, which video, and when it started (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BroadcastIdentity {
    streamer_name: String,
    video_id: String,
    start: NaiveDateTime,
}

impl BroadcastIdentity {
    /// Normalizes the streamer name to lowercase and rejects empty or
    /// non-numeric fields before anything touches the network.
    pub fn new(
        streamer_name: impl AsRef<str>,
        video_id: impl AsRef<str>,
        start: NaiveDateTime,
    ) -> Result<Self> {
        let streamer_name = streamer_name.as_ref().trim().to_lowercase();
        if streamer_name.is_empty() {
            return Err(RecoveryError::invalid_input("streamer name is empty"));
        }
        let video_id = validate_video_id(video_id.as_ref())?;

        Ok(Self {
            streamer_name,
            video_id,
            start,
        })
    }

    /// Same as [`BroadcastIdentity::new`] with the start given as `YYYY-MM-DD HH:MM:SS`.
    pub fn parse(
        streamer_name: impl AsRef<str>,
        video_id: impl AsRef<str>,
        start: &str,
    ) -> Result<Self> {
        Self::new(streamer_name, video_id, parse_timestamp(start)?)
    }

    pub fn streamer_name(&self) -> &str {
        &self.streamer_name
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.and_utc()
    }
}

impl fmt::Display for BroadcastIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} @ {}",
            self.streamer_name,
            self.video_id,
            self.start.format(TIMESTAMP_FORMAT)
        )
    }
}

pub fn validate_video_id(video_id: &str) -> Result<String> {
    let video_id = video_id.trim();
    if video_id.is_empty() {
        return Err(RecoveryError::invalid_input("video id is empty"));
    }
    if !video_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RecoveryError::invalid_input(format!(
            "video id `{video_id}` is not numeric"
        )));
    }
    Ok(video_id.to_string())
}

pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return Err(RecoveryError::invalid_input(
            "timestamp is empty, expected YYYY-MM-DD HH:MM:SS",
        ));
    }
    NaiveDateTime::parse_from_str(input, TIMESTAMP_FORMAT).map_err(|e| {
        RecoveryError::invalid_input(format!(
            "invalid timestamp `{input}` ({e}), expected YYYY-MM-DD HH:MM:SS"
        ))
    })
}

/// Streamer and video recovered from a CDN manifest URL.
///
/// VOD paths look like `{domain}{hash}_{streamer}_{videoId}_{epoch}/{quality}/index-dvr.m3u8`.
/// Streamer names may themselves contain underscores, so the two numeric
/// fields are split off from the right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VodPath {
    pub streamer_name: String,
    pub video_id: String,
    pub epoch_seconds: i64,
}

impl VodPath {
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || RecoveryError::invalid_input(format!("`{url}` is not a VOD manifest URL"));

        let without_query = url.split(['?', '#']).next().unwrap_or(url);
        let segment = without_query
            .split('/')
            .find(|segment| {
                segment
                    .split_once('_')
                    .is_some_and(|(hash, _)| hash.len() == 20 && hash.bytes().all(|b| b.is_ascii_hexdigit()))
            })
            .ok_or_else(invalid)?;

        let (_, base) = segment.split_once('_').ok_or_else(invalid)?;
        let (rest, epoch) = base.rsplit_once('_').ok_or_else(invalid)?;
        let (streamer, video_id) = rest.rsplit_once('_').ok_or_else(invalid)?;

        let epoch_seconds = epoch.parse::<i64>().map_err(|_| invalid())?;
        if streamer.is_empty() {
            return Err(invalid());
        }
        let video_id = validate_video_id(video_id)?;

        Ok(Self {
            streamer_name: streamer.to_string(),
            video_id,
            epoch_seconds,
        })
    }
}
