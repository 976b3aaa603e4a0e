use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use rand::seq::IndexedRandom;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vod_recovery::{BroadcastIdentity, MetadataProvider};

use crate::error::{Result, TrackerError};
use crate::sites::{TrackerSite, TrackerUrl};

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// One is picked at random for every page request
    pub user_agents: Vec<String>,
    /// Concurrent requests raced for StreamsCharts pages, which rate-limit hard
    pub streamscharts_attempts: usize,
    pub request_timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            streamscharts_attempts: 10,
            request_timeout_secs: 20,
        }
    }
}

/// Everything one tracker page says about a broadcast.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerBroadcast {
    pub page: TrackerUrl,
    pub identity: BroadcastIdentity,
    /// Absent when the page lists no usable duration.
    pub duration_minutes: Option<u64>,
}

/// [`MetadataProvider`] backed by TwitchTracker, StreamsCharts and SullyGnome pages.
#[derive(Debug, Clone)]
pub struct TrackerMetadataProvider {
    client: Client,
    config: TrackerConfig,
}

impl TrackerMetadataProvider {
    pub fn new(client: Client, config: TrackerConfig) -> Self {
        Self { client, config }
    }

    fn user_agent(&self) -> Option<&str> {
        self.config
            .user_agents
            .choose(&mut rand::rng())
            .map(String::as_str)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    /// One GET; any non-2xx status is an error.
    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        let mut request = self.client.get(url).timeout(self.request_timeout());
        if let Some(ua) = self.user_agent() {
            request = request.header(USER_AGENT, ua);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    /// Fire `attempts` identical requests at once and keep the first success.
    pub async fn fetch_page_racing(&self, url: &str, attempts: usize) -> Result<String> {
        let attempts = attempts.max(1);
        let mut pending: FuturesUnordered<_> = (0..attempts).map(|_| self.fetch_page(url)).collect();

        while let Some(result) = pending.next().await {
            match result {
                Ok(body) => return Ok(body),
                Err(e) => debug!(url, error = %e, "Tracker attempt failed"),
            }
        }
        warn!(url, attempts, "Every tracker attempt failed");
        Err(TrackerError::RetriesExhausted {
            url: url.to_string(),
            attempts,
        })
    }

    async fn fetch_for(&self, page: &TrackerUrl) -> Result<String> {
        match page.site {
            TrackerSite::StreamsCharts => {
                self.fetch_page_racing(&page.url, self.config.streamscharts_attempts)
                    .await
            }
            TrackerSite::TwitchTracker | TrackerSite::SullyGnome => self.fetch_page(&page.url).await,
        }
    }

    /// Fetch the page once and read both start and duration from it.
    pub async fn lookup(&self, url: &str) -> Result<TrackerBroadcast> {
        let page = TrackerUrl::parse(url)?;
        let html = self.fetch_for(&page).await?;

        let start = page.site.parse_start(&html, Utc::now().year())?;
        let duration_minutes = match page.site.parse_duration(&html) {
            Ok(minutes) => Some(minutes),
            Err(e) => {
                warn!(site = %page.site, error = %e, "Duration not found on page");
                None
            }
        };
        let identity = BroadcastIdentity::new(&page.streamer_name, &page.video_id, start)
            .map_err(|e| TrackerError::parse(page.site.name(), e.to_string()))?;

        debug!(site = %page.site, identity = %identity, ?duration_minutes, "Tracker lookup");
        Ok(TrackerBroadcast {
            page,
            identity,
            duration_minutes,
        })
    }
}

#[async_trait]
impl MetadataProvider for TrackerMetadataProvider {
    fn supports(&self, url: &str) -> bool {
        TrackerUrl::parse(url).is_ok()
    }

    async fn resolve_broadcast_start(&self, url: &str) -> vod_recovery::Result<NaiveDateTime> {
        let page = TrackerUrl::parse(url)?;
        let html = self.fetch_for(&page).await?;
        Ok(page.site.parse_start(&html, Utc::now().year())?)
    }

    async fn resolve_broadcast_duration(&self, url: &str) -> vod_recovery::Result<u64> {
        let page = TrackerUrl::parse(url)?;
        let html = self.fetch_for(&page).await?;
        Ok(page.site.parse_duration(&html)?)
    }

    async fn resolve_identity(&self, url: &str) -> vod_recovery::Result<BroadcastIdentity> {
        Ok(self.lookup(url).await?.identity)
    }
}
