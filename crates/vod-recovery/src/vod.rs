//! VOD recovery: candidate search, winner selection and quality resolution.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::candidate::CandidateAddressGenerator;
use crate::client::build_client;
use crate::config::RecoveryConfig;
use crate::error::{RecoveryError, Result};
use crate::identity::BroadcastIdentity;
use crate::links::{AlternateLink, alternate_links};
use crate::prober::{AvailabilityProber, ProbeMethod, ProbeProgress};

/// Rendition names as they appear in the CDN path, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "chunked")]
    Chunked,
    #[serde(rename = "1080p60")]
    P1080p60,
    #[serde(rename = "1080p30")]
    P1080p30,
    #[serde(rename = "720p60")]
    P720p60,
    #[serde(rename = "720p30")]
    P720p30,
    #[serde(rename = "480p60")]
    P480p60,
    #[serde(rename = "480p30")]
    P480p30,
}

impl Quality {
    pub const ALL: [Quality; 7] = [
        Quality::Chunked,
        Quality::P1080p60,
        Quality::P1080p30,
        Quality::P720p60,
        Quality::P720p30,
        Quality::P480p60,
        Quality::P480p30,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Chunked => "chunked",
            Quality::P1080p60 => "1080p60",
            Quality::P1080p30 => "1080p30",
            Quality::P720p60 => "720p60",
            Quality::P720p30 => "720p30",
            Quality::P480p60 => "480p60",
            Quality::P480p30 => "480p30",
        }
    }

    /// Replace the `chunked` path component of a recovered URL with this rendition.
    pub fn apply(&self, chunked_url: &str) -> String {
        chunked_url.replace("/chunked/", &format!("/{}/", self.as_str()))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self> {
        Quality::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RecoveryError::invalid_input(format!("unknown quality `{s}`")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedQuality {
    pub quality: Quality,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoveredVod {
    pub identity: BroadcastIdentity,
    /// Winning candidate, pointing at the `chunked` rendition.
    pub base_url: String,
    pub candidates_probed: usize,
    pub candidates_found: usize,
    /// Confirmed renditions in best-first order.
    pub qualities: Vec<ConfirmedQuality>,
}

impl RecoveredVod {
    /// URL for the requested rendition, or the best confirmed one when none is requested.
    pub fn url_for(&self, quality: Option<Quality>) -> Option<&str> {
        match quality {
            Some(q) => self
                .qualities
                .iter()
                .find(|c| c.quality == q)
                .map(|c| c.url.as_str()),
            None => self.qualities.first().map(|c| c.url.as_str()),
        }
    }

    pub fn best_url(&self) -> &str {
        self.url_for(None).unwrap_or(&self.base_url)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VodRecoveryOutcome {
    Recovered(RecoveredVod),
    /// Older than the retention window; nothing was probed.
    StaleBroadcast { age_days: i64, retention_days: i64 },
    /// No candidate answered; try the broadcast on these pages instead.
    RecoveryExhausted {
        candidates_probed: usize,
        alternates: Vec<AlternateLink>,
    },
}

impl VodRecoveryOutcome {
    pub fn recovered(&self) -> Option<&RecoveredVod> {
        match self {
            Self::Recovered(vod) => Some(vod),
            _ => None,
        }
    }
}

/// Whole days between the broadcast date and `today`, never negative.
pub fn age_in_days(start: NaiveDateTime, today: NaiveDate) -> i64 {
    (today - start.date()).num_days().max(0)
}

#[derive(Debug, Clone)]
pub struct VodUrlRecoveryEngine {
    config: Arc<RecoveryConfig>,
    client: Client,
    prober: AvailabilityProber,
}

impl VodUrlRecoveryEngine {
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
        Ok(Self {
            config: Arc::new(config),
            client,
            prober,
        })
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn recover(
        &self,
        identity: &BroadcastIdentity,
        progress: &dyn ProbeProgress,
    ) -> Result<VodRecoveryOutcome> {
        self.recover_at(identity, Utc::now().date_naive(), progress)
            .await
    }

    /// Recovery as of `today`; the retention check is the only use of the date.
    #[instrument(skip(self, identity, progress), fields(identity = %identity))]
    pub async fn recover_at(
        &self,
        identity: &BroadcastIdentity,
        today: NaiveDate,
        progress: &dyn ProbeProgress,
    ) -> Result<VodRecoveryOutcome> {
        let age_days = age_in_days(identity.start(), today);
        if age_days > self.config.retention_days {
            info!(
                age_days,
                retention_days = self.config.retention_days,
                "Broadcast is past the retention window, skipping search"
            );
            return Ok(VodRecoveryOutcome::StaleBroadcast {
                age_days,
                retention_days: self.config.retention_days,
            });
        }

        let candidates = CandidateAddressGenerator::new(&self.config.domains).generate(identity)?;
        let candidates_probed = candidates.len();
        info!(candidates = candidates_probed, "Searching for VOD");

        let report = self
            .prober
            .probe_all(
                "Searching for VOD",
                candidates.into_iter().map(|c| c.full_url).collect(),
                progress,
            )
            .await;

        let Some(winner) = report.choose_random() else {
            warn!(candidates = candidates_probed, "No candidate found on the configured domains");
            return Ok(VodRecoveryOutcome::RecoveryExhausted {
                candidates_probed,
                alternates: alternate_links(identity.streamer_name(), identity.video_id()),
            });
        };
        let base_url = winner.resolved_url.clone();
        debug!(base_url = %base_url, found = report.found_count(), "Selected winning candidate");

        let mut qualities = self.resolve_qualities(&base_url, progress).await;
        if qualities.is_empty() {
            // the search itself already confirmed the chunked rendition
            qualities.push(ConfirmedQuality {
                quality: Quality::Chunked,
                url: base_url.clone(),
            });
        }

        Ok(VodRecoveryOutcome::Recovered(RecoveredVod {
            identity: identity.clone(),
            base_url,
            candidates_probed,
            candidates_found: report.found_count(),
            qualities,
        }))
    }

    /// Probe every rendition of a recovered `chunked` URL, best first.
    pub async fn resolve_qualities(
        &self,
        chunked_url: &str,
        progress: &dyn ProbeProgress,
    ) -> Vec<ConfirmedQuality> {
        let prober = self.prober.clone().with_method(ProbeMethod::Get);
        let urls: Vec<String> = Quality::ALL.iter().map(|q| q.apply(chunked_url)).collect();
        let report = prober.probe_all("Checking qualities", urls, progress).await;

        let confirmed = report.requested_urls();
        Quality::ALL
            .into_iter()
            .map(|quality| ConfirmedQuality {
                url: quality.apply(chunked_url),
                quality,
            })
            .filter(|c| confirmed.contains(&c.url))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn age_is_clamped_at_zero() {
        assert_eq!(age_in_days(at("2024-02-03 23:59:59"), date("2024-02-03")), 0);
        assert_eq!(age_in_days(at("2024-02-05 00:00:00"), date("2024-02-03")), 0);
        assert_eq!(age_in_days(at("2024-02-03 00:01:31"), date("2024-04-03")), 60);
    }

    #[test]
    fn quality_substitution_and_parsing() {
        let url = "https://cdn/abc_camila_1_2/chunked/index-dvr.m3u8";
        assert_eq!(
            Quality::P720p60.apply(url),
            "https://cdn/abc_camila_1_2/720p60/index-dvr.m3u8"
        );
        assert_eq!("1080P60".parse::<Quality>().unwrap(), Quality::P1080p60);
        assert!("4k".parse::<Quality>().is_err());
    }

    #[test]
    fn default_choice_is_best_confirmed() {
        let identity = BroadcastIdentity::parse("camila", "1", "2024-02-03 00:01:31").unwrap();
        let vod = RecoveredVod {
            identity,
            base_url: "https://cdn/x/chunked/index-dvr.m3u8".to_string(),
            candidates_probed: 60,
            candidates_found: 1,
            qualities: vec![
                ConfirmedQuality {
                    quality: Quality::P1080p60,
                    url: "https://cdn/x/1080p60/index-dvr.m3u8".to_string(),
                },
                ConfirmedQuality {
                    quality: Quality::P480p30,
                    url: "https://cdn/x/480p30/index-dvr.m3u8".to_string(),
                },
            ],
        };
        assert_eq!(vod.url_for(None), Some("https://cdn/x/1080p60/index-dvr.m3u8"));
        assert_eq!(
            vod.url_for(Some(Quality::P480p30)),
            Some("https://cdn/x/480p30/index-dvr.m3u8")
        );
        assert_eq!(vod.url_for(Some(Quality::Chunked)), None);
    }

    #[tokio::test]
    async fn stale_broadcast_short_circuits() {
        let config = RecoveryConfig::default();
        let engine = VodUrlRecoveryEngine::new(config).unwrap();
        let identity = BroadcastIdentity::parse("camila", "1", "2024-02-03 00:01:31").unwrap();

        let outcome = engine
            .recover_at(&identity, date("2024-04-04"), &crate::prober::NoProgress)
            .await
            .unwrap();
        match outcome {
            VodRecoveryOutcome::StaleBroadcast {
                age_days,
                retention_days,
            } => {
                assert_eq!(age_days, 61);
                assert_eq!(retention_days, 60);
            }
            other => panic!("expected stale outcome, got {other:?}"),
        }
    }
}
