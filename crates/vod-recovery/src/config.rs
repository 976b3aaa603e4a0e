use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RecoveryError, Result};
use crate::proxy::ProxyConfig;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// CDN origins that host archived broadcasts, tried in order for every candidate second.
pub const DEFAULT_DOMAINS: &[&str] = &[
    "https://vod-secure.twitch.tv/",
    "https://vod-metro.twitch.tv/",
    "https://vod-pop-secure.twitch.tv/",
    "https://d2e2de1etea730.cloudfront.net/",
    "https://dqrpb9wgowsf5.cloudfront.net/",
    "https://ds0h3roq6wcgc.cloudfront.net/",
    "https://d2nvs31859zcd8.cloudfront.net/",
    "https://d2aba1wr3818hz.cloudfront.net/",
    "https://d3c27h4odz752x.cloudfront.net/",
    "https://dgeft87wbj63p.cloudfront.net/",
    "https://d1m7jfoe9zdc1j.cloudfront.net/",
    "https://d3vd9lfkzbru3h.cloudfront.net/",
    "https://d2vjef5jvl6bfs.cloudfront.net/",
    "https://d1ymi26ma8va5x.cloudfront.net/",
    "https://d1mhjrowxxagfy.cloudfront.net/",
    "https://ddacn6pr5v0tl.cloudfront.net/",
    "https://d3aqoihi2n8ty8.cloudfront.net/",
];

pub const DEFAULT_CLIP_DOMAIN: &str = "https://clips-media-assets2.twitch.tv/";

/// Ordered list of CDN origin prefixes. Never empty once validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainList(Vec<String>);

impl DomainList {
    pub fn new(domains: Vec<String>) -> Result<Self> {
        let list = Self(domains);
        list.validate()?;
        Ok(list)
    }

    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(RecoveryError::invalid_input("domain list is empty"));
        }
        if let Some(blank) = self.0.iter().find(|d| d.trim().is_empty()) {
            return Err(RecoveryError::invalid_input(format!(
                "domain list contains a blank entry `{blank}`"
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for DomainList {
    fn default() -> Self {
        Self(DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect())
    }
}

/// Answers the caller used to get at prompt time. `None` means "ask".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Rewrite muted segments after a successful VOD recovery
    pub unmute_video: Option<bool>,
    /// Probe every segment of a recovered playlist
    pub check_segments: Option<bool>,
    /// Download clips as soon as they are found
    pub download_clips: Option<bool>,
    /// Remove the clip log once clips have been handled
    pub remove_log_file: Option<bool>,
}

/// Configuration injected into every engine at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// VOD CDN origins
    pub domains: DomainList,

    /// Origin serving clip media
    pub clip_domain: String,

    /// Broadcasts older than this are not probed
    pub retention_days: i64,

    /// Maximum in-flight existence checks per batch
    pub probe_concurrency: usize,

    /// Maximum in-flight content downloads per batch
    pub fetch_concurrency: usize,

    /// Per-request timeout in seconds, bounds the tail of every batch
    pub probe_timeout_secs: u64,

    /// Connection establishment timeout in seconds
    pub connect_timeout_secs: u64,

    /// Seconds an idle pooled connection is kept alive
    pub pool_idle_timeout_secs: u64,

    pub user_agent: String,

    /// Where manifests, clip logs and downloads are written
    pub output_dir: PathBuf,

    pub proxy: Option<ProxyConfig>,

    pub policy: PolicyConfig,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            domains: DomainList::default(),
            clip_domain: DEFAULT_CLIP_DOMAIN.to_string(),
            retention_days: 60,
            probe_concurrency: 100,
            fetch_concurrency: 12,
            probe_timeout_secs: 10,
            connect_timeout_secs: 5,
            pool_idle_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            output_dir: PathBuf::from("."),
            proxy: None,
            policy: PolicyConfig::default(),
        }
    }
}

impl RecoveryConfig {
    pub fn validate(&self) -> Result<()> {
        self.domains
            .validate()
            .map_err(|e| RecoveryError::configuration(e.to_string()))?;
        if self.probe_concurrency == 0 {
            return Err(RecoveryError::configuration(
                "probe_concurrency must be at least 1",
            ));
        }
        if self.fetch_concurrency == 0 {
            return Err(RecoveryError::configuration(
                "fetch_concurrency must be at least 1",
            ));
        }
        if self.probe_timeout_secs == 0 {
            return Err(RecoveryError::configuration(
                "probe_timeout_secs must be at least 1",
            ));
        }
        if self.retention_days < 0 {
            return Err(RecoveryError::configuration(
                "retention_days cannot be negative",
            ));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RecoveryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retention_days, 60);
        assert_eq!(config.probe_concurrency, 100);
        assert_eq!(config.fetch_concurrency, 12);
    }

    #[test]
    fn empty_domain_list_is_rejected() {
        assert!(DomainList::new(vec![]).is_err());
        assert!(DomainList::new(vec!["  ".to_string()]).is_err());

        let config = RecoveryConfig {
            domains: DomainList(vec![]),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RecoveryError::Configuration { .. })
        ));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = RecoveryConfig {
            probe_concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
