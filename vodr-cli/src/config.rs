use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracker_metadata::TrackerConfig;
use vod_recovery::RecoveryConfig;

use crate::error::{AppError, Result};

/// HTTP surface settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Contents of `config.toml`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub recovery: RecoveryConfig,
    pub tracker: TrackerConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vodr").join("config.toml"))
    }

    fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        path.map(Path::to_path_buf)
            .or_else(Self::default_path)
            .ok_or_else(|| AppError::InvalidInput("no configuration directory on this system".into()))
    }

    /// Load from `path` or the default location; a missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(path)?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&text)?;
        config.recovery.validate()?;
        Ok(config)
    }

    /// Overwrite the file with defaults.
    pub fn reset(path: Option<&Path>) -> Result<PathBuf> {
        let path = Self::resolve_path(path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, Self::default().show()?)?;
        Ok(path)
    }

    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Command line flags win over the file.
    pub fn apply_overrides(
        &mut self,
        output_dir: Option<PathBuf>,
        concurrency: Option<usize>,
        timeout_secs: Option<u64>,
    ) {
        if let Some(dir) = output_dir {
            self.recovery.output_dir = dir;
        }
        if let Some(concurrency) = concurrency {
            self.recovery.probe_concurrency = concurrency;
        }
        if let Some(timeout) = timeout_secs {
            self.recovery.probe_timeout_secs = timeout;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[recovery]
domains = ["https://vod-secure.twitch.tv/"]
probe_concurrency = 20

[recovery.policy]
unmute_video = false

[server]
port = 8080
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.recovery.domains.len(), 1);
        assert_eq!(config.recovery.probe_concurrency, 20);
        assert_eq!(config.recovery.retention_days, 60);
        assert_eq!(config.recovery.policy.unmute_video, Some(false));
        assert_eq!(config.recovery.policy.check_segments, None);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.tracker, TrackerConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[recovery]\ndomains = []\n").unwrap();
        assert!(AppConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn reset_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        AppConfig::reset(Some(&path)).unwrap();
        assert_eq!(AppConfig::load(Some(&path)).unwrap(), AppConfig::default());
    }

    #[test]
    fn flags_override_file() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some(PathBuf::from("/tmp/out")), Some(7), None);
        assert_eq!(config.recovery.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.recovery.probe_concurrency, 7);
        assert_eq!(config.recovery.probe_timeout_secs, 10);
    }
}
