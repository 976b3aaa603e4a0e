use crate::config::PolicyConfig;

/// Decisions the recovery flows defer to whoever is driving them.
///
/// Implementations may ask a human, read configuration, or answer
/// constantly; the engines never block on input themselves.
pub trait RecoveryPolicy: Send + Sync {
    /// Keep the rewritten manifest of a muted VOD.
    fn unmute_video(&self) -> bool;

    /// Probe every segment of a recovered manifest and report availability.
    fn check_segments(&self) -> bool;

    /// Download the `found` clips that were just logged.
    fn download_clips(&self, found: usize) -> bool;

    /// Delete the clip log once its clips were handled.
    fn remove_clip_log(&self) -> bool;
}

/// Answers from configuration, with non-destructive defaults for unset keys.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredPolicy {
    config: PolicyConfig,
}

impl ConfiguredPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }
}

impl RecoveryPolicy for ConfiguredPolicy {
    fn unmute_video(&self) -> bool {
        self.config.unmute_video.unwrap_or(true)
    }

    fn check_segments(&self) -> bool {
        self.config.check_segments.unwrap_or(false)
    }

    fn download_clips(&self, _found: usize) -> bool {
        self.config.download_clips.unwrap_or(false)
    }

    fn remove_clip_log(&self) -> bool {
        self.config.remove_log_file.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_keys_use_defaults() {
        let policy = ConfiguredPolicy::default();
        assert!(policy.unmute_video());
        assert!(!policy.check_segments());
        assert!(!policy.download_clips(3));
        assert!(!policy.remove_clip_log());
    }

    #[test]
    fn configured_keys_win() {
        let policy = ConfiguredPolicy::new(PolicyConfig {
            unmute_video: Some(false),
            check_segments: Some(true),
            download_clips: Some(true),
            remove_log_file: Some(true),
        });
        assert!(!policy.unmute_video());
        assert!(policy.check_segments());
        assert!(policy.download_clips(1));
        assert!(policy.remove_clip_log());
    }
}
