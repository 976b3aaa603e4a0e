use vod_recovery::{PolicyConfig, RecoveryPolicy};

/// Configured answers first, then a terminal prompt, then a fixed default.
pub struct PromptPolicy {
    config: PolicyConfig,
    interactive: bool,
}

impl PromptPolicy {
    pub fn new(config: PolicyConfig, interactive: bool) -> Self {
        Self {
            config,
            interactive: interactive && cfg!(feature = "interactive"),
        }
    }

    fn decide(&self, configured: Option<bool>, question: &str, default: bool) -> bool {
        if let Some(answer) = configured {
            return answer;
        }
        if !self.interactive {
            return default;
        }
        confirm(question, default)
    }
}

#[cfg(feature = "interactive")]
fn confirm(question: &str, default: bool) -> bool {
    match inquire::Confirm::new(question).with_default(default).prompt() {
        Ok(answer) => answer,
        Err(e) => {
            tracing::debug!(error = %e, "Prompt aborted, using default");
            default
        }
    }
}

#[cfg(not(feature = "interactive"))]
fn confirm(_question: &str, default: bool) -> bool {
    default
}

impl RecoveryPolicy for PromptPolicy {
    fn unmute_video(&self) -> bool {
        self.decide(
            self.config.unmute_video,
            "The VOD has muted segments. Keep an unmuted playlist?",
            true,
        )
    }

    fn check_segments(&self) -> bool {
        self.decide(
            self.config.check_segments,
            "Check which segments are still available?",
            false,
        )
    }

    fn download_clips(&self, found: usize) -> bool {
        self.decide(
            self.config.download_clips,
            &format!("Download the {found} clips found?"),
            false,
        )
    }

    fn remove_clip_log(&self) -> bool {
        self.decide(
            self.config.remove_log_file,
            "Remove the clip log file?",
            false,
        )
    }
}
