use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;
use vod_recovery::{ProbeProgress, ProbeResult};

/// Terminal progress bar for probing batches.
///
/// One bar per batch; counts are best effort and carry no meaning beyond display.
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
    hidden: bool,
}

impl BarProgress {
    pub fn new(hidden: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            hidden,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.blue} {msg} [{bar:30.cyan/blue}] {pos}/{len} ({per_sec}, {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
    }
}

impl ProbeProgress for BarProgress {
    fn on_start(&self, label: &str, total: usize) {
        let bar = if self.hidden {
            ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::hidden())
        } else {
            ProgressBar::new(total as u64)
        };
        bar.set_style(Self::style());
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        if let Some(previous) = self.bar.lock().replace(bar) {
            previous.finish_and_clear();
        }
    }

    fn on_result(&self, _completed: usize, _total: usize, _result: &ProbeResult) {
        if let Some(bar) = self.bar.lock().as_ref() {
            bar.inc(1);
        }
    }

    fn on_finish(&self, found: usize, total: usize) {
        if let Some(bar) = self.bar.lock().take() {
            bar.finish_and_clear();
            if !self.hidden {
                eprintln!("{found} of {total} found");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_bar_tracks_a_batch() {
        let progress = BarProgress::new(true);
        progress.on_start("Searching", 3);
        let result = ProbeResult {
            requested_url: "u".into(),
            resolved_url: "u".into(),
            success: true,
        };
        progress.on_result(1, 3, &result);
        assert_eq!(progress.bar.lock().as_ref().map(|b| b.position()), Some(1));
        progress.on_finish(1, 3);
        assert!(progress.bar.lock().is_none());
    }
}
