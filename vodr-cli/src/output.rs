use std::path::Path;

#[cfg(feature = "colored-output")]
use colored::*;
use serde::Serialize;
use vod_recovery::{
    ClipDownloadReport, ClipRecoveryReport, MarkReport, PlaylistReport, Quality,
    SegmentValidation, VodRecoveryOutcome,
};

use crate::error::Result;

#[derive(Debug, Clone, Copy)]
enum Color {
    Green,
    Yellow,
    Blue,
    Cyan,
    Red,
}

/// Renders results either as JSON documents or as human readable text.
pub struct OutputManager {
    colored: bool,
    json: bool,
}

impl OutputManager {
    pub fn new(colored: bool, json: bool) -> Self {
        Self { colored, json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }

    fn field(&self, name: &str, value: &str, color: Color) -> String {
        format!(
            "  {}: {}\n",
            self.colorize(name, Color::Yellow, false),
            self.colorize(value, color, false)
        )
    }

    pub fn format_vod_outcome(
        &self,
        outcome: &VodRecoveryOutcome,
        quality: Option<Quality>,
    ) -> Result<String> {
        if self.json {
            return self.to_json(outcome);
        }

        let mut output = String::new();
        match outcome {
            VodRecoveryOutcome::Recovered(vod) => {
                output.push_str(&self.colorize("VOD recovered", Color::Green, true));
                output.push('\n');
                output.push_str(&self.field("Streamer", vod.identity.streamer_name(), Color::Cyan));
                output.push_str(&self.field("Video ID", vod.identity.video_id(), Color::Cyan));
                output.push_str(&self.field(
                    "Found",
                    &format!("{} of {} candidates", vod.candidates_found, vod.candidates_probed),
                    Color::Cyan,
                ));
                if let Some(q) = quality {
                    match vod.url_for(Some(q)) {
                        Some(url) => output.push_str(&self.field(q.as_str(), url, Color::Blue)),
                        None => output.push_str(&self.field(
                            q.as_str(),
                            "not available, showing every confirmed rendition",
                            Color::Red,
                        )),
                    }
                }
                if quality.is_none() || vod.url_for(quality).is_none() {
                    for confirmed in &vod.qualities {
                        output.push_str(&self.field(
                            confirmed.quality.as_str(),
                            &confirmed.url,
                            Color::Blue,
                        ));
                    }
                }
            }
            VodRecoveryOutcome::StaleBroadcast {
                age_days,
                retention_days,
            } => {
                output.push_str(&self.colorize("Broadcast is too old", Color::Red, true));
                output.push('\n');
                output.push_str(&format!(
                    "  The broadcast is {age_days} days old; the CDN keeps VODs for {retention_days} days.\n"
                ));
            }
            VodRecoveryOutcome::RecoveryExhausted {
                candidates_probed,
                alternates,
            } => {
                output.push_str(&self.colorize("No VOD found", Color::Red, true));
                output.push('\n');
                output.push_str(&format!(
                    "  None of the {candidates_probed} candidates exist. Try these pages instead:\n"
                ));
                for link in alternates {
                    output.push_str(&self.field(link.site, &link.url, Color::Blue));
                }
            }
        }
        Ok(output)
    }

    pub fn format_playlist_report(&self, report: &PlaylistReport) -> Result<String> {
        if self.json {
            return self.to_json(report);
        }
        let mut output = String::new();
        output.push_str(&self.colorize("Playlist", Color::Green, true));
        output.push('\n');
        output.push_str(&self.field(
            "Muted",
            if report.muted { "yes" } else { "no" },
            Color::Cyan,
        ));
        output.push_str(&self.field(
            "Duration",
            &format!("{} min", report.duration_minutes),
            Color::Cyan,
        ));
        if let Some(path) = &report.kept_at {
            output.push_str(&self.field("Unmuted playlist", &path.display().to_string(), Color::Blue));
        }
        if let Some((available, total)) = report.validation {
            output.push_str(&self.field(
                "Segments",
                &format!("{available} of {total} available"),
                if available == total { Color::Green } else { Color::Red },
            ));
        }
        Ok(output)
    }

    pub fn format_validation(&self, validation: &SegmentValidation) -> Result<String> {
        if self.json {
            return self.to_json(&serde_json::json!({
                "total": validation.total,
                "available": validation.available_count(),
                "complete": validation.is_complete(),
            }));
        }
        let color = if validation.is_complete() {
            Color::Green
        } else {
            Color::Red
        };
        Ok(format!(
            "{}\n",
            self.colorize(
                &format!(
                    "{} of {} segments available",
                    validation.available_count(),
                    validation.total
                ),
                color,
                true,
            )
        ))
    }

    pub fn format_mark_report(&self, report: &MarkReport) -> Result<String> {
        if self.json {
            return self.to_json(report);
        }
        let mut output = String::new();
        output.push_str(&self.colorize("Invalid segments marked", Color::Green, true));
        output.push('\n');
        output.push_str(&self.field("Playlist", &report.path.display().to_string(), Color::Blue));
        output.push_str(&self.field("Valid", &report.valid.to_string(), Color::Cyan));
        output.push_str(&self.field("Removed", &report.invalidated.to_string(), Color::Cyan));
        Ok(output)
    }

    pub fn format_clip_report(&self, report: &ClipRecoveryReport) -> Result<String> {
        if self.json {
            return self.to_json(report);
        }
        let mut output = String::new();
        let header = format!(
            "{} of {} clips found for {} ({})",
            report.found_count(),
            report.probed,
            report.streamer_name,
            report.video_id
        );
        let color = if report.found.is_empty() {
            Color::Red
        } else {
            Color::Green
        };
        output.push_str(&self.colorize(&header, color, true));
        output.push('\n');
        if let Some(path) = &report.log_path {
            output.push_str(&self.field("Log", &path.display().to_string(), Color::Blue));
        }
        Ok(output)
    }

    pub fn format_clip_sample(&self, urls: &[String]) -> Result<String> {
        if self.json {
            return self.to_json(urls);
        }
        if urls.is_empty() {
            return Ok(format!("{}\n", self.colorize("No clips found", Color::Red, true)));
        }
        let mut output = String::new();
        for url in urls {
            output.push_str(&self.colorize(url, Color::Blue, false));
            output.push('\n');
        }
        Ok(output)
    }

    pub fn format_download_report(&self, report: &ClipDownloadReport) -> Result<String> {
        if self.json {
            return self.to_json(report);
        }
        let mut output = String::new();
        output.push_str(&self.colorize(
            &format!("{} clips downloaded", report.downloaded.len()),
            Color::Green,
            true,
        ));
        output.push('\n');
        output.push_str(&self.field("Directory", &report.directory.display().to_string(), Color::Blue));
        for url in &report.failed {
            output.push_str(&self.field("Failed", url, Color::Red));
        }
        Ok(output)
    }

    pub fn format_downloaded_file(&self, path: &Path) -> Result<String> {
        if self.json {
            return self.to_json(&serde_json::json!({ "status": "ok", "path": path }));
        }
        Ok(format!(
            "{} {}\n",
            self.colorize("Saved", Color::Green, true),
            self.colorize(&path.display().to_string(), Color::Blue, false)
        ))
    }

    pub fn format_bulk_summary(&self, label: &str, succeeded: usize, total: usize) -> Result<String> {
        if self.json {
            return self.to_json(&serde_json::json!({
                "status": "done",
                "label": label,
                "succeeded": succeeded,
                "total": total,
            }));
        }
        Ok(format!(
            "{}\n",
            self.colorize(&format!("{label}: {succeeded} of {total}"), Color::Green, true)
        ))
    }

    /// Tracker duration well beyond the playlist means the broadcast was split in parts.
    pub fn format_split_warning(&self, channel_url: &str) -> String {
        format!(
            "{} the broadcast may be split into several VODs, check {}\n",
            self.colorize("Warning:", Color::Yellow, true),
            self.colorize(channel_url, Color::Blue, false)
        )
    }

    fn colorize(&self, text: &str, color: Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Blue => text.blue(),
                    Color::Cyan => text.cyan(),
                    Color::Red => text.red(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (color, bold, self.colored);
            text.to_string()
        }
    }
}
