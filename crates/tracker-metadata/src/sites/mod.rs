//! Per-site page parsers.
//!
//! Each site module exposes its URL pattern plus pure functions from page
//! HTML to values, so page structure never leaks past this module.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;

use crate::error::{Result, TrackerError};

pub mod streamscharts;
pub mod sullygnome;
pub mod twitchtracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerSite {
    TwitchTracker,
    StreamsCharts,
    SullyGnome,
}

impl TrackerSite {
    pub const ALL: [TrackerSite; 3] = [
        TrackerSite::TwitchTracker,
        TrackerSite::StreamsCharts,
        TrackerSite::SullyGnome,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::TwitchTracker => "twitchtracker",
            Self::StreamsCharts => "streamscharts",
            Self::SullyGnome => "sullygnome",
        }
    }

    fn url_regex(&self) -> &'static LazyLock<Regex> {
        match self {
            Self::TwitchTracker => &twitchtracker::URL_REGEX,
            Self::StreamsCharts => &streamscharts::URL_REGEX,
            Self::SullyGnome => &sullygnome::URL_REGEX,
        }
    }

    /// Start of the broadcast shown on a page of this site.
    pub fn parse_start(&self, html: &str, current_year: i32) -> Result<NaiveDateTime> {
        match self {
            Self::TwitchTracker => twitchtracker::parse_start(html),
            Self::StreamsCharts => streamscharts::parse_start(html),
            Self::SullyGnome => sullygnome::parse_start(html, current_year),
        }
    }

    /// Broadcast length in minutes shown on a page of this site.
    pub fn parse_duration(&self, html: &str) -> Result<u64> {
        match self {
            Self::TwitchTracker => twitchtracker::parse_duration(html),
            Self::StreamsCharts => streamscharts::parse_duration(html),
            Self::SullyGnome => sullygnome::parse_duration(html),
        }
    }
}

impl fmt::Display for TrackerSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A recognized tracker page for one broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerUrl {
    pub site: TrackerSite,
    pub streamer_name: String,
    pub video_id: String,
    pub url: String,
}

impl TrackerUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        for site in TrackerSite::ALL {
            if let Some(caps) = site.url_regex().captures(url) {
                return Ok(Self {
                    site,
                    streamer_name: caps[1].to_lowercase(),
                    video_id: caps[2].to_string(),
                    url: url.to_string(),
                });
            }
        }
        Err(TrackerError::UnsupportedUrl(url.to_string()))
    }
}

/// Trimmed text of the `index`-th element matching `selector`.
pub(crate) fn select_text(
    site: &'static str,
    html: &str,
    selector: &str,
    index: usize,
) -> Result<String> {
    let selector = Selector::parse(selector)
        .map_err(|e| TrackerError::parse(site, format!("invalid selector `{selector}`: {e:?}")))?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .nth(index)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .ok_or_else(|| TrackerError::parse(site, "expected element not found on page"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_every_site() {
        let tt = TrackerUrl::parse("https://twitchtracker.com/Camila/streams/43549753755").unwrap();
        assert_eq!(tt.site, TrackerSite::TwitchTracker);
        assert_eq!(tt.streamer_name, "camila");
        assert_eq!(tt.video_id, "43549753755");

        let sc = TrackerUrl::parse("https://streamscharts.com/channels/camila/streams/43549753755")
            .unwrap();
        assert_eq!(sc.site, TrackerSite::StreamsCharts);

        let sg = TrackerUrl::parse("https://sullygnome.com/channel/some_streamer/stream/42").unwrap();
        assert_eq!(sg.site, TrackerSite::SullyGnome);
        assert_eq!(sg.streamer_name, "some_streamer");
        assert_eq!(sg.video_id, "42");
    }

    #[test]
    fn rejects_other_pages() {
        assert!(matches!(
            TrackerUrl::parse("https://twitch.tv/camila"),
            Err(TrackerError::UnsupportedUrl(_))
        ));
        assert!(TrackerUrl::parse("https://twitchtracker.com/camila/streams/").is_err());
    }
}
