use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use super::select_text;
use crate::duration::parse_duration_minutes;
use crate::error::{Result, TrackerError};

const SITE: &str = "twitchtracker";

pub static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?twitchtracker\.com/([^/?#]+)/streams/(\d+)").unwrap()
});

/// The page prints the start in UTC as `YYYY-MM-DD HH:MM:SS`.
pub fn parse_start(html: &str) -> Result<NaiveDateTime> {
    let text = select_text(SITE, html, "div.stream-timestamp-dt", 0)?;
    NaiveDateTime::parse_from_str(&text, vod_recovery::identity::TIMESTAMP_FORMAT)
        .map_err(|e| TrackerError::parse(SITE, format!("bad timestamp `{text}`: {e}")))
}

/// First stat value on the page: plain minutes, or an `Xh Ym` string.
pub fn parse_duration(html: &str) -> Result<u64> {
    let text = select_text(SITE, html, "div.g-x-s-value", 0)?;
    text.parse::<u64>()
        .ok()
        .or_else(|| parse_duration_minutes(&text))
        .ok_or_else(|| TrackerError::parse(SITE, format!("bad duration `{text}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="stream-timestamp-dt">2024-02-03 00:01:31</div>
          <div class="g-x-s-block">
            <div class="g-x-s-value">347</div>
            <div class="g-x-s-label">Duration</div>
          </div>
          <div class="g-x-s-value">12,345</div>
        </body></html>
    "#;

    #[test]
    fn parses_stream_page() {
        assert_eq!(
            parse_start(PAGE).unwrap().to_string(),
            "2024-02-03 00:01:31"
        );
        assert_eq!(parse_duration(PAGE).unwrap(), 347);
    }

    #[test]
    fn missing_elements_are_parse_errors() {
        let err = parse_start("<html></html>").unwrap_err();
        assert!(matches!(err, TrackerError::Parse { site: "twitchtracker", .. }));
    }
}
