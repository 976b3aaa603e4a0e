use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use super::select_text;
use crate::duration::parse_duration_minutes;
use crate::error::{Result, TrackerError};

const SITE: &str = "streamscharts";

pub static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?streamscharts\.com/channels/([^/?#]+)/streams/(\d+)")
        .unwrap()
});

/// `3 Feb 2024, 00:01` in the stream header; the page has no seconds.
pub fn parse_start(html: &str) -> Result<NaiveDateTime> {
    let text = select_text(SITE, html, "time.ml-2.font-bold", 0)?;
    let cleaned = format!("{}:00", text.replace(',', ""));
    NaiveDateTime::parse_from_str(&cleaned, "%d %b %Y %H:%M:%S")
        .map_err(|e| TrackerError::parse(SITE, format!("bad timestamp `{text}`: {e}")))
}

/// Fourth bold stat of the header block.
pub fn parse_duration(html: &str) -> Result<u64> {
    let text = select_text(SITE, html, "div.text-xs.font-bold", 3)?;
    parse_duration_minutes(&text)
        .ok_or_else(|| TrackerError::parse(SITE, format!("bad duration `{text}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <p>Started <time class="ml-2 font-bold">3 Feb 2024, 00:01</time></p>
          <div class="text-xs font-bold">12 345</div>
          <div class="text-xs font-bold">6 789</div>
          <div class="text-xs font-bold">Just Chatting</div>
          <div class="text-xs font-bold">5h 47m</div>
        </body></html>
    "#;

    #[test]
    fn parses_stream_page() {
        assert_eq!(
            parse_start(PAGE).unwrap().to_string(),
            "2024-02-03 00:01:00"
        );
        assert_eq!(parse_duration(PAGE).unwrap(), 347);
    }
}
