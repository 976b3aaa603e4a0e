use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use super::select_text;
use crate::duration::{normalize_long_date, parse_duration_minutes};
use crate::error::{Result, TrackerError};

const SITE: &str = "sullygnome";

const HEADER_VALUE: &str = "div.MiddleSubHeaderItemValue";

pub static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?sullygnome\.com/channel/([^/?#]+)/stream/(\d+)").unwrap()
});

/// `Saturday 3rd February 12:01am`; the page omits the year, so the
/// caller supplies it.
pub fn parse_start(html: &str, year: i32) -> Result<NaiveDateTime> {
    let text = select_text(SITE, html, HEADER_VALUE, 6)?;
    let dated = format!("{year} {}", normalize_long_date(&text));
    NaiveDateTime::parse_from_str(&dated, "%Y %d %B %I:%M%p")
        .map_err(|e| TrackerError::parse(SITE, format!("bad timestamp `{text}`: {e}")))
}

/// `5 hours, 47 minutes` in the eighth header value.
pub fn parse_duration(html: &str) -> Result<u64> {
    let text = select_text(SITE, html, HEADER_VALUE, 7)?;
    parse_duration_minutes(&text)
        .ok_or_else(|| TrackerError::parse(SITE, format!("bad duration `{text}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> String {
        let values = [
            "1,234", "567", "89", "10", "11", "12",
            "Saturday 3rd February 12:01am",
            "5 hours, 47 minutes",
        ];
        let divs: String = values
            .iter()
            .map(|v| format!(r#"<div class="MiddleSubHeaderItemValue">{v}</div>"#))
            .collect();
        format!("<html><body>{divs}</body></html>")
    }

    #[test]
    fn parses_stream_page() {
        let html = page();
        assert_eq!(
            parse_start(&html, 2024).unwrap().to_string(),
            "2024-02-03 00:01:00"
        );
        assert_eq!(parse_duration(&html).unwrap(), 347);
    }

    #[test]
    fn afternoon_times() {
        let html = page().replace("12:01am", "3:15pm");
        assert_eq!(
            parse_start(&html, 2024).unwrap().to_string(),
            "2024-02-03 15:15:00"
        );
    }
}
