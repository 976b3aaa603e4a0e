//! Loose parsing of the date and duration strings tracker pages display.

use std::sync::LazyLock;

use regex::Regex;

static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(h(?:ou)?r?s?|m(?:in)?(?:ute)?s?)").unwrap()
});

static ORDINAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)\b").unwrap());

/// `"5h 30m"`, `"3 hours, 12 minutes"`, `"45 mins"` -> minutes.
///
/// Returns `None` when neither an hour nor a minute component is present.
pub fn parse_duration_minutes(text: &str) -> Option<u64> {
    let mut hours = None;
    let mut minutes = None;
    for caps in DURATION_REGEX.captures_iter(text) {
        let value: u64 = caps[1].parse().ok()?;
        if caps[2].to_ascii_lowercase().starts_with('h') {
            hours = Some(value);
        } else {
            minutes = Some(value);
        }
    }
    if hours.is_none() && minutes.is_none() {
        return None;
    }
    Some(hours.unwrap_or(0) * 60 + minutes.unwrap_or(0))
}

/// `"Saturday 3rd February 2024 00:01"` -> `"3 February 2024 00:01"`.
///
/// Drops a leading weekday and the ordinal suffix of the day so the rest can
/// be handed to a strict date parser.
pub fn normalize_long_date(text: &str) -> String {
    let text = text.trim().replace(',', "");
    let without_weekday = match text.split_once(' ') {
        Some((first, rest)) if first.chars().all(|c| c.is_ascii_alphabetic()) => rest,
        _ => text.as_str(),
    };
    ORDINAL_REGEX
        .replace(without_weekday.trim(), "$1")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration_minutes("5h 30m"), Some(330));
        assert_eq!(parse_duration_minutes("3 hours, 12 minutes"), Some(192));
        assert_eq!(parse_duration_minutes("45 mins"), Some(45));
        assert_eq!(parse_duration_minutes("2 hrs"), Some(120));
        assert_eq!(parse_duration_minutes("1 Hour"), Some(60));
        assert_eq!(parse_duration_minutes("n/a"), None);
    }

    #[test]
    fn long_dates() {
        assert_eq!(
            normalize_long_date("Saturday 3rd February 2024 00:01"),
            "3 February 2024 00:01"
        );
        assert_eq!(normalize_long_date("Monday 21st October 9:15pm"), "21 October 9:15pm");
        assert_eq!(normalize_long_date("12 March 2024 10:00"), "12 March 2024 10:00");
    }
}
