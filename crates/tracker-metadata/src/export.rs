//! SullyGnome "stream stats" CSV exports, the input of bulk recovery.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};
use vod_recovery::storage::title_case;

use crate::duration::normalize_long_date;
use crate::error::{Result, TrackerError};

static EXPORT_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]{4,25} - Twitch stream stats").unwrap());

const DATE_FORMAT: &str = "%d %B %Y %H:%M";

/// One broadcast row of an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamRecord {
    pub start: NaiveDateTime,
    pub video_id: String,
    pub duration_minutes: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SullyGnomeExport {
    pub streamer_name: String,
    pub records: Vec<StreamRecord>,
}

/// Streamer name from an export file name as downloaded from SullyGnome.
pub fn streamer_from_export_name(path: &Path) -> Result<String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TrackerError::InvalidExport(format!("`{}` has no file name", path.display())))?;
    if !EXPORT_NAME_REGEX.is_match(file_name) {
        return Err(TrackerError::InvalidExport(format!(
            "`{file_name}` is not an original SullyGnome export name"
        )));
    }
    file_name
        .split_whitespace()
        .next()
        .map(str::to_lowercase)
        .ok_or_else(|| TrackerError::InvalidExport(file_name.to_string()))
}

/// Read an export whose name identifies the streamer.
pub async fn read_export(path: &Path) -> Result<SullyGnomeExport> {
    let streamer_name = streamer_from_export_name(path)?;
    read_export_as(path, &streamer_name).await
}

/// Read an export for an explicitly named streamer, e.g. a merged file.
pub async fn read_export_as(path: &Path, streamer_name: &str) -> Result<SullyGnomeExport> {
    let text = tokio::fs::read_to_string(path).await?;
    let records = parse_export(&text);
    debug!(path = %path.display(), records = records.len(), "Export parsed");
    Ok(SullyGnomeExport {
        streamer_name: streamer_name.trim().to_lowercase(),
        records,
    })
}

/// Rows that fail to parse are skipped, as are rows without a VOD.
pub fn parse_export(text: &str) -> Vec<StreamRecord> {
    text.lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields = split_csv_line(line);
            match parse_record(&fields) {
                Some(record) if record.video_id != "0" => Some(record),
                Some(_) => None,
                None => {
                    warn!(line, "Skipping unreadable export row");
                    None
                }
            }
        })
        .collect()
}

fn parse_record(fields: &[String]) -> Option<StreamRecord> {
    let date = fields.get(1)?;
    let start = NaiveDateTime::parse_from_str(&normalize_long_date(date), DATE_FORMAT).ok()?;

    let (_, after) = fields.get(2)?.split_once("stream/")?;
    let video_id: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
    if video_id.is_empty() {
        return None;
    }

    let duration_minutes = fields.get(3).and_then(|d| d.trim().parse().ok());
    Some(StreamRecord {
        start,
        video_id,
        duration_minutes,
    })
}

/// Split one CSV line, honoring double quotes and `""` escapes.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Concatenate every `.csv` export in `dir` into `{Streamer}_MERGED.csv`,
/// keeping the first header only.
pub async fn merge_exports(dir: &Path, streamer_name: &str) -> Result<PathBuf> {
    let output = dir.join(format!("{}_MERGED.csv", title_case(streamer_name)));

    let mut inputs = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "csv") && path != output {
            inputs.push(path);
        }
    }
    inputs.sort();
    if inputs.is_empty() {
        return Err(TrackerError::InvalidExport(format!(
            "no csv files in `{}`",
            dir.display()
        )));
    }

    let mut merged = String::new();
    let mut header_written = false;
    for path in &inputs {
        let text = tokio::fs::read_to_string(path).await?;
        let mut lines = text.lines();
        if let Some(header) = lines.next()
            && !header_written
        {
            merged.push_str(header);
            merged.push('\n');
            header_written = true;
        }
        for line in lines.filter(|l| !l.trim().is_empty()) {
            merged.push_str(line);
            merged.push('\n');
        }
    }

    tokio::fs::write(&output, merged).await?;
    debug!(files = inputs.len(), output = %output.display(), "Exports merged");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
\"Stream start time\",\"Stream start\",\"Stream link\",\"Stream length (mins)\"
\"1\",\"Saturday 3rd February 2024 00:01\",\"https://sullygnome.com/channel/camila/stream/43549753755\",\"347\"
\"2\",\"Thursday 1st February 2024 18:30\",\"https://sullygnome.com/channel/camila/stream/0\",\"60\"
\"3\",\"not a date\",\"https://sullygnome.com/channel/camila/stream/1\",\"60\"
\"4\",\"Tuesday 30th January 2024 21:05\",\"https://sullygnome.com/channel/camila/stream/43530000000\",\"\"
";

    #[test]
    fn splits_quoted_fields() {
        assert_eq!(
            split_csv_line(r#""a,b",c,"say ""hi""""#),
            vec!["a,b", "c", r#"say "hi""#]
        );
        assert_eq!(split_csv_line("x,,y\r"), vec!["x", "", "y"]);
    }

    #[test]
    fn parses_rows_and_skips_the_rest() {
        let records = parse_export(EXPORT);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].video_id, "43549753755");
        assert_eq!(records[0].start.to_string(), "2024-02-03 00:01:00");
        assert_eq!(records[0].duration_minutes, Some(347));
        assert_eq!(records[1].video_id, "43530000000");
        assert_eq!(records[1].duration_minutes, None);
    }

    #[test]
    fn export_names() {
        assert_eq!(
            streamer_from_export_name(Path::new(
                "/tmp/Camila - Twitch stream stats - SullyGnome.csv"
            ))
            .unwrap(),
            "camila"
        );
        assert!(streamer_from_export_name(Path::new("/tmp/streams.csv")).is_err());
    }

    #[tokio::test]
    async fn merges_with_a_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let header = "a,b,c,d\n";
        tokio::fs::write(dir.path().join("one.csv"), format!("{header}1,x,y,z\n"))
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("two.csv"), format!("{header}2,x,y,z\n"))
            .await
            .unwrap();

        let merged = merge_exports(dir.path(), "camila").await.unwrap();
        assert_eq!(merged, dir.path().join("Camila_MERGED.csv"));
        let text = tokio::fs::read_to_string(&merged).await.unwrap();
        assert_eq!(text, "a,b,c,d\n1,x,y,z\n2,x,y,z\n");

        // merging again ignores the previous output
        merge_exports(dir.path(), "camila").await.unwrap();
        let again = tokio::fs::read_to_string(&merged).await.unwrap();
        assert_eq!(again, text);
    }
}
