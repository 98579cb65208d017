use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::warn;

use crate::db::models::NewSegment;
use crate::search::filters::DT_FORMAT;

/// `<ST>_<STATION>_<YYYY>_<MM>_<DD>_<HH>_<MM>.json`
static FILE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]{2})_([A-Z0-9]+)_(\d{4})_(\d{2})_(\d{2})_(\d{2})_(\d{2})\.json$")
        .expect("file name pattern is valid")
});

/// Station metadata encoded in a broadcast file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastMeta {
    pub state: String,
    pub station: String,
    pub started_at: NaiveDateTime,
}

pub fn parse_file_name(name: &str) -> Result<BroadcastMeta> {
    let Some(caps) = FILE_NAME_RE.captures(name) else {
        bail!("Invalid file name (expected ST_STATION_YYYY_MM_DD_HH_MM.json): {name}");
    };
    let num = |i: usize| -> u32 { caps[i].parse().unwrap_or(u32::MAX) };

    let started_at = NaiveDate::from_ymd_opt(num(3) as i32, num(4), num(5))
        .and_then(|d| d.and_hms_opt(num(6), num(7), 0))
        .with_context(|| format!("Invalid broadcast date in file name: {name}"))?;

    Ok(BroadcastMeta {
        state: caps[1].to_string(),
        station: caps[2].to_string(),
        started_at,
    })
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BroadcastJson {
    Segments(Vec<JsonSegment>),
    Wrapped { segments: Vec<JsonSegment> },
}

#[derive(Debug, Deserialize)]
struct JsonSegment {
    start: Option<f64>,
    end: Option<f64>,
    text: Option<String>,
    speaker: Option<String>,
}

/// Segments parsed from one file, plus how many entries were unusable.
#[derive(Debug, Clone)]
pub struct ParsedBroadcast {
    pub segments: Vec<NewSegment>,
    pub skipped: usize,
}

/// Parse a broadcast JSON document: either a bare list of segments or
/// `{ "segments": [...] }`. Entries without `start`, `end` and non-blank
/// `text` are skipped.
pub fn parse_broadcast(content: &str, meta: &BroadcastMeta) -> Result<ParsedBroadcast> {
    let doc: BroadcastJson =
        serde_json::from_str(content).context("Failed to parse broadcast JSON")?;
    let raw = match doc {
        BroadcastJson::Segments(s) | BroadcastJson::Wrapped { segments: s } => s,
    };

    let mut segments = Vec::with_capacity(raw.len());
    let mut skipped = 0;

    for seg in raw {
        let (Some(start), Some(end), Some(text)) = (seg.start, seg.end, seg.text) else {
            skipped += 1;
            continue;
        };
        let text = clean_text(&text);
        if text.is_empty() || !start.is_finite() || !end.is_finite() {
            skipped += 1;
            continue;
        }

        let Some(dt) = TimeDelta::try_milliseconds((start.max(0.0) * 1000.0) as i64)
            .and_then(|offset| meta.started_at.checked_add_signed(offset))
        else {
            warn!(start, station = %meta.station, "segment offset out of range; skipped");
            skipped += 1;
            continue;
        };

        segments.push(NewSegment {
            station: meta.station.clone(),
            state: meta.state.clone(),
            speaker: seg
                .speaker
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            dt: dt.format(DT_FORMAT).to_string(),
            start_time: start,
            end_time: end,
            text,
        });
    }

    Ok(ParsedBroadcast { segments, skipped })
}

/// Collapse whitespace runs into single spaces.
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_carries_state_station_and_start() {
        let meta = parse_file_name("AZ_KAWC_2024_01_15_08_30.json").unwrap();
        assert_eq!(meta.state, "AZ");
        assert_eq!(meta.station, "KAWC");
        assert_eq!(meta.started_at.format(DT_FORMAT).to_string(), "2024-01-15 08:30:00");
    }

    #[test]
    fn bad_file_names_are_rejected() {
        assert!(parse_file_name("notes.json").is_err());
        assert!(parse_file_name("az_KAWC_2024_01_15_08_30.json").is_err());
        assert!(parse_file_name("AZ_KAWC_2024_13_15_08_30.json").is_err());
    }

    #[test]
    fn segments_are_cleaned_offset_and_filtered() {
        let meta = parse_file_name("AZ_KAWC_2024_01_15_08_30.json").unwrap();
        let parsed = parse_broadcast(
            r#"{"segments": [
                {"start": 0.0, "end": 4.2, "text": "  Good   morning\nArizona ", "speaker": " SPEAKER_00 "},
                {"start": 65.5, "end": 70.0, "text": "Weather next", "speaker": ""},
                {"start": 71.0, "text": "no end"},
                {"start": 80.0, "end": 81.0, "text": "   "}
            ]}"#,
            &meta,
        )
        .unwrap();

        assert_eq!(parsed.skipped, 2);
        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(parsed.segments[0].text, "Good morning Arizona");
        assert_eq!(parsed.segments[0].speaker.as_deref(), Some("SPEAKER_00"));
        assert_eq!(parsed.segments[0].dt, "2024-01-15 08:30:00");
        assert_eq!(parsed.segments[1].speaker, None);
        assert_eq!(parsed.segments[1].dt, "2024-01-15 08:31:05");
    }

    #[test]
    fn out_of_range_offsets_are_skipped() {
        let meta = parse_file_name("AZ_KAWC_2024_01_15_08_30.json").unwrap();
        let parsed = parse_broadcast(
            r#"[{"start": 1e15, "end": 2e15, "text": "far future"},
                {"start": 1e300, "end": 1e301, "text": "further"},
                {"start": 2.5, "end": 3.0, "text": "kept"}]"#,
            &meta,
        )
        .unwrap();

        assert_eq!(parsed.skipped, 2);
        assert_eq!(parsed.segments.len(), 1);
        assert_eq!(parsed.segments[0].dt, "2024-01-15 08:30:02");
    }

    #[test]
    fn bare_list_documents_are_accepted() {
        let meta = parse_file_name("NY_WBAI_2024_03_01_00_00.json").unwrap();
        let parsed =
            parse_broadcast(r#"[{"start": 1, "end": 2, "text": "hello"}]"#, &meta).unwrap();
        assert_eq!(parsed.segments.len(), 1);
        assert_eq!(parsed.segments[0].station, "WBAI");
    }
}
