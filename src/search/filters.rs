use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::error::{Result, SearchError};

/// Storage format for `dt`, and for range parameters compared against it.
pub const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}'._-]+\*?$").expect("word pattern is valid"));

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]").expect("token pattern is valid"));

/// Paging and context bounds. Loaded from the `[search]`/`[context]` config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub default_limit: i64,
    pub max_limit: i64,
    pub default_context: u32,
    pub max_context: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            default_limit: 50,
            max_limit: 100,
            default_context: 5,
            max_context: 20,
        }
    }
}

/// A filter field that may arrive as a list, a single value, or `A|B`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MultiValue {
    Many(Vec<String>),
    One(String),
}

/// A numeric field that may arrive as a number or as a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Untrusted filter input, exactly as received from the command line or a
/// JSON export body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFilters {
    pub q: Option<String>,
    pub station: Option<MultiValue>,
    pub state: Option<MultiValue>,
    pub speaker: Option<MultiValue>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<Scalar>,
    pub offset: Option<Scalar>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Case-insensitive `asc`/`desc`; anything else is `Desc`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.trim().eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

/// Comma-separated clauses, each a list of words. Every word is a conjunct.
///
/// Words without a letter or digit (a lone `-` or `.`) carry no index token
/// and are dropped rather than ANDed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
    pub clauses: Vec<Vec<String>>,
}

impl TextQuery {
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let mut clauses = Vec::new();
        for term in raw.split(',') {
            let mut words = Vec::new();
            for word in term.split_whitespace() {
                if !WORD_RE.is_match(word) {
                    return Err(SearchError::invalid(
                        "q",
                        format!("unsupported characters in search term {word:?}"),
                    ));
                }
                if TOKEN_RE.is_match(word) {
                    words.push(word.to_string());
                }
            }
            if !words.is_empty() {
                clauses.push(words);
            }
        }
        Ok(if clauses.is_empty() {
            None
        } else {
            Some(TextQuery { clauses })
        })
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.clauses.iter().flatten().map(String::as_str)
    }
}

/// Inclusive `[start, end]` bounds on `dt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    /// Both bounds are required; a lone bound yields no range.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>> {
        fn present(s: Option<&str>) -> Option<&str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }
        let (Some(start), Some(end)) = (present(start), present(end)) else {
            return Ok(None);
        };

        let start = parse_bound(start, false)
            .ok_or_else(|| SearchError::invalid("startDate", format!("unrecognized date {start:?}")))?;
        let end = parse_bound(end, true)
            .ok_or_else(|| SearchError::invalid("endDate", format!("unrecognized date {end:?}")))?;

        if start > end {
            return Err(SearchError::invalid("startDate", "startDate is after endDate"));
        }
        Ok(Some(DateRange { start, end }))
    }
}

fn parse_bound(s: &str, end_of_day: bool) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)?
    } else {
        NaiveTime::MIN
    };
    Some(date.and_time(time))
}

/// Typed, validated filters for one request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchFilter {
    pub text: Option<TextQuery>,
    pub stations: Vec<String>,
    pub states: Vec<String>,
    pub speakers: Vec<String>,
    pub date_range: Option<DateRange>,
    pub sort: SortDirection,
    pub page: Option<Page>,
}

impl SearchFilter {
    pub fn is_unfiltered(&self) -> bool {
        self.text.is_none()
            && self.stations.is_empty()
            && self.states.is_empty()
            && self.speakers.is_empty()
            && self.date_range.is_none()
    }
}

impl RawFilters {
    /// Validate and type the filters, with pagination.
    pub fn normalize(&self, limits: &Limits) -> Result<SearchFilter> {
        let mut filter = self.normalize_unpaged()?;
        filter.page = Some(Page {
            limit: parse_int(self.limit.as_ref())
                .filter(|n| *n > 0)
                .unwrap_or(limits.default_limit)
                .min(limits.max_limit),
            offset: parse_int(self.offset.as_ref())
                .filter(|n| *n >= 0)
                .unwrap_or(0),
        });
        Ok(filter)
    }

    /// Validate and type the filters; `limit`/`offset` are ignored.
    pub fn normalize_unpaged(&self) -> Result<SearchFilter> {
        Ok(SearchFilter {
            text: match self.q.as_deref() {
                Some(q) => TextQuery::parse(q)?,
                None => None,
            },
            stations: multi_values(self.station.as_ref()),
            states: multi_values(self.state.as_ref()),
            speakers: multi_values(self.speaker.as_ref()),
            date_range: DateRange::parse(self.start_date.as_deref(), self.end_date.as_deref())?,
            sort: SortDirection::parse(self.sort.as_deref()),
            page: None,
        })
    }
}

fn multi_values(raw: Option<&MultiValue>) -> Vec<String> {
    let pieces: Vec<&str> = match raw {
        None => Vec::new(),
        Some(MultiValue::One(s)) => s.split('|').collect(),
        Some(MultiValue::Many(items)) => items.iter().flat_map(|s| s.split('|')).collect(),
    };

    let mut values: Vec<String> = Vec::new();
    for piece in pieces.into_iter().map(str::trim).filter(|p| !p.is_empty()) {
        if !values.iter().any(|v| v == piece) {
            values.push(piece.to_string());
        }
    }
    values
}

fn parse_int(raw: Option<&Scalar>) -> Option<i64> {
    match raw? {
        Scalar::Int(n) => Some(*n),
        Scalar::Float(f) if f.is_finite() => Some(f.trunc() as i64),
        Scalar::Float(_) => None,
        Scalar::Text(s) => s.trim().parse().ok(),
    }
}

/// Requested context around one export anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextRequest {
    pub before: u32,
    pub after: u32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CountSpec {
    Count(i64),
    Flag(bool),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawContextRequest {
    before: Option<CountSpec>,
    after: Option<CountSpec>,
}

/// Parse an export context map `{ "<id>": { "before": n, "after": n } }`.
///
/// `true` asks for the default count, `false` for none.
pub fn parse_context_map(
    raw: &serde_json::Value,
    limits: &Limits,
) -> Result<BTreeMap<i64, ContextRequest>> {
    if raw.is_null() {
        return Ok(BTreeMap::new());
    }

    let entries: BTreeMap<String, RawContextRequest> = serde_json::from_value(raw.clone())
        .map_err(|e| {
            SearchError::invalid(
                "contextRequested",
                format!("expected an object of id -> {{before, after}}: {e}"),
            )
        })?;

    let mut map = BTreeMap::new();
    for (key, entry) in entries {
        let id: i64 = key.trim().parse().map_err(|_| {
            SearchError::invalid("contextRequested", format!("segment id {key:?} is not an integer"))
        })?;
        let request = ContextRequest {
            before: context_count(entry.before.as_ref(), limits)?,
            after: context_count(entry.after.as_ref(), limits)?,
        };
        map.insert(id, request);
    }
    Ok(map)
}

fn context_count(spec: Option<&CountSpec>, limits: &Limits) -> Result<u32> {
    match spec {
        None | Some(CountSpec::Flag(false)) => Ok(0),
        Some(CountSpec::Flag(true)) => Ok(limits.default_context),
        Some(CountSpec::Count(n)) => {
            if *n < 0 || *n > i64::from(limits.max_context) {
                Err(SearchError::invalid(
                    "contextRequested",
                    format!("context count {n} is outside 0..={}", limits.max_context),
                ))
            } else {
                Ok(*n as u32)
            }
        }
    }
}
