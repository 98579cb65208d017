use serde::{Deserialize, Serialize};

use super::store::Row;
use crate::error::StoreError;

/// One stored transcript segment, as returned by context lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: i64,
    pub station: String,
    pub state: String,
    pub speaker: Option<String>,
    #[serde(rename = "datetime")]
    pub dt: String,
    pub text: String,
}

impl Segment {
    /// Column order: id, station, state, speaker, dt, text.
    pub const COLUMNS: &'static str = "s.id, s.station, s.state, s.speaker, s.dt, s.text";

    pub fn from_row(row: &Row) -> Result<Self, StoreError> {
        Ok(Segment {
            id: row.int(0)?,
            station: row.text(1)?,
            state: row.text(2)?,
            speaker: row.text_opt(3)?,
            dt: row.text(4)?,
            text: row.text(5)?,
        })
    }
}

/// Data needed to insert a new segment (id is assigned by the store).
#[derive(Debug, Clone)]
pub struct NewSegment {
    pub station: String,
    pub state: String,
    pub speaker: Option<String>,
    pub dt: String,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

/// Stats returned by `wavesearch stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub segments: i64,
    pub stations: i64,
    pub states: i64,
    pub speakers: i64,
    pub ingested_files: i64,
    pub first_dt: Option<String>,
    pub last_dt: Option<String>,
    pub by_station: Vec<StationCount>,
    pub db_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationCount {
    pub station: String,
    pub count: i64,
}
