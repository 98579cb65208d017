//! Export assembly: main rows interleaved with their requested context.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::models::Segment;
use crate::db::store::Store;
use crate::error::StoreError;
use crate::search::context::{Anchor, ContextExpander, Direction};
use crate::search::filters::{ContextRequest, RawFilters};
use crate::search::SegmentHit;

/// Fixed export column set, in order.
pub const EXPORT_COLUMNS: [&str; 7] = ["id", "type", "station", "datetime", "state", "speaker", "snippet"];

/// Export request body: `{ "filters": {...}, "contextRequested": {...} }`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(default)]
    pub filters: RawFilters,
    /// Validated lazily so a malformed map is reported as a validation error.
    #[serde(default)]
    pub context_requested: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Before,
    Main,
    After,
}

/// One export line. Field order matches [`EXPORT_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: RowKind,
    pub station: String,
    pub datetime: String,
    pub state: String,
    pub speaker: Option<String>,
    pub snippet: String,
}

impl ExportRow {
    fn main(hit: &SegmentHit) -> Self {
        ExportRow {
            id: hit.id,
            kind: RowKind::Main,
            station: hit.station.clone(),
            datetime: hit.datetime.clone(),
            state: hit.state.clone(),
            speaker: hit.speaker.clone(),
            snippet: hit.snippet.clone(),
        }
    }

    fn context(seg: Segment, kind: RowKind) -> Self {
        ExportRow {
            id: seg.id,
            kind,
            station: seg.station,
            datetime: seg.dt,
            state: seg.state,
            speaker: seg.speaker,
            snippet: seg.text,
        }
    }
}

/// For each hit, in order: its `before` rows, the hit, its `after` rows.
///
/// Context ids that are not in `hits` are ignored.
pub fn assemble<S: Store + ?Sized>(
    store: &S,
    expander: &ContextExpander,
    hits: &[SegmentHit],
    contexts: &BTreeMap<i64, ContextRequest>,
) -> Result<Vec<ExportRow>, StoreError> {
    let mut rows = Vec::with_capacity(hits.len());

    for hit in hits {
        let request = contexts.get(&hit.id).copied().unwrap_or_default();
        let anchor = Anchor {
            id: hit.id,
            station: &hit.station,
        };

        let before = expander.expand(store, anchor, Direction::Before, request.before)?;
        let after = expander.expand(store, anchor, Direction::After, request.after)?;

        rows.extend(before.into_iter().map(|s| ExportRow::context(s, RowKind::Before)));
        rows.push(ExportRow::main(hit));
        rows.extend(after.into_iter().map(|s| ExportRow::context(s, RowKind::After)));
    }

    Ok(rows)
}
