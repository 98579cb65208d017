use serde::Serialize;

use crate::db::models::Segment;
use crate::db::store::{Param, Statement, Store};
use crate::error::{Result, SearchError, StoreError};

use super::predicate::{Column, QueryPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Before,
    After,
}

impl Direction {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "before" => Ok(Direction::Before),
            "after" => Ok(Direction::After),
            other => Err(SearchError::invalid(
                "direction",
                format!("expected \"before\" or \"after\", got {other:?}"),
            )),
        }
    }
}

/// The segment context is fetched around.
#[derive(Debug, Clone, Copy)]
pub struct Anchor<'a> {
    pub id: i64,
    pub station: &'a str,
}

/// Neighbor lookup by surrogate key. Search filters never apply here; the
/// only optional restriction is staying on the anchor's station.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextExpander {
    pub same_station: bool,
}

impl ContextExpander {
    pub fn new(same_station: bool) -> Self {
        ContextExpander { same_station }
    }

    /// Up to `count` segments strictly on one side of the anchor, in
    /// ascending id order. Fewer are returned near either end of the data.
    pub fn expand<S: Store + ?Sized>(
        &self,
        store: &S,
        anchor: Anchor<'_>,
        direction: Direction,
        count: u32,
    ) -> std::result::Result<Vec<Segment>, StoreError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let rows = store.query(&self.neighbors(anchor, direction, count))?;
        let mut segments = rows
            .iter()
            .map(Segment::from_row)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Nearest-first for `before`; flip back to chronological.
        if direction == Direction::Before {
            segments.reverse();
        }
        Ok(segments)
    }

    /// Fetch the anchor segment itself; `None` when the id no longer exists.
    pub fn resolve<S: Store + ?Sized>(
        &self,
        store: &S,
        id: i64,
    ) -> std::result::Result<Option<Segment>, StoreError> {
        let mut plan = QueryPlan::new();
        plan.equals(Column::Id, Param::Integer(id));
        let statement = Statement {
            sql: format!("SELECT {} FROM segments s {}", Segment::COLUMNS, plan.where_clause()),
            params: plan.params().to_vec(),
        };
        store
            .query(&statement)?
            .first()
            .map(Segment::from_row)
            .transpose()
    }

    pub fn neighbors(&self, anchor: Anchor<'_>, direction: Direction, count: u32) -> Statement {
        let mut plan = QueryPlan::new();
        let id = Param::Integer(anchor.id);
        let order = match direction {
            Direction::Before => {
                plan.range(None, Column::Id, Some((id, false)));
                "DESC"
            }
            Direction::After => {
                plan.range(Some((id, false)), Column::Id, None);
                "ASC"
            }
        };
        if self.same_station {
            plan.equals(Column::Station, Param::Text(anchor.station.to_string()));
        }

        let limit_slot = plan.next_slot();
        let mut params = plan.params().to_vec();
        params.push(Param::Integer(i64::from(count)));

        Statement {
            sql: format!(
                "SELECT {} FROM segments s {} ORDER BY s.id {order} LIMIT ?{limit_slot}",
                Segment::COLUMNS,
                plan.where_clause()
            ),
            params,
        }
    }
}
