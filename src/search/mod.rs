pub mod context;
pub mod filters;
pub mod predicate;
pub mod query;

use serde::Serialize;
use tracing::{debug, error};

use crate::db::models::Segment;
use crate::db::store::{Row, Statement, Store};
use crate::error::{Result, SearchError, StoreError};
use crate::export::{self, ExportRequest, ExportRow};
use context::{Anchor, ContextExpander, Direction};
use filters::{Limits, RawFilters};
use predicate::QueryPlan;
use query::{Bucket, Shape};

/// One search hit. `rank` is present only when a text query was given;
/// higher is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentHit {
    pub id: i64,
    pub station: String,
    pub datetime: String,
    pub state: String,
    pub speaker: Option<String>,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<f64>,
}

impl SegmentHit {
    pub fn from_row(row: &Row) -> std::result::Result<Self, StoreError> {
        Ok(SegmentHit {
            id: row.int(0)?,
            station: row.text(1)?,
            datetime: row.text(2)?,
            state: row.text(3)?,
            speaker: row.text_opt(4)?,
            snippet: row.text(5)?,
            rank: row.real_opt(6)?,
        })
    }
}

/// One page of results plus the total for the whole filtered set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub count: i64,
    pub results: Vec<SegmentHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketCount {
    pub label: String,
    pub count: i64,
}

/// Known filter values, sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vocabularies {
    pub stations: Vec<String>,
    pub states: Vec<String>,
}

/// Request-scoped search engine over a [`Store`].
///
/// Every operation validates its input completely before the first store
/// call, and either returns its whole result or fails.
pub struct Engine<'s, S: Store + ?Sized> {
    store: &'s S,
    limits: Limits,
    expander: ContextExpander,
}

impl<'s, S: Store + ?Sized> Engine<'s, S> {
    pub fn new(store: &'s S, limits: Limits, expander: ContextExpander) -> Self {
        Engine {
            store,
            limits,
            expander,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Distinct station and state codes.
    pub fn vocabularies(&self) -> Result<Vocabularies> {
        let distinct = |column: &str| Statement {
            sql: format!("SELECT DISTINCT {column} FROM segments ORDER BY {column}"),
            params: Vec::new(),
        };
        Ok(Vocabularies {
            stations: self.fetch("filters", &distinct("station"), |r| r.text(0))?,
            states: self.fetch("filters", &distinct("state"), |r| r.text(0))?,
        })
    }

    /// Filtered, sorted, paginated search with the total match count.
    pub fn search(&self, raw: &RawFilters) -> Result<SearchPage> {
        let filter = raw.normalize(&self.limits)?;
        let plan = QueryPlan::from_filter(&filter);

        let count = self
            .fetch("search", &plan.compose(Shape::Count), |r| r.int(0))?
            .first()
            .copied()
            .unwrap_or(0);
        let results = self.fetch(
            "search",
            &plan.compose(Shape::Search {
                sort: filter.sort,
                page: filter.page,
            }),
            SegmentHit::from_row,
        )?;

        debug!(count, page = results.len(), "search complete");
        Ok(SearchPage { count, results })
    }

    /// Match counts per bucket, ordered by label.
    pub fn aggregate(&self, raw: &RawFilters, group_by: Option<&str>) -> Result<Vec<BucketCount>> {
        let filter = raw.normalize_unpaged()?;
        let plan = QueryPlan::from_filter(&filter);
        let bucket = Bucket::parse(group_by);

        self.fetch("aggregate", &plan.compose(Shape::Aggregate(bucket)), |r| {
            Ok(BucketCount {
                label: r.text_opt(0)?.unwrap_or_default(),
                count: r.int(1)?,
            })
        })
    }

    /// Segments adjacent to `id` on one side, chronological. An unknown
    /// anchor yields an empty list.
    ///
    /// The anchor is looked up first, even when context is not scoped to its
    /// station: that round trip is what tells a deleted anchor (empty result)
    /// apart from one at the edge of the data.
    pub fn context(&self, id: i64, direction: &str, count: Option<i64>) -> Result<Vec<Segment>> {
        let direction = Direction::parse(direction)?;
        let count = match count {
            None => self.limits.default_context,
            Some(n) if n >= 1 && n <= i64::from(self.limits.max_context) => n as u32,
            Some(n) => {
                return Err(SearchError::invalid(
                    "count",
                    format!("{n} is outside 1..={}", self.limits.max_context),
                ))
            }
        };

        let Some(anchor) = self
            .expander
            .resolve(self.store, id)
            .map_err(store_failure("context"))?
        else {
            debug!(id, "context anchor not found");
            return Ok(Vec::new());
        };

        self.expander
            .expand(
                self.store,
                Anchor {
                    id: anchor.id,
                    station: &anchor.station,
                },
                direction,
                count,
            )
            .map_err(store_failure("context"))
    }

    /// Full filtered result set in requested order, with context rows
    /// spliced around the anchors that asked for them.
    pub fn export_rows(&self, request: &ExportRequest) -> Result<Vec<ExportRow>> {
        let contexts = filters::parse_context_map(&request.context_requested, &self.limits)?;
        let filter = request.filters.normalize_unpaged()?;
        let plan = QueryPlan::from_filter(&filter);

        let hits = self.fetch(
            "export",
            &plan.compose(Shape::Search {
                sort: filter.sort,
                page: None,
            }),
            SegmentHit::from_row,
        )?;

        let rows = export::assemble(self.store, &self.expander, &hits, &contexts)
            .map_err(store_failure("export"))?;
        debug!(anchors = hits.len(), rows = rows.len(), "export assembled");
        Ok(rows)
    }

    fn fetch<T>(
        &self,
        operation: &'static str,
        statement: &Statement,
        decode: impl Fn(&Row) -> std::result::Result<T, StoreError>,
    ) -> Result<Vec<T>> {
        debug!(operation, sql = %statement.sql, params = statement.params.len(), "executing");
        let rows = self
            .store
            .query(statement)
            .map_err(store_failure(operation))?;
        rows.iter()
            .map(decode)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(store_failure(operation))
    }
}

/// Log the full store failure and reduce it to a detail-free error.
fn store_failure(operation: &'static str) -> impl Fn(StoreError) -> SearchError {
    move |err| {
        error!(operation, error = %err, detail = ?err, "store query failed");
        SearchError::Store { operation }
    }
}
