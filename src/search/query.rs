use crate::db::store::{Param, Statement};

use super::filters::{Page, SortDirection};
use super::predicate::QueryPlan;

/// Grouping key for aggregate counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bucket {
    #[default]
    Date,
    /// ISO 8601 week, labelled `YYYY-WW`.
    Week,
    Month,
    Station,
}

impl Bucket {
    /// Unknown or missing selectors fall back to `Date`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("week") => Bucket::Week,
            Some("month") => Bucket::Month,
            Some("station") => Bucket::Station,
            _ => Bucket::Date,
        }
    }

    fn label_sql(self) -> &'static str {
        match self {
            Bucket::Date => "date(s.dt)",
            Bucket::Week => "strftime('%G-%V', s.dt)",
            Bucket::Month => "strftime('%Y-%m', s.dt)",
            Bucket::Station => "s.station",
        }
    }
}

/// Statement shape rendered from a [`QueryPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Rows with rank, ordered by `dt` then `id`; paged when `page` is set.
    Search {
        sort: SortDirection,
        page: Option<Page>,
    },
    Count,
    Aggregate(Bucket),
}

/// Select list for [`Shape::Search`]: id, station, dt, state, speaker, text, rank.
const SEARCH_COLUMNS: &str = "s.id, s.station, s.dt, s.state, s.speaker, s.text";

impl QueryPlan {
    /// Render a complete statement. The plan is only read; every shape
    /// shares the same WHERE clause and parameter prefix.
    pub fn compose(&self, shape: Shape) -> Statement {
        let where_clause = self.where_clause();
        let mut params = self.params().to_vec();

        let sql = match shape {
            Shape::Search { sort, page } => {
                let rank = match self.text_slot() {
                    Some(slot) => format!(
                        "(SELECT -bm25(segments_fts) FROM segments_fts \
                         WHERE segments_fts MATCH ?{slot} AND segments_fts.rowid = s.id)"
                    ),
                    None => "NULL".to_string(),
                };
                let mut parts = vec![
                    format!("SELECT {SEARCH_COLUMNS}, {rank} AS rank FROM segments s"),
                    where_clause,
                    format!("ORDER BY s.dt {}, s.id ASC", sort.as_sql()),
                ];
                if let Some(page) = page {
                    let limit_slot = self.next_slot();
                    parts.push(format!("LIMIT ?{} OFFSET ?{}", limit_slot, limit_slot + 1));
                    params.push(Param::Integer(page.limit));
                    params.push(Param::Integer(page.offset));
                }
                join_parts(parts)
            }
            Shape::Count => join_parts(vec!["SELECT COUNT(*) FROM segments s".into(), where_clause]),
            Shape::Aggregate(bucket) => join_parts(vec![
                format!(
                    "SELECT {} AS label, COUNT(*) AS count FROM segments s",
                    bucket.label_sql()
                ),
                where_clause,
                "GROUP BY label ORDER BY label ASC".into(),
            ]),
        };

        Statement { sql, params }
    }
}

fn join_parts(parts: Vec<String>) -> String {
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
