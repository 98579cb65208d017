//! Predicate descriptors and the single renderer that turns them into SQL.
//!
//! Every user-supplied value becomes a positional parameter. The only text
//! spliced into statements comes from [`Column`] and fixed templates here.

use crate::db::store::Param;

use super::filters::{SearchFilter, TextQuery, DT_FORMAT};

/// Filterable segment columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    Station,
    State,
    Speaker,
    Dt,
}

impl Column {
    pub fn as_sql(self) -> &'static str {
        match self {
            Column::Id => "s.id",
            Column::Station => "s.station",
            Column::State => "s.state",
            Column::Speaker => "s.speaker",
            Column::Dt => "s.dt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bound {
    pub slot: usize,
    pub inclusive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// Segment text matches the FTS5 expression in `slot`.
    TextMatch { slot: usize },
    /// Column value is a member of the array in `slot`.
    SetMembership { column: Column, slot: usize },
    Range {
        column: Column,
        lower: Option<Bound>,
        upper: Option<Bound>,
    },
    Equality { column: Column, slot: usize },
}

impl Predicate {
    fn render(&self, out: &mut Vec<String>) {
        match *self {
            Predicate::TextMatch { slot } => out.push(format!(
                "s.id IN (SELECT rowid FROM segments_fts WHERE segments_fts MATCH ?{slot})"
            )),
            Predicate::SetMembership { column, slot } => {
                out.push(format!("{} IN rarray(?{slot})", column.as_sql()))
            }
            Predicate::Range {
                column,
                lower,
                upper,
            } => {
                if let Some(b) = lower {
                    let op = if b.inclusive { ">=" } else { ">" };
                    out.push(format!("{} {op} ?{}", column.as_sql(), b.slot));
                }
                if let Some(b) = upper {
                    let op = if b.inclusive { "<=" } else { "<" };
                    out.push(format!("{} {op} ?{}", column.as_sql(), b.slot));
                }
            }
            Predicate::Equality { column, slot } => {
                out.push(format!("{} = ?{slot}", column.as_sql()))
            }
        }
    }
}

/// Ordered predicates plus the parameters they reference.
///
/// Slots are claimed left to right and never renumbered, so any statement
/// shape that renders this plan first can append its own parameters after
/// [`QueryPlan::next_slot`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPlan {
    predicates: Vec<Predicate>,
    params: Vec<Param>,
    text_slot: Option<usize>,
}

impl QueryPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the WHERE predicates for a normalized filter.
    pub fn from_filter(filter: &SearchFilter) -> Self {
        let mut plan = QueryPlan::new();

        if let Some(text) = &filter.text {
            let slot = plan.bind(Param::Text(fts5_expression(text)));
            plan.text_slot = Some(slot);
            plan.predicates.push(Predicate::TextMatch { slot });
        }

        for (column, values) in [
            (Column::Station, &filter.stations),
            (Column::State, &filter.states),
            (Column::Speaker, &filter.speakers),
        ] {
            if !values.is_empty() {
                plan.is_in(column, values.clone());
            }
        }

        if let Some(range) = &filter.date_range {
            let start = Param::Text(range.start.format(DT_FORMAT).to_string());
            let end = Param::Text(range.end.format(DT_FORMAT).to_string());
            plan.range(Some((start, true)), Column::Dt, Some((end, true)));
        }

        plan
    }

    /// Claim the next slot for `param`.
    pub fn bind(&mut self, param: Param) -> usize {
        self.params.push(param);
        self.params.len()
    }

    pub fn is_in(&mut self, column: Column, values: Vec<String>) -> &mut Self {
        let slot = self.bind(Param::TextList(values));
        self.predicates.push(Predicate::SetMembership { column, slot });
        self
    }

    pub fn equals(&mut self, column: Column, value: Param) -> &mut Self {
        let slot = self.bind(value);
        self.predicates.push(Predicate::Equality { column, slot });
        self
    }

    /// Lower bound then upper bound, each `(value, inclusive)`.
    pub fn range(
        &mut self,
        lower: Option<(Param, bool)>,
        column: Column,
        upper: Option<(Param, bool)>,
    ) -> &mut Self {
        let lower = lower.map(|(p, inclusive)| Bound {
            slot: self.bind(p),
            inclusive,
        });
        let upper = upper.map(|(p, inclusive)| Bound {
            slot: self.bind(p),
            inclusive,
        });
        self.predicates.push(Predicate::Range {
            column,
            lower,
            upper,
        });
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Slot holding the FTS5 expression, when a text filter is active.
    pub fn text_slot(&self) -> Option<usize> {
        self.text_slot
    }

    /// First slot not used by the predicates.
    pub fn next_slot(&self) -> usize {
        self.params.len() + 1
    }

    /// `WHERE a AND b ...`, or an empty string when there are no predicates.
    pub fn where_clause(&self) -> String {
        let mut parts = Vec::with_capacity(self.predicates.len());
        for p in &self.predicates {
            p.render(&mut parts);
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", parts.join(" AND "))
        }
    }
}

/// FTS5 expression requiring every word: `"city" AND "council"`.
///
/// Words are quoted so punctuation inside them never reaches the FTS5 query
/// parser; a trailing `*` stays outside the quotes as a prefix marker.
pub fn fts5_expression(query: &TextQuery) -> String {
    query
        .words()
        .map(|word| {
            let (core, prefix) = match word.strip_suffix('*') {
                Some(core) => (core, "*"),
                None => (word, ""),
            };
            format!("\"{}\"{prefix}", core.replace('"', "\"\""))
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}
