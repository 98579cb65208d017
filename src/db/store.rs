use rusqlite::types::{ToSql, ToSqlOutput, Value};
use std::rc::Rc;
use std::sync::MutexGuard;
use tracing::debug;

use crate::error::StoreError;

/// A positional statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    /// Bound as one array value, consumed by `rarray(?n)`.
    TextList(Vec<String>),
    Integer(i64),
}

impl ToSql for Param {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Param::Text(s) => s.to_sql(),
            Param::Integer(n) => n.to_sql(),
            Param::TextList(items) => {
                let values: Vec<Value> = items.iter().cloned().map(Value::from).collect();
                Ok(ToSqlOutput::Array(Rc::new(values)))
            }
        }
    }
}

/// A complete statement: SQL with `?N` placeholders and the values for them.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
}

/// One result row, columns in select-list order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row(pub Vec<Value>);

impl Row {
    fn value(&self, column: usize) -> Result<&Value, StoreError> {
        self.0.get(column).ok_or_else(|| StoreError::Decode {
            column,
            detail: format!("row has only {} columns", self.0.len()),
        })
    }

    pub fn int(&self, column: usize) -> Result<i64, StoreError> {
        match self.value(column)? {
            Value::Integer(n) => Ok(*n),
            other => Err(mismatch(column, "integer", other)),
        }
    }

    pub fn text(&self, column: usize) -> Result<String, StoreError> {
        match self.value(column)? {
            Value::Text(s) => Ok(s.clone()),
            other => Err(mismatch(column, "text", other)),
        }
    }

    pub fn text_opt(&self, column: usize) -> Result<Option<String>, StoreError> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            other => Err(mismatch(column, "text", other)),
        }
    }

    pub fn real_opt(&self, column: usize) -> Result<Option<f64>, StoreError> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Real(f) => Ok(Some(*f)),
            Value::Integer(n) => Ok(Some(*n as f64)),
            other => Err(mismatch(column, "real", other)),
        }
    }
}

fn mismatch(column: usize, expected: &str, got: &Value) -> StoreError {
    StoreError::Decode {
        column,
        detail: format!("expected {expected}, got {:?}", got.data_type()),
    }
}

/// Parameterized query execution. The only way the engine reaches the data.
pub trait Store {
    fn query(&self, statement: &Statement) -> Result<Vec<Row>, StoreError>;
}

/// Exclusive use of the database connection for the span of one request.
///
/// Obtained from [`Database::session`](super::Database::session); the
/// connection is released when the session is dropped, on every exit path.
pub struct Session<'db> {
    conn: MutexGuard<'db, rusqlite::Connection>,
}

impl<'db> Session<'db> {
    pub(super) fn new(conn: MutexGuard<'db, rusqlite::Connection>) -> Self {
        debug!("store session acquired");
        Session { conn }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        debug!("store session released");
    }
}

impl Store for Session<'_> {
    fn query(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        let wrap = |source: rusqlite::Error| StoreError::Query {
            statement: statement.sql.clone(),
            source,
        };

        let mut stmt = self.conn.prepare(&statement.sql).map_err(wrap)?;
        let columns = stmt.column_count();
        let mut rows = stmt
            .query(rusqlite::params_from_iter(statement.params.iter()))
            .map_err(wrap)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().map_err(wrap)? {
            let mut values = Vec::with_capacity(columns);
            for i in 0..columns {
                values.push(row.get::<_, Value>(i).map_err(wrap)?);
            }
            results.push(Row(values));
        }
        Ok(results)
    }
}
