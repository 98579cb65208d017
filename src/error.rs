//! Error types for the search engine and its store seam.

use thiserror::Error;

/// Failure raised by a [`Store`](crate::db::store::Store) implementation.
///
/// Carries full diagnostic detail. It is logged by the engine and never
/// handed to callers as-is.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {source}")]
    Query {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("unexpected value in column {column}: {detail}")]
    Decode { column: usize, detail: String },

    #[error("store session unavailable: {0}")]
    Unavailable(String),
}

/// Error returned by every engine operation.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Out-of-contract input, rejected before any store access.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The store failed. Details were logged; only the operation is reported.
    #[error("{operation} failed")]
    Store { operation: &'static str },
}

impl SearchError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SearchError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SearchError::Validation { .. })
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
