//! Query-builder contract for the relational backend.
//!
//! Rows travel as JSON objects so the same engine can drive every resource
//! table without per-table structs. Implementations: `PostgrestDatabase`
//! (hosted), `PgDatabase` (direct Postgres) and `MemoryDatabase`.

use crate::storage::error::BackendError;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// A single database row.
pub type Row = serde_json::Map<String, JsonValue>;

/// Row filter. Multiple filters on a query are AND'd together.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, JsonValue),
    In(String, Vec<JsonValue>),
    /// Case-insensitive substring match against any of the columns (OR'd).
    AnyILike(Vec<String>, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    /// Columns to return. Empty means every column.
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    /// Inclusive row range `(from, to)`, zero based.
    pub range: Option<(u64, u64)>,
    /// Ask the backend for the exact number of rows matching `filters`
    /// (ignoring `range`).
    pub count: bool,
}

impl SelectQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.into()));
        self
    }

    pub fn is_in(mut self, column: impl Into<String>, values: Vec<JsonValue>) -> Self {
        self.filters.push(Filter::In(column.into(), values));
        self
    }

    pub fn any_ilike(mut self, columns: &[String], needle: impl Into<String>) -> Self {
        self.filters
            .push(Filter::AnyILike(columns.to_vec(), needle.into()));
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.range = Some((from, to));
        self
    }

    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectResult {
    pub rows: Vec<Row>,
    /// Present only when the query asked for a count.
    pub count: Option<u64>,
}

#[async_trait]
pub trait Database: Send + Sync {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<SelectResult, BackendError>;

    /// Inserts one row and returns it as stored (backend-assigned id and
    /// timestamps included).
    async fn insert(&self, table: &str, row: Row) -> Result<Row, BackendError>;

    /// Applies `patch` to every row matching `filters`; returns the updated rows.
    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Row,
    ) -> Result<Vec<Row>, BackendError>;

    /// Deletes every row matching `filters`; returns the deleted rows.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, BackendError>;
}

/// Renders a scalar JSON value the way it compares as text (`"abc"` -> `abc`,
/// `12` -> `12`, `true` -> `true`).
pub fn json_as_text(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// True when `filters` refuse to match everything. Mutations without a
/// filter are rejected by every implementation.
pub fn is_scoped(filters: &[Filter]) -> bool {
    !filters.is_empty()
}
