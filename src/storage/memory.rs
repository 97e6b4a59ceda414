//! In-process backend: a `Database` and an `ObjectStorage` held in memory.
//!
//! Used for local development (`BACKEND=memory`) and as the test double for
//! the integration tests. Both support failure injection so the error paths
//! of the engine can be exercised deterministically.

use crate::storage::database::{
    is_scoped, json_as_text, Database, Filter, Order, Row, SelectQuery, SelectResult,
};
use crate::storage::error::BackendError;
use crate::storage::objects::{public_object_url, ObjectStorage};
use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryTables {
    tables: HashMap<String, Vec<Row>>,
    next_id: HashMap<String, i64>,
    last_stamp: Option<DateTime<Utc>>,
    failing: HashSet<String>,
    insert_calls: HashMap<String, usize>,
}

impl MemoryTables {
    /// Strictly increasing timestamps so creation order is total even when
    /// two rows land in the same clock tick.
    fn next_stamp(&mut self) -> String {
        let mut now = Utc::now();
        if let Some(last) = self.last_stamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_stamp = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn check(&self, table: &str) -> Result<(), BackendError> {
        if self.failing.contains(table) {
            return Err(BackendError::rejected(
                503,
                format!("simulated failure on table {}", table),
            ));
        }
        Ok(())
    }
}

/// Table-per-key in-memory database. Ids are assigned from a per-table
/// sequence and `created_at` / `updated_at` are set on write, like the hosted
/// backend does.
#[derive(Default)]
pub struct MemoryDatabase {
    inner: Mutex<MemoryTables>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation on `table` fail until switched off again.
    pub async fn fail_table(&self, table: &str, failing: bool) {
        let mut inner = self.inner.lock().await;
        if failing {
            inner.failing.insert(table.to_string());
        } else {
            inner.failing.remove(table);
        }
    }

    /// Snapshot of a table in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        let inner = self.inner.lock().await;
        inner.tables.get(table).cloned().unwrap_or_default()
    }

    /// Number of insert calls attempted against `table`, including failed ones.
    pub async fn insert_calls(&self, table: &str) -> usize {
        let inner = self.inner.lock().await;
        inner.insert_calls.get(table).copied().unwrap_or(0)
    }
}

fn cell<'a>(row: &'a Row, column: &str) -> Option<&'a JsonValue> {
    row.get(column).filter(|v| !v.is_null())
}

fn eq_matches(row: &Row, column: &str, value: &JsonValue) -> bool {
    match (cell(row, column), value) {
        (None, JsonValue::Null) => true,
        (Some(actual), expected) if !expected.is_null() => {
            json_as_text(actual) == json_as_text(expected)
        }
        _ => false,
    }
}

fn row_matches(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| match f {
        Filter::Eq(column, value) => eq_matches(row, column, value),
        Filter::In(column, values) => values.iter().any(|v| eq_matches(row, column, v)),
        Filter::AnyILike(columns, needle) => {
            let needle = needle.to_lowercase();
            columns.iter().any(|c| {
                cell(row, c)
                    .map(|v| json_as_text(v).to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
        }
    })
}

fn compare_cells(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(fx), Some(fy)) => fx.partial_cmp(&fy).unwrap_or(Ordering::Equal),
            _ => json_as_text(x).cmp(&json_as_text(y)),
        },
    }
}

fn sort_rows(rows: &mut [Row], order: &[Order]) {
    rows.sort_by(|a, b| {
        for o in order {
            let ord = compare_cells(cell(a, &o.column), cell(b, &o.column));
            let ord = if o.ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn project(row: Row, columns: &[String]) -> Row {
    if columns.is_empty() {
        return row;
    }
    columns
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(JsonValue::Null)))
        .collect()
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<SelectResult, BackendError> {
        let inner = self.inner.lock().await;
        inner.check(table)?;

        let mut rows: Vec<Row> = inner
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| row_matches(r, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let total = rows.len() as u64;

        sort_rows(&mut rows, &query.order);

        let rows: Vec<Row> = match query.range {
            Some((from, to)) if to >= from => rows
                .into_iter()
                .skip(from as usize)
                .take((to - from + 1) as usize)
                .collect(),
            Some(_) => Vec::new(),
            None => rows,
        };

        Ok(SelectResult {
            rows: rows.into_iter().map(|r| project(r, &query.columns)).collect(),
            count: query.count.then_some(total),
        })
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row, BackendError> {
        let mut inner = self.inner.lock().await;
        *inner.insert_calls.entry(table.to_string()).or_insert(0) += 1;
        inner.check(table)?;

        if cell(&row, "id").is_none() {
            let next = inner.next_id.entry(table.to_string()).or_insert(0);
            *next += 1;
            row.insert("id".to_string(), JsonValue::from(*next));
        }
        let stamp = inner.next_stamp();
        row.entry("created_at".to_string())
            .or_insert_with(|| JsonValue::from(stamp.clone()));
        row.insert("updated_at".to_string(), JsonValue::from(stamp));

        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Row,
    ) -> Result<Vec<Row>, BackendError> {
        if !is_scoped(filters) {
            return Err(BackendError::rejected(400, "UPDATE requires a WHERE clause"));
        }
        let mut inner = self.inner.lock().await;
        inner.check(table)?;
        let stamp = inner.next_stamp();

        let mut updated = Vec::new();
        if let Some(rows) = inner.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| row_matches(r, filters)) {
                for (k, v) in &patch {
                    row.insert(k.clone(), v.clone());
                }
                row.insert("updated_at".to_string(), JsonValue::from(stamp.clone()));
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, BackendError> {
        if !is_scoped(filters) {
            return Err(BackendError::rejected(400, "DELETE requires a WHERE clause"));
        }
        let mut inner = self.inner.lock().await;
        inner.check(table)?;

        let mut deleted = Vec::new();
        if let Some(rows) = inner.tables.get_mut(table) {
            let (gone, kept): (Vec<Row>, Vec<Row>) =
                rows.drain(..).partition(|r| row_matches(r, filters));
            *rows = kept;
            deleted = gone;
        }
        Ok(deleted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Default)]
struct ObjectState {
    objects: BTreeMap<String, StoredObject>,
    fail_uploads: bool,
    /// Successful uploads left before every further upload fails.
    uploads_left: Option<usize>,
    fail_removals: bool,
    fail_batch_removals: bool,
    remove_calls: Vec<Vec<String>>,
}

/// Single in-memory bucket.
pub struct MemoryObjectStorage {
    bucket: String,
    base_url: String,
    state: Mutex<ObjectState>,
}

impl MemoryObjectStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            base_url: "http://localhost:54321".to_string(),
            state: Mutex::new(ObjectState::default()),
        }
    }

    pub async fn fail_uploads(&self, failing: bool) {
        self.state.lock().await.fail_uploads = failing;
    }

    /// Lets `successes` more uploads through, then fails the rest.
    pub async fn fail_uploads_after(&self, successes: usize) {
        self.state.lock().await.uploads_left = Some(successes);
    }

    /// Every `remove` call fails.
    pub async fn fail_removals(&self, failing: bool) {
        self.state.lock().await.fail_removals = failing;
    }

    /// Only multi-path `remove` calls fail; single-path calls succeed.
    pub async fn fail_batch_removals(&self, failing: bool) {
        self.state.lock().await.fail_batch_removals = failing;
    }

    pub async fn object(&self, path: &str) -> Option<StoredObject> {
        self.state.lock().await.objects.get(path).cloned()
    }

    pub async fn paths(&self) -> Vec<String> {
        self.state.lock().await.objects.keys().cloned().collect()
    }

    /// Every path list handed to `remove`, in call order (failed calls included).
    pub async fn remove_calls(&self) -> Vec<Vec<String>> {
        self.state.lock().await.remove_calls.clone()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(
        &self,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        let exhausted = match state.uploads_left.as_mut() {
            Some(0) => true,
            Some(left) => {
                *left -= 1;
                false
            }
            None => false,
        };
        if state.fail_uploads || exhausted {
            return Err(BackendError::rejected(500, "simulated upload failure"));
        }
        if state.objects.contains_key(path) {
            return Err(BackendError::rejected(409, "The resource already exists"));
        }
        state.objects.insert(
            path.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                data,
            },
        );
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        public_object_url(&self.base_url, &self.bucket, path)
    }

    async fn remove(&self, paths: &[String]) -> Result<Vec<String>, BackendError> {
        let mut state = self.state.lock().await;
        state.remove_calls.push(paths.to_vec());
        if state.fail_removals || (state.fail_batch_removals && paths.len() > 1) {
            return Err(BackendError::rejected(500, "simulated removal failure"));
        }
        Ok(paths
            .iter()
            .filter(|p| state.objects.remove(p.as_str()).is_some())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: JsonValue) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn select_counts_before_range_and_orders_desc() {
        let db = MemoryDatabase::new();
        for t in ["a", "b", "c"] {
            db.insert("jobs", row(json!({ "title": t }))).await.unwrap();
        }
        let res = db
            .select(
                "jobs",
                &SelectQuery::all()
                    .order(Order::desc("created_at"))
                    .range(0, 1)
                    .with_count(),
            )
            .await
            .unwrap();
        assert_eq!(res.count, Some(3));
        let titles: Vec<_> = res.rows.iter().map(|r| r["title"].clone()).collect();
        assert_eq!(titles, vec![json!("c"), json!("b")]);
    }

    #[tokio::test]
    async fn ilike_matches_any_column_case_insensitively() {
        let db = MemoryDatabase::new();
        db.insert("staff", row(json!({ "name": "Asha", "designation": "PGT Maths" })))
            .await
            .unwrap();
        db.insert("staff", row(json!({ "name": "Ravi", "designation": "Clerk" })))
            .await
            .unwrap();
        let cols = vec!["name".to_string(), "designation".to_string()];
        let res = db
            .select("staff", &SelectQuery::all().any_ilike(&cols, "maths"))
            .await
            .unwrap();
        assert_eq!(res.rows.len(), 1);
        assert_eq!(res.rows[0]["name"], json!("Asha"));
    }

    #[tokio::test]
    async fn unscoped_delete_is_refused() {
        let db = MemoryDatabase::new();
        db.insert("jobs", row(json!({ "title": "x" }))).await.unwrap();
        assert!(db.delete("jobs", &[]).await.is_err());
        assert_eq!(db.rows("jobs").await.len(), 1);
    }

    #[tokio::test]
    async fn batch_removal_failure_can_be_isolated() {
        let storage = MemoryObjectStorage::new("AISPPUR");
        storage
            .upload("a/1_x.pdf", "application/pdf", Bytes::from_static(b"1"))
            .await
            .unwrap();
        storage.fail_batch_removals(true).await;
        let paths = vec!["a/1_x.pdf".to_string(), "a/2_y.pdf".to_string()];
        assert!(storage.remove(&paths).await.is_err());
        assert_eq!(
            storage.remove(&paths[..1]).await.unwrap(),
            vec!["a/1_x.pdf".to_string()]
        );
    }
}
