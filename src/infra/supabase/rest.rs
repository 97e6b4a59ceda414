//! `Database` over the hosted REST interface (PostgREST query syntax).

use crate::infra::supabase::{check, SupabaseClient};
use crate::storage::database::{
    is_scoped, json_as_text, Database, Filter, Row, SelectQuery, SelectResult,
};
use crate::storage::error::BackendError;
use async_trait::async_trait;
use reqwest::header::CONTENT_RANGE;
use reqwest::{Method, StatusCode};
use serde_json::Value as JsonValue;
use tracing::debug;

pub struct PostgrestDatabase {
    client: SupabaseClient,
}

impl PostgrestDatabase {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn path(table: &str) -> String {
        format!("/rest/v1/{}", table)
    }
}

/// Quotes a value for use inside `in.(...)` / `or=(...)` lists.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Query-string pairs for a filter list.
pub(crate) fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| match f {
            Filter::Eq(column, JsonValue::Null) => (column.clone(), "is.null".to_string()),
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", json_as_text(value))),
            Filter::In(column, values) => {
                let list: Vec<String> = values.iter().map(|v| quote(&json_as_text(v))).collect();
                (column.clone(), format!("in.({})", list.join(",")))
            }
            Filter::AnyILike(columns, needle) => {
                let pattern = quote(&format!("*{}*", needle));
                let terms: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{}.ilike.{}", c, pattern))
                    .collect();
                ("or".to_string(), format!("({})", terms.join(",")))
            }
        })
        .collect()
}

/// Total from a `Content-Range` header (`0-9/42`, `*/0`).
pub(crate) fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

fn into_rows(value: JsonValue) -> Result<Vec<Row>, BackendError> {
    match value {
        JsonValue::Array(items) => items
            .into_iter()
            .map(|item| match item {
                JsonValue::Object(map) => Ok(map),
                other => Err(BackendError::Decode(format!("expected row object, got {}", other))),
            })
            .collect(),
        other => Err(BackendError::Decode(format!("expected row array, got {}", other))),
    }
}

#[async_trait]
impl Database for PostgrestDatabase {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<SelectResult, BackendError> {
        if query
            .filters
            .iter()
            .any(|f| matches!(f, Filter::AnyILike(cols, _) if cols.is_empty()))
        {
            return Ok(SelectResult {
                rows: Vec::new(),
                count: query.count.then_some(0),
            });
        }

        let mut params: Vec<(String, String)> = vec![(
            "select".to_string(),
            if query.columns.is_empty() {
                "*".to_string()
            } else {
                query.columns.join(",")
            },
        )];
        params.extend(filter_params(&query.filters));
        if !query.order.is_empty() {
            let order: Vec<String> = query
                .order
                .iter()
                .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
                .collect();
            params.push(("order".to_string(), order.join(",")));
        }

        let mut req = self
            .client
            .data_request(Method::GET, &Self::path(table))
            .query(&params);
        if let Some((from, to)) = query.range {
            req = req
                .header("Range-Unit", "items")
                .header("Range", format!("{}-{}", from, to));
        }
        if query.count {
            req = req.header("Prefer", "count=exact");
        }

        let resp = req.send().await?;
        let total = resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);

        // Asking for a page past the end is not an error for the caller.
        if resp.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            debug!(table = %table, "requested range is past the last row");
            return Ok(SelectResult {
                rows: Vec::new(),
                count: query.count.then(|| total.unwrap_or(0)),
            });
        }

        let resp = check(resp).await?;
        let rows = into_rows(resp.json().await?)?;
        let count = if query.count {
            Some(total.unwrap_or(rows.len() as u64))
        } else {
            None
        };
        Ok(SelectResult { rows, count })
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, BackendError> {
        let resp = self
            .client
            .data_request(Method::POST, &Self::path(table))
            .header("Prefer", "return=representation")
            .json(&vec![JsonValue::Object(row)])
            .send()
            .await?;
        let rows = into_rows(check(resp).await?.json().await?)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode("insert returned no row".to_string()))
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
        let resp = self
            .client
            .data_request(Method::PATCH, &Self::path(table))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation")
            .json(&JsonValue::Object(patch))
            .send()
            .await?;
        into_rows(check(resp).await?.json().await?)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, BackendError> {
        if !is_scoped(filters) {
            return Err(BackendError::rejected(400, "DELETE requires a WHERE clause"));
        }
        let resp = self
            .client
            .data_request(Method::DELETE, &Self::path(table))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        into_rows(check(resp).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_syntax() {
        let params = filter_params(&[
            Filter::Eq("job_id".into(), json!(7)),
            Filter::Eq("deleted_at".into(), JsonValue::Null),
            Filter::In("id".into(), vec![json!("1"), json!("2")]),
            Filter::AnyILike(vec!["title".into(), "subject".into()], "math".into()),
        ]);
        assert_eq!(params[0], ("job_id".into(), "eq.7".into()));
        assert_eq!(params[1], ("deleted_at".into(), "is.null".into()));
        assert_eq!(params[2], ("id".into(), "in.(\"1\",\"2\")".into()));
        assert_eq!(
            params[3],
            ("or".into(), "(title.ilike.\"*math*\",subject.ilike.\"*math*\")".into())
        );
    }

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range("0-9/42"), Some(42));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-9/*"), None);
    }
}
