//! `Database` implementation talking to Postgres directly (self-hosted mode).
//!
//! Rows are read back with `row_to_json(t.*)` and written through
//! `jsonb_populate_record`, so column typing is left to the table definition
//! instead of per-column casts.

use crate::storage::database::{
    is_scoped, json_as_text, Database, Filter, Row, SelectQuery, SelectResult,
};
use crate::storage::error::BackendError;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Row as _};

pub struct PgDatabase {
    pool: PgPool,
}

pub fn validate_ident(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn ident(name: &str) -> Result<&str, BackendError> {
    if validate_ident(name) {
        Ok(name)
    } else {
        Err(BackendError::rejected(
            400,
            format!("invalid identifier '{}'", name),
        ))
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &[Filter]) -> Result<(), BackendError> {
    for (i, filter) in filters.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        match filter {
            Filter::Eq(column, value) => {
                qb.push("t.").push(ident(column)?);
                if value.is_null() {
                    qb.push(" IS NULL");
                } else {
                    qb.push("::text = ").push_bind(json_as_text(value));
                }
            }
            Filter::In(column, values) => {
                let values: Vec<String> = values.iter().map(json_as_text).collect();
                qb.push("t.")
                    .push(ident(column)?)
                    .push("::text = ANY(")
                    .push_bind(values)
                    .push(")");
            }
            Filter::AnyILike(columns, needle) => {
                if columns.is_empty() {
                    qb.push("FALSE");
                    continue;
                }
                let pattern = format!("%{}%", escape_like(needle));
                qb.push("(");
                for (j, column) in columns.iter().enumerate() {
                    if j > 0 {
                        qb.push(" OR ");
                    }
                    qb.push("t.")
                        .push(ident(column)?)
                        .push("::text ILIKE ")
                        .push_bind(pattern.clone());
                }
                qb.push(")");
            }
        }
    }
    Ok(())
}

fn records(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<Row>, BackendError> {
    rows.into_iter()
        .map(|r| {
            let record: JsonValue = r.try_get("record")?;
            match record {
                JsonValue::Object(map) => Ok(map),
                other => Err(BackendError::Decode(format!(
                    "expected a JSON object row, got {}",
                    other
                ))),
            }
        })
        .collect()
}

fn column_list(row: &Row) -> Result<String, BackendError> {
    let mut cols = Vec::with_capacity(row.len());
    for k in row.keys() {
        cols.push(ident(k)?);
    }
    Ok(cols.join(", "))
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds a pool without connecting; the first query opens connections.
    pub fn connect_lazy(database_url: &str) -> Result<Self, BackendError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), BackendError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<SelectResult, BackendError> {
        let table = ident(table)?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT row_to_json(t.*) AS record FROM ");
        qb.push(table).push(" AS t");
        push_filters(&mut qb, &query.filters)?;

        if !query.order.is_empty() {
            qb.push(" ORDER BY ");
            for (i, o) in query.order.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                qb.push("t.")
                    .push(ident(&o.column)?)
                    .push(if o.ascending { " ASC" } else { " DESC" });
            }
        }

        if let Some((from, to)) = query.range {
            let limit = if to >= from { to - from + 1 } else { 0 };
            qb.push(" LIMIT ")
                .push_bind(limit as i64)
                .push(" OFFSET ")
                .push_bind(from as i64);
        }

        let mut rows = records(qb.build().fetch_all(&self.pool).await?)?;
        if !query.columns.is_empty() {
            rows = rows
                .into_iter()
                .map(|r| {
                    query
                        .columns
                        .iter()
                        .map(|c| (c.clone(), r.get(c).cloned().unwrap_or(JsonValue::Null)))
                        .collect()
                })
                .collect();
        }

        let count = if query.count {
            let mut cq: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) AS n FROM ");
            cq.push(table).push(" AS t");
            push_filters(&mut cq, &query.filters)?;
            let row = cq.build().fetch_one(&self.pool).await?;
            let n: i64 = row.try_get("n")?;
            Some(n.max(0) as u64)
        } else {
            None
        };

        Ok(SelectResult { rows, count })
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, BackendError> {
        let table = ident(table)?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO ");
        qb.push(table).push(" AS t");
        if row.is_empty() {
            qb.push(" DEFAULT VALUES");
        } else {
            let cols = column_list(&row)?;
            qb.push(" (")
                .push(&cols)
                .push(") SELECT ")
                .push(&cols)
                .push(" FROM jsonb_populate_record(NULL::")
                .push(table)
                .push(", ")
                .push_bind(JsonValue::Object(row))
                .push(")");
        }
        qb.push(" RETURNING row_to_json(t.*) AS record");

        let rows = records(qb.build().fetch_all(&self.pool).await?)?;
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
        if patch.is_empty() {
            return self
                .select(
                    table,
                    &SelectQuery {
                        filters: filters.to_vec(),
                        ..SelectQuery::default()
                    },
                )
                .await
                .map(|r| r.rows);
        }
        let table = ident(table)?;
        let cols = column_list(&patch)?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE ");
        qb.push(table)
            .push(" AS t SET (")
            .push(&cols)
            .push(") = (SELECT ")
            .push(&cols)
            .push(" FROM jsonb_populate_record(NULL::")
            .push(table)
            .push(", ")
            .push_bind(JsonValue::Object(patch))
            .push("))");
        push_filters(&mut qb, filters)?;
        qb.push(" RETURNING row_to_json(t.*) AS record");

        records(qb.build().fetch_all(&self.pool).await?)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, BackendError> {
        if !is_scoped(filters) {
            return Err(BackendError::rejected(400, "DELETE requires a WHERE clause"));
        }
        let table = ident(table)?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("DELETE FROM ");
        qb.push(table).push(" AS t");
        push_filters(&mut qb, filters)?;
        qb.push(" RETURNING row_to_json(t.*) AS record");

        records(qb.build().fetch_all(&self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_restricted() {
        assert!(validate_ident("latest_updates"));
        assert!(validate_ident("_x1"));
        assert!(!validate_ident("1abc"));
        assert!(!validate_ident("jobs; drop table jobs"));
        assert!(!validate_ident(""));
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
