use std::future::Future;

use anyhow::{Context, Result};
use sqlx::{Connection, PgConnection};

/// Values offered by the dropdowns of a generated template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupData {
    pub projects: Vec<String>,
    pub tasks: Vec<String>,
    pub categories: Vec<String>,
    pub units: Vec<String>,
}

/// A single named column of a table, restricted to rows not flagged as deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnQuery {
    pub table: String,
    pub column: String,
}

impl ColumnQuery {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn sql(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE is_deleted = false;",
            self.column, self.table
        )
    }
}

pub fn project_query() -> ColumnQuery {
    ColumnQuery::new("projects", "project_code")
}

pub fn task_query() -> ColumnQuery {
    ColumnQuery::new("tasks", "task_name")
}

pub fn category_query() -> ColumnQuery {
    ColumnQuery::new("categories", "category")
}

pub fn unit_query() -> ColumnQuery {
    ColumnQuery::new("units", "unit_name")
}

/// Read-only source of lookup values.
pub trait LookupStore: Send + Sync + 'static {
    fn fetch_lookups(&self) -> impl Future<Output = Result<LookupData>> + Send;

    fn fetch_column(&self, query: &ColumnQuery) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Postgres-backed store. Every call opens its own connection and closes it
/// before returning, whether the queries succeeded or not.
#[derive(Debug, Clone)]
pub struct PgLookupStore {
    database_url: String,
}

impl PgLookupStore {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    async fn connect(&self) -> Result<PgConnection> {
        PgConnection::connect(&self.database_url)
            .await
            .context("connect postgres")
    }
}

async fn close(conn: PgConnection) {
    if let Err(err) = conn.close().await {
        tracing::warn!(error = %err, "failed to close postgres connection");
    }
}

async fn fetch_column_on(conn: &mut PgConnection, query: &ColumnQuery) -> Result<Vec<String>> {
    let sql = query.sql();
    let rows = sqlx::query_scalar::<sqlx::Postgres, Option<String>>(&sql)
        .fetch_all(&mut *conn)
        .await
        .with_context(|| format!("query {}.{}", query.table, query.column))?;
    Ok(rows.into_iter().flatten().collect())
}

async fn fetch_lookups_on(conn: &mut PgConnection) -> Result<LookupData> {
    Ok(LookupData {
        projects: fetch_column_on(conn, &project_query()).await?,
        tasks: fetch_column_on(conn, &task_query()).await?,
        categories: fetch_column_on(conn, &category_query()).await?,
        units: fetch_column_on(conn, &unit_query()).await?,
    })
}

impl LookupStore for PgLookupStore {
    async fn fetch_lookups(&self) -> Result<LookupData> {
        let mut conn = self.connect().await?;
        let result = fetch_lookups_on(&mut conn).await;
        close(conn).await;
        result
    }

    async fn fetch_column(&self, query: &ColumnQuery) -> Result<Vec<String>> {
        let mut conn = self.connect().await?;
        let result = fetch_column_on(&mut conn, query).await;
        close(conn).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_queries_skip_deleted_rows() {
        assert_eq!(
            project_query().sql(),
            "SELECT project_code FROM projects WHERE is_deleted = false;"
        );
        assert_eq!(
            task_query().sql(),
            "SELECT task_name FROM tasks WHERE is_deleted = false;"
        );
        assert_eq!(
            category_query().sql(),
            "SELECT category FROM categories WHERE is_deleted = false;"
        );
        assert_eq!(
            unit_query().sql(),
            "SELECT unit_name FROM units WHERE is_deleted = false;"
        );
    }
}
