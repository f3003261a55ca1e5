//! Relational store client: the `Store` seam plus its PostgreSQL implementation.

use crate::error::AppError;
use crate::sql::PgBindValue;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use sqlx::PgPool;

/// Outcome of a statement that returns no rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
}

/// Pooled relational store. Rows come back as JSON objects keyed by column name.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, AppError>;

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, AppError>;
}

/// `Store` over a sqlx PostgreSQL pool. Each call is one auto-committed statement.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    /// Lazily connecting pool: no connection is opened until the first statement.
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)?;
        Ok(PgStore { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %sql, params = ?params, "query");
        let query = bind_all(sql, params);
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, AppError> {
        tracing::debug!(sql = %sql, params = ?params, "execute");
        let query = bind_all(sql, params);
        let done = query.execute(&self.pool).await?;
        Ok(ExecResult {
            rows_affected: done.rows_affected(),
        })
    }
}

/// Parameter types follow the JSON kind of each value, so the same SQL text can be bound
/// with different types from one request to the next. Such statements are never cached.
fn bind_all<'q>(sql: &'q str, params: &[Value]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql).persistent(false);
    for p in params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    // Later columns of the same name win, so `*, "price"::text AS "price"` yields the text form.
    for (i, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), cell_to_value(row, i));
    }
    Value::Object(map)
}

/// Decode one cell by trying the common PostgreSQL types in turn; anything undecodable is null.
/// NUMERIC has no decoder here: patterns select it as text (see `sql::builder`).
fn cell_to_value(row: &sqlx::postgres::PgRow, idx: usize) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(idx) {
        if let Some(n) = serde_json::Number::from_f64(f64::from(n)) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(idx) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(idx) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(idx) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(idx) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(idx) {
        return j;
    }
    Value::Null
}
