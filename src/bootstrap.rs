//! Schema setup: run the statements of a SQL file once, in order.

use crate::error::{AppError, ConfigError};
use crate::state::AppState;
use sqlx::ConnectOptions;
use std::str::FromStr;

/// Statements of a SQL script, split on `;`, trimmed, blanks dropped.
/// The split is naive: a `;` inside a string literal also ends a statement.
pub fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(';').map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Create the database if missing, then execute every statement of `config.sql`.
/// Stops at the first failing statement.
pub async fn setup_database(state: &AppState) -> Result<(), AppError> {
    let result = run_setup(state).await;
    match &result {
        Ok(count) => tracing::info!(statements = count, "All done!"),
        Err(e) => tracing::error!(error = %e, "database setup failed"),
    }
    result.map(|_| ())
}

async fn run_setup(state: &AppState) -> Result<usize, AppError> {
    let file = &state.config.sql;
    let sql = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", file, e)))?;
    if let Some(db) = &state.config.database {
        ensure_database_exists(&db.url).await?;
    }
    let store = state.store()?;
    let statements = split_statements(&sql);
    for (i, stmt) in statements.iter().enumerate() {
        tracing::info!(n = i + 1, total = statements.len(), "executing setup statement");
        store.execute(stmt, &[]).await?;
    }
    Ok(statements.len())
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| ConfigError::Validation(format!("invalid database url: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = url[scheme_end..]
        .find('/')
        .map(|i| scheme_end + i + 1)
        .ok_or_else(|| ConfigError::Validation("database url: no path".into()))?;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
