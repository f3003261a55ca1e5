//! Generic CRUD execution: runs compiled pattern SQL against a `Store`.

use crate::config::CrudPattern;
use crate::context::RequestContext;
use crate::error::AppError;
use crate::handler::Handler;
use crate::pagination::{paginate, PageRequest, Pagination};
use crate::sql::{delete, insert, select_count, select_list, update};
use crate::store::Store;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Body of a list endpoint.
#[derive(Debug, Serialize)]
pub struct ListPage {
    pub pagination: Pagination,
    pub data: Vec<Value>,
}

pub struct CrudService;

impl CrudService {
    /// One page of rows plus pagination computed from a COUNT under the same filters.
    pub async fn list(store: &dyn Store, pattern: &CrudPattern, data: &Map<String, Value>) -> Result<ListPage, AppError> {
        let page = PageRequest::from_data(data, pattern.limit, pattern.max_limit)?;
        let count_q = select_count(pattern, data);
        let list_q = select_list(pattern, data, &page);
        let (count_rows, rows) = tokio::try_join!(
            store.query(&count_q.sql, &count_q.params),
            store.query(&list_q.sql, &list_q.params),
        )?;
        let total = count_rows
            .first()
            .and_then(|r| r.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok(ListPage {
            pagination: paginate(page.page, page.per_page, total)?,
            data: rows,
        })
    }

    /// Insert one row; the stored row comes back from `RETURNING` in the same statement.
    pub async fn create(store: &dyn Store, pattern: &CrudPattern, data: &Map<String, Value>) -> Result<Value, AppError> {
        let q = insert(pattern, data);
        store
            .query(&q.sql, &q.params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Unhandled(format!("insert into {} returned no row", pattern.table)))
    }

    /// Update one row by id. No matching row is NotFound.
    pub async fn update(
        store: &dyn Store,
        pattern: &CrudPattern,
        id: &Value,
        data: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        let q = update(pattern, id, data);
        store
            .query(&q.sql, &q.params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("{} {}", pattern.table, id)))
    }

    /// Delete one row by id. Zero affected rows is NotFound.
    pub async fn delete(store: &dyn Store, pattern: &CrudPattern, id: &Value) -> Result<Value, AppError> {
        let q = delete(pattern, id);
        let done = store.execute(&q.sql, &q.params).await?;
        if done.rows_affected == 0 {
            return Err(AppError::NotFound(format!("{} {}", pattern.table, id)));
        }
        Ok(Value::Object(Map::new()))
    }
}

fn id_param(ctx: &RequestContext) -> Result<Value, AppError> {
    ctx.param("id")
        .cloned()
        .ok_or_else(|| AppError::BadRequest("missing id path parameter".into()))
}

// Each generated handler owns the pattern it was registered with.

pub fn list_handler(pattern: Arc<CrudPattern>) -> impl Handler {
    move |ctx: RequestContext| {
        let pattern = Arc::clone(&pattern);
        async move {
            let store = Arc::clone(ctx.state().store()?);
            CrudService::list(store.as_ref(), &pattern, &ctx.data()).await
        }
    }
}

pub fn create_handler(pattern: Arc<CrudPattern>) -> impl Handler {
    move |ctx: RequestContext| {
        let pattern = Arc::clone(&pattern);
        async move {
            let store = Arc::clone(ctx.state().store()?);
            CrudService::create(store.as_ref(), &pattern, &ctx.payload()).await
        }
    }
}

pub fn update_handler(pattern: Arc<CrudPattern>) -> impl Handler {
    move |ctx: RequestContext| {
        let pattern = Arc::clone(&pattern);
        async move {
            let store = Arc::clone(ctx.state().store()?);
            let id = id_param(&ctx)?;
            CrudService::update(store.as_ref(), &pattern, &id, &ctx.payload()).await
        }
    }
}

pub fn delete_handler(pattern: Arc<CrudPattern>) -> impl Handler {
    move |ctx: RequestContext| {
        let pattern = Arc::clone(&pattern);
        async move {
            let store = Arc::clone(ctx.state().store()?);
            let id = id_param(&ctx)?;
            CrudService::delete(store.as_ref(), &pattern, &id).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ExecResult;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers COUNT queries with `total`, other queries with `rows`, and records every statement.
    #[derive(Default)]
    struct StubStore {
        total: u64,
        rows: Vec<Value>,
        affected: u64,
        seen: Mutex<Vec<(String, Vec<Value>)>>,
    }

    #[async_trait]
    impl Store for StubStore {
        async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, AppError> {
            self.seen.lock().unwrap().push((sql.to_string(), params.to_vec()));
            if sql.starts_with("SELECT COUNT(*)") {
                return Ok(vec![json!({ "total": self.total })]);
            }
            Ok(self.rows.clone())
        }

        async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, AppError> {
            self.seen.lock().unwrap().push((sql.to_string(), params.to_vec()));
            Ok(ExecResult { rows_affected: self.affected })
        }
    }

    fn pattern() -> CrudPattern {
        CrudPattern::new("products")
            .columns(["id", "name"])
            .creatable(["name", "price"])
            .updatable(["name"])
            .filters(["name"])
    }

    fn data(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn list_paginates_from_count() {
        let store = StubStore {
            total: 12,
            rows: vec![json!({ "id": 6 }), json!({ "id": 7 })],
            ..Default::default()
        };
        let page = CrudService::list(&store, &pattern(), &data(json!({ "page": "2", "per_page": "5" })))
            .await
            .unwrap();
        assert_eq!(page.pagination, paginate(2, 5, 12).unwrap());
        assert_eq!(page.data.len(), 2);
    }

    #[tokio::test]
    async fn list_rejects_zero_page_size() {
        let store = StubStore::default();
        let err = CrudService::list(&store, &pattern(), &data(json!({ "per_page": 0 }))).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_binds_only_allowed_columns() {
        let store = StubStore {
            rows: vec![json!({ "id": 1, "name": "x" })],
            ..Default::default()
        };
        let row = CrudService::create(&store, &pattern(), &data(json!({ "name": "x", "price": 1, "admin": true })))
            .await
            .unwrap();
        assert_eq!(row["id"], json!(1));
        let seen = store.seen.lock().unwrap();
        assert!(!seen[0].0.contains("admin"));
        assert_eq!(seen[0].1, vec![json!("x"), json!(1)]);
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let store = StubStore::default();
        let err = CrudService::update(&store, &pattern(), &json!(404), &data(json!({ "name": "y" })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_zero_rows_is_not_found() {
        let store = StubStore::default();
        let err = CrudService::delete(&store, &pattern(), &json!(404)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let store = StubStore { affected: 1, ..Default::default() };
        assert_eq!(CrudService::delete(&store, &pattern(), &json!(1)).await.unwrap(), json!({}));
    }
}
