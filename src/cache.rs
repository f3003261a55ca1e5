//! Key-value cache client: the `Cache` seam plus its Redis implementation.

use crate::error::AppError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::sync::OnceCell;

#[async_trait]
pub trait Cache: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
}

/// `Cache` over a Redis server. One `ConnectionManager` is shared by all clones and
/// reconnects on its own after a dropped connection.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
    manager: Arc<OnceCell<ConnectionManager>>,
}

impl RedisCache {
    /// Validates the URL only; the connection is made on first use.
    pub fn open(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)?;
        Ok(RedisCache {
            client,
            manager: Arc::new(OnceCell::new()),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, AppError> {
        let manager = self
            .manager
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        tracing::debug!(key = %key, "cache get");
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        tracing::debug!(key = %key, "cache set");
        let mut conn = self.connection().await?;
        let _: () = conn.set(key, value).await?;
        Ok(())
    }
}
