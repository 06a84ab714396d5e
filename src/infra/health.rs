//! Connectivity probes for backing services.

use async_trait::async_trait;

use super::db::Database;
use super::memory::{MemoryCache, MemoryDatabase};
use super::RedisCache;
use crate::errors::{AppError, AppResult};

/// A dependency that can be pinged.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> AppResult<()>;
}

#[async_trait]
impl HealthCheck for Database {
    async fn ping(&self) -> AppResult<()> {
        Database::ping(self)
            .await
            .map_err(|e| AppError::store("ping database", e))
    }
}

#[async_trait]
impl HealthCheck for RedisCache {
    async fn ping(&self) -> AppResult<()> {
        RedisCache::ping(self).await
    }
}

#[async_trait]
impl HealthCheck for MemoryDatabase {
    async fn ping(&self) -> AppResult<()> {
        MemoryDatabase::ping(self).await
    }
}

#[async_trait]
impl HealthCheck for MemoryCache {
    async fn ping(&self) -> AppResult<()> {
        MemoryCache::ping(self).await
    }
}
