//! User cache port and its Redis implementation.
//!
//! The cache is a read-through accelerator only. A miss is `Ok(None)`;
//! an `Err` means the cache itself is unavailable, which callers treat as a
//! miss after logging.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::{Config, CACHE_PREFIX_USER};
use crate::domain::User;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Cache port for user aggregates.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserCache: Send + Sync {
    /// `Ok(None)` on a miss
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Store the user for `ttl`, replacing any previous entry
    async fn store(&self, user: &User, ttl: Duration) -> AppResult<()>;

    /// Evict the entry; evicting a missing key succeeds
    async fn remove(&self, id: Uuid) -> AppResult<()>;
}

/// Cache key for a user.
pub fn user_key(id: Uuid) -> String {
    format!("{}{}", CACHE_PREFIX_USER, id)
}

/// Redis cache wrapper with connection pooling.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis.
    pub async fn connect(config: &Config) -> AppResult<Self> {
        let client = Client::open(config.redis_url.as_str()).map_err(cache_error)?;
        let connection = ConnectionManager::new(client).await.map_err(cache_error)?;

        tracing::info!("Redis cache connected");

        Ok(Self { connection })
    }

    /// Get the connection manager for direct Redis operations.
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    // =========================================================================
    // Generic Cache Operations
    // =========================================================================

    /// Get a JSON value from cache.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await.map_err(cache_error)?;

        match value {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| {
                    AppError::Cache(format!("undecodable entry at {}: {}", key, e))
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Set a JSON value with a TTL.
    ///
    /// Redis rejects `EX 0`, so sub-second TTLs are rounded up to one second.
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::internal(format!("Cache serialization error: {}", e)))?;

        conn.set_ex::<_, _, ()>(key, json, ttl.as_secs().max(1))
            .await
            .map_err(cache_error)?;

        Ok(())
    }

    /// Delete a value from cache.
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await.map_err(cache_error)?;
        Ok(())
    }

    /// Round-trip a PING.
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(())
    }
}

#[async_trait]
impl UserCache for RedisCache {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        self.get(&user_key(id)).await
    }

    async fn store(&self, user: &User, ttl: Duration) -> AppResult<()> {
        self.set_with_ttl(&user_key(user.id), user, ttl).await
    }

    async fn remove(&self, id: Uuid) -> AppResult<()> {
        self.delete(&user_key(id)).await
    }
}

/// Convert Redis error to AppError.
fn cache_error(e: RedisError) -> AppError {
    AppError::Cache(e.to_string())
}
