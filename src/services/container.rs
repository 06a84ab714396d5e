//! Service Container - Centralized service access.
//!
//! Wires the services to either the relational/Redis backends or the
//! in-memory ones, depending on configuration.

use std::sync::Arc;

use super::{
    HealthMonitor, HealthService, MatchingManager, MatchingService, UserManager, UserService,
    UserSettings,
};
use crate::config::{Config, StorageBackend};
use crate::errors::AppResult;
use crate::infra::{
    Database, HealthCheck, MemoryCache, MemoryDatabase, MemoryQueue, MemoryUnitOfWork,
    MessageQueue, Persistence, RedisCache, RedisQueue, UserCache,
};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Service container trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait ServiceContainer: Send + Sync {
    fn users(&self) -> Arc<dyn UserService>;

    fn matchings(&self) -> Arc<dyn MatchingService>;

    fn health(&self) -> Arc<dyn HealthService>;
}

/// Concrete implementation of ServiceContainer
#[derive(Clone)]
pub struct Services {
    user_service: Arc<dyn UserService>,
    matching_service: Arc<dyn MatchingService>,
    health_service: Arc<dyn HealthService>,
}

impl Services {
    pub fn new(
        user_service: Arc<dyn UserService>,
        matching_service: Arc<dyn MatchingService>,
        health_service: Arc<dyn HealthService>,
    ) -> Self {
        Self {
            user_service,
            matching_service,
            health_service,
        }
    }

    /// Connect to the configured backend and build every service.
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        match config.storage_backend {
            StorageBackend::Postgres => {
                let database = Database::connect(config).await?;
                let cache = RedisCache::connect(config).await?;
                let queue = RedisQueue::with_connection(
                    cache.connection(),
                    &config.deletion_queue_name,
                );
                Ok(Self::from_connections(database, cache, queue, config))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on exit");
                Ok(Self::in_memory(
                    MemoryDatabase::new(),
                    Arc::new(MemoryCache::new()),
                    Arc::new(MemoryQueue::new()),
                    config,
                ))
            }
        }
    }

    /// Build services over Postgres and Redis.
    pub fn from_connections(
        database: Database,
        cache: RedisCache,
        queue: RedisQueue,
        config: &Config,
    ) -> Self {
        let uow = Arc::new(Persistence::new(
            database.get_connection(),
            config.transaction_timeout,
        ));
        let cache = Arc::new(cache);
        let health = HealthMonitor::new(vec![
            ("database", Arc::new(database) as Arc<dyn HealthCheck>),
            ("cache", cache.clone() as Arc<dyn HealthCheck>),
        ]);

        Self::assemble(uow, cache, Arc::new(queue), health, config)
    }

    /// Build services over the in-memory backends.
    pub fn in_memory(
        database: Arc<MemoryDatabase>,
        cache: Arc<MemoryCache>,
        queue: Arc<MemoryQueue>,
        config: &Config,
    ) -> Self {
        let uow = Arc::new(MemoryUnitOfWork::new(
            database.clone(),
            config.transaction_timeout,
        ));
        let health = HealthMonitor::new(vec![
            ("database", database as Arc<dyn HealthCheck>),
            ("cache", cache.clone() as Arc<dyn HealthCheck>),
        ]);

        Self::assemble(uow, cache, queue, health, config)
    }

    fn assemble<U>(
        uow: Arc<U>,
        cache: Arc<dyn UserCache>,
        queue: Arc<dyn MessageQueue>,
        health: HealthMonitor,
        config: &Config,
    ) -> Self
    where
        U: crate::infra::UnitOfWork + 'static,
    {
        let user_service = Arc::new(UserManager::new(
            uow.clone(),
            cache,
            queue,
            UserSettings::from(config),
        ));
        let matching_service = Arc::new(MatchingManager::new(uow));

        Self {
            user_service,
            matching_service,
            health_service: Arc::new(health),
        }
    }
}

impl ServiceContainer for Services {
    fn users(&self) -> Arc<dyn UserService> {
        self.user_service.clone()
    }

    fn matchings(&self) -> Arc<dyn MatchingService> {
        self.matching_service.clone()
    }

    fn health(&self) -> Arc<dyn HealthService> {
        self.health_service.clone()
    }
}
