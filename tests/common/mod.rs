//! Shared wiring for integration tests: services over the in-memory backends.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use matching_api::config::{Config, StorageBackend};
use matching_api::infra::{MemoryCache, MemoryDatabase, MemoryQueue};
use matching_api::services::Services;

pub struct TestApp {
    pub db: Arc<MemoryDatabase>,
    pub cache: Arc<MemoryCache>,
    pub queue: Arc<MemoryQueue>,
    pub services: Services,
    pub config: Config,
}

pub fn test_config() -> Config {
    Config {
        storage_backend: StorageBackend::Memory,
        cache_ttl: Duration::from_secs(3600),
        visibility_timeout: Duration::from_secs(30),
        transaction_timeout: Duration::from_secs(5),
        deletion_batch_size: 10,
        deletion_poll_interval: Duration::from_millis(1000),
        ..Config::default()
    }
}

pub fn test_app() -> TestApp {
    let config = test_config();
    let db = MemoryDatabase::new();
    let cache = Arc::new(MemoryCache::new());
    let queue = Arc::new(MemoryQueue::new());
    let services = Services::in_memory(db.clone(), cache.clone(), queue.clone(), &config);

    TestApp {
        db,
        cache,
        queue,
        services,
        config,
    }
}
