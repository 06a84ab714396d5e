//! Infrastructure layer - External systems integration
//!
//! This module handles all external system concerns:
//! - Database connections, migrations and repositories
//! - User cache (Redis)
//! - Message queue (Redis)
//! - In-memory stand-ins for all of the above
//! - Unit of Work for transaction management

pub mod cache;
pub mod db;
pub mod health;
pub mod memory;
pub mod queue;
pub mod repositories;
pub mod unit_of_work;

pub use cache::{RedisCache, UserCache};
pub use db::{Database, Migrator};
pub use health::HealthCheck;
pub use memory::{MemoryCache, MemoryDatabase, MemoryQueue, MemoryUnitOfWork};
pub use queue::{MessageQueue, RedisQueue};
pub use repositories::{MatchingRepository, MatchingStore, UserRepository, UserStore};
pub use unit_of_work::{
    Persistence, TransactionContext, Tx, TxFuture, TxMatchingRepository, TxUserRepository,
    UnitOfWork,
};

#[cfg(any(test, feature = "test-utils"))]
pub use cache::MockUserCache;
#[cfg(any(test, feature = "test-utils"))]
pub use queue::MockMessageQueue;
