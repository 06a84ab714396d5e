//! In-memory backends.
//!
//! Drop-in replacements for Postgres and Redis, selected with
//! `STORAGE_BACKEND=memory`. Each one can be told to fail so tests can
//! exercise the failure paths of the services.

mod cache;
mod queue;
mod store;

pub use cache::MemoryCache;
pub use queue::MemoryQueue;
pub use store::{MemoryDatabase, MemoryMatchingStore, MemoryTx, MemoryUnitOfWork, MemoryUserStore};
