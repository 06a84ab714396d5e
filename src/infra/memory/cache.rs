//! In-memory user cache with expiry and an outage switch.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::User;
use crate::errors::{AppError, AppResult};
use crate::infra::UserCache;

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<Uuid, (User, Instant)>>,
    unavailable: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails as if the cache were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Whether a live entry exists, ignoring the outage switch.
    pub async fn contains(&self, id: Uuid) -> bool {
        self.entries
            .lock()
            .await
            .get(&id)
            .is_some_and(|(_, expires_at)| *expires_at > Instant::now())
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.check()
    }

    fn check(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Cache("cache unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserCache for MemoryCache {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        self.check()?;
        let mut entries = self.entries.lock().await;
        match entries.get(&id) {
            Some((user, expires_at)) if *expires_at > Instant::now() => Ok(Some(user.clone())),
            Some(_) => {
                entries.remove(&id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn store(&self, user: &User, ttl: Duration) -> AppResult<()> {
        self.check()?;
        self.entries
            .lock()
            .await
            .insert(user.id, (user.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> AppResult<()> {
        self.check()?;
        self.entries.lock().await.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = MemoryCache::new();
        let user = User::new("ttl@example.com").unwrap();

        cache.store(&user, Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.find_by_id(user.id).await.unwrap(), Some(user.clone()));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.find_by_id(user.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_outage_fails_every_operation() {
        let cache = MemoryCache::new();
        let user = User::new("down@example.com").unwrap();
        cache.set_unavailable(true);

        assert!(cache.find_by_id(user.id).await.is_err());
        assert!(cache.store(&user, Duration::from_secs(1)).await.is_err());
        assert!(cache.remove(user.id).await.is_err());
    }
}
