//! User service - cache-aside CRUD and the asynchronous deletion pipeline.
//!
//! Writes go through the Unit of Work; the cache is populated or evicted only
//! after a successful commit and never decides the outcome of an operation.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::{
    Config, MAX_RECEIVE_BATCH_SIZE, MESSAGE_TYPE_ATTRIBUTE, MESSAGE_TYPE_USER_DELETION,
};
use crate::domain::{validate_email, Message, User};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::{MessageQueue, UnitOfWork, UserCache};
use crate::with_transaction;

/// User service trait for dependency injection.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Validate and persist a new user
    async fn create(&self, email: String) -> AppResult<User>;

    /// Cache first, then the store
    async fn get(&self, id: Uuid) -> AppResult<User>;

    /// Page straight from the store
    async fn list(&self, limit: u64, offset: u64) -> AppResult<Vec<User>>;

    /// Replace the email of an existing user
    async fn update(&self, id: Uuid, email: String) -> AppResult<User>;

    /// Remove an existing user
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Queue the user for asynchronous deletion and return the message ID.
    ///
    /// Does not check that the user exists.
    async fn enqueue_deletion(&self, id: Uuid) -> AppResult<Uuid>;

    /// Process one batch of deletion requests, returning how many were
    /// deleted and acknowledged.
    async fn dequeue_and_delete(&self, batch_size: i64) -> AppResult<usize>;
}

/// Tunables for [`UserManager`].
#[derive(Debug, Clone, Copy)]
pub struct UserSettings {
    /// Lifetime of entries written after create and update
    pub cache_ttl: Duration,
    /// Lifetime of entries refilled by `get` after a miss
    pub cache_fill_ttl: Duration,
    pub visibility_timeout: Duration,
}

impl From<&Config> for UserSettings {
    fn from(config: &Config) -> Self {
        Self {
            cache_ttl: config.cache_ttl,
            cache_fill_ttl: config.cache_fill_ttl,
            visibility_timeout: config.visibility_timeout,
        }
    }
}

/// Clamp a requested batch size to what one receive may return.
pub fn clamp_batch_size(requested: i64) -> usize {
    requested.clamp(1, MAX_RECEIVE_BATCH_SIZE as i64) as usize
}

/// Concrete implementation of UserService using Unit of Work.
pub struct UserManager<U: UnitOfWork> {
    uow: Arc<U>,
    cache: Arc<dyn UserCache>,
    queue: Arc<dyn MessageQueue>,
    settings: UserSettings,
}

impl<U: UnitOfWork> UserManager<U> {
    pub fn new(
        uow: Arc<U>,
        cache: Arc<dyn UserCache>,
        queue: Arc<dyn MessageQueue>,
        settings: UserSettings,
    ) -> Self {
        Self {
            uow,
            cache,
            queue,
            settings,
        }
    }

    async fn cache_store(&self, user: &User, ttl: Duration) {
        if let Err(e) = self.cache.store(user, ttl).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to cache user");
        }
    }

    async fn cache_evict(&self, id: Uuid) {
        if let Err(e) = self.cache.remove(id).await {
            tracing::warn!(user_id = %id, error = %e, "Failed to evict cached user");
        }
    }

    /// Delete and acknowledge one deletion message.
    async fn process_deletion(&self, message: &Message) -> AppResult<Uuid> {
        let id: Uuid = serde_json::from_str(&message.body).map_err(|e| {
            AppError::invalid_argument(format!("undecodable deletion request: {}", e))
        })?;

        let removed = with_transaction!(self.uow, |ctx| ctx.users().remove(id).await)?;
        if removed.is_none() {
            tracing::debug!(user_id = %id, "User already absent");
        }

        self.cache_evict(id).await;
        self.queue.delete(message).await?;
        Ok(id)
    }
}

#[async_trait]
impl<U: UnitOfWork> UserService for UserManager<U> {
    async fn create(&self, email: String) -> AppResult<User> {
        let user = User::new(email)?;

        let user = with_transaction!(self.uow, |ctx| ctx.users().save(&user).await)?;

        tracing::info!(user_id = %user.id, "User created");
        self.cache_store(&user, self.settings.cache_ttl).await;
        Ok(user)
    }

    async fn get(&self, id: Uuid) -> AppResult<User> {
        match self.cache.find_by_id(id).await {
            Ok(Some(user)) => return Ok(user),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(user_id = %id, error = %e, "Cache lookup failed, reading store");
            }
        }

        let user = self
            .uow
            .users()
            .find_by_id(None, id)
            .await?
            .ok_or_not_found("user")?;

        // A delete committing between the read above and this write leaves a
        // stale entry behind; the shorter fill TTL bounds how long it lives.
        self.cache_store(&user, self.settings.cache_fill_ttl).await;
        Ok(user)
    }

    async fn list(&self, limit: u64, offset: u64) -> AppResult<Vec<User>> {
        self.uow.users().find_all(None, limit, offset).await
    }

    async fn update(&self, id: Uuid, email: String) -> AppResult<User> {
        validate_email(email.trim())?;

        let user = with_transaction!(self.uow, |ctx| {
            let users = ctx.users();
            let mut user = users.find_by_id(id).await?.ok_or_not_found("user")?;
            user.change_email(email)?;
            users.update(&user).await
        })?;

        tracing::info!(user_id = %user.id, "User updated");
        self.cache_store(&user, self.settings.cache_ttl).await;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        with_transaction!(self.uow, |ctx| {
            ctx.users().remove(id).await?.ok_or_not_found("user")
        })?;

        tracing::info!(user_id = %id, "User deleted");
        self.cache_evict(id).await;
        Ok(())
    }

    async fn enqueue_deletion(&self, id: Uuid) -> AppResult<Uuid> {
        let body = serde_json::to_string(&id)
            .map_err(|e| AppError::internal(format!("Failed to encode deletion request: {}", e)))?;
        let message = Message::new(body)
            .with_attribute(MESSAGE_TYPE_ATTRIBUTE, MESSAGE_TYPE_USER_DELETION);

        self.queue.send(&message).await?;

        tracing::info!(user_id = %id, message_id = %message.id, "User deletion enqueued");
        Ok(message.id)
    }

    async fn dequeue_and_delete(&self, batch_size: i64) -> AppResult<usize> {
        let batch_size = clamp_batch_size(batch_size);
        let messages = self
            .queue
            .receive(batch_size, self.settings.visibility_timeout)
            .await?;

        let mut deleted = 0;
        for message in &messages {
            match self.process_deletion(message).await {
                Ok(user_id) => {
                    tracing::info!(user_id = %user_id, message_id = %message.id, "User deletion processed");
                    deleted += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        message_id = %message.id,
                        error = %e,
                        "Skipping deletion message; it will be redelivered"
                    );
                }
            }
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::infra::{MemoryDatabase, MemoryUnitOfWork, MockMessageQueue, MockUserCache};
    use mockall::predicate::{always, eq};

    fn settings() -> UserSettings {
        UserSettings {
            cache_ttl: Duration::from_secs(3600),
            cache_fill_ttl: Duration::from_secs(60),
            visibility_timeout: Duration::from_secs(30),
        }
    }

    fn manager(cache: MockUserCache, queue: MockMessageQueue) -> UserManager<MemoryUnitOfWork> {
        let uow = MemoryUnitOfWork::new(MemoryDatabase::new(), Duration::from_secs(5));
        UserManager::new(Arc::new(uow), Arc::new(cache), Arc::new(queue), settings())
    }

    #[test]
    fn test_batch_size_is_clamped() {
        assert_eq!(clamp_batch_size(-3), 1);
        assert_eq!(clamp_batch_size(0), 1);
        assert_eq!(clamp_batch_size(7), 7);
        assert_eq!(clamp_batch_size(50), 10);
    }

    #[tokio::test]
    async fn test_oversized_batch_is_clamped_before_receive() {
        let mut queue = MockMessageQueue::new();
        queue
            .expect_receive()
            .with(eq(10usize), eq(Duration::from_secs(30)))
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let service = manager(MockUserCache::new(), queue);

        assert_eq!(service.dequeue_and_delete(50).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cache_outage_falls_back_to_store() {
        let mut cache = MockUserCache::new();
        cache
            .expect_store()
            .returning(|_, _| Err(AppError::Cache("connection refused".into())));
        cache
            .expect_find_by_id()
            .returning(|_| Err(AppError::Cache("connection refused".into())));

        let service = manager(cache, MockMessageQueue::new());
        let created = service.create("fallback@example.com".into()).await.unwrap();

        let fetched = service.get(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_get_refills_cache_with_fill_ttl() {
        let mut cache = MockUserCache::new();
        cache
            .expect_store()
            .with(always(), eq(Duration::from_secs(3600)))
            .times(1)
            .returning(|_, _| Ok(()));
        cache.expect_find_by_id().times(1).returning(|_| Ok(None));
        cache
            .expect_store()
            .with(always(), eq(Duration::from_secs(60)))
            .times(1)
            .returning(|_, _| Ok(()));

        let service = manager(cache, MockMessageQueue::new());
        let created = service.create("refill@example.com".into()).await.unwrap();

        assert_eq!(service.get(created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store() {
        let cached = User::new("cached@example.com").unwrap();
        let returned = cached.clone();

        let mut cache = MockUserCache::new();
        cache
            .expect_find_by_id()
            .with(eq(cached.id))
            .times(1)
            .returning(move |_| Ok(Some(returned.clone())));
        cache.expect_store().never();

        let service = manager(cache, MockMessageQueue::new());

        assert_eq!(service.get(cached.id).await.unwrap(), cached);
    }

    #[tokio::test]
    async fn test_invalid_email_fails_before_any_io() {
        let mut cache = MockUserCache::new();
        cache.expect_store().never();

        let service = manager(cache, MockMessageQueue::new());
        let err = service.create("   ".into()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_enqueue_tags_message_type() {
        let id = Uuid::now_v7();
        let mut queue = MockMessageQueue::new();
        queue
            .expect_send()
            .withf(move |m| {
                m.attribute(MESSAGE_TYPE_ATTRIBUTE) == Some(MESSAGE_TYPE_USER_DELETION)
                    && serde_json::from_str::<Uuid>(&m.body).ok() == Some(id)
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = manager(MockUserCache::new(), queue);

        service.enqueue_deletion(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_failure_propagates() {
        let mut queue = MockMessageQueue::new();
        queue
            .expect_receive()
            .returning(|_, _| Err(AppError::queue("receive messages", "timeout")));

        let service = manager(MockUserCache::new(), queue);
        let err = service.dequeue_and_delete(10).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transient);
    }
}
