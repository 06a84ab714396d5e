//! Unit of Work pattern implementation.
//!
//! The Unit of Work:
//! - Centralizes access to all repositories
//! - Manages transactions (begin, commit, rollback)
//! - Hands the active transaction to repositories as an explicit [`Tx`] token
//!
//! Closures run inside a transaction receive a [`TransactionContext`] whose
//! repositories are bound to that transaction. There is no ambient
//! transaction: a repository call either carries a `Tx` or auto-commits.

use async_trait::async_trait;
use futures::FutureExt;
use sea_orm::{
    AccessMode, DatabaseConnection, DatabaseTransaction, IsolationLevel, TransactionTrait,
};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::memory::MemoryTx;
use super::repositories::{MatchingRepository, MatchingStore, UserRepository, UserStore};
use crate::domain::{Matching, MatchingStatus, User, UserLookup};
use crate::errors::{AppError, AppResult};

/// Boxed future returned by transaction closures.
pub type TxFuture<'a, T> = Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>;

/// Handle to the transaction a repository call should join.
#[derive(Clone, Copy)]
pub enum Tx<'a> {
    Database(&'a DatabaseTransaction),
    Memory(&'a MemoryTx),
}

impl<'a> Tx<'a> {
    pub(crate) fn database(self) -> AppResult<&'a DatabaseTransaction> {
        match self {
            Tx::Database(txn) => Ok(txn),
            Tx::Memory(_) => Err(backend_mismatch()),
        }
    }

    pub(crate) fn memory(self) -> AppResult<&'a MemoryTx> {
        match self {
            Tx::Memory(txn) => Ok(txn),
            Tx::Database(_) => Err(backend_mismatch()),
        }
    }
}

impl std::fmt::Debug for Tx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tx::Database(_) => f.write_str("Tx::Database"),
            Tx::Memory(_) => f.write_str("Tx::Memory"),
        }
    }
}

fn backend_mismatch() -> AppError {
    AppError::internal("transaction belongs to a different storage backend")
}

/// Unit of Work trait for dependency injection.
///
/// Not mockable directly because of the generic `transaction` method.
/// Tests use the in-memory implementation instead.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// User repository in auto-commit mode
    fn users(&self) -> Arc<dyn UserRepository>;

    /// Matching repository in auto-commit mode
    fn matchings(&self) -> Arc<dyn MatchingRepository>;

    /// Execute a closure within a transaction.
    ///
    /// Commits when the closure returns `Ok`, rolls back when it returns
    /// `Err`, panics, or runs past the transaction timeout. Dropping the
    /// returned future before completion also rolls back.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send;
}

/// Transaction context providing repository access within a transaction.
///
/// Every repository obtained here joins the same transaction. The context
/// offers no way to open a nested one.
#[derive(Clone, Copy)]
pub struct TransactionContext<'a> {
    tx: Tx<'a>,
    users: &'a dyn UserRepository,
    matchings: &'a dyn MatchingRepository,
}

impl<'a> TransactionContext<'a> {
    pub(crate) fn new(
        tx: Tx<'a>,
        users: &'a dyn UserRepository,
        matchings: &'a dyn MatchingRepository,
    ) -> Self {
        Self {
            tx,
            users,
            matchings,
        }
    }

    /// The transaction token itself.
    pub fn tx(&self) -> Tx<'a> {
        self.tx
    }

    /// Get user repository for this transaction
    pub fn users(&self) -> TxUserRepository<'a> {
        TxUserRepository {
            tx: self.tx,
            repo: self.users,
        }
    }

    /// Get matching repository for this transaction
    pub fn matchings(&self) -> TxMatchingRepository<'a> {
        TxMatchingRepository {
            tx: self.tx,
            repo: self.matchings,
        }
    }
}

/// Transaction-bound user repository.
#[derive(Clone, Copy)]
pub struct TxUserRepository<'a> {
    tx: Tx<'a>,
    repo: &'a dyn UserRepository,
}

impl TxUserRepository<'_> {
    pub async fn save(&self, user: &User) -> AppResult<User> {
        self.repo.save(Some(self.tx), user).await
    }

    pub async fn update(&self, user: &User) -> AppResult<User> {
        self.repo.update(Some(self.tx), user).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        self.repo.find_by_id(Some(self.tx), id).await
    }

    pub async fn find_all(&self, limit: u64, offset: u64) -> AppResult<Vec<User>> {
        self.repo.find_all(Some(self.tx), limit, offset).await
    }

    pub async fn remove(&self, id: Uuid) -> AppResult<Option<Uuid>> {
        self.repo.remove(Some(self.tx), id).await
    }
}

#[async_trait]
impl UserLookup for TxUserRepository<'_> {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        self.find_by_id(id).await
    }
}

/// Transaction-bound matching repository.
#[derive(Clone, Copy)]
pub struct TxMatchingRepository<'a> {
    tx: Tx<'a>,
    repo: &'a dyn MatchingRepository,
}

impl TxMatchingRepository<'_> {
    pub async fn save(&self, matching: &Matching) -> AppResult<Matching> {
        self.repo.save(Some(self.tx), matching).await
    }

    pub async fn update_status(
        &self,
        matching: &Matching,
        expected: MatchingStatus,
    ) -> AppResult<()> {
        self.repo.update_status(Some(self.tx), matching, expected).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Matching>> {
        self.repo.find_by_id(Some(self.tx), id).await
    }

    pub async fn find_by_participants(
        &self,
        me_id: Uuid,
        partner_id: Uuid,
    ) -> AppResult<Option<Matching>> {
        self.repo
            .find_by_participants(Some(self.tx), me_id, partner_id)
            .await
    }

    pub async fn find_all_by_user(
        &self,
        user_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<Matching>> {
        self.repo
            .find_all_by_user(Some(self.tx), user_id, limit, offset)
            .await
    }

    pub async fn remove(&self, id: Uuid) -> AppResult<Option<Uuid>> {
        self.repo.remove(Some(self.tx), id).await
    }
}

/// An open transaction that can be finished exactly once.
#[async_trait]
pub(crate) trait TransactionHandle: Send + Sync + Sized {
    fn tx(&self) -> Tx<'_>;

    async fn commit(self) -> AppResult<()>;

    async fn rollback(self) -> AppResult<()>;
}

#[async_trait]
impl TransactionHandle for DatabaseTransaction {
    fn tx(&self) -> Tx<'_> {
        Tx::Database(self)
    }

    async fn commit(self) -> AppResult<()> {
        DatabaseTransaction::commit(self)
            .await
            .map_err(|e| AppError::store("commit transaction", e))
    }

    async fn rollback(self) -> AppResult<()> {
        DatabaseTransaction::rollback(self)
            .await
            .map_err(|e| AppError::store("rollback transaction", e))
    }
}

/// Drive an already-begun transaction through `f`.
///
/// Shared by every backend so commit and rollback rules are identical.
pub(crate) async fn run_transaction<H, F, T>(
    handle: H,
    users: &dyn UserRepository,
    matchings: &dyn MatchingRepository,
    timeout: Duration,
    f: F,
) -> AppResult<T>
where
    H: TransactionHandle,
    F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
    T: Send,
{
    let outcome = {
        let ctx = TransactionContext::new(handle.tx(), users, matchings);
        let work = AssertUnwindSafe(f(ctx)).catch_unwind();
        tokio::time::timeout(timeout, work).await
    };

    match outcome {
        Ok(Ok(Ok(value))) => {
            handle.commit().await?;
            Ok(value)
        }
        Ok(Ok(Err(err))) => Err(rollback_after(handle, err).await),
        Ok(Err(panic)) => {
            if let Err(rollback) = handle.rollback().await {
                tracing::error!(error = %rollback, "Transaction rollback after panic failed");
            }
            std::panic::resume_unwind(panic)
        }
        Err(_) => {
            let err = AppError::Timeout(format!("transaction after {:?}", timeout));
            Err(rollback_after(handle, err).await)
        }
    }
}

async fn rollback_after<H: TransactionHandle>(handle: H, err: AppError) -> AppError {
    match handle.rollback().await {
        Ok(()) => err,
        Err(rollback) => {
            tracing::error!(
                rollback_error = %rollback,
                error = %err,
                "Transaction rollback failed"
            );
            AppError::RollbackFailed {
                rollback: rollback.to_string(),
                source: Box::new(err),
            }
        }
    }
}

/// Relational implementation of UnitOfWork
pub struct Persistence {
    db: DatabaseConnection,
    user_repo: Arc<UserStore>,
    matching_repo: Arc<MatchingStore>,
    timeout: Duration,
}

impl Persistence {
    pub fn new(db: DatabaseConnection, timeout: Duration) -> Self {
        let user_repo = Arc::new(UserStore::new(db.clone()));
        let matching_repo = Arc::new(MatchingStore::new(db.clone()));
        Self {
            db,
            user_repo,
            matching_repo,
            timeout,
        }
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.user_repo.clone()
    }

    fn matchings(&self) -> Arc<dyn MatchingRepository> {
        self.matching_repo.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        let txn = self
            .db
            .begin_with_config(
                Some(IsolationLevel::ReadCommitted),
                Some(AccessMode::ReadWrite),
            )
            .await
            .map_err(|e| AppError::store("begin transaction", e))?;

        run_transaction(
            txn,
            self.user_repo.as_ref(),
            self.matching_repo.as_ref(),
            self.timeout,
            f,
        )
        .await
    }
}

/// Shorthand for running a block inside a transaction.
///
/// ```ignore
/// let user = with_transaction!(uow, |ctx| ctx.users().save(&user).await)?;
/// ```
#[macro_export]
macro_rules! with_transaction {
    ($uow:expr, |$ctx:ident| $body:expr) => {
        $uow.transaction(|$ctx| Box::pin(async move { $body })).await
    };
}
