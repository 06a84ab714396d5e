//! In-memory relational store with journaled transactions.
//!
//! A [`MemoryTx`] works on a private copy of the tables taken at begin and
//! records every write in a journal. Commit replays the journal against the
//! live tables as one step, so writes made outside the transaction in the
//! meantime survive and a failed replay leaves the live tables untouched.

use async_trait::async_trait;
use sea_orm::DbErr;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Matching, MatchingStatus, User};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::repositories::{
    status_changed, MatchingRepository, UserRepository, DUPLICATE_MATCHING,
};
use crate::infra::unit_of_work::{run_transaction, TransactionHandle, TxFuture};
use crate::infra::{TransactionContext, Tx, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<Uuid, User>,
    matchings: BTreeMap<Uuid, Matching>,
}

#[derive(Debug, Clone)]
enum Op {
    InsertUser(User),
    UpdateUser(User),
    RemoveUser(Uuid),
    InsertMatching(Matching),
    UpdateMatchingStatus {
        matching: Matching,
        expected: MatchingStatus,
    },
    RemoveMatching(Uuid),
}

impl Tables {
    /// Apply one write, enforcing the same constraints as the relational schema.
    ///
    /// Commit replays every journaled op against the live tables, so each
    /// precondition here is checked again against whatever committed since
    /// the transaction began.
    fn apply(&mut self, op: &Op) -> AppResult<Option<Uuid>> {
        match op {
            Op::InsertUser(user) => {
                if self.users.contains_key(&user.id) {
                    return Err(AppError::conflict(format!("user {} already exists", user.id)));
                }
                self.users.insert(user.id, user.clone());
                Ok(Some(user.id))
            }
            Op::UpdateUser(user) => {
                let row = self.users.get_mut(&user.id).ok_or_not_found("user")?;
                row.email = user.email.clone();
                row.updated_at = user.updated_at;
                Ok(Some(user.id))
            }
            Op::RemoveUser(id) => {
                let removed = self.users.remove(id).map(|u| u.id);
                if removed.is_some() {
                    self.matchings.retain(|_, m| !m.involves(*id));
                }
                Ok(removed)
            }
            Op::InsertMatching(matching) => {
                for user_id in [matching.me_id, matching.partner_id] {
                    if !self.users.contains_key(&user_id) {
                        return Err(AppError::NotFound("user"));
                    }
                }
                let duplicate = self.matchings.values().any(|m| {
                    m.id == matching.id
                        || (m.me_id == matching.me_id && m.partner_id == matching.partner_id)
                });
                if duplicate {
                    return Err(AppError::conflict(DUPLICATE_MATCHING));
                }
                self.matchings.insert(matching.id, matching.clone());
                Ok(Some(matching.id))
            }
            Op::UpdateMatchingStatus { matching, expected } => {
                let row = self
                    .matchings
                    .get_mut(&matching.id)
                    .ok_or_not_found("matching")?;
                if row.status != *expected {
                    return Err(status_changed(matching.id, *expected));
                }
                row.status = matching.status;
                row.updated_at = matching.updated_at;
                Ok(Some(matching.id))
            }
            Op::RemoveMatching(id) => Ok(self.matchings.remove(id).map(|m| m.id)),
        }
    }

    fn users_page(&self, limit: u64, offset: u64) -> Vec<User> {
        let mut users: Vec<&User> = self.users.values().collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        users
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect()
    }

    fn matchings_page(&self, user_id: Uuid, limit: u64, offset: u64) -> Vec<Matching> {
        let mut matchings: Vec<&Matching> = self
            .matchings
            .values()
            .filter(|m| m.involves(user_id))
            .collect();
        matchings.sort_by_key(|m| (m.created_at, m.id));
        matchings
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect()
    }
}

/// Countdown of injected failures for one operation.
#[derive(Debug, Default)]
struct Faults {
    begin: usize,
    commit: usize,
    rollback: usize,
    user_remove: usize,
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Begin,
    Commit,
    Rollback,
    UserRemove,
}

/// Shared in-memory tables with failure injection.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
    unavailable: AtomicBool,
}

impl MemoryDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `n` transaction begins fail.
    pub async fn fail_next_begins(&self, n: usize) {
        self.faults.lock().await.begin = n;
    }

    /// Make the next `n` commits fail.
    pub async fn fail_next_commits(&self, n: usize) {
        self.faults.lock().await.commit = n;
    }

    /// Make the next `n` rollbacks fail.
    pub async fn fail_next_rollbacks(&self, n: usize) {
        self.faults.lock().await.rollback = n;
    }

    /// Make the next `n` user removals fail.
    pub async fn fail_next_user_removes(&self, n: usize) {
        self.faults.lock().await.user_remove = n;
    }

    /// Toggle the health probe result.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn ping(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::store(
                "ping database",
                DbErr::Custom("database unavailable".to_string()),
            ));
        }
        Ok(())
    }

    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }

    pub async fn matching_count(&self) -> usize {
        self.tables.lock().await.matchings.len()
    }

    async fn take_fault(&self, fault: Fault) -> Result<(), DbErr> {
        let mut faults = self.faults.lock().await;
        let remaining = match fault {
            Fault::Begin => &mut faults.begin,
            Fault::Commit => &mut faults.commit,
            Fault::Rollback => &mut faults.rollback,
            Fault::UserRemove => &mut faults.user_remove,
        };
        if *remaining > 0 {
            *remaining -= 1;
            return Err(DbErr::Custom(format!("injected {:?} failure", fault)));
        }
        Ok(())
    }

    /// Open a transaction over a copy of the current tables.
    pub async fn begin(self: &Arc<Self>) -> AppResult<MemoryTx> {
        self.take_fault(Fault::Begin)
            .await
            .map_err(|e| AppError::store("begin transaction", e))?;

        let working = self.tables.lock().await.clone();
        Ok(MemoryTx {
            db: Arc::clone(self),
            working: Mutex::new(working),
            journal: Mutex::new(Vec::new()),
        })
    }
}

/// An open in-memory transaction.
#[derive(Debug)]
pub struct MemoryTx {
    db: Arc<MemoryDatabase>,
    working: Mutex<Tables>,
    journal: Mutex<Vec<Op>>,
}

impl MemoryTx {
    async fn write(&self, op: Op) -> AppResult<Option<Uuid>> {
        let result = self.working.lock().await.apply(&op)?;
        self.journal.lock().await.push(op);
        Ok(result)
    }
}

#[async_trait]
impl TransactionHandle for MemoryTx {
    fn tx(&self) -> Tx<'_> {
        Tx::Memory(self)
    }

    async fn commit(self) -> AppResult<()> {
        self.db
            .take_fault(Fault::Commit)
            .await
            .map_err(|e| AppError::store("commit transaction", e))?;

        let journal = self.journal.into_inner();
        let mut live = self.db.tables.lock().await;
        let mut next = live.clone();
        for op in &journal {
            next.apply(op)?;
        }
        *live = next;
        Ok(())
    }

    async fn rollback(self) -> AppResult<()> {
        self.db
            .take_fault(Fault::Rollback)
            .await
            .map_err(|e| AppError::store("rollback transaction", e))
    }
}

async fn read<R, F>(db: &MemoryDatabase, tx: Option<Tx<'_>>, f: F) -> AppResult<R>
where
    F: FnOnce(&Tables) -> R + Send,
{
    match tx {
        None => Ok(f(&*db.tables.lock().await)),
        Some(tx) => Ok(f(&*tx.memory()?.working.lock().await)),
    }
}

async fn write(db: &MemoryDatabase, tx: Option<Tx<'_>>, op: Op) -> AppResult<Option<Uuid>> {
    match tx {
        None => db.tables.lock().await.apply(&op),
        Some(tx) => tx.memory()?.write(op).await,
    }
}

/// In-memory implementation of UserRepository
pub struct MemoryUserStore {
    db: Arc<MemoryDatabase>,
}

impl MemoryUserStore {
    pub fn new(db: Arc<MemoryDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for MemoryUserStore {
    async fn save(&self, tx: Option<Tx<'_>>, user: &User) -> AppResult<User> {
        write(&self.db, tx, Op::InsertUser(user.clone())).await?;
        Ok(user.clone())
    }

    async fn update(&self, tx: Option<Tx<'_>>, user: &User) -> AppResult<User> {
        write(&self.db, tx, Op::UpdateUser(user.clone())).await?;
        Ok(user.clone())
    }

    async fn find_by_id(&self, tx: Option<Tx<'_>>, id: Uuid) -> AppResult<Option<User>> {
        read(&self.db, tx, |t| t.users.get(&id).cloned()).await
    }

    async fn find_all(&self, tx: Option<Tx<'_>>, limit: u64, offset: u64) -> AppResult<Vec<User>> {
        read(&self.db, tx, |t| t.users_page(limit, offset)).await
    }

    async fn remove(&self, tx: Option<Tx<'_>>, id: Uuid) -> AppResult<Option<Uuid>> {
        self.db
            .take_fault(Fault::UserRemove)
            .await
            .map_err(|e| AppError::store("remove user", e))?;
        write(&self.db, tx, Op::RemoveUser(id)).await
    }
}

/// In-memory implementation of MatchingRepository
pub struct MemoryMatchingStore {
    db: Arc<MemoryDatabase>,
}

impl MemoryMatchingStore {
    pub fn new(db: Arc<MemoryDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MatchingRepository for MemoryMatchingStore {
    async fn save(&self, tx: Option<Tx<'_>>, matching: &Matching) -> AppResult<Matching> {
        write(&self.db, tx, Op::InsertMatching(matching.clone())).await?;
        Ok(matching.clone())
    }

    async fn update_status(
        &self,
        tx: Option<Tx<'_>>,
        matching: &Matching,
        expected: MatchingStatus,
    ) -> AppResult<()> {
        let op = Op::UpdateMatchingStatus {
            matching: matching.clone(),
            expected,
        };
        write(&self.db, tx, op).await?;
        Ok(())
    }

    async fn find_by_id(&self, tx: Option<Tx<'_>>, id: Uuid) -> AppResult<Option<Matching>> {
        read(&self.db, tx, |t| t.matchings.get(&id).cloned()).await
    }

    async fn find_by_participants(
        &self,
        tx: Option<Tx<'_>>,
        me_id: Uuid,
        partner_id: Uuid,
    ) -> AppResult<Option<Matching>> {
        read(&self.db, tx, |t| {
            t.matchings
                .values()
                .find(|m| m.me_id == me_id && m.partner_id == partner_id)
                .cloned()
        })
        .await
    }

    async fn find_all_by_user(
        &self,
        tx: Option<Tx<'_>>,
        user_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<Matching>> {
        read(&self.db, tx, |t| t.matchings_page(user_id, limit, offset)).await
    }

    async fn remove(&self, tx: Option<Tx<'_>>, id: Uuid) -> AppResult<Option<Uuid>> {
        write(&self.db, tx, Op::RemoveMatching(id)).await
    }
}

/// In-memory implementation of UnitOfWork
pub struct MemoryUnitOfWork {
    db: Arc<MemoryDatabase>,
    user_repo: Arc<MemoryUserStore>,
    matching_repo: Arc<MemoryMatchingStore>,
    timeout: Duration,
}

impl MemoryUnitOfWork {
    pub fn new(db: Arc<MemoryDatabase>, timeout: Duration) -> Self {
        Self {
            user_repo: Arc::new(MemoryUserStore::new(db.clone())),
            matching_repo: Arc::new(MemoryMatchingStore::new(db.clone())),
            db,
            timeout,
        }
    }

    pub fn database(&self) -> &Arc<MemoryDatabase> {
        &self.db
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
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
        let txn = self.db.begin().await?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[tokio::test]
    async fn test_removing_a_user_cascades_to_matchings() {
        let db = MemoryDatabase::new();
        let users = MemoryUserStore::new(db.clone());
        let matchings = MemoryMatchingStore::new(db.clone());

        let me = users.save(None, &User::new("me@example.com").unwrap()).await.unwrap();
        let partner = users.save(None, &User::new("p@example.com").unwrap()).await.unwrap();
        matchings
            .save(None, &Matching::new(me.id, partner.id).unwrap())
            .await
            .unwrap();

        assert_eq!(users.remove(None, partner.id).await.unwrap(), Some(partner.id));
        assert_eq!(db.matching_count().await, 0);
        assert_eq!(users.remove(None, partner.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_matching_requires_existing_users() {
        let db = MemoryDatabase::new();
        let matchings = MemoryMatchingStore::new(db.clone());

        let err = matchings
            .save(None, &Matching::new(Uuid::now_v7(), Uuid::now_v7()).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound("user")));
    }

    #[tokio::test]
    async fn test_status_update_rechecks_expected_status_at_commit() {
        let db = MemoryDatabase::new();
        let users = MemoryUserStore::new(db.clone());
        let matchings = MemoryMatchingStore::new(db.clone());
        let me = users.save(None, &User::new("me@example.com").unwrap()).await.unwrap();
        let partner = users.save(None, &User::new("p@example.com").unwrap()).await.unwrap();
        let pending = matchings
            .save(None, &Matching::new(me.id, partner.id).unwrap())
            .await
            .unwrap();

        let mut accepted = pending.clone();
        accepted.accept().unwrap();
        let mut rejected = pending.clone();
        rejected.reject().unwrap();

        let first = db.begin().await.unwrap();
        let second = db.begin().await.unwrap();
        matchings
            .update_status(Some(first.tx()), &accepted, MatchingStatus::Pending)
            .await
            .unwrap();
        matchings
            .update_status(Some(second.tx()), &rejected, MatchingStatus::Pending)
            .await
            .unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        let stored = matchings.find_by_id(None, pending.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchingStatus::Accepted);
    }

    #[tokio::test]
    async fn test_status_update_of_missing_matching_is_not_found() {
        let db = MemoryDatabase::new();
        let matchings = MemoryMatchingStore::new(db.clone());
        let mut matching = Matching::new(Uuid::now_v7(), Uuid::now_v7()).unwrap();
        matching.accept().unwrap();

        let err = matchings
            .update_status(None, &matching, MatchingStatus::Pending)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound("matching")));
    }

    #[tokio::test]
    async fn test_update_does_not_resurrect_user_removed_before_commit() {
        let db = MemoryDatabase::new();
        let users = MemoryUserStore::new(db.clone());
        let mut user = users.save(None, &User::new("old@example.com").unwrap()).await.unwrap();
        user.change_email("new@example.com").unwrap();

        let txn = db.begin().await.unwrap();
        users.update(Some(txn.tx()), &user).await.unwrap();
        assert_eq!(users.remove(None, user.id).await.unwrap(), Some(user.id));

        let err = txn.commit().await.unwrap_err();

        assert!(matches!(err, AppError::NotFound("user")));
        assert!(users.find_by_id(None, user.id).await.unwrap().is_none());
        assert_eq!(db.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_of_missing_user_is_not_found() {
        let db = MemoryDatabase::new();
        let users = MemoryUserStore::new(db.clone());

        let err = users
            .update(None, &User::new("ghost@example.com").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound("user")));
        assert_eq!(db.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_pair_committed_concurrently_is_conflict() {
        let db = MemoryDatabase::new();
        let users = MemoryUserStore::new(db.clone());
        let matchings = MemoryMatchingStore::new(db.clone());
        let me = users.save(None, &User::new("me@example.com").unwrap()).await.unwrap();
        let partner = users.save(None, &User::new("p@example.com").unwrap()).await.unwrap();

        let first = db.begin().await.unwrap();
        let second = db.begin().await.unwrap();
        matchings
            .save(Some(first.tx()), &Matching::new(me.id, partner.id).unwrap())
            .await
            .unwrap();
        matchings
            .save(Some(second.tx()), &Matching::new(me.id, partner.id).unwrap())
            .await
            .unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(db.matching_count().await, 1);
    }

    #[tokio::test]
    async fn test_transaction_writes_are_invisible_until_commit() {
        let db = MemoryDatabase::new();
        let users = MemoryUserStore::new(db.clone());
        let user = User::new("tx@example.com").unwrap();

        let txn = db.begin().await.unwrap();
        users.save(Some(txn.tx()), &user).await.unwrap();

        assert!(users.find_by_id(Some(txn.tx()), user.id).await.unwrap().is_some());
        assert!(users.find_by_id(None, user.id).await.unwrap().is_none());

        txn.commit().await.unwrap();
        assert!(users.find_by_id(None, user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_injected_faults_count_down() {
        let db = MemoryDatabase::new();
        db.fail_next_begins(1).await;

        assert!(db.begin().await.is_err());
        assert!(db.begin().await.is_ok());
    }

    #[tokio::test]
    async fn test_users_page_is_ordered_by_creation() {
        let db = MemoryDatabase::new();
        let users = MemoryUserStore::new(db.clone());

        let mut created = Vec::new();
        for i in 0..5 {
            let user = User::new(format!("u{}@example.com", i)).unwrap();
            users.save(None, &user).await.unwrap();
            created.push(user);
        }
        created.sort_by_key(|u| (u.created_at, u.id));

        let page = users.find_all(None, 2, 1).await.unwrap();
        assert_eq!(page, created[1..3].to_vec());
    }
}
