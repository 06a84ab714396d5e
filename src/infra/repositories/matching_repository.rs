//! Matching repository port and its relational implementation.

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Set,
};
use uuid::Uuid;

use super::entities::matching::{self, ActiveModel, Entity as MatchingEntity};
use super::{on_executor, status_changed, write_error, Executor, DUPLICATE_MATCHING};
use crate::domain::{Matching, MatchingStatus};
use crate::errors::{AppError, AppResult};
use crate::infra::Tx;

/// Matching repository trait for dependency injection.
#[async_trait]
pub trait MatchingRepository: Send + Sync {
    /// Insert a new matching.
    ///
    /// A second matching for the same participants is a `Conflict`; a
    /// participant that no longer exists is `NotFound`.
    async fn save(&self, tx: Option<Tx<'_>>, matching: &Matching) -> AppResult<Matching>;

    /// Write `matching.status` only if the stored status is still `expected`.
    ///
    /// `Conflict` when another writer moved the status first.
    async fn update_status(
        &self,
        tx: Option<Tx<'_>>,
        matching: &Matching,
        expected: MatchingStatus,
    ) -> AppResult<()>;

    async fn find_by_id(&self, tx: Option<Tx<'_>>, id: Uuid) -> AppResult<Option<Matching>>;

    /// The matching `me_id` started with `partner_id`, if any
    async fn find_by_participants(
        &self,
        tx: Option<Tx<'_>>,
        me_id: Uuid,
        partner_id: Uuid,
    ) -> AppResult<Option<Matching>>;

    /// Matchings where the user is on either side
    async fn find_all_by_user(
        &self,
        tx: Option<Tx<'_>>,
        user_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<Matching>>;

    async fn remove(&self, tx: Option<Tx<'_>>, id: Uuid) -> AppResult<Option<Uuid>>;
}

/// Relational implementation of MatchingRepository
pub struct MatchingStore {
    db: DatabaseConnection,
}

impl MatchingStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn into_domain(models: Vec<matching::Model>) -> AppResult<Vec<Matching>> {
    models.into_iter().map(Matching::try_from).collect()
}

#[async_trait]
impl MatchingRepository for MatchingStore {
    async fn save(&self, tx: Option<Tx<'_>>, matching: &Matching) -> AppResult<Matching> {
        let insert = MatchingEntity::insert(ActiveModel::from(matching));

        on_executor!(Executor::resolve(&self.db, tx)?, |conn| {
            insert.exec_without_returning(conn).await
        })
        .map_err(|e| write_error("save matching", DUPLICATE_MATCHING, e))?;

        Ok(matching.clone())
    }

    async fn update_status(
        &self,
        tx: Option<Tx<'_>>,
        matching: &Matching,
        expected: MatchingStatus,
    ) -> AppResult<()> {
        let update = MatchingEntity::update_many()
            .set(ActiveModel {
                status: Set(matching.status.as_str().to_string()),
                updated_at: Set(matching.updated_at),
                ..Default::default()
            })
            .filter(matching::Column::Id.eq(matching.id))
            .filter(matching::Column::Status.eq(expected.as_str()));

        let result = on_executor!(Executor::resolve(&self.db, tx)?, |conn| {
            update.exec(conn).await
        })
        .map_err(|e| AppError::store("update matching status", e))?;

        if result.rows_affected == 0 {
            return Err(status_changed(matching.id, expected));
        }
        Ok(())
    }

    async fn find_by_id(&self, tx: Option<Tx<'_>>, id: Uuid) -> AppResult<Option<Matching>> {
        let query = MatchingEntity::find_by_id(id);

        let result = on_executor!(Executor::resolve(&self.db, tx)?, |conn| {
            query.one(conn).await
        })
        .map_err(|e| AppError::store("find matching", e))?;

        result.map(Matching::try_from).transpose()
    }

    async fn find_by_participants(
        &self,
        tx: Option<Tx<'_>>,
        me_id: Uuid,
        partner_id: Uuid,
    ) -> AppResult<Option<Matching>> {
        let query = MatchingEntity::find()
            .filter(matching::Column::MeId.eq(me_id))
            .filter(matching::Column::PartnerId.eq(partner_id));

        let result = on_executor!(Executor::resolve(&self.db, tx)?, |conn| {
            query.one(conn).await
        })
        .map_err(|e| AppError::store("find matching by participants", e))?;

        result.map(Matching::try_from).transpose()
    }

    async fn find_all_by_user(
        &self,
        tx: Option<Tx<'_>>,
        user_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<Matching>> {
        let query = MatchingEntity::find()
            .filter(
                Condition::any()
                    .add(matching::Column::MeId.eq(user_id))
                    .add(matching::Column::PartnerId.eq(user_id)),
            )
            .order_by_asc(matching::Column::CreatedAt)
            .order_by_asc(matching::Column::Id)
            .limit(limit)
            .offset(offset);

        let models = on_executor!(Executor::resolve(&self.db, tx)?, |conn| {
            query.all(conn).await
        })
        .map_err(|e| AppError::store("list matchings", e))?;

        into_domain(models)
    }

    async fn remove(&self, tx: Option<Tx<'_>>, id: Uuid) -> AppResult<Option<Uuid>> {
        let delete = MatchingEntity::delete_by_id(id);

        let result = on_executor!(Executor::resolve(&self.db, tx)?, |conn| {
            delete.exec(conn).await
        })
        .map_err(|e| AppError::store("remove matching", e))?;

        Ok((result.rows_affected > 0).then_some(id))
    }
}
