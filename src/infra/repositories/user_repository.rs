//! User repository port and its relational implementation.

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::entities::user::{self, ActiveModel, Entity as UserEntity};
use super::{on_executor, write_error, Executor};
use crate::domain::User;
use crate::errors::{AppError, AppResult};
use crate::infra::Tx;

/// User repository trait for dependency injection.
///
/// `tx` selects the transaction to join; `None` auto-commits.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user; an existing ID is a `Conflict`
    async fn save(&self, tx: Option<Tx<'_>>, user: &User) -> AppResult<User>;

    /// Overwrite the mutable fields of an existing user.
    ///
    /// `NotFound` when the row is gone, so an update racing a delete never
    /// brings the user back.
    async fn update(&self, tx: Option<Tx<'_>>, user: &User) -> AppResult<User>;

    /// `Ok(None)` when no user has this ID
    async fn find_by_id(&self, tx: Option<Tx<'_>>, id: Uuid) -> AppResult<Option<User>>;

    /// Page of users ordered by creation time, then ID
    async fn find_all(&self, tx: Option<Tx<'_>>, limit: u64, offset: u64) -> AppResult<Vec<User>>;

    /// Delete by ID, returning `None` if it was already absent
    async fn remove(&self, tx: Option<Tx<'_>>, id: Uuid) -> AppResult<Option<Uuid>>;
}

/// Relational implementation of UserRepository
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn save(&self, tx: Option<Tx<'_>>, user: &User) -> AppResult<User> {
        let insert = UserEntity::insert(ActiveModel::from(user));

        on_executor!(Executor::resolve(&self.db, tx)?, |conn| {
            insert.exec_without_returning(conn).await
        })
        .map_err(|e| write_error("save user", "user already exists", e))?;

        Ok(user.clone())
    }

    async fn update(&self, tx: Option<Tx<'_>>, user: &User) -> AppResult<User> {
        let update = UserEntity::update_many()
            .set(ActiveModel {
                email: Set(user.email.clone()),
                updated_at: Set(user.updated_at),
                ..Default::default()
            })
            .filter(user::Column::Id.eq(user.id));

        let result = on_executor!(Executor::resolve(&self.db, tx)?, |conn| {
            update.exec(conn).await
        })
        .map_err(|e| AppError::store("update user", e))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("user"));
        }
        Ok(user.clone())
    }

    async fn find_by_id(&self, tx: Option<Tx<'_>>, id: Uuid) -> AppResult<Option<User>> {
        let query = UserEntity::find_by_id(id);

        let result = on_executor!(Executor::resolve(&self.db, tx)?, |conn| {
            query.one(conn).await
        })
        .map_err(|e| AppError::store("find user", e))?;

        Ok(result.map(User::from))
    }

    async fn find_all(&self, tx: Option<Tx<'_>>, limit: u64, offset: u64) -> AppResult<Vec<User>> {
        let query = UserEntity::find()
            .order_by_asc(user::Column::CreatedAt)
            .order_by_asc(user::Column::Id)
            .limit(limit)
            .offset(offset);

        let models = on_executor!(Executor::resolve(&self.db, tx)?, |conn| {
            query.all(conn).await
        })
        .map_err(|e| AppError::store("list users", e))?;

        Ok(models.into_iter().map(User::from).collect())
    }

    async fn remove(&self, tx: Option<Tx<'_>>, id: Uuid) -> AppResult<Option<Uuid>> {
        let delete = UserEntity::delete_by_id(id);

        let result = on_executor!(Executor::resolve(&self.db, tx)?, |conn| {
            delete.exec(conn).await
        })
        .map_err(|e| AppError::store("remove user", e))?;

        Ok((result.rows_affected > 0).then_some(id))
    }
}
