//! Matching database entity for SeaORM.

use sea_orm::entity::prelude::*;
use sea_orm::Set;

use crate::domain::{Matching, MatchingStatus};
use crate::errors::AppError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "matchings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub me_id: Uuid,
    pub partner_id: Uuid,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Convert database model to domain entity.
///
/// Fails only when the row holds a status this build does not know.
impl TryFrom<Model> for Matching {
    type Error = AppError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let status: MatchingStatus = model.status.parse().map_err(|_| {
            AppError::internal(format!(
                "matching {} has unknown status {}",
                model.id, model.status
            ))
        })?;

        Ok(Matching {
            id: model.id,
            me_id: model.me_id,
            partner_id: model.partner_id,
            status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl From<&Matching> for ActiveModel {
    fn from(matching: &Matching) -> Self {
        ActiveModel {
            id: Set(matching.id),
            me_id: Set(matching.me_id),
            partner_id: Set(matching.partner_id),
            status: Set(matching.status.as_str().to_string()),
            created_at: Set(matching.created_at),
            updated_at: Set(matching.updated_at),
        }
    }
}
