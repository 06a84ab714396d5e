//! Matching service - creation and the pending → accepted/rejected lifecycle.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Matching, MatchingDomainService};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::repositories::DUPLICATE_MATCHING;
use crate::infra::UnitOfWork;
use crate::with_transaction;

/// Decision a participant can take on a pending matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Accept,
    Reject,
}

/// Matching service trait for dependency injection.
#[async_trait]
pub trait MatchingService: Send + Sync {
    /// Start a pending matching from `me_id` to `partner_id`
    async fn create(&self, me_id: Uuid, partner_id: Uuid) -> AppResult<Matching>;

    async fn get(&self, id: Uuid) -> AppResult<Matching>;

    /// Accept the pending matching between the two users
    async fn accept(&self, me_id: Uuid, partner_id: Uuid) -> AppResult<Matching>;

    /// Reject the pending matching between the two users
    async fn reject(&self, me_id: Uuid, partner_id: Uuid) -> AppResult<Matching>;

    /// Matchings the user takes part in on either side
    async fn list(&self, user_id: Uuid, limit: u64, offset: u64) -> AppResult<Vec<Matching>>;

    /// Remove a matching whatever its status
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

/// Concrete implementation of MatchingService using Unit of Work.
pub struct MatchingManager<U: UnitOfWork> {
    uow: Arc<U>,
    rules: MatchingDomainService,
}

impl<U: UnitOfWork> MatchingManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self {
            uow,
            rules: MatchingDomainService,
        }
    }

    async fn decide(&self, me_id: Uuid, partner_id: Uuid, decision: Decision) -> AppResult<Matching> {
        let matching = with_transaction!(self.uow, |ctx| {
            let matchings = ctx.matchings();
            let mut matching = matchings
                .find_by_participants(me_id, partner_id)
                .await?
                .ok_or_not_found("matching")?;

            let expected = matching.status;
            match decision {
                Decision::Accept => matching.accept()?,
                Decision::Reject => matching.reject()?,
            }
            matchings
                .update_status(&matching, expected)
                .await
                .map(|()| matching)
        })?;

        tracing::info!(
            matching_id = %matching.id,
            status = %matching.status,
            "Matching decided"
        );
        Ok(matching)
    }
}

#[async_trait]
impl<U: UnitOfWork> MatchingService for MatchingManager<U> {
    async fn create(&self, me_id: Uuid, partner_id: Uuid) -> AppResult<Matching> {
        let rules = self.rules;
        let matching = with_transaction!(self.uow, |ctx| {
            let matching = rules
                .create_matching(&ctx.users(), me_id, partner_id)
                .await?;

            let matchings = ctx.matchings();
            if matchings
                .find_by_participants(me_id, partner_id)
                .await?
                .is_some()
            {
                return Err(AppError::conflict(DUPLICATE_MATCHING));
            }
            matchings.save(&matching).await
        })?;

        tracing::info!(matching_id = %matching.id, "Matching created");
        Ok(matching)
    }

    async fn get(&self, id: Uuid) -> AppResult<Matching> {
        self.uow
            .matchings()
            .find_by_id(None, id)
            .await?
            .ok_or_not_found("matching")
    }

    async fn accept(&self, me_id: Uuid, partner_id: Uuid) -> AppResult<Matching> {
        self.decide(me_id, partner_id, Decision::Accept).await
    }

    async fn reject(&self, me_id: Uuid, partner_id: Uuid) -> AppResult<Matching> {
        self.decide(me_id, partner_id, Decision::Reject).await
    }

    async fn list(&self, user_id: Uuid, limit: u64, offset: u64) -> AppResult<Vec<Matching>> {
        self.uow
            .matchings()
            .find_all_by_user(None, user_id, limit, offset)
            .await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        with_transaction!(self.uow, |ctx| {
            ctx.matchings().remove(id).await?.ok_or_not_found("matching")
        })?;

        tracing::info!(matching_id = %id, "Matching deleted");
        Ok(())
    }
}
