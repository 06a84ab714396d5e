//! Cross-aggregate rules for matchings.
//!
//! Creating a matching needs facts about two users, which no single
//! aggregate owns. The rules here only read; persisting the result is the
//! caller's job.

use async_trait::async_trait;
use uuid::Uuid;

use super::matching::{same_user_error, Matching};
use super::user::User;
use crate::errors::{AppResult, OptionExt};

/// Read-only user access needed by the matching rules.
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;
}

/// Domain service enforcing the matching creation invariant.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchingDomainService;

impl MatchingDomainService {
    /// Build a pending matching between two distinct, existing users.
    ///
    /// The same-user check runs before any lookup.
    pub async fn create_matching<L>(&self, users: &L, me_id: Uuid, partner_id: Uuid) -> AppResult<Matching>
    where
        L: UserLookup + ?Sized,
    {
        if me_id == partner_id {
            return Err(same_user_error());
        }

        users.find_user(me_id).await?.ok_or_not_found("user")?;
        users.find_user(partner_id).await?.ok_or_not_found("user")?;

        Matching::new(me_id, partner_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MatchingStatus;
    use crate::errors::{AppError, ErrorKind};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Users {
        known: HashMap<Uuid, User>,
        lookups: AtomicUsize,
        fail: bool,
    }

    impl Users {
        fn with(users: &[&User]) -> Self {
            Self {
                known: users.iter().map(|u| (u.id, (*u).clone())).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl UserLookup for Users {
        async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::internal("lookup failed"));
            }
            Ok(self.known.get(&id).cloned())
        }
    }

    #[tokio::test]
    async fn test_creates_pending_matching_for_existing_users() {
        let me = User::new("me@example.com").unwrap();
        let partner = User::new("partner@example.com").unwrap();
        let users = Users::with(&[&me, &partner]);

        let matching = MatchingDomainService
            .create_matching(&users, me.id, partner.id)
            .await
            .unwrap();

        assert_eq!(matching.me_id, me.id);
        assert_eq!(matching.partner_id, partner.id);
        assert_eq!(matching.status, MatchingStatus::Pending);
    }

    #[tokio::test]
    async fn test_same_user_is_rejected_without_lookup() {
        let users = Users::default();
        let id = Uuid::now_v7();

        let err = MatchingDomainService
            .create_matching(&users, id, id)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(users.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_partner_is_not_found() {
        let me = User::new("me@example.com").unwrap();
        let users = Users::with(&[&me]);

        let err = MatchingDomainService
            .create_matching(&users, me.id, Uuid::now_v7())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let users = Users {
            fail: true,
            ..Default::default()
        };

        let err = MatchingDomainService
            .create_matching(&users, Uuid::now_v7(), Uuid::now_v7())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
