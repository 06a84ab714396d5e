//! Matching aggregate and its status state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Matching status.
///
/// `pending` is the only non-terminal state; it can move to either
/// `accepted` or `rejected`, and nothing moves out of those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MatchingStatus {
    Pending,
    Accepted,
    Rejected,
}

impl MatchingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchingStatus::Pending => "pending",
            MatchingStatus::Accepted => "accepted",
            MatchingStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, MatchingStatus::Pending)
    }
}

impl fmt::Display for MatchingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchingStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MatchingStatus::Pending),
            "accepted" => Ok(MatchingStatus::Accepted),
            "rejected" => Ok(MatchingStatus::Rejected),
            other => Err(AppError::invalid_argument(format!(
                "matching status is invalid: {}",
                other
            ))),
        }
    }
}

/// Matching domain entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matching {
    pub id: Uuid,
    pub me_id: Uuid,
    pub partner_id: Uuid,
    pub status: MatchingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Matching {
    /// Create a pending matching between two distinct users.
    pub fn new(me_id: Uuid, partner_id: Uuid) -> AppResult<Self> {
        if me_id == partner_id {
            return Err(same_user_error());
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            me_id,
            partner_id,
            status: MatchingStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Move `pending → accepted`.
    pub fn accept(&mut self) -> AppResult<()> {
        self.transition(MatchingStatus::Accepted)
    }

    /// Move `pending → rejected`.
    pub fn reject(&mut self) -> AppResult<()> {
        self.transition(MatchingStatus::Rejected)
    }

    /// Whether `user_id` is one of the two participants.
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.me_id == user_id || self.partner_id == user_id
    }

    fn transition(&mut self, to: MatchingStatus) -> AppResult<()> {
        if self.status != MatchingStatus::Pending {
            return Err(AppError::conflict(format!(
                "matching {} is {}, cannot become {}",
                self.id, self.status, to
            )));
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

pub(crate) fn same_user_error() -> AppError {
    AppError::conflict("me and partner are the same user")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn pending() -> Matching {
        Matching::new(Uuid::now_v7(), Uuid::now_v7()).unwrap()
    }

    #[test]
    fn test_new_matching_is_pending() {
        let matching = pending();
        assert_eq!(matching.status, MatchingStatus::Pending);
        assert!(!matching.status.is_terminal());
    }

    #[test]
    fn test_same_user_is_a_conflict() {
        let id = Uuid::now_v7();
        let err = Matching::new(id, id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_accept_then_reject_fails_and_keeps_status() {
        let mut matching = pending();
        matching.accept().unwrap();
        assert_eq!(matching.status, MatchingStatus::Accepted);

        let err = matching.reject().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(matching.status, MatchingStatus::Accepted);
    }

    #[test]
    fn test_accept_is_not_idempotent() {
        let mut matching = pending();
        matching.accept().unwrap();
        let updated_at = matching.updated_at;

        assert!(matching.accept().is_err());
        assert_eq!(matching.updated_at, updated_at);
    }

    #[test]
    fn test_rejected_is_terminal() {
        let mut matching = pending();
        matching.reject().unwrap();
        assert!(matching.status.is_terminal());
        assert!(matching.accept().is_err());
        assert_eq!(matching.status, MatchingStatus::Rejected);
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            MatchingStatus::Pending,
            MatchingStatus::Accepted,
            MatchingStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<MatchingStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<MatchingStatus>().is_err());
    }
}
