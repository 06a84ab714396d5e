//! User domain entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::ValidateEmail;

use crate::errors::{AppError, AppResult};

/// User domain entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a freshly generated, time-sortable ID.
    pub fn new(email: impl Into<String>) -> AppResult<Self> {
        Self::with_id(Uuid::now_v7(), email)
    }

    /// Create a new user with a caller-supplied ID.
    ///
    /// A nil ID is replaced with a generated one.
    pub fn with_id(id: Uuid, email: impl Into<String>) -> AppResult<Self> {
        let email = normalize_email(email.into())?;
        let id = if id.is_nil() { Uuid::now_v7() } else { id };
        let now = Utc::now();

        Ok(Self {
            id,
            email,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the email address and refresh `updated_at`.
    ///
    /// The entity is left untouched when the new address is invalid.
    pub fn change_email(&mut self, email: impl Into<String>) -> AppResult<()> {
        self.email = normalize_email(email.into())?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Check the entity invariants.
    pub fn validate(&self) -> AppResult<()> {
        validate_email(&self.email)
    }
}

/// Validate an email address without building a user.
pub fn validate_email(email: &str) -> AppResult<()> {
    if email.trim().is_empty() {
        return Err(AppError::invalid_argument("user email is required"));
    }
    if !email.validate_email() {
        return Err(AppError::invalid_argument(format!(
            "user email is invalid: {}",
            email
        )));
    }
    Ok(())
}

fn normalize_email(email: String) -> AppResult<String> {
    let email = email.trim().to_string();
    validate_email(&email)?;
    Ok(email)
}
