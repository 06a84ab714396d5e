//! Pagination types for list endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::handlers::{MatchingResponse, UserResponse};
use crate::config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Limit/offset query parameters, reusable across list endpoints
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Page size, capped at 100 (default 20)
    pub limit: Option<u64>,
    /// Number of items to skip (default 0)
    pub offset: Option<u64>,
}

impl PaginationParams {
    /// Get limit capped at maximum
    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

/// Paginated response wrapper
#[derive(Debug, Serialize, ToSchema)]
#[aliases(UserPage = Paginated<UserResponse>, MatchingPage = Paginated<MatchingResponse>)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub limit: u64,
    pub offset: u64,
    /// Items in this page
    pub count: u64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, limit: u64, offset: u64) -> Self {
        let count = data.len() as u64;
        Self {
            data,
            meta: PaginationMeta {
                limit,
                offset,
                count,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_cap() {
        let params = PaginationParams::default();
        assert_eq!(params.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(params.offset(), 0);

        let params = PaginationParams {
            limit: Some(500),
            offset: Some(40),
        };
        assert_eq!(params.limit(), MAX_PAGE_SIZE);
        assert_eq!(params.offset(), 40);
    }
}
