//! Shared types for list endpoints and common responses.

mod pagination;
mod response;

pub use pagination::{MatchingPage, Paginated, PaginationMeta, PaginationParams, UserPage};
pub use response::{Accepted, Created, NoContent};
