//! HTTP request handlers.

pub mod health_handler;
pub mod matching_handler;
pub mod user_handler;

pub use health_handler::health_routes;
pub use matching_handler::{matching_routes, MatchingResponse};
pub use user_handler::{user_routes, UserResponse};
