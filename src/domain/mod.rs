//! Domain layer - Core business entities and logic
//!
//! Entities, value objects and the matching domain service. Nothing in
//! here touches storage directly.

pub mod matching;
pub mod matching_rules;
pub mod message;
pub mod user;

pub use matching::{Matching, MatchingStatus};
pub use matching_rules::{MatchingDomainService, UserLookup};
pub use message::Message;
pub use user::{validate_email, User};
