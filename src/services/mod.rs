//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure to fulfill
//! application use cases. They depend on abstractions (traits) for
//! dependency inversion.
//!
//! All services use Unit of Work pattern for centralized repository
//! access and transaction management.

pub mod container;
mod health_service;
mod matching_service;
mod user_service;

// Service Container
pub use container::{ServiceContainer, Services};

// Service traits and implementations
pub use health_service::{HealthMonitor, HealthReport, HealthService, HealthStatus};
pub use matching_service::{MatchingManager, MatchingService};
pub use user_service::{clamp_batch_size, UserManager, UserService, UserSettings};

#[cfg(any(test, feature = "test-utils"))]
pub use container::MockServiceContainer;
