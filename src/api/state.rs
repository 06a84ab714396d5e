//! Application state - Dependency injection container.

use std::sync::Arc;

use crate::services::{HealthService, MatchingService, ServiceContainer, UserService};

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<dyn UserService>,
    pub matching_service: Arc<dyn MatchingService>,
    pub health_service: Arc<dyn HealthService>,
}

impl AppState {
    /// Create application state with manually injected services.
    pub fn new(
        user_service: Arc<dyn UserService>,
        matching_service: Arc<dyn MatchingService>,
        health_service: Arc<dyn HealthService>,
    ) -> Self {
        Self {
            user_service,
            matching_service,
            health_service,
        }
    }

    /// Take every service from a container.
    pub fn from_services(services: &dyn ServiceContainer) -> Self {
        Self::new(services.users(), services.matchings(), services.health())
    }
}
