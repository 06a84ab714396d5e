//! OpenAPI documentation configuration.
//!
//! Provides Swagger UI for API exploration and testing.

use utoipa::OpenApi;

use crate::api::handlers::{health_handler, matching_handler, user_handler};
use crate::domain::MatchingStatus;
use crate::services::{HealthReport, HealthStatus};
use crate::types::{MatchingPage, PaginationMeta, UserPage};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Matching API",
        version = "0.1.0",
        description = "Users, matchings between them, and queued user deletion",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        user_handler::list_users,
        user_handler::create_user,
        user_handler::get_user,
        user_handler::update_user,
        user_handler::delete_user,
        user_handler::enqueue_user_deletion,
        matching_handler::create_matching,
        matching_handler::accept_matching,
        matching_handler::reject_matching,
        matching_handler::list_matchings,
        matching_handler::get_matching,
        matching_handler::delete_matching,
        health_handler::health,
        health_handler::deep_health,
    ),
    components(
        schemas(
            user_handler::UserResponse,
            user_handler::CreateUserRequest,
            user_handler::UpdateUserRequest,
            user_handler::DeletionAccepted,
            matching_handler::MatchingResponse,
            matching_handler::ParticipantsRequest,
            MatchingStatus,
            PaginationMeta,
            UserPage,
            MatchingPage,
            HealthStatus,
            HealthReport,
        )
    ),
    tags(
        (name = "Users", description = "User management and deletion"),
        (name = "Matchings", description = "Matchings between users"),
        (name = "Health", description = "Liveness and dependency checks")
    )
)]
pub struct ApiDoc;
