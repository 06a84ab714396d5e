//! Matching handlers.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::AppState;
use crate::domain::{Matching, MatchingStatus};
use crate::errors::AppResult;
use crate::types::{Created, MatchingPage, NoContent, Paginated, PaginationParams};

/// Matching as returned by the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MatchingResponse {
    pub id: Uuid,
    pub me_id: Uuid,
    pub partner_id: Uuid,
    pub status: MatchingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Matching> for MatchingResponse {
    fn from(matching: Matching) -> Self {
        Self {
            id: matching.id,
            me_id: matching.me_id,
            partner_id: matching.partner_id,
            status: matching.status,
            created_at: matching.created_at,
            updated_at: matching.updated_at,
        }
    }
}

/// The two users of a matching, in the direction it was created
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ParticipantsRequest {
    pub me_id: Uuid,
    pub partner_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListMatchingsQuery {
    /// Participant on either side
    pub user_id: Uuid,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Create matching routes
pub fn matching_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_matchings).post(create_matching))
        .route("/accept", post(accept_matching))
        .route("/reject", post(reject_matching))
        .route("/:id", get(get_matching).delete(delete_matching))
}

/// Start a matching
#[utoipa::path(
    post,
    path = "/api/v1/matchings",
    tag = "Matchings",
    request_body = ParticipantsRequest,
    responses(
        (status = 201, description = "Matching created", body = MatchingResponse),
        (status = 404, description = "User not found"),
        (status = 409, description = "Same user or matching already exists")
    )
)]
pub async fn create_matching(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ParticipantsRequest>,
) -> AppResult<Created<MatchingResponse>> {
    let matching = state
        .matching_service
        .create(payload.me_id, payload.partner_id)
        .await?;
    Ok(Created(MatchingResponse::from(matching)))
}

/// Accept a pending matching
#[utoipa::path(
    post,
    path = "/api/v1/matchings/accept",
    tag = "Matchings",
    request_body = ParticipantsRequest,
    responses(
        (status = 200, description = "Matching accepted", body = MatchingResponse),
        (status = 404, description = "Matching not found"),
        (status = 409, description = "Matching is not pending")
    )
)]
pub async fn accept_matching(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ParticipantsRequest>,
) -> AppResult<Json<MatchingResponse>> {
    let matching = state
        .matching_service
        .accept(payload.me_id, payload.partner_id)
        .await?;
    Ok(Json(MatchingResponse::from(matching)))
}

/// Reject a pending matching
#[utoipa::path(
    post,
    path = "/api/v1/matchings/reject",
    tag = "Matchings",
    request_body = ParticipantsRequest,
    responses(
        (status = 200, description = "Matching rejected", body = MatchingResponse),
        (status = 404, description = "Matching not found"),
        (status = 409, description = "Matching is not pending")
    )
)]
pub async fn reject_matching(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ParticipantsRequest>,
) -> AppResult<Json<MatchingResponse>> {
    let matching = state
        .matching_service
        .reject(payload.me_id, payload.partner_id)
        .await?;
    Ok(Json(MatchingResponse::from(matching)))
}

/// List a user's matchings
#[utoipa::path(
    get,
    path = "/api/v1/matchings",
    tag = "Matchings",
    params(ListMatchingsQuery),
    responses(
        (status = 200, description = "Page of matchings", body = MatchingPage)
    )
)]
pub async fn list_matchings(
    State(state): State<AppState>,
    Query(query): Query<ListMatchingsQuery>,
) -> AppResult<Json<Paginated<MatchingResponse>>> {
    let page = PaginationParams {
        limit: query.limit,
        offset: query.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());
    let matchings = state
        .matching_service
        .list(query.user_id, limit, offset)
        .await?;

    Ok(Json(Paginated::new(
        matchings.into_iter().map(MatchingResponse::from).collect(),
        limit,
        offset,
    )))
}

/// Get matching by ID
#[utoipa::path(
    get,
    path = "/api/v1/matchings/{id}",
    tag = "Matchings",
    params(
        ("id" = Uuid, Path, description = "Matching ID")
    ),
    responses(
        (status = 200, description = "Matching", body = MatchingResponse),
        (status = 404, description = "Matching not found")
    )
)]
pub async fn get_matching(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MatchingResponse>> {
    let matching = state.matching_service.get(id).await?;
    Ok(Json(MatchingResponse::from(matching)))
}

/// Delete a matching
#[utoipa::path(
    delete,
    path = "/api/v1/matchings/{id}",
    tag = "Matchings",
    params(
        ("id" = Uuid, Path, description = "Matching ID")
    ),
    responses(
        (status = 204, description = "Matching deleted"),
        (status = 404, description = "Matching not found")
    )
)]
pub async fn delete_matching(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    state.matching_service.delete(id).await?;
    Ok(NoContent)
}
