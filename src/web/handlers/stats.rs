//! Dashboard statistics handler.

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::stats::{Statistics, StatsService};
use crate::web::dto::{ApiResponse, StatsQuery};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AdminUser;

/// GET /api/stats - Storage and upload statistics.
///
/// The range only applies when both `from` and `to` are given.
#[utoipa::path(
    get,
    path = "/api/stats",
    tag = "stats",
    params(StatsQuery),
    responses(
        (status = 200, description = "Statistics", body = Statistics),
        (status = 403, description = "Admin only"),
        (status = 422, description = "'from' is after 'to'")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ApiResponse<Statistics>>, ApiError> {
    let stats = StatsService::new(&state.db)
        .collect(query.from, query.to)
        .await?;
    Ok(Json(ApiResponse::new(stats)))
}
