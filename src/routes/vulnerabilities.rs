//! Read path: filter stored vulnerabilities.

use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use crate::errors::{ApiResponse, AppError};
use crate::models::vulnerability::Vulnerability;
use crate::services::store;
use crate::AppState;

/// Request body for a vulnerability query.
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(nested)]
    pub filters: QueryFilters,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QueryFilters {
    /// Matched exactly against the stored severity (`CRITICAL`, `HIGH`, ...).
    #[validate(length(min = 1, message = "severity filter cannot be empty"))]
    pub severity: String,
}

/// POST /api/v1/query: vulnerabilities matching the severity filter.
pub async fn query(
    State(state): State<AppState>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<ApiResponse<Vec<Vulnerability>>>, AppError> {
    body.validate()?;

    let vulnerabilities =
        store::vulnerabilities_by_severity(&state.db, &body.filters.severity).await?;
    Ok(ApiResponse::success(vulnerabilities))
}
