//! Ingestion route: scan a repository's scan-result files into the store.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{ApiResponse, AppError};
use crate::models::repository::RepositoryLocator;
use crate::services::ingestion::Ingestor;
use crate::AppState;

/// Request body for a repository scan.
#[derive(Debug, Deserialize, Validate)]
pub struct ScanRepoRequest {
    #[validate(length(min = 1, message = "GitHub repository cannot be empty"))]
    pub repo: String,
    #[validate(length(min = 1, message = "no files to scan"))]
    pub files: Vec<String>,
}

/// Response for a fully successful scan.
#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub message: String,
    pub files_scanned: usize,
}

/// POST /api/v1/scan: fetch, decode and store every listed file.
///
/// Files are independent: when some fail, the others are still stored and the
/// response lists one error per failed file.
pub async fn scan(
    State(state): State<AppState>,
    Json(body): Json<ScanRepoRequest>,
) -> Result<Json<ApiResponse<ScanSummary>>, AppError> {
    body.validate()?;

    let repo = RepositoryLocator::parse(&body.repo)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let ingestor = Ingestor::new(
        state.db.clone(),
        state.github.clone(),
        state.config.ingest_max_concurrency,
    );
    // The run lives on its own task so a disconnecting caller does not cancel it.
    let report = ingestor
        .spawn(repo, body.files)
        .await
        .map_err(|e| AppError::Internal(format!("ingestion run failed: {e}")))?;

    if !report.is_success() {
        return Err(AppError::Ingestion(report.error_messages()));
    }

    Ok(ApiResponse::success(ScanSummary {
        message: "All JSON files scanned successfully".to_string(),
        files_scanned: report.files_succeeded,
    }))
}
