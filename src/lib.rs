pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::services::github::GitHubClient;

/// Shared application state passed to all Axum handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: config::AppConfig,
    pub github: Arc<GitHubClient>,
}
