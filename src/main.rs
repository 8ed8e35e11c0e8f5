use std::net::SocketAddr;
use std::sync::Arc;

use mimalloc::MiMalloc;
use scanledger::config::AppConfig;
use scanledger::services::github::GitHubClient;
use scanledger::{db, routes, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// M-MIMALLOC-APP: Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scanledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("failed to load configuration (PERSONAL_ACCESS_TOKEN): {e}"))?;

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    db::migrate(&pool).await?;

    let github = GitHubClient::new(
        config.github_api_url.clone(),
        config.github_token.clone(),
        config.retry_policy(),
        config.fetch_timeout(),
    )?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(host = %addr, "Starting scanledger API server");

    let state = AppState {
        db: pool,
        config,
        github: Arc::new(github),
    };
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
