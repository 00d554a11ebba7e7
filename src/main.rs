//! City Guide server

use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use city_guide::{
    api::{self, AppState},
    config::Config,
    db,
};

/// How often expired sessions are purged
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so the log level can follow DEBUG
    let config = Config::load_with_env(Path::new("config.yml"))?;

    let default_filter = if config.server.debug {
        "city_guide=debug,tower_http=debug"
    } else {
        "city_guide=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting City Guide...");
    if config.server.secret_key.is_none() {
        tracing::warn!("SECRET_KEY is not set; using the insecure development key");
    }

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let state = AppState::from_config(pool, &config)?;

    // Bootstrap the staff account
    if let Some(admin) = &config.admin {
        let staff = state.user_service.ensure_staff_account(admin).await?;
        tracing::info!("Staff account ready: {}", staff.username);
    }

    // Purge expired sessions hourly
    {
        let user_service = state.user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(e) = user_service.cleanup_expired_sessions().await {
                    tracing::warn!("Session cleanup failed: {}", e);
                }
            }
        });
    }

    let app = api::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
