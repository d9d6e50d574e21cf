//! VisaPilot API server
//!
//! Main application entry point

use std::net::SocketAddr;
use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use VisaPilot::{
    config::Settings,
    utils::logging,
    database::{DatabaseService, connection::{create_pool, run_migrations, DatabaseConfig}},
    services::ServiceFactory,
    state::AppState,
    handlers::router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;
    settings.validate()?;

    // Guard flushes the file log on exit
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", VisaPilot::info());

    info!("Connecting to database...");
    let pool = create_pool(&DatabaseConfig::from(&settings.database)).await?;

    info!("Running database migrations...");
    run_migrations(&pool).await?;

    let database = DatabaseService::new(pool);

    info!("Initializing services...");
    let bind_address = settings.bind_address();
    let services = ServiceFactory::new(settings, database)?;

    let health = services.health_check().await;
    for issue in health.get_issues() {
        warn!(issue = %issue, "Service health issue at startup");
    }

    let state = AppState::new(services);
    let _rate_limit_sweep = state.rate_limiter.spawn_cleanup();

    let app = router(state);

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!(address = %bind_address, "VisaPilot API is ready");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("VisaPilot has been shut down.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
