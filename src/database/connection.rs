//! Database connection management

use sqlx::{Pool, Postgres};
use std::time::Duration;
use crate::utils::errors::VisaPilotError;

pub type DatabasePool = Pool<Postgres>;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/visapilot".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

impl From<&crate::config::DatabaseConfig> for DatabaseConfig {
    fn from(settings: &crate::config::DatabaseConfig) -> Self {
        Self {
            url: settings.url.clone(),
            max_connections: settings.max_connections,
            min_connections: settings.min_connections,
            ..Self::default()
        }
    }
}

/// Host and database name of a connection URL, without credentials
pub fn redacted_target(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => format!(
            "{}{}",
            parsed.host_str().unwrap_or("localhost"),
            parsed.path()
        ),
        Err(_) => "<unparsable database url>".to_string(),
    }
}

/// Open the pool and make sure the store answers
pub async fn create_pool(config: &DatabaseConfig) -> Result<DatabasePool, VisaPilotError> {
    let target = redacted_target(&config.url);
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(&config.url)
        .await?;

    health_check(&pool).await?;

    tracing::info!(target_db = %target, max_connections = config.max_connections, "Database pool ready");
    Ok(pool)
}

/// Apply pending schema migrations, including the seeded checklist templates
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), VisaPilotError> {
    let migrator = sqlx::migrate!("./migrations");
    tracing::info!(known = migrator.migrations.len(), "Applying database migrations");

    migrator.run(pool).await?;

    tracing::info!("Database schema is current");
    Ok(())
}

pub async fn health_check(pool: &DatabasePool) -> Result<(), VisaPilotError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await?;

    Ok(())
}
