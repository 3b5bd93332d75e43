//! Readlog Server: application entry point.

use std::env;

use readlog_auth::{AuthConfig, AuthService};
use readlog_db::repository::{SurrealRefreshTokenRepository, SurrealUserRepository};
use readlog_db::{DbConfig, DbManager, UserStoreConfig, run_migrations};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("readlog=info"))?;
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    tracing::info!("Starting Readlog server...");

    let auth_config = AuthConfig::from_env()?;
    let db_config = DbConfig::from_env();
    let store_config = UserStoreConfig {
        pepper: env::var("READLOG_PASSWORD_PEPPER").ok().filter(|p| !p.is_empty()),
        ..UserStoreConfig::default()
    };

    let db = DbManager::connect(&db_config).await?;
    run_migrations(db.client()).await?;

    let auth = AuthService::new(
        SurrealUserRepository::with_config(db.client().clone(), store_config),
        SurrealRefreshTokenRepository::new(db.client().clone()),
        auth_config,
    )?;

    tracing::info!(
        issuer = %auth.config().jwt_issuer,
        audience = %auth.config().jwt_audience,
        "Auth service ready"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Readlog server stopped.");
    Ok(())
}
