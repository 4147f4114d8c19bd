use std::sync::Arc;

use anyhow::Context;
use mimalloc::MiMalloc;
use tracing::{info, warn};

use servicemesh_api::api::jwt::JwtService;
use servicemesh_api::api::{ApiServer, ApiServerConfig, AppState};
use servicemesh_api::config::AppConfig;
use servicemesh_api::database;
use servicemesh_api::integrations::HttpSettings;
use servicemesh_api::logging;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let _log_guard = logging::init_logging(&config.log_level, config.log_dir.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting servicemesh-api"
    );
    tracing::debug!(?config, "Loaded configuration");

    // Initialize database
    let pool = database::init_pool(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    if config.database_migration {
        database::run_migrations(&pool)
            .await
            .context("Failed to apply database migrations")?;
        info!("Database migrations applied");
    }

    let mut state = AppState::new(pool, HttpSettings::new(config.default_timeout));

    if !config.seeds.is_empty() {
        let inserted = state
            .credential_service
            .seed_defaults(&config.seeds)
            .await
            .context("Failed to seed default credentials")?;
        info!(inserted, "Seeded default credentials");
    }

    match JwtService::from_config(&config) {
        Some(jwt) => state = state.with_jwt_service(Arc::new(jwt)),
        None => warn!("SECRET_KEY is not set; vendor routes are unauthenticated"),
    }

    let server = ApiServer::with_state(ApiServerConfig::from_app_config(&config), state);

    let cancel_token = server.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            cancel_token.cancel();
        }
    });

    server.run().await?;

    info!("servicemesh-api stopped");
    Ok(())
}
