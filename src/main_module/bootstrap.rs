//! Bootstrap and application initialization logic

use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::core::config::AppConfig;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{create_conn, run_migrations, DbPool};
use crate::email::mailer_from_config;
use crate::extraction::ExtractionClient;
use crate::security::jwt::JwtManager;
use crate::security::password::PasswordHasher2;

/// Initialize the tracing subscriber; `log` records are forwarded to it.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_err()
    {
        eprintln!("Logger already initialized");
    }
}

/// Assemble handler state around an existing pool.
pub fn build_state(config: AppConfig, pool: DbPool) -> Result<AppState> {
    let jwt_manager = JwtManager::from_app_config(&config).context("Invalid JWT settings")?;
    let password_hasher = PasswordHasher2::with_defaults().context("Invalid password hasher")?;

    let extraction =
        ExtractionClient::from_config(&config).context("Failed to build extraction client")?;
    match &extraction {
        Some(client) => info!(
            "Extraction service configured (process: {}, reprocess: {})",
            client.can_process(),
            client.can_reprocess()
        ),
        None => warn!("Extraction service not configured; uploads will not be processed"),
    }

    let mailer = mailer_from_config(&config).context("Failed to build mailer")?;
    info!("Using {} mailer", mailer.name());

    Ok(AppState::new(
        config,
        pool,
        jwt_manager,
        password_hasher,
        extraction,
        mailer,
    ))
}

/// Load config, connect, migrate and assemble the shared state.
pub fn bootstrap() -> Result<Arc<AppState>> {
    let config = AppConfig::load_with_dotenv().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let database_url = config
        .resolved_database_url()
        .context("Database settings incomplete")?;
    let pool = create_conn(&database_url, config.db_pool_size)
        .context("Failed to connect to the database")?;
    info!("Database pool ready ({} connections)", config.db_pool_size);

    run_migrations(&pool)?;

    Ok(Arc::new(build_state(config, pool)?))
}
