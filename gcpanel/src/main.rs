mod server;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, Instrument};

use gcpanel_core::{
    logging,
    oauth2::{MemoryStateStore, ProviderRegistry, RedisStateStore, StateStore},
    repository::{MemoryUserRepository, PgUserRepository, UserRepository},
    service::{
        auth::{Argon2PasswordHasher, JwtSessionIssuer},
        OAuth2Service,
    },
    Config,
};

/// gcPanel sign-in server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "GCPANEL_CONFIG_PATH")]
    config: Option<String>,

    /// Override `server.host`
    #[arg(long)]
    host: Option<String>,

    /// Override `server.http_port`
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.http_port = port;
    }

    // 2. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 3. Initialize logging
    logging::init_logging(&config.logging)?;
    let root = logging::service_span(&config.logging);
    run(config).instrument(root).await
}

async fn run(config: Config) -> Result<()> {
    info!("gcPanel server starting...");
    info!("HTTP address: {}", config.http_address());

    // 4. Stores
    let users = init_user_repository(&config).await?;
    let state_store = init_state_store(&config).await?;

    // 5. Providers and services
    let registry = Arc::new(ProviderRegistry::from_env(&config.oauth2));
    for summary in registry.providers() {
        info!(
            provider = %summary.provider,
            configured = summary.configured,
            "OAuth2 provider {}",
            summary.name
        );
    }

    let sessions = JwtSessionIssuer::new(
        config.session.jwt_secret.as_bytes(),
        config.session.access_token_duration_hours,
    )?;
    let oauth2_service = OAuth2Service::new(
        &config.oauth2,
        registry,
        state_store,
        users,
        Arc::new(Argon2PasswordHasher),
        Arc::new(sessions),
    )?;

    // 6. Serve
    let state = gcpanel_api::AppState {
        oauth2_service: Arc::new(oauth2_service),
    };
    server::serve(&config.http_address(), gcpanel_api::create_router(state)).await?;

    info!("gcPanel server stopped");
    Ok(())
}

/// Postgres when `database.url` is set, otherwise in memory
async fn init_user_repository(config: &Config) -> Result<Arc<dyn UserRepository>> {
    if config.database.url.is_empty() {
        info!("Database not configured, using in-memory user store");
        return Ok(Arc::new(MemoryUserRepository::new()));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_seconds))
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            anyhow::anyhow!("Database connection failed: {e}")
        })?;
    info!("Database connected successfully");

    info!("Running database migrations...");
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            error!("Failed to run migrations: {}", e);
            anyhow::anyhow!("Migration failed: {e}")
        })?;
    info!("Migrations completed");

    Ok(Arc::new(PgUserRepository::new(pool)))
}

/// Redis when `redis.url` is set, otherwise in memory
async fn init_state_store(config: &Config) -> Result<Arc<dyn StateStore>> {
    if config.redis.url.is_empty() {
        info!("Redis not configured, using in-memory OAuth2 state store");
        return Ok(Arc::new(MemoryStateStore::new()));
    }

    let store = RedisStateStore::connect(&config.redis.url, config.redis.key_prefix.clone())
        .await
        .map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            anyhow::anyhow!("Redis connection failed: {e}")
        })?;
    info!("Redis state store connected");

    Ok(Arc::new(store))
}
