use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use runsdb_api::auth::{create_user, AuthError, ADMIN_ROLE};
use runsdb_api::config::AppConfig;
use runsdb_api::store::users::{MemoryUserStore, PgUserStore, UserStore};
use runsdb_api::store::{MemoryRunStore, PgRunStore, RunStore};
use runsdb_api::{app, AppState};

#[derive(Parser)]
#[command(name = "runsdb-api")]
#[command(about = "HTTP API for run metadata lookups")]
#[command(version)]
struct Args {
    #[arg(long, env = "RUNSDB_CONFIG", help = "JSON config file layered over the environment preset")]
    config: Option<PathBuf>,

    #[arg(long, help = "Port to listen on (overrides config and PORT)")]
    port: Option<u16>,

    #[arg(long, help = "JSON fixture loaded into the in-memory run store")]
    fixture: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("runsdb_api=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(fixture) = args.fixture {
        config.store.fixture_path = Some(fixture);
    }
    tracing::info!("Starting runsdb API in {:?} mode", config.environment);

    let runs = run_store(&config).await?;
    let users = user_store(&config).await?;
    bootstrap_admin(&config, users.as_ref()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, runs, users);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("runsdb API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn run_store(config: &AppConfig) -> anyhow::Result<Arc<dyn RunStore>> {
    if let Some(url) = &config.store.url {
        let store = PgRunStore::connect(url, &config.store).await?;
        return Ok(Arc::new(store));
    }

    match &config.store.fixture_path {
        Some(path) => Ok(Arc::new(MemoryRunStore::from_json_file(path).await?)),
        None => {
            tracing::warn!("No RUNSDB_URL or fixture configured; serving an empty in-memory run store");
            Ok(Arc::new(MemoryRunStore::new()))
        }
    }
}

async fn user_store(config: &AppConfig) -> anyhow::Result<Arc<dyn UserStore>> {
    match &config.auth.user_db_url {
        Some(url) => Ok(Arc::new(
            PgUserStore::connect(url, config.store.connection_timeout_secs).await?,
        )),
        None => Ok(Arc::new(MemoryUserStore::new())),
    }
}

async fn bootstrap_admin(config: &AppConfig, users: &dyn UserStore) -> anyhow::Result<()> {
    let (Some(username), Some(password)) = (&config.auth.admin_username, &config.auth.admin_password) else {
        return Ok(());
    };

    let roles = vec![ADMIN_ROLE.to_string()];
    match create_user(users, username, password, roles, config.auth.password_hash_cost).await {
        Ok(_) => tracing::info!("Created bootstrap admin '{}'", username),
        Err(AuthError::UserExists(_)) => tracing::info!("Bootstrap admin '{}' already exists", username),
        Err(e) => return Err(e).context("failed to create bootstrap admin"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
