use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod manager;
mod middleware;
mod models;
mod repositories;
mod routes;
mod settings;
mod state;
mod validation;

use common::{
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    token::{JwtConfig, TokenService},
};

use crate::{
    manager::UserManager,
    repositories::{MemoryUserStore, UserRepository, UserStore},
    settings::{Settings, StorageBackend},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    let settings = Settings::from_env()?;

    let store: Arc<dyn UserStore> = match settings.storage {
        StorageBackend::Postgres => {
            let db_config = DatabaseConfig::from_env()?;
            let pool = init_pool(&db_config).await?;

            if health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            run_migrations(&pool).await?;
            Arc::new(UserRepository::new(pool))
        }
        StorageBackend::Memory => {
            info!("Using in-memory account storage");
            Arc::new(MemoryUserStore::new())
        }
    };

    let users = UserManager::new(store);

    if let Some((email, password)) = settings.superuser() {
        users.ensure_superuser(email, password).await?;
    }

    let jwt_config = JwtConfig::from_env()?;
    let tokens = TokenService::new(&jwt_config)?;

    let app_state = AppState { users, tokens };

    info!("Authentication service initialized successfully");

    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&settings.bind_address).await?;
    info!(
        "Authentication service listening on {}",
        settings.bind_address
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Authentication service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
