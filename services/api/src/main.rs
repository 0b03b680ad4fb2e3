use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod media;
mod middleware;
mod models;
mod repositories;
mod routes;
mod serializers;
mod settings;
mod state;

use common::{
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    token::{JwtConfig, TokenService},
};

use crate::{
    media::MediaStorage,
    repositories::{MemoryRecipeStore, RecipeRepository, RecipeStore},
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

    info!("Starting API service");

    let settings = Settings::from_env()?;

    let store: Arc<dyn RecipeStore> = match settings.storage {
        StorageBackend::Postgres => {
            let db_config = DatabaseConfig::from_env()?;
            let pool = init_pool(&db_config).await?;

            if health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            run_migrations(&pool).await?;
            Arc::new(RecipeRepository::new(pool))
        }
        StorageBackend::Memory => {
            info!("Using in-memory recipe storage");
            Arc::new(MemoryRecipeStore::new())
        }
    };

    tokio::fs::create_dir_all(&settings.media_root).await?;
    let media = MediaStorage::new(&settings.media_root, settings.max_upload_bytes);
    info!("Serving media from {}", settings.media_root);

    let jwt_config = JwtConfig::from_env()?;
    let tokens = TokenService::new(&jwt_config)?;

    let app_state = AppState {
        store,
        tokens,
        media,
    };

    info!("API service initialized successfully");

    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&settings.bind_address).await?;
    info!("API service listening on {}", settings.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
