//! Shared building blocks of the recipe backend
//!
//! Both services depend on this crate for database connectivity and
//! migrations, the bearer token codec they use to agree on who a caller is,
//! and the per-field validation error shape returned to clients.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     run_migrations(&pool).await?;
//!     println!("Database reachable: {}", health_check(&pool).await?);
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
pub mod token;
pub mod validation;
