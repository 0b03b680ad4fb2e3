//! Account persistence
//!
//! [`UserStore`] is the seam between the account logic and the backing
//! store: PostgreSQL in production, an in-process map for local runs and tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AccountError,
    models::{NewUser, UpdateUser, User},
};

pub mod memory;
pub mod user;

pub use memory::MemoryUserStore;
pub use user::UserRepository;

/// Storage operations on user accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new account; fails with [`AccountError::EmailTaken`] on a
    /// duplicate email
    async fn insert(&self, new_user: &NewUser) -> Result<User, AccountError>;

    /// Find an account by its (normalized) email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountError>;

    /// Find an account by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AccountError>;

    /// Apply the set fields of `changes`; `None` when the account does not exist
    async fn update(&self, id: Uuid, changes: &UpdateUser) -> Result<Option<User>, AccountError>;

    /// Check if the store is reachable
    async fn health_check(&self) -> bool;
}
