//! Account management: creation, authentication and profile updates
//!
//! All email normalization and password hashing happens here so that every
//! store backend receives ready-to-persist records.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AccountError,
    models::{NewUser, UpdateUser, User},
    repositories::UserStore,
};

/// Normalize an email address by lower-casing its domain part
///
/// The local part is left untouched; an address without `@` is returned as is.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

/// Hash a password into a PHC string
pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::PasswordHash(e.to_string()))
}

/// Check a password against a stored PHC string
pub fn verify_password(password_hash: &str, password: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Profile fields a user may change on their own account
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Account operations on top of a [`UserStore`]
#[derive(Clone)]
pub struct UserManager {
    store: Arc<dyn UserStore>,
}

impl UserManager {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Create a regular account
    pub async fn create_user(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<User, AccountError> {
        self.create(email, name, password, false).await
    }

    /// Create an account with the staff and superuser flags set
    pub async fn create_superuser(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<User, AccountError> {
        self.create(email, name, password, true).await
    }

    async fn create(
        &self,
        email: &str,
        name: &str,
        password: &str,
        superuser: bool,
    ) -> Result<User, AccountError> {
        if email.trim().is_empty() {
            return Err(AccountError::MissingEmail);
        }

        let new_user = NewUser {
            email: normalize_email(email),
            name: name.to_string(),
            password_hash: hash_password(password)?,
            is_staff: superuser,
            is_superuser: superuser,
        };

        let user = self.store.insert(&new_user).await?;
        info!("Created user {} (superuser: {})", user.id, superuser);
        Ok(user)
    }

    /// Create the configured superuser unless an account with that email exists
    pub async fn ensure_superuser(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, AccountError> {
        if let Some(existing) = self.store.find_by_email(&normalize_email(email)).await? {
            info!("Superuser {} already present", existing.email);
            return Ok(existing);
        }

        self.create_superuser(email, "admin", password).await
    }

    /// Return the active account matching the credentials
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, AccountError> {
        let user = self.store.find_by_email(&normalize_email(email)).await?;

        Ok(user.filter(|u| u.is_active && verify_password(&u.password_hash, password)))
    }

    /// Find an account by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AccountError> {
        self.store.find_by_id(id).await
    }

    /// Apply profile changes, re-hashing a new password
    pub async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Option<User>, AccountError> {
        let update = UpdateUser {
            email: changes.email.as_deref().map(normalize_email),
            name: changes.name,
            password_hash: changes.password.as_deref().map(hash_password).transpose()?,
        };

        if update.is_empty() {
            return self.store.find_by_id(id).await;
        }

        self.store.update(id, &update).await
    }

    /// Check if the backing store is reachable
    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }
}
