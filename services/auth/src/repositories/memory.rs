//! In-process user store
//!
//! Keeps accounts in a map behind a lock. Used for local runs without a
//! database (`AUTH__STORAGE=memory`) and by the handler tests.

use async_trait::async_trait;
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::UserStore;
use crate::{
    error::AccountError,
    models::{NewUser, UpdateUser, User},
};

/// Map-backed user store
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, new_user: &NewUser) -> Result<User, AccountError> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == new_user.email) {
            return Err(AccountError::EmailTaken(new_user.email.clone()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email.clone(),
            name: new_user.name.clone(),
            password_hash: new_user.password_hash.clone(),
            is_active: true,
            is_staff: new_user.is_staff,
            is_superuser: new_user.is_superuser,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AccountError> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, changes: &UpdateUser) -> Result<Option<User>, AccountError> {
        let mut users = self.users.write().await;

        if let Some(email) = &changes.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(AccountError::EmailTaken(email.clone()));
            }
        }

        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(name) = &changes.name {
            user.name = name.clone();
        }
        if let Some(password_hash) = &changes.password_hash {
            user.password_hash = password_hash.clone();
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn health_check(&self) -> bool {
        true
    }
}
