//! Application state shared across handlers

use common::token::TokenService;

use crate::manager::UserManager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub users: UserManager,
    pub tokens: TokenService,
}
