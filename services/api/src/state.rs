//! Application state shared across handlers

use common::token::TokenService;
use std::sync::Arc;

use crate::{media::MediaStorage, repositories::RecipeStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecipeStore>,
    pub tokens: TokenService,
    pub media: MediaStorage,
}
