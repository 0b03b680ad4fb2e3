//! Repositories for database operations
//!
//! Every operation takes the caller's user ID and only ever sees records
//! owned by that user; a record owned by someone else behaves exactly like a
//! missing one.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Attribute, AttributeKind, NewRecipe, Recipe, RecipeChanges, RecipeFilter};

pub mod memory;
pub mod recipes;

pub use memory::MemoryRecipeStore;
pub use recipes::RecipeRepository;

/// Owner-scoped storage of recipes, tags and ingredients
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// List the owner's recipes, newest first
    async fn list_recipes(&self, owner: Uuid, filter: &RecipeFilter) -> Result<Vec<Recipe>>;

    /// Find one of the owner's recipes
    async fn find_recipe(&self, owner: Uuid, id: i64) -> Result<Option<Recipe>>;

    /// Create a recipe, resolving tag and ingredient names under the owner
    async fn create_recipe(&self, owner: Uuid, new_recipe: &NewRecipe) -> Result<Recipe>;

    /// Update one of the owner's recipes; `None` if it does not exist
    async fn update_recipe(
        &self,
        owner: Uuid,
        id: i64,
        changes: &RecipeChanges,
    ) -> Result<Option<Recipe>>;

    /// Delete one of the owner's recipes; false if it does not exist
    async fn delete_recipe(&self, owner: Uuid, id: i64) -> Result<bool>;

    /// Replace the image reference of one of the owner's recipes
    async fn set_recipe_image(&self, owner: Uuid, id: i64, image: &str)
    -> Result<Option<Recipe>>;

    /// List the owner's tags or ingredients by name, descending
    async fn list_attributes(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        assigned_only: bool,
    ) -> Result<Vec<Attribute>>;

    /// Find one of the owner's tags or ingredients
    async fn find_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        id: i64,
    ) -> Result<Option<Attribute>>;

    /// Create a tag or ingredient for the owner
    async fn create_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        name: &str,
    ) -> Result<Attribute>;

    /// Rename one of the owner's tags or ingredients
    async fn rename_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        id: i64,
        name: &str,
    ) -> Result<Option<Attribute>>;

    /// Delete one of the owner's tags or ingredients, unlinking it from recipes
    async fn delete_attribute(&self, kind: AttributeKind, owner: Uuid, id: i64) -> Result<bool>;

    /// Check if the store is reachable
    async fn health_check(&self) -> bool;
}
