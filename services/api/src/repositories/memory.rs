//! In-process recipe store
//!
//! Keeps recipes, tags and ingredients in ordered maps behind a single lock.
//! Used for local runs without a database (`API__STORAGE=memory`) and by the
//! handler tests.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::RecipeStore;
use crate::models::{Attribute, AttributeKind, NewRecipe, Recipe, RecipeChanges, RecipeFilter};

#[derive(Debug, Clone)]
struct StoredRecipe {
    owner_id: Uuid,
    title: String,
    description: String,
    time_minutes: i32,
    price: Decimal,
    link: String,
    image: Option<String>,
    tag_ids: BTreeSet<i64>,
    ingredient_ids: BTreeSet<i64>,
}

impl StoredRecipe {
    fn links(&self, kind: AttributeKind) -> &BTreeSet<i64> {
        match kind {
            AttributeKind::Tag => &self.tag_ids,
            AttributeKind::Ingredient => &self.ingredient_ids,
        }
    }

    fn links_mut(&mut self, kind: AttributeKind) -> &mut BTreeSet<i64> {
        match kind {
            AttributeKind::Tag => &mut self.tag_ids,
            AttributeKind::Ingredient => &mut self.ingredient_ids,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredAttribute {
    owner_id: Uuid,
    name: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_recipe_id: i64,
    next_attribute_id: i64,
    recipes: BTreeMap<i64, StoredRecipe>,
    tags: BTreeMap<i64, StoredAttribute>,
    ingredients: BTreeMap<i64, StoredAttribute>,
}

impl MemoryState {
    fn attributes(&self, kind: AttributeKind) -> &BTreeMap<i64, StoredAttribute> {
        match kind {
            AttributeKind::Tag => &self.tags,
            AttributeKind::Ingredient => &self.ingredients,
        }
    }

    fn attributes_mut(&mut self, kind: AttributeKind) -> &mut BTreeMap<i64, StoredAttribute> {
        match kind {
            AttributeKind::Tag => &mut self.tags,
            AttributeKind::Ingredient => &mut self.ingredients,
        }
    }

    fn insert_attribute(&mut self, kind: AttributeKind, owner: Uuid, name: &str) -> i64 {
        self.next_attribute_id += 1;
        let id = self.next_attribute_id;
        self.attributes_mut(kind).insert(
            id,
            StoredAttribute {
                owner_id: owner,
                name: name.to_string(),
            },
        );
        id
    }

    /// Upsert-by-name under the owner
    fn resolve(&mut self, kind: AttributeKind, owner: Uuid, name: &str) -> i64 {
        let existing = self
            .attributes(kind)
            .iter()
            .find(|(_, a)| a.owner_id == owner && a.name == name)
            .map(|(id, _)| *id);

        existing.unwrap_or_else(|| self.insert_attribute(kind, owner, name))
    }

    fn resolve_all(&mut self, kind: AttributeKind, owner: Uuid, names: &[String]) -> BTreeSet<i64> {
        names
            .iter()
            .map(|name| self.resolve(kind, owner, name))
            .collect()
    }

    fn owned_recipe(&self, owner: Uuid, id: i64) -> Option<&StoredRecipe> {
        self.recipes.get(&id).filter(|r| r.owner_id == owner)
    }

    fn to_recipe(&self, id: i64, stored: &StoredRecipe) -> Recipe {
        let resolve = |kind: AttributeKind| -> Vec<Attribute> {
            stored
                .links(kind)
                .iter()
                .filter_map(|attribute_id| {
                    self.attributes(kind).get(attribute_id).map(|a| Attribute {
                        id: *attribute_id,
                        name: a.name.clone(),
                    })
                })
                .collect()
        };

        Recipe {
            id,
            owner_id: stored.owner_id,
            title: stored.title.clone(),
            description: stored.description.clone(),
            time_minutes: stored.time_minutes,
            price: stored.price,
            link: stored.link.clone(),
            image: stored.image.clone(),
            tags: resolve(AttributeKind::Tag),
            ingredients: resolve(AttributeKind::Ingredient),
        }
    }
}

fn matches_any(links: &BTreeSet<i64>, wanted: Option<&Vec<i64>>) -> bool {
    match wanted {
        Some(ids) => ids.iter().any(|id| links.contains(id)),
        None => true,
    }
}

/// Map-backed recipe store
#[derive(Clone, Default)]
pub struct MemoryRecipeStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecipeStore for MemoryRecipeStore {
    async fn list_recipes(&self, owner: Uuid, filter: &RecipeFilter) -> Result<Vec<Recipe>> {
        let state = self.state.read().await;

        Ok(state
            .recipes
            .iter()
            .rev()
            .filter(|(_, r)| r.owner_id == owner)
            .filter(|(_, r)| matches_any(&r.tag_ids, filter.tags.as_ref()))
            .filter(|(_, r)| matches_any(&r.ingredient_ids, filter.ingredients.as_ref()))
            .map(|(id, r)| state.to_recipe(*id, r))
            .collect())
    }

    async fn find_recipe(&self, owner: Uuid, id: i64) -> Result<Option<Recipe>> {
        let state = self.state.read().await;
        Ok(state
            .owned_recipe(owner, id)
            .map(|r| state.to_recipe(id, r)))
    }

    async fn create_recipe(&self, owner: Uuid, new_recipe: &NewRecipe) -> Result<Recipe> {
        let mut state = self.state.write().await;

        let tag_ids = state.resolve_all(AttributeKind::Tag, owner, &new_recipe.tags);
        let ingredient_ids =
            state.resolve_all(AttributeKind::Ingredient, owner, &new_recipe.ingredients);

        state.next_recipe_id += 1;
        let id = state.next_recipe_id;
        let stored = StoredRecipe {
            owner_id: owner,
            title: new_recipe.title.clone(),
            description: new_recipe.description.clone(),
            time_minutes: new_recipe.time_minutes,
            price: new_recipe.price,
            link: new_recipe.link.clone(),
            image: None,
            tag_ids,
            ingredient_ids,
        };
        let recipe = state.to_recipe(id, &stored);
        state.recipes.insert(id, stored);

        Ok(recipe)
    }

    async fn update_recipe(
        &self,
        owner: Uuid,
        id: i64,
        changes: &RecipeChanges,
    ) -> Result<Option<Recipe>> {
        let mut state = self.state.write().await;

        let Some(mut stored) = state.owned_recipe(owner, id).cloned() else {
            return Ok(None);
        };

        if let Some(title) = &changes.title {
            stored.title = title.clone();
        }
        if let Some(description) = &changes.description {
            stored.description = description.clone();
        }
        if let Some(time_minutes) = changes.time_minutes {
            stored.time_minutes = time_minutes;
        }
        if let Some(price) = changes.price {
            stored.price = price;
        }
        if let Some(link) = &changes.link {
            stored.link = link.clone();
        }
        for kind in [AttributeKind::Tag, AttributeKind::Ingredient] {
            if let Some(names) = changes.names(kind) {
                *stored.links_mut(kind) = state.resolve_all(kind, owner, names);
            }
        }

        let recipe = state.to_recipe(id, &stored);
        state.recipes.insert(id, stored);

        Ok(Some(recipe))
    }

    async fn delete_recipe(&self, owner: Uuid, id: i64) -> Result<bool> {
        let mut state = self.state.write().await;

        if state.owned_recipe(owner, id).is_none() {
            return Ok(false);
        }
        state.recipes.remove(&id);

        Ok(true)
    }

    async fn set_recipe_image(
        &self,
        owner: Uuid,
        id: i64,
        image: &str,
    ) -> Result<Option<Recipe>> {
        let mut state = self.state.write().await;

        let Some(stored) = state.recipes.get_mut(&id).filter(|r| r.owner_id == owner) else {
            return Ok(None);
        };
        stored.image = Some(image.to_string());

        Ok(state
            .owned_recipe(owner, id)
            .map(|r| state.to_recipe(id, r)))
    }

    async fn list_attributes(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        assigned_only: bool,
    ) -> Result<Vec<Attribute>> {
        let state = self.state.read().await;

        let assigned: BTreeSet<i64> = state
            .recipes
            .values()
            .filter(|r| r.owner_id == owner)
            .flat_map(|r| r.links(kind).iter().copied())
            .collect();

        let mut attributes: Vec<Attribute> = state
            .attributes(kind)
            .iter()
            .filter(|(_, a)| a.owner_id == owner)
            .filter(|(id, _)| !assigned_only || assigned.contains(*id))
            .map(|(id, a)| Attribute {
                id: *id,
                name: a.name.clone(),
            })
            .collect();
        attributes.sort_by(|a, b| b.name.cmp(&a.name).then(b.id.cmp(&a.id)));

        Ok(attributes)
    }

    async fn find_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        id: i64,
    ) -> Result<Option<Attribute>> {
        let state = self.state.read().await;

        Ok(state
            .attributes(kind)
            .get(&id)
            .filter(|a| a.owner_id == owner)
            .map(|a| Attribute {
                id,
                name: a.name.clone(),
            }))
    }

    async fn create_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        name: &str,
    ) -> Result<Attribute> {
        let mut state = self.state.write().await;
        let id = state.insert_attribute(kind, owner, name);

        Ok(Attribute {
            id,
            name: name.to_string(),
        })
    }

    async fn rename_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        id: i64,
        name: &str,
    ) -> Result<Option<Attribute>> {
        let mut state = self.state.write().await;

        let Some(attribute) = state
            .attributes_mut(kind)
            .get_mut(&id)
            .filter(|a| a.owner_id == owner)
        else {
            return Ok(None);
        };
        attribute.name = name.to_string();

        Ok(Some(Attribute {
            id,
            name: name.to_string(),
        }))
    }

    async fn delete_attribute(&self, kind: AttributeKind, owner: Uuid, id: i64) -> Result<bool> {
        let mut state = self.state.write().await;

        let owned = state
            .attributes(kind)
            .get(&id)
            .is_some_and(|a| a.owner_id == owner);
        if !owned {
            return Ok(false);
        }

        state.attributes_mut(kind).remove(&id);
        for recipe in state.recipes.values_mut() {
            recipe.links_mut(kind).remove(&id);
        }

        Ok(true)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
