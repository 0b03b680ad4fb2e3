//! Domain models of the recipe API

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two kinds of named entities a recipe links to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Tag,
    Ingredient,
}

impl AttributeKind {
    /// Table holding entities of this kind
    pub fn table(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Ingredient => "ingredients",
        }
    }

    /// Join table linking recipes to entities of this kind
    pub fn link_table(self) -> &'static str {
        match self {
            AttributeKind::Tag => "recipe_tags",
            AttributeKind::Ingredient => "recipe_ingredients",
        }
    }

    /// Foreign key column of the join table
    pub fn link_column(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tag_id",
            AttributeKind::Ingredient => "ingredient_id",
        }
    }

    /// Maximum length of a name
    pub fn max_name_length(self) -> usize {
        match self {
            AttributeKind::Tag => 50,
            AttributeKind::Ingredient => 100,
        }
    }

    /// Field name used in payloads and query strings
    pub fn field(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Ingredient => "ingredients",
        }
    }
}

/// A tag or an ingredient, as seen by its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: i64,
    pub name: String,
}

/// Recipe with its resolved tags and ingredients
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: i64,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    /// Path of the stored image relative to the media root
    pub image: Option<String>,
    pub tags: Vec<Attribute>,
    pub ingredients: Vec<Attribute>,
}

/// Validated payload of a recipe creation
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub title: String,
    pub description: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    /// Tag names, resolved by name under the owner
    pub tags: Vec<String>,
    /// Ingredient names, resolved by name under the owner
    pub ingredients: Vec<String>,
}

impl NewRecipe {
    pub fn names(&self, kind: AttributeKind) -> &[String] {
        match kind {
            AttributeKind::Tag => &self.tags,
            AttributeKind::Ingredient => &self.ingredients,
        }
    }
}

/// Validated payload of a recipe update
///
/// `None` leaves a field untouched. For `tags` and `ingredients`, `Some`
/// replaces the whole association set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<String>>,
}

impl RecipeChanges {
    pub fn names(&self, kind: AttributeKind) -> Option<&[String]> {
        match kind {
            AttributeKind::Tag => self.tags.as_deref(),
            AttributeKind::Ingredient => self.ingredients.as_deref(),
        }
    }
}

/// Recipe list filter; each set keeps recipes linked to any of its IDs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<i64>>,
}
