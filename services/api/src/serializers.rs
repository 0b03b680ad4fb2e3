//! Request validation and response shapes of the recipe API
//!
//! Payloads are read field by field from raw JSON so that every offending
//! field gets its own message, and so unknown or read-only fields (`id`,
//! `user`, `image`) are silently ignored.

use common::validation::FieldErrors;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::{
    media::media_url,
    models::{Attribute, AttributeKind, NewRecipe, Recipe, RecipeChanges, RecipeFilter},
};

const TITLE_MAX_LENGTH: usize = 150;
const LINK_MAX_LENGTH: usize = 255;
const PRICE_MAX_DECIMAL_PLACES: u32 = 2;
const PRICE_MAX_WHOLE_DIGITS: u32 = 3;

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";
const INVALID_INTEGER: &str = "A valid integer is required.";

/// Recipe as shown in lists
#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: String,
    pub link: String,
    pub tags: Vec<Attribute>,
    pub ingredients: Vec<Attribute>,
}

impl From<&Recipe> for RecipeSummary {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title.clone(),
            time_minutes: recipe.time_minutes,
            price: format_price(recipe.price),
            link: recipe.link.clone(),
            tags: recipe.tags.clone(),
            ingredients: recipe.ingredients.clone(),
        }
    }
}

/// Recipe as shown on its own
#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub summary: RecipeSummary,
    pub description: String,
    /// Public URL of the image
    pub image: Option<String>,
}

impl From<&Recipe> for RecipeDetail {
    fn from(recipe: &Recipe) -> Self {
        Self {
            summary: RecipeSummary::from(recipe),
            description: recipe.description.clone(),
            image: recipe.image.as_deref().map(media_url),
        }
    }
}

/// Response of an image upload
#[derive(Debug, Serialize, Deserialize)]
pub struct ImageResponse {
    pub id: i64,
    pub image: Option<String>,
}

impl From<&Recipe> for ImageResponse {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            image: recipe.image.as_deref().map(media_url),
        }
    }
}

/// Prices always carry two decimal places on the wire
pub fn format_price(price: Decimal) -> String {
    format!("{:.2}", price)
}

/// Query string of the recipe list
#[derive(Debug, Default, Deserialize)]
pub struct RecipeQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

impl RecipeQuery {
    /// Parse the comma-separated ID lists into a filter
    pub fn filter(&self) -> Result<RecipeFilter, FieldErrors> {
        let mut errors = FieldErrors::new();
        let filter = RecipeFilter {
            tags: parse_ids(
                &mut errors,
                AttributeKind::Tag.field(),
                self.tags.as_deref(),
            ),
            ingredients: parse_ids(
                &mut errors,
                AttributeKind::Ingredient.field(),
                self.ingredients.as_deref(),
            ),
        };
        errors.into_result()?;
        Ok(filter)
    }
}

fn parse_ids(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Option<Vec<i64>> {
    let raw = raw.filter(|s| !s.is_empty())?;

    let mut ids = Vec::new();
    for part in raw.split(',') {
        match part.trim().parse::<i64>() {
            Ok(id) => ids.push(id),
            Err(_) => {
                errors.add(field, format!("\"{}\" is not a valid ID.", part.trim()));
                return None;
            }
        }
    }
    Some(ids)
}

/// Query string of the tag and ingredient lists
#[derive(Debug, Default, Deserialize)]
pub struct AttributeQuery {
    pub assigned_only: Option<String>,
}

impl AttributeQuery {
    /// Any non-zero integer restricts the list to attributes in use
    pub fn assigned_only(&self) -> Result<bool, FieldErrors> {
        match self.assigned_only.as_deref() {
            None => Ok(false),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map(|flag| flag != 0)
                .map_err(|_| FieldErrors::single("assigned_only", INVALID_INTEGER)),
        }
    }
}

fn as_object(body: &Value) -> Result<&Map<String, Value>, FieldErrors> {
    body.as_object().ok_or_else(|| {
        FieldErrors::single("non_field_errors", "Invalid data. Expected a dictionary.")
    })
}

/// Validate a recipe creation payload
pub fn new_recipe(body: &Value) -> Result<NewRecipe, FieldErrors> {
    let changes = recipe_changes(body, false)?;

    // Required fields are guaranteed present once validation passed
    match (changes.title, changes.time_minutes, changes.price) {
        (Some(title), Some(time_minutes), Some(price)) => Ok(NewRecipe {
            title,
            description: changes.description.unwrap_or_default(),
            time_minutes,
            price,
            link: changes.link.unwrap_or_default(),
            tags: changes.tags.unwrap_or_default(),
            ingredients: changes.ingredients.unwrap_or_default(),
        }),
        _ => Err(FieldErrors::single("non_field_errors", REQUIRED)),
    }
}

/// Validate a recipe update payload
///
/// A full update (`partial == false`) requires `title`, `time_minutes` and
/// `price`; everything else may be omitted and is then left unchanged.
pub fn recipe_changes(body: &Value, partial: bool) -> Result<RecipeChanges, FieldErrors> {
    let object = as_object(body)?;
    let required = !partial;
    let mut errors = FieldErrors::new();

    let changes = RecipeChanges {
        title: text(
            &mut errors,
            object,
            "title",
            TITLE_MAX_LENGTH,
            false,
            required,
        ),
        description: text(&mut errors, object, "description", usize::MAX, true, false),
        time_minutes: time_minutes(&mut errors, object, required),
        price: price(&mut errors, object, required),
        link: text(&mut errors, object, "link", LINK_MAX_LENGTH, true, false),
        tags: names(&mut errors, object, AttributeKind::Tag),
        ingredients: names(&mut errors, object, AttributeKind::Ingredient),
    };

    errors.into_result()?;
    Ok(changes)
}

/// Validate a tag or ingredient update payload
///
/// Returns `None` when a partial update leaves the name out.
pub fn attribute_name(
    body: &Value,
    kind: AttributeKind,
    partial: bool,
) -> Result<Option<String>, FieldErrors> {
    let object = as_object(body)?;
    let mut errors = FieldErrors::new();
    let name = text(
        &mut errors,
        object,
        "name",
        kind.max_name_length(),
        false,
        !partial,
    );
    errors.into_result()?;
    Ok(name)
}

/// Look up a field, recording missing and null values
fn present<'a>(
    errors: &mut FieldErrors,
    object: &'a Map<String, Value>,
    field: &str,
    required: bool,
) -> Option<&'a Value> {
    match object.get(field) {
        None => {
            if required {
                errors.add(field, REQUIRED);
            }
            None
        }
        Some(Value::Null) => {
            errors.add(field, NOT_NULL);
            None
        }
        Some(value) => Some(value),
    }
}

fn check_text(value: &Value, max_length: usize, allow_blank: bool) -> Result<String, String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return Err("Not a valid string.".to_string()),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() && !allow_blank {
        return Err(NOT_BLANK.to_string());
    }
    if trimmed.chars().count() > max_length {
        return Err(format!(
            "Ensure this field has no more than {} characters.",
            max_length
        ));
    }
    Ok(trimmed.to_string())
}

fn text(
    errors: &mut FieldErrors,
    object: &Map<String, Value>,
    field: &str,
    max_length: usize,
    allow_blank: bool,
    required: bool,
) -> Option<String> {
    let value = present(errors, object, field, required)?;
    match check_text(value, max_length, allow_blank) {
        Ok(text) => Some(text),
        Err(message) => {
            errors.add(field, message);
            None
        }
    }
}

fn time_minutes(
    errors: &mut FieldErrors,
    object: &Map<String, Value>,
    required: bool,
) -> Option<i32> {
    const FIELD: &str = "time_minutes";
    let value = present(errors, object, FIELD, required)?;

    let parsed = match value {
        Value::Number(n) => parse_integer(&n.to_string()),
        Value::String(s) => parse_integer(s),
        _ => None,
    };

    let result = match parsed {
        None => Err(INVALID_INTEGER.to_string()),
        Some(minutes) => i32::try_from(minutes).map_err(|_| {
            let (relation, bound) = if minutes < 0 {
                ("greater", i32::MIN)
            } else {
                ("less", i32::MAX)
            };
            format!("Ensure this value is {relation} than or equal to {bound}.")
        }),
    };

    match result {
        Ok(minutes) => Some(minutes),
        Err(message) => {
            errors.add(FIELD, message);
            None
        }
    }
}

/// Integer from its text form; a zero fraction such as `"15.0"` is allowed
fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let whole = match raw.split_once('.') {
        Some((whole, fraction)) if fraction.chars().all(|c| c == '0') => whole,
        Some(_) => return None,
        None => raw,
    };
    whole.parse().ok()
}

/// Parse and bound-check a price, returning it with exactly two decimal places
pub fn parse_price(value: &Value) -> Result<Decimal, String> {
    const INVALID: &str = "A valid number is required.";

    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(INVALID.to_string()),
    };

    let mut price = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| INVALID.to_string())?
        .normalize();

    if price.scale() > PRICE_MAX_DECIMAL_PLACES {
        return Err(format!(
            "Ensure that there are no more than {} decimal places.",
            PRICE_MAX_DECIMAL_PLACES
        ));
    }
    if price.abs() >= Decimal::from(10_i64.pow(PRICE_MAX_WHOLE_DIGITS)) {
        return Err(format!(
            "Ensure that there are no more than {} digits before the decimal point.",
            PRICE_MAX_WHOLE_DIGITS
        ));
    }

    price.rescale(PRICE_MAX_DECIMAL_PLACES);
    Ok(price)
}

fn price(errors: &mut FieldErrors, object: &Map<String, Value>, required: bool) -> Option<Decimal> {
    let value = present(errors, object, "price", required)?;
    match parse_price(value) {
        Ok(price) => Some(price),
        Err(message) => {
            errors.add("price", message);
            None
        }
    }
}

/// Nested `[{"name": ...}, ...]` list; duplicate names collapse to one
fn names(
    errors: &mut FieldErrors,
    object: &Map<String, Value>,
    kind: AttributeKind,
) -> Option<Vec<String>> {
    let field = kind.field();
    let value = present(errors, object, field, false)?;

    let Value::Array(items) = value else {
        errors.add(field, "Expected a list of items.");
        return None;
    };

    let mut collected: Vec<String> = Vec::with_capacity(items.len());
    let mut valid = true;
    for item in items {
        let name = match item.as_object().and_then(|o| o.get("name")) {
            None => Err(format!("name: {}", REQUIRED)),
            Some(Value::Null) => Err(format!("name: {}", NOT_NULL)),
            Some(name) => check_text(name, kind.max_name_length(), false)
                .map_err(|message| format!("name: {}", message)),
        };

        match name {
            Ok(name) if !collected.contains(&name) => collected.push(name),
            Ok(_) => {}
            Err(message) => {
                errors.add(field, message);
                valid = false;
            }
        }
    }

    valid.then_some(collected)
}
