//! Recipe repository for database operations

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use super::RecipeStore;
use crate::models::{Attribute, AttributeKind, NewRecipe, Recipe, RecipeChanges, RecipeFilter};

const RECIPE_COLUMNS: &str =
    "r.id, r.owner_id, r.title, r.description, r.time_minutes, r.price, r.link, r.image";

const KINDS: [AttributeKind; 2] = [AttributeKind::Tag, AttributeKind::Ingredient];

/// PostgreSQL-backed recipe repository
#[derive(Clone)]
pub struct RecipeRepository {
    pool: PgPool,
}

impl RecipeRepository {
    /// Create a new recipe repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attach tags and ingredients to recipe rows
    async fn hydrate(&self, conn: &mut PgConnection, rows: Vec<PgRow>) -> Result<Vec<Recipe>> {
        let mut recipes: Vec<Recipe> = rows.iter().map(recipe_from_row).collect();
        let ids: Vec<i64> = recipes.iter().map(|r| r.id).collect();

        if ids.is_empty() {
            return Ok(recipes);
        }

        for kind in KINDS {
            let mut linked = load_attributes(conn, kind, &ids).await?;
            for recipe in &mut recipes {
                let attributes = linked.remove(&recipe.id).unwrap_or_default();
                match kind {
                    AttributeKind::Tag => recipe.tags = attributes,
                    AttributeKind::Ingredient => recipe.ingredients = attributes,
                }
            }
        }

        Ok(recipes)
    }

    async fn fetch_recipe(
        &self,
        conn: &mut PgConnection,
        owner: Uuid,
        id: i64,
    ) -> Result<Option<Recipe>> {
        let sql = format!(
            "SELECT {} FROM recipes r WHERE r.id = $1 AND r.owner_id = $2",
            RECIPE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

fn recipe_from_row(row: &PgRow) -> Recipe {
    Recipe {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        description: row.get("description"),
        time_minutes: row.get("time_minutes"),
        price: row.get("price"),
        link: row.get("link"),
        image: row.get("image"),
        tags: Vec::new(),
        ingredients: Vec::new(),
    }
}

fn attribute_from_row(row: &PgRow) -> Attribute {
    Attribute {
        id: row.get("id"),
        name: row.get("name"),
    }
}

/// Load the attributes of `kind` linked to each of the given recipes
async fn load_attributes(
    conn: &mut PgConnection,
    kind: AttributeKind,
    recipe_ids: &[i64],
) -> Result<HashMap<i64, Vec<Attribute>>> {
    let sql = format!(
        r#"
        SELECT l.recipe_id, a.id, a.name
        FROM {link} l
        JOIN {table} a ON a.id = l.{column}
        WHERE l.recipe_id = ANY($1)
        ORDER BY a.id
        "#,
        link = kind.link_table(),
        table = kind.table(),
        column = kind.link_column(),
    );

    let rows = sqlx::query(&sql)
        .bind(recipe_ids)
        .fetch_all(&mut *conn)
        .await?;

    let mut linked: HashMap<i64, Vec<Attribute>> = HashMap::new();
    for row in rows {
        linked
            .entry(row.get("recipe_id"))
            .or_default()
            .push(attribute_from_row(&row));
    }

    Ok(linked)
}

/// Upsert-by-name: reuse the owner's attribute with this name or create it
async fn resolve_attribute(
    conn: &mut PgConnection,
    kind: AttributeKind,
    owner: Uuid,
    name: &str,
) -> Result<i64> {
    let select = format!(
        "SELECT id FROM {} WHERE owner_id = $1 AND name = $2 ORDER BY id LIMIT 1",
        kind.table()
    );
    let existing = sqlx::query(&select)
        .bind(owner)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(row) = existing {
        return Ok(row.get("id"));
    }

    let insert = format!(
        "INSERT INTO {} (name, owner_id) VALUES ($1, $2) RETURNING id",
        kind.table()
    );
    let row = sqlx::query(&insert)
        .bind(name)
        .bind(owner)
        .fetch_one(&mut *conn)
        .await?;

    Ok(row.get("id"))
}

/// Replace the recipe's links of `kind` with the named attributes
async fn link_attributes(
    conn: &mut PgConnection,
    kind: AttributeKind,
    owner: Uuid,
    recipe_id: i64,
    names: &[String],
) -> Result<()> {
    let delete = format!("DELETE FROM {} WHERE recipe_id = $1", kind.link_table());
    sqlx::query(&delete)
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    let insert = format!(
        "INSERT INTO {} (recipe_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        kind.link_table(),
        kind.link_column()
    );
    for name in names {
        let attribute_id = resolve_attribute(conn, kind, owner, name).await?;
        sqlx::query(&insert)
            .bind(recipe_id)
            .bind(attribute_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

#[async_trait]
impl RecipeStore for RecipeRepository {
    async fn list_recipes(&self, owner: Uuid, filter: &RecipeFilter) -> Result<Vec<Recipe>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM recipes r
            WHERE r.owner_id = $1
              AND ($2::BIGINT[] IS NULL OR EXISTS (
                    SELECT 1 FROM recipe_tags rt
                    WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2)))
              AND ($3::BIGINT[] IS NULL OR EXISTS (
                    SELECT 1 FROM recipe_ingredients ri
                    WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY($3)))
            ORDER BY r.id DESC
            "#,
            RECIPE_COLUMNS
        );

        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(&sql)
            .bind(owner)
            .bind(filter.tags.clone())
            .bind(filter.ingredients.clone())
            .fetch_all(&mut *conn)
            .await?;

        self.hydrate(&mut conn, rows).await
    }

    async fn find_recipe(&self, owner: Uuid, id: i64) -> Result<Option<Recipe>> {
        let mut conn = self.pool.acquire().await?;
        self.fetch_recipe(&mut conn, owner, id).await
    }

    async fn create_recipe(&self, owner: Uuid, new_recipe: &NewRecipe) -> Result<Recipe> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO recipes (owner_id, title, description, time_minutes, price, link)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(owner)
        .bind(&new_recipe.title)
        .bind(&new_recipe.description)
        .bind(new_recipe.time_minutes)
        .bind(new_recipe.price)
        .bind(&new_recipe.link)
        .fetch_one(&mut *tx)
        .await?;
        let id: i64 = row.get("id");

        for kind in KINDS {
            link_attributes(&mut tx, kind, owner, id, new_recipe.names(kind)).await?;
        }

        let recipe = self
            .fetch_recipe(&mut tx, owner, id)
            .await?
            .ok_or_else(|| anyhow!("Recipe {} vanished during creation", id))?;
        tx.commit().await?;

        info!("Created recipe {} for {}", id, owner);
        Ok(recipe)
    }

    async fn update_recipe(
        &self,
        owner: Uuid,
        id: i64,
        changes: &RecipeChanges,
    ) -> Result<Option<Recipe>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE recipes
            SET title = COALESCE($3, title),
                description = COALESCE($4, description),
                time_minutes = COALESCE($5, time_minutes),
                price = COALESCE($6, price),
                link = COALESCE($7, link)
            WHERE id = $1 AND owner_id = $2
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.time_minutes)
        .bind(changes.price)
        .bind(&changes.link)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            return Ok(None);
        }

        for kind in KINDS {
            if let Some(names) = changes.names(kind) {
                link_attributes(&mut tx, kind, owner, id, names).await?;
            }
        }

        let recipe = self.fetch_recipe(&mut tx, owner, id).await?;
        tx.commit().await?;

        info!("Updated recipe {} for {}", id, owner);
        Ok(recipe)
    }

    async fn delete_recipe(&self, owner: Uuid, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_recipe_image(
        &self,
        owner: Uuid,
        id: i64,
        image: &str,
    ) -> Result<Option<Recipe>> {
        let mut conn = self.pool.acquire().await?;

        let updated = sqlx::query(
            "UPDATE recipes SET image = $3 WHERE id = $1 AND owner_id = $2 RETURNING id",
        )
        .bind(id)
        .bind(owner)
        .bind(image)
        .fetch_optional(&mut *conn)
        .await?;

        if updated.is_none() {
            return Ok(None);
        }

        self.fetch_recipe(&mut conn, owner, id).await
    }

    async fn list_attributes(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        assigned_only: bool,
    ) -> Result<Vec<Attribute>> {
        let sql = format!(
            r#"
            SELECT a.id, a.name
            FROM {table} a
            WHERE a.owner_id = $1
              AND (NOT $2 OR EXISTS (
                    SELECT 1 FROM {link} l
                    JOIN recipes r ON r.id = l.recipe_id
                    WHERE l.{column} = a.id AND r.owner_id = $1))
            ORDER BY a.name DESC, a.id DESC
            "#,
            table = kind.table(),
            link = kind.link_table(),
            column = kind.link_column(),
        );

        let rows = sqlx::query(&sql)
            .bind(owner)
            .bind(assigned_only)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(attribute_from_row).collect())
    }

    async fn find_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        id: i64,
    ) -> Result<Option<Attribute>> {
        let sql = format!(
            "SELECT id, name FROM {} WHERE id = $1 AND owner_id = $2",
            kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(attribute_from_row))
    }

    async fn create_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        name: &str,
    ) -> Result<Attribute> {
        let sql = format!(
            "INSERT INTO {} (name, owner_id) VALUES ($1, $2) RETURNING id, name",
            kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(owner)
            .fetch_one(&self.pool)
            .await?;

        Ok(attribute_from_row(&row))
    }

    async fn rename_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        id: i64,
        name: &str,
    ) -> Result<Option<Attribute>> {
        let sql = format!(
            "UPDATE {} SET name = $3 WHERE id = $1 AND owner_id = $2 RETURNING id, name",
            kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(owner)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(attribute_from_row))
    }

    async fn delete_attribute(&self, kind: AttributeKind, owner: Uuid, id: i64) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE id = $1 AND owner_id = $2",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> bool {
        common::database::health_check(&self.pool)
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::database::{DatabaseConfig, init_pool, run_migrations};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    async fn repository() -> (RecipeRepository, Uuid) {
        let pool = init_pool(&DatabaseConfig::from_env().unwrap())
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();

        let owner: Uuid = sqlx::query(
            "INSERT INTO users (email, name, password_hash) VALUES ($1, 'test', 'x') RETURNING id",
        )
        .bind(format!("{}@example.com", Uuid::new_v4()))
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("id");

        (RecipeRepository::new(pool), owner)
    }

    fn new_recipe(title: &str, tags: &[&str]) -> NewRecipe {
        NewRecipe {
            title: title.to_string(),
            description: String::new(),
            time_minutes: 5,
            price: Decimal::from_str("5.50").unwrap(),
            link: String::new(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            ingredients: vec!["Salt".to_string()],
        }
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_recipe_lifecycle() {
        let (repository, owner) = repository().await;

        let curry = repository
            .create_recipe(owner, &new_recipe("Curry", &["Indian", "Spicy"]))
            .await
            .unwrap();
        let dal = repository
            .create_recipe(owner, &new_recipe("Dal", &["Indian"]))
            .await
            .unwrap();

        assert_eq!(curry.tags.len(), 2);
        assert_eq!(curry.price.to_string(), "5.50");
        assert_eq!(curry.ingredients[0].id, dal.ingredients[0].id);

        let spicy = curry.tags.iter().find(|t| t.name == "Spicy").unwrap().id;
        let filter = RecipeFilter {
            tags: Some(vec![spicy]),
            ingredients: None,
        };
        let filtered = repository.list_recipes(owner, &filter).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, curry.id);

        // Matching through several IDs still lists a recipe once
        let filter = RecipeFilter {
            tags: Some(curry.tags.iter().map(|t| t.id).collect()),
            ingredients: Some(curry.ingredients.iter().map(|i| i.id).collect()),
        };
        let filtered = repository.list_recipes(owner, &filter).await.unwrap();
        let ids: Vec<i64> = filtered.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![dal.id, curry.id]);

        let changes = RecipeChanges {
            tags: Some(vec![]),
            ..Default::default()
        };
        let cleared = repository
            .update_recipe(owner, curry.id, &changes)
            .await
            .unwrap()
            .unwrap();
        assert!(cleared.tags.is_empty());
        assert_eq!(cleared.ingredients.len(), 1);

        let assigned = repository
            .list_attributes(AttributeKind::Tag, owner, true)
            .await
            .unwrap();
        let names: Vec<&str> = assigned.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Indian"]);

        assert!(repository.delete_recipe(owner, dal.id).await.unwrap());
        assert!(
            !repository
                .delete_recipe(Uuid::new_v4(), curry.id)
                .await
                .unwrap()
        );
        assert!(
            repository
                .find_recipe(owner, dal.id)
                .await
                .unwrap()
                .is_none()
        );
    }
}
