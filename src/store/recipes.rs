use super::images::{ImageRecord, ImageRecordManager};
use super::now;
use crate::error::{Result, TastebaseError};
use crate::model::{Difficulty, ParsedIngredient, ParsedInstruction, ParsedRecipe};
use log::debug;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

const TAG_SEPARATOR: char = '\u{1f}';

/// Recipe content as submitted by a client or produced by the parser,
/// before it has an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeDraft(pub ParsedRecipe);

impl From<ParsedRecipe> for RecipeDraft {
    fn from(recipe: ParsedRecipe) -> Self {
        Self(recipe)
    }
}

impl RecipeDraft {
    /// Normalized copy of the draft, or `InvalidRecipe`.
    pub fn validated(&self) -> Result<ParsedRecipe> {
        let recipe = self.0.clone().normalize();
        recipe.validate()?;
        Ok(recipe)
    }
}

/// A stored recipe with everything hanging off it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeRecord {
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub recipe: ParsedRecipe,
    pub is_favorite: bool,
    pub images: Vec<ImageRecord>,
    pub created_at: String,
    pub updated_at: String,
}

/// One row of a recipe listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeSummary {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time_minutes: Option<u32>,
    pub tags: Vec<String>,
    pub is_favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hero_image_id: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecipeQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default, alias = "favorites")]
    pub favorites_only: bool,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModificationRecord {
    pub id: String,
    pub recipe_id: String,
    pub note: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: i64,
}

fn opt_u32(row: &SqliteRow, column: &str) -> Option<u32> {
    row.get::<Option<i64>, _>(column)
        .and_then(|v| u32::try_from(v).ok())
}

fn opt_difficulty(row: &SqliteRow) -> Option<Difficulty> {
    row.get::<Option<String>, _>("difficulty")
        .and_then(|d| d.parse().ok())
}

fn flag(row: &SqliteRow, column: &str) -> bool {
    row.get::<i64, _>(column) != 0
}

/// `%term%` for LIKE, with the wildcards in `term` escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

pub struct RecipeManager {
    pool: SqlitePool,
}

impl RecipeManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: &str, draft: &RecipeDraft) -> Result<RecipeRecord> {
        let recipe = draft.validated()?;
        let id = Uuid::new_v4().to_string();
        let now = now();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r"
            INSERT INTO recipes (id, user_id, title, description, servings, prep_time_minutes,
                                 cook_time_minutes, difficulty, cuisine, source_url, image_url,
                                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            ",
        )
        .bind(&id)
        .bind(user_id)
        .bind(&recipe.title)
        .bind(&recipe.description)
        .bind(recipe.servings.map(i64::from))
        .bind(recipe.prep_time_minutes.map(i64::from))
        .bind(recipe.cook_time_minutes.map(i64::from))
        .bind(recipe.difficulty.map(|d| d.as_str()))
        .bind(&recipe.cuisine)
        .bind(&recipe.source_url)
        .bind(&recipe.image_url)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        write_children(&mut tx, user_id, &id, &recipe).await?;
        tx.commit().await?;
        debug!("Created recipe {} for user {}", id, user_id);

        self.get(user_id, &id).await
    }

    pub async fn get(&self, user_id: &str, id: &str) -> Result<RecipeRecord> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, title, description, servings, prep_time_minutes, cook_time_minutes,
                   difficulty, cuisine, source_url, image_url, created_at, updated_at,
                   EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = recipes.id AND f.user_id = $2)
                       AS is_favorite
            FROM recipes
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| TastebaseError::NotFound(format!("recipe {id}")))?;

        let ingredients = sqlx::query(
            "SELECT name, quantity, unit, notes FROM ingredients WHERE recipe_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|r| ParsedIngredient {
            name: r.get("name"),
            quantity: r.get("quantity"),
            unit: r.get("unit"),
            notes: r.get("notes"),
        })
        .collect();

        let instructions = sqlx::query(
            "SELECT step_number, text, time_minutes FROM instructions WHERE recipe_id = $1 ORDER BY step_number",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|r| ParsedInstruction {
            step_number: opt_u32(r, "step_number").unwrap_or_default(),
            text: r.get("text"),
            time_minutes: opt_u32(r, "time_minutes"),
        })
        .collect();

        let tags: Vec<String> = sqlx::query_scalar(
            r"
            SELECT t.name FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = $1
            ORDER BY t.name
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let images = ImageRecordManager::new(self.pool.clone()).list(id).await?;

        Ok(RecipeRecord {
            id: row.get("id"),
            user_id: row.get("user_id"),
            recipe: ParsedRecipe {
                title: row.get("title"),
                description: row.get("description"),
                servings: opt_u32(&row, "servings"),
                prep_time_minutes: opt_u32(&row, "prep_time_minutes"),
                cook_time_minutes: opt_u32(&row, "cook_time_minutes"),
                difficulty: opt_difficulty(&row),
                cuisine: row.get("cuisine"),
                ingredients,
                instructions,
                tags,
                source_url: row.get("source_url"),
                image_url: row.get("image_url"),
            },
            is_favorite: flag(&row, "is_favorite"),
            images,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Newest-first listing of the user's recipes
    pub async fn list(&self, user_id: &str, query: &RecipeQuery) -> Result<Vec<RecipeSummary>> {
        let search = query
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);
        let tag = query
            .tag
            .as_deref()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);

        let rows = sqlx::query(
            r"
            SELECT r.id, r.title, r.description, r.cuisine, r.difficulty,
                   r.prep_time_minutes, r.cook_time_minutes, r.updated_at,
                   EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = $1)
                       AS is_favorite,
                   (SELECT i.id FROM recipe_images i WHERE i.recipe_id = r.id AND i.is_hero = 1)
                       AS hero_image_id,
                   (SELECT group_concat(t.name, char(31)) FROM recipe_tags rt
                       JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id) AS tag_names
            FROM recipes r
            WHERE r.user_id = $1
              AND ($2 IS NULL
                   OR lower(r.title) LIKE $2 ESCAPE '\'
                   OR lower(coalesce(r.description, '')) LIKE $2 ESCAPE '\')
              AND ($3 IS NULL OR EXISTS (
                   SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id
                   WHERE rt.recipe_id = r.id AND t.name = $3))
              AND ($4 = 0 OR EXISTS (
                   SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = $1))
            ORDER BY r.updated_at DESC, r.rowid DESC
            LIMIT $5 OFFSET $6
            ",
        )
        .bind(user_id)
        .bind(search)
        .bind(tag)
        .bind(i64::from(query.favorites_only))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let mut tags: Vec<String> = r
                    .get::<Option<String>, _>("tag_names")
                    .map(|names| names.split(TAG_SEPARATOR).map(String::from).collect())
                    .unwrap_or_default();
                tags.sort();

                let total_time_minutes = match (
                    opt_u32(r, "prep_time_minutes"),
                    opt_u32(r, "cook_time_minutes"),
                ) {
                    (None, None) => None,
                    (prep, cook) => Some(prep.unwrap_or(0) + cook.unwrap_or(0)),
                };

                RecipeSummary {
                    id: r.get("id"),
                    title: r.get("title"),
                    description: r.get("description"),
                    cuisine: r.get("cuisine"),
                    difficulty: opt_difficulty(r),
                    total_time_minutes,
                    tags,
                    is_favorite: flag(r, "is_favorite"),
                    hero_image_id: r.get("hero_image_id"),
                    updated_at: r.get("updated_at"),
                }
            })
            .collect())
    }

    /// Replace the recipe's content, children and tags in one go.
    pub async fn update(&self, user_id: &str, id: &str, draft: &RecipeDraft) -> Result<RecipeRecord> {
        let recipe = draft.validated()?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r"
            UPDATE recipes
            SET title = $3, description = $4, servings = $5, prep_time_minutes = $6,
                cook_time_minutes = $7, difficulty = $8, cuisine = $9, source_url = $10,
                image_url = $11, updated_at = $12
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(&recipe.title)
        .bind(&recipe.description)
        .bind(recipe.servings.map(i64::from))
        .bind(recipe.prep_time_minutes.map(i64::from))
        .bind(recipe.cook_time_minutes.map(i64::from))
        .bind(recipe.difficulty.map(|d| d.as_str()))
        .bind(&recipe.cuisine)
        .bind(&recipe.source_url)
        .bind(&recipe.image_url)
        .bind(now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TastebaseError::NotFound(format!("recipe {id}")));
        }

        for statement in [
            "DELETE FROM ingredients WHERE recipe_id = $1",
            "DELETE FROM instructions WHERE recipe_id = $1",
            "DELETE FROM recipe_tags WHERE recipe_id = $1",
        ] {
            sqlx::query(statement)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        write_children(&mut tx, user_id, id, &recipe).await?;
        prune_tags(&mut tx, user_id).await?;
        tx.commit().await?;

        self.get(user_id, id).await
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(TastebaseError::NotFound(format!("recipe {id}")));
        }
        prune_tags(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// `NotFound` unless `user_id` owns recipe `id`.
    pub async fn ensure_owned(&self, user_id: &str, id: &str) -> Result<()> {
        let owned: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM recipes WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        owned
            .map(|_| ())
            .ok_or_else(|| TastebaseError::NotFound(format!("recipe {id}")))
    }

    /// Flip the favorite flag; returns the new state.
    pub async fn toggle_favorite(&self, user_id: &str, id: &str) -> Result<bool> {
        self.ensure_owned(user_id, id).await?;

        let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if removed.rows_affected() > 0 {
            return Ok(false);
        }

        sqlx::query("INSERT INTO favorites (user_id, recipe_id, created_at) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(id)
            .bind(now())
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    pub async fn add_modification(
        &self,
        user_id: &str,
        id: &str,
        note: &str,
    ) -> Result<ModificationRecord> {
        let note = note.trim();
        if note.is_empty() {
            return Err(TastebaseError::InvalidInput("note is empty".into()));
        }
        self.ensure_owned(user_id, id).await?;

        let record = ModificationRecord {
            id: Uuid::new_v4().to_string(),
            recipe_id: id.to_string(),
            note: note.to_string(),
            created_at: now(),
        };
        sqlx::query(
            r"
            INSERT INTO recipe_modifications (id, recipe_id, user_id, note, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&record.id)
        .bind(&record.recipe_id)
        .bind(user_id)
        .bind(&record.note)
        .bind(&record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    /// Oldest first
    pub async fn list_modifications(&self, user_id: &str, id: &str) -> Result<Vec<ModificationRecord>> {
        self.ensure_owned(user_id, id).await?;
        let rows = sqlx::query(
            r"
            SELECT id, recipe_id, note, created_at FROM recipe_modifications
            WHERE recipe_id = $1 AND user_id = $2
            ORDER BY created_at, rowid
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ModificationRecord {
                id: r.get("id"),
                recipe_id: r.get("recipe_id"),
                note: r.get("note"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    pub async fn list_tags(&self, user_id: &str) -> Result<Vec<TagCount>> {
        let rows = sqlx::query(
            r"
            SELECT t.name, COUNT(rt.recipe_id) AS count
            FROM tags t JOIN recipe_tags rt ON rt.tag_id = t.id
            WHERE t.user_id = $1
            GROUP BY t.id
            ORDER BY count DESC, t.name
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| TagCount {
                name: r.get("name"),
                count: r.get("count"),
            })
            .collect())
    }
}

async fn write_children(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
    recipe_id: &str,
    recipe: &ParsedRecipe,
) -> Result<()> {
    for (position, ingredient) in recipe.ingredients.iter().enumerate() {
        sqlx::query(
            r"
            INSERT INTO ingredients (recipe_id, position, name, quantity, unit, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(recipe_id)
        .bind(position as i64)
        .bind(&ingredient.name)
        .bind(&ingredient.quantity)
        .bind(&ingredient.unit)
        .bind(&ingredient.notes)
        .execute(&mut **tx)
        .await?;
    }

    for step in &recipe.instructions {
        sqlx::query(
            r"
            INSERT INTO instructions (recipe_id, step_number, text, time_minutes)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(recipe_id)
        .bind(i64::from(step.step_number))
        .bind(&step.text)
        .bind(step.time_minutes.map(i64::from))
        .execute(&mut **tx)
        .await?;
    }

    for tag in &recipe.tags {
        sqlx::query("INSERT INTO tags (user_id, name) VALUES ($1, $2) ON CONFLICT(user_id, name) DO NOTHING")
            .bind(user_id)
            .bind(tag)
            .execute(&mut **tx)
            .await?;
        sqlx::query(
            r"
            INSERT OR IGNORE INTO recipe_tags (recipe_id, tag_id)
            SELECT $1, id FROM tags WHERE user_id = $2 AND name = $3
            ",
        )
        .bind(recipe_id)
        .bind(user_id)
        .bind(tag)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Tags no recipe uses any more
async fn prune_tags(tx: &mut Transaction<'_, Sqlite>, user_id: &str) -> Result<()> {
    sqlx::query(
        r"
        DELETE FROM tags
        WHERE user_id = $1 AND id NOT IN (SELECT tag_id FROM recipe_tags)
        ",
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{test_db, Database, NewImage};

    fn soup() -> ParsedRecipe {
        ParsedRecipe {
            title: "  Tomato Soup ".into(),
            description: Some("Smooth and warming".into()),
            servings: Some(4),
            prep_time_minutes: Some(10),
            cook_time_minutes: Some(25),
            difficulty: Some(Difficulty::Easy),
            ingredients: vec![
                ParsedIngredient {
                    name: "tomatoes".into(),
                    quantity: Some("800".into()),
                    unit: Some("g".into()),
                    notes: None,
                },
                ParsedIngredient::named("salt"),
            ],
            instructions: vec![
                ParsedInstruction::new(1, "Simmer the tomatoes."),
                ParsedInstruction::new(2, "Blend."),
            ],
            tags: vec!["Soup".into(), "vegetarian".into(), "soup".into()],
            ..Default::default()
        }
    }

    async fn setup() -> (Database, String) {
        let db = test_db().await;
        let user = db.users().find_or_create("cook@example.com", None).await.unwrap();
        (db, user.id)
    }

    #[tokio::test]
    async fn test_create_and_get_round_trip() {
        let (db, user) = setup().await;
        let recipes = db.recipes();

        let created = recipes.create(&user, &soup().into()).await.unwrap();
        let fetched = recipes.get(&user, &created.id).await.unwrap();

        assert_eq!(fetched.recipe.title, "Tomato Soup");
        assert_eq!(fetched.recipe.ingredients[0].quantity.as_deref(), Some("800"));
        assert_eq!(fetched.recipe.ingredients[1].name, "salt");
        assert_eq!(fetched.recipe.instructions[1].step_number, 2);
        assert_eq!(fetched.recipe.tags, vec!["soup", "vegetarian"]);
        assert_eq!(fetched.recipe.difficulty, Some(Difficulty::Easy));
        assert!(!fetched.is_favorite);
        assert_eq!(fetched.recipe, created.recipe);
    }

    #[tokio::test]
    async fn test_create_and_get_agree_on_tag_order() {
        let (db, user) = setup().await;
        let recipes = db.recipes();
        let mut recipe = soup();
        recipe.tags = vec!["winter".into(), "soup".into()];

        let created = recipes.create(&user, &recipe.into()).await.unwrap();
        let fetched = recipes.get(&user, &created.id).await.unwrap();

        assert_eq!(created.recipe.tags, vec!["soup", "winter"]);
        assert_eq!(created.recipe.tags, fetched.recipe.tags);
        assert_eq!(created.created_at, fetched.created_at);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_draft() {
        let (db, user) = setup().await;
        let draft = RecipeDraft(ParsedRecipe {
            title: "Nothing".into(),
            ..Default::default()
        });
        let err = db.recipes().create(&user, &draft).await.unwrap_err();
        assert!(matches!(err, TastebaseError::InvalidRecipe(_)));
    }

    #[tokio::test]
    async fn test_recipes_are_scoped_to_owner() {
        let (db, user) = setup().await;
        let stranger = db.users().find_or_create("other@example.com", None).await.unwrap();
        let recipes = db.recipes();
        let created = recipes.create(&user, &soup().into()).await.unwrap();

        assert!(matches!(
            recipes.get(&stranger.id, &created.id).await,
            Err(TastebaseError::NotFound(_))
        ));
        assert!(matches!(
            recipes.delete(&stranger.id, &created.id).await,
            Err(TastebaseError::NotFound(_))
        ));
        assert!(matches!(
            recipes.toggle_favorite(&stranger.id, &created.id).await,
            Err(TastebaseError::NotFound(_))
        ));
        assert!(recipes.list(&stranger.id, &RecipeQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_and_order() {
        let (db, user) = setup().await;
        let recipes = db.recipes();

        let first = recipes.create(&user, &soup().into()).await.unwrap();
        let mut cake = soup();
        cake.title = "Chocolate 100% Cake".into();
        cake.description = None;
        cake.tags = vec!["dessert".into()];
        let second = recipes.create(&user, &cake.into()).await.unwrap();

        let all = recipes.list(&user, &RecipeQuery::default()).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
        assert_eq!(all[1].total_time_minutes, Some(35));
        assert_eq!(all[1].tags, vec!["soup", "vegetarian"]);

        let search = RecipeQuery {
            search: Some("WARMING".into()),
            ..Default::default()
        };
        let found = recipes.list(&user, &search).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, first.id);

        let percent = RecipeQuery {
            search: Some("100%".into()),
            ..Default::default()
        };
        assert_eq!(recipes.list(&user, &percent).await.unwrap()[0].id, second.id);

        let tagged = RecipeQuery {
            tag: Some("Dessert".into()),
            ..Default::default()
        };
        assert_eq!(recipes.list(&user, &tagged).await.unwrap()[0].id, second.id);

        assert!(recipes.toggle_favorite(&user, &first.id).await.unwrap());
        let favorites = RecipeQuery {
            favorites_only: true,
            ..Default::default()
        };
        let favs = recipes.list(&user, &favorites).await.unwrap();
        assert_eq!(favs.len(), 1);
        assert!(favs[0].is_favorite);
        assert!(!recipes.toggle_favorite(&user, &first.id).await.unwrap());

        let paged = RecipeQuery {
            limit: Some(1),
            offset: Some(1),
            ..Default::default()
        };
        assert_eq!(recipes.list(&user, &paged).await.unwrap()[0].id, first.id);
    }

    #[tokio::test]
    async fn test_update_replaces_children_and_prunes_tags() {
        let (db, user) = setup().await;
        let recipes = db.recipes();
        let created = recipes.create(&user, &soup().into()).await.unwrap();

        let mut edited = soup();
        edited.ingredients.truncate(1);
        edited.instructions = vec![ParsedInstruction::new(1, "Just heat it.")];
        edited.tags = vec!["quick".into()];
        let updated = recipes.update(&user, &created.id, &edited.into()).await.unwrap();

        assert_eq!(updated.recipe.ingredients.len(), 1);
        assert_eq!(updated.recipe.instructions.len(), 1);
        assert_eq!(updated.recipe.tags, vec!["quick"]);
        assert!(updated.updated_at >= created.updated_at);

        let tags = recipes.list_tags(&user).await.unwrap();
        assert_eq!(
            tags,
            vec![TagCount {
                name: "quick".into(),
                count: 1
            }]
        );
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (db, user) = setup().await;
        let recipes = db.recipes();
        let created = recipes.create(&user, &soup().into()).await.unwrap();
        recipes
            .add_modification(&user, &created.id, "less salt")
            .await
            .unwrap();
        db.images()
            .add(&created.id, &NewImage::new("a.png", "image/png", 10))
            .await
            .unwrap();

        recipes.delete(&user, &created.id).await.unwrap();

        let leftovers: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM ingredients) + (SELECT COUNT(*) FROM recipe_images)
                  + (SELECT COUNT(*) FROM recipe_modifications) + (SELECT COUNT(*) FROM tags)",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(leftovers, 0);
        assert!(matches!(
            recipes.delete(&user, &created.id).await,
            Err(TastebaseError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_modifications() {
        let (db, user) = setup().await;
        let recipes = db.recipes();
        let created = recipes.create(&user, &soup().into()).await.unwrap();

        recipes.add_modification(&user, &created.id, " used passata ").await.unwrap();
        recipes.add_modification(&user, &created.id, "double garlic").await.unwrap();
        assert!(matches!(
            recipes.add_modification(&user, &created.id, "  ").await,
            Err(TastebaseError::InvalidInput(_))
        ));

        let notes: Vec<String> = recipes
            .list_modifications(&user, &created.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.note)
            .collect();
        assert_eq!(notes, vec!["used passata", "double garlic"]);
    }
}
