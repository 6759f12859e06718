use super::now;
use crate::error::{Result, TastebaseError};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Metadata for an image file belonging to a recipe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    pub id: String,
    pub recipe_id: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    pub is_hero: bool,
    pub ai_generated: bool,
    pub created_at: String,
}

impl From<SqliteRow> for ImageRecord {
    fn from(r: SqliteRow) -> Self {
        Self {
            id: r.get("id"),
            recipe_id: r.get("recipe_id"),
            filename: r.get("filename"),
            content_type: r.get("content_type"),
            size_bytes: r.get("size_bytes"),
            alt_text: r.get("alt_text"),
            is_hero: r.get::<i64, _>("is_hero") != 0,
            ai_generated: r.get::<i64, _>("ai_generated") != 0,
            created_at: r.get("created_at"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewImage {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub alt_text: Option<String>,
    pub ai_generated: bool,
}

impl NewImage {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            size_bytes: i64::try_from(size_bytes).unwrap_or(i64::MAX),
            alt_text: None,
            ai_generated: false,
        }
    }

    pub fn with_alt(mut self, alt: Option<&str>) -> Self {
        self.alt_text = alt.map(str::trim).filter(|a| !a.is_empty()).map(String::from);
        self
    }

    pub fn ai_generated(mut self) -> Self {
        self.ai_generated = true;
        self
    }
}

const COLUMNS: &str =
    "id, recipe_id, filename, content_type, size_bytes, alt_text, is_hero, ai_generated, created_at";

/// Image rows. A recipe with images always has exactly one hero.
pub struct ImageRecordManager {
    pool: SqlitePool,
}

impl ImageRecordManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a stored file. The recipe's first image becomes its hero.
    ///
    /// The hero check and the insert are one statement, so concurrent adds
    /// cannot both see an empty recipe.
    pub async fn add(&self, recipe_id: &str, image: &NewImage) -> Result<ImageRecord> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r"
            INSERT INTO recipe_images (id, recipe_id, filename, content_type, size_bytes,
                                       alt_text, is_hero, ai_generated, created_at)
            SELECT $1, $2, $3, $4, $5, $6,
                   NOT EXISTS (SELECT 1 FROM recipe_images WHERE recipe_id = $2 AND is_hero = 1),
                   $7, $8
            ",
        )
        .bind(&id)
        .bind(recipe_id)
        .bind(&image.filename)
        .bind(&image.content_type)
        .bind(image.size_bytes)
        .bind(&image.alt_text)
        .bind(i64::from(image.ai_generated))
        .bind(now())
        .execute(&self.pool)
        .await?;

        self.get(&id).await
    }

    pub async fn set_hero(&self, recipe_id: &str, image_id: &str) -> Result<ImageRecord> {
        let mut tx = self.pool.begin().await?;
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM recipe_images WHERE id = $1 AND recipe_id = $2")
                .bind(image_id)
                .bind(recipe_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(TastebaseError::NotFound(format!("image {image_id}")));
        }

        // Clear first; the one-hero index is checked row by row.
        sqlx::query("UPDATE recipe_images SET is_hero = 0 WHERE recipe_id = $1 AND is_hero = 1")
            .bind(recipe_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE recipe_images SET is_hero = 1 WHERE id = $1")
            .bind(image_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.get(image_id).await
    }

    /// Delete the row; if it was the hero, the oldest remaining image takes over.
    pub async fn remove(&self, recipe_id: &str, image_id: &str) -> Result<ImageRecord> {
        let mut tx = self.pool.begin().await?;
        let record = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM recipe_images WHERE id = $1 AND recipe_id = $2"
        ))
        .bind(image_id)
        .bind(recipe_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(ImageRecord::from)
        .ok_or_else(|| TastebaseError::NotFound(format!("image {image_id}")))?;

        sqlx::query("DELETE FROM recipe_images WHERE id = $1")
            .bind(image_id)
            .execute(&mut *tx)
            .await?;

        if record.is_hero {
            sqlx::query(
                r"
                UPDATE recipe_images SET is_hero = 1
                WHERE id = (SELECT id FROM recipe_images WHERE recipe_id = $1
                            ORDER BY created_at, rowid LIMIT 1)
                ",
            )
            .bind(recipe_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(record)
    }

    pub async fn get(&self, image_id: &str) -> Result<ImageRecord> {
        sqlx::query(&format!("SELECT {COLUMNS} FROM recipe_images WHERE id = $1"))
            .bind(image_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ImageRecord::from)
            .ok_or_else(|| TastebaseError::NotFound(format!("image {image_id}")))
    }

    /// Oldest first
    pub async fn list(&self, recipe_id: &str) -> Result<Vec<ImageRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM recipe_images WHERE recipe_id = $1 ORDER BY created_at, rowid"
        ))
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ImageRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParsedIngredient, ParsedRecipe};
    use crate::store::{test_db, Database};

    async fn recipe(db: &Database) -> String {
        let user = db.users().find_or_create("img@example.com", None).await.unwrap();
        let draft = ParsedRecipe {
            title: "Bread".into(),
            ingredients: vec![ParsedIngredient::named("flour")],
            ..Default::default()
        };
        db.recipes().create(&user.id, &draft.into()).await.unwrap().id
    }

    fn heroes(images: &[ImageRecord]) -> Vec<&str> {
        images
            .iter()
            .filter(|i| i.is_hero)
            .map(|i| i.filename.as_str())
            .collect()
    }

    #[tokio::test]
    async fn test_first_image_is_hero() {
        let db = test_db().await;
        let recipe_id = recipe(&db).await;
        let images = db.images();

        let first = images
            .add(&recipe_id, &NewImage::new("a.jpg", "image/jpeg", 100).with_alt(Some(" crust ")))
            .await
            .unwrap();
        let second = images
            .add(&recipe_id, &NewImage::new("b.png", "image/png", 200).ai_generated())
            .await
            .unwrap();

        assert!(first.is_hero);
        assert_eq!(first.alt_text.as_deref(), Some("crust"));
        assert!(!second.is_hero);
        assert!(second.ai_generated);
        assert_eq!(heroes(&images.list(&recipe_id).await.unwrap()), vec!["a.jpg"]);
    }

    #[tokio::test]
    async fn test_set_hero_keeps_single_hero() {
        let db = test_db().await;
        let recipe_id = recipe(&db).await;
        let images = db.images();
        images.add(&recipe_id, &NewImage::new("a.jpg", "image/jpeg", 1)).await.unwrap();
        let b = images.add(&recipe_id, &NewImage::new("b.jpg", "image/jpeg", 1)).await.unwrap();

        let hero = images.set_hero(&recipe_id, &b.id).await.unwrap();
        assert!(hero.is_hero);
        assert_eq!(heroes(&images.list(&recipe_id).await.unwrap()), vec!["b.jpg"]);

        assert!(matches!(
            images.set_hero(&recipe_id, "missing").await,
            Err(TastebaseError::NotFound(_))
        ));
        assert_eq!(heroes(&images.list(&recipe_id).await.unwrap()), vec!["b.jpg"]);
    }

    #[tokio::test]
    async fn test_concurrent_first_uploads_pick_one_hero() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("images.db").display());
        let db = Database::connect(&url).await.unwrap();
        let recipe_id = recipe(&db).await;

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let images = db.images();
                let recipe_id = recipe_id.clone();
                tokio::spawn(async move {
                    images
                        .add(&recipe_id, &NewImage::new(format!("{n}.jpg"), "image/jpeg", 1))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let listed = db.images().list(&recipe_id).await.unwrap();
        assert_eq!(listed.len(), 8);
        assert_eq!(heroes(&listed).len(), 1);
    }

    #[tokio::test]
    async fn test_schema_rejects_second_hero() {
        let db = test_db().await;
        let recipe_id = recipe(&db).await;
        let first = db
            .images()
            .add(&recipe_id, &NewImage::new("a.jpg", "image/jpeg", 1))
            .await
            .unwrap();
        assert!(first.is_hero);

        let forced = sqlx::query(
            r"
            INSERT INTO recipe_images (id, recipe_id, filename, content_type, size_bytes,
                                       is_hero, created_at)
            VALUES ('forced', $1, 'b.jpg', 'image/jpeg', 1, 1, $2)
            ",
        )
        .bind(&recipe_id)
        .bind(now())
        .execute(db.pool())
        .await;
        assert!(forced.is_err());
    }

    #[tokio::test]
    async fn test_removing_hero_promotes_oldest() {
        let db = test_db().await;
        let recipe_id = recipe(&db).await;
        let images = db.images();
        let a = images.add(&recipe_id, &NewImage::new("a.jpg", "image/jpeg", 1)).await.unwrap();
        images.add(&recipe_id, &NewImage::new("b.jpg", "image/jpeg", 1)).await.unwrap();
        images.add(&recipe_id, &NewImage::new("c.jpg", "image/jpeg", 1)).await.unwrap();

        let removed = images.remove(&recipe_id, &a.id).await.unwrap();
        assert_eq!(removed.filename, "a.jpg");
        assert_eq!(heroes(&images.list(&recipe_id).await.unwrap()), vec!["b.jpg"]);

        assert!(matches!(
            images.get(&a.id).await,
            Err(TastebaseError::NotFound(_))
        ));
    }
}
