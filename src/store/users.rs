use super::now;
use crate::error::{Result, TastebaseError};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: String,
}

impl From<SqliteRow> for User {
    fn from(r: SqliteRow) -> Self {
        Self {
            id: r.get("id"),
            email: r.get("email"),
            display_name: r.get("display_name"),
            created_at: r.get("created_at"),
        }
    }
}

pub struct UserManager {
    pool: SqlitePool,
}

impl UserManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up a user by email, creating the account on first sight.
    pub async fn find_or_create(&self, email: &str, display_name: Option<&str>) -> Result<User> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(TastebaseError::InvalidInput(format!(
                "'{email}' is not an email address"
            )));
        }

        if let Some(user) = self.find_by_email(&email).await? {
            return Ok(user);
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            email,
            display_name: display_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from),
            created_at: now(),
        };

        // A concurrent insert of the same email loses quietly and we re-read.
        sqlx::query(
            r"
            INSERT INTO users (id, email, display_name, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(email) DO NOTHING
            ",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.created_at)
        .execute(&self.pool)
        .await?;

        self.find_by_email(&user.email)
            .await?
            .ok_or_else(|| TastebaseError::NotFound(format!("user {}", user.email)))
    }

    pub async fn get(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, email, display_name, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row =
            sqlx::query("SELECT id, email, display_name, created_at FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }
}
