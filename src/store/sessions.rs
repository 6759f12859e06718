use super::{now, timestamp};
use crate::error::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use log::debug;
use rand::RngCore;
use sqlx::{Row, SqlitePool};

const TOKEN_BYTES: usize = 32;

pub struct SessionManager {
    pool: SqlitePool,
}

impl SessionManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Issue a bearer token for `user_id`, valid for `ttl`.
    pub async fn create(&self, user_id: &str, ttl: Duration) -> Result<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let created = Utc::now();
        sqlx::query(
            r"
            INSERT INTO sessions (token, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&token)
        .bind(user_id)
        .bind(timestamp(created))
        .bind(timestamp(created + ttl))
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    /// The user behind `token`, if the session is still live. Expired
    /// sessions are removed on sight.
    pub async fn resolve(&self, token: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT user_id, expires_at FROM sessions WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let expires_at: String = row.get("expires_at");
        if expires_at <= now() {
            debug!("Session expired at {}", expires_at);
            self.revoke(token).await?;
            return Ok(None);
        }
        Ok(Some(row.get("user_id")))
    }

    pub async fn revoke(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop every expired session; returns how many went.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::store::test_db;
    use chrono::Duration;

    #[tokio::test]
    async fn test_session_lifecycle() {
        let db = test_db().await;
        let user = db.users().find_or_create("a@b.c", None).await.unwrap();
        let sessions = db.sessions();

        let token = sessions.create(&user.id, Duration::hours(1)).await.unwrap();
        assert_eq!(token.len(), 43);
        assert!(!token.contains(['+', '/', '=']));

        assert_eq!(sessions.resolve(&token).await.unwrap(), Some(user.id.clone()));
        assert!(sessions.revoke(&token).await.unwrap());
        assert_eq!(sessions.resolve(&token).await.unwrap(), None);
        assert!(!sessions.revoke(&token).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_rejected_and_purged() {
        let db = test_db().await;
        let user = db.users().find_or_create("a@b.c", None).await.unwrap();
        let sessions = db.sessions();

        let stale = sessions.create(&user.id, Duration::seconds(-5)).await.unwrap();
        let other = sessions.create(&user.id, Duration::seconds(-5)).await.unwrap();
        let live = sessions.create(&user.id, Duration::hours(1)).await.unwrap();

        assert_eq!(sessions.resolve(&stale).await.unwrap(), None);
        assert_eq!(sessions.purge_expired().await.unwrap(), 1);
        assert_eq!(sessions.resolve(&other).await.unwrap(), None);
        assert!(sessions.resolve(&live).await.unwrap().is_some());
    }
}
