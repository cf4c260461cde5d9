/// Authenticated sessions
///
/// A session is created at login, refreshed by presenting its current
/// refresh token (which is then rotated), and revoked at logout or when the
/// user is deactivated. Only the SHA-256 hex digest of the refresh token is
/// stored.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE sessions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     refresh_token_hash VARCHAR(64) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     expires_at TIMESTAMPTZ NOT NULL,
///     last_refreshed_at TIMESTAMPTZ,
///     revoked_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,

    #[serde(skip_serializing, default)]
    pub refresh_token_hash: String,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Whether the session can still authenticate requests at `now`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }

    /// Inserts a session with a pre-chosen id
    ///
    /// The id is chosen by the caller so it can be embedded in the refresh
    /// token whose hash is stored here.
    pub async fn create(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        refresh_token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, refresh_token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, refresh_token_hash, created_at, expires_at,
                      last_refreshed_at, revoked_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(refresh_token_hash)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, refresh_token_hash, created_at, expires_at,
                   last_refreshed_at, revoked_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Replaces the refresh hash if `current_hash` still matches
    ///
    /// Compare-and-swap: of two refreshes racing with the same token only one
    /// succeeds. Returns `false` when the session is revoked, expired or the
    /// hash has already moved on.
    pub async fn rotate(
        pool: &PgPool,
        id: Uuid,
        current_hash: &str,
        new_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET refresh_token_hash = $3, last_refreshed_at = NOW()
            WHERE id = $1
              AND refresh_token_hash = $2
              AND revoked_at IS NULL
              AND expires_at > NOW()
            "#,
        )
        .bind(id)
        .bind(current_hash)
        .bind(new_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Revokes a session; already-revoked sessions are left untouched
    pub async fn revoke(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Whether the session is live and its user still active
    ///
    /// Checked on every authenticated request.
    pub async fn is_valid_for_user(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM sessions s
                JOIN users u ON u.id = s.user_id
                WHERE s.id = $1
                  AND s.user_id = $2
                  AND s.revoked_at IS NULL
                  AND s.expires_at > NOW()
                  AND u.is_active
            )
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Deletes sessions that ended more than `retention_days` ago
    pub async fn purge_stale(pool: &PgPool, retention_days: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE COALESCE(revoked_at, expires_at) < NOW() - make_interval(days => $1)
            "#,
        )
        .bind(retention_days)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_in: Duration, revoked: bool) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            refresh_token_hash: "0".repeat(64),
            created_at: now,
            expires_at: now + expires_in,
            last_refreshed_at: None,
            revoked_at: revoked.then_some(now),
        }
    }

    #[test]
    fn test_session_activity() {
        let now = Utc::now();
        assert!(session(Duration::hours(1), false).is_active_at(now));
        assert!(!session(Duration::hours(1), true).is_active_at(now));
        assert!(!session(Duration::seconds(-1), false).is_active_at(now));
    }

    #[test]
    fn test_hash_not_serialized() {
        let json = serde_json::to_string(&session(Duration::hours(1), false)).unwrap();
        assert!(!json.contains(&"0".repeat(64)));
    }
}
