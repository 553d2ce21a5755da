//! PostgreSQL-backed credential store.
//!
//! Single table `api_connections`, unique on (user_id, platform). All
//! writes are `INSERT .. ON CONFLICT .. DO UPDATE` so concurrent callers
//! for the same key merge into one row instead of racing inserts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use super::{Connection, ConnectionStatus, CredentialStore};
use crate::error::AdsError;
use crate::platforms::Platform;

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub async fn new(db_url: &str) -> Result<Self, AdsError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(20)
            .connect(db_url)
            .await
            .map_err(|e| AdsError::Store(format!("Failed to connect to PostgreSQL: {e}")))?;

        Ok(Self { pool })
    }

    /// Run schema migrations.
    pub async fn migrate(&self) -> Result<(), AdsError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_connections (
                id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id             TEXT NOT NULL,
                platform            TEXT NOT NULL,
                access_token        TEXT,
                refresh_token       TEXT,
                status              TEXT NOT NULL DEFAULT 'connected',
                selected_account_id TEXT,
                token_expires_at    TIMESTAMPTZ,
                created_at          TIMESTAMPTZ DEFAULT NOW(),
                updated_at          TIMESTAMPTZ DEFAULT NOW(),
                UNIQUE(user_id, platform)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_api_connections_lookup \
             ON api_connections(user_id, platform)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn upsert_tokens(
        &self,
        user_id: &str,
        platform: Platform,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AdsError> {
        sqlx::query(
            r#"
            INSERT INTO api_connections
                (user_id, platform, access_token, refresh_token, status, token_expires_at)
            VALUES ($1, $2, $3, $4, 'connected', $5)
            ON CONFLICT (user_id, platform)
            DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = COALESCE(EXCLUDED.refresh_token, api_connections.refresh_token),
                status = 'connected',
                token_expires_at = EXCLUDED.token_expires_at,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(platform.as_str())
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn select_account(
        &self,
        user_id: &str,
        platform: Platform,
        account_id: &str,
    ) -> Result<(), AdsError> {
        sqlx::query(
            r#"
            INSERT INTO api_connections (user_id, platform, selected_account_id, status)
            VALUES ($1, $2, $3, 'connected')
            ON CONFLICT (user_id, platform)
            DO UPDATE SET
                selected_account_id = EXCLUDED.selected_account_id,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(platform.as_str())
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<Connection>, AdsError> {
        let row = sqlx::query(
            r#"
            SELECT access_token, refresh_token, status, selected_account_id, token_expires_at
            FROM api_connections
            WHERE user_id = $1 AND platform = $2
            "#,
        )
        .bind(user_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let status: String = row.get(2);

        Ok(Some(Connection {
            user_id: user_id.to_string(),
            platform,
            access_token: row.try_get(0).ok(),
            refresh_token: row.try_get(1).ok(),
            status: ConnectionStatus::parse(&status),
            selected_account_id: row.try_get(3).ok(),
            expires_at: row.try_get(4).ok(),
        }))
    }

    async fn mark_status(
        &self,
        user_id: &str,
        platform: Platform,
        status: ConnectionStatus,
    ) -> Result<(), AdsError> {
        sqlx::query(
            "UPDATE api_connections SET status = $3, updated_at = NOW() \
             WHERE user_id = $1 AND platform = $2",
        )
        .bind(user_id)
        .bind(platform.as_str())
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
