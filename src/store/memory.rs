//! In-memory credential store, used by tests. Implements the same merge
//! semantics as the PostgreSQL backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{Connection, ConnectionStatus, CredentialStore};
use crate::error::AdsError;
use crate::platforms::Platform;

#[derive(Default)]
pub struct MemoryCredentialStore {
    rows: RwLock<HashMap<(String, Platform), Connection>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn blank(user_id: &str, platform: Platform) -> Connection {
        Connection {
            user_id: user_id.to_string(),
            platform,
            access_token: None,
            refresh_token: None,
            expires_at: None,
            status: ConnectionStatus::Connected,
            selected_account_id: None,
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn upsert_tokens(
        &self,
        user_id: &str,
        platform: Platform,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AdsError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .entry((user_id.to_string(), platform))
            .or_insert_with(|| Self::blank(user_id, platform));

        row.access_token = Some(access_token.to_string());
        // COALESCE(new, existing): an omitted refresh token never erases one.
        if let Some(rt) = refresh_token {
            row.refresh_token = Some(rt.to_string());
        }
        row.expires_at = Some(expires_at);
        row.status = ConnectionStatus::Connected;

        Ok(())
    }

    async fn select_account(
        &self,
        user_id: &str,
        platform: Platform,
        account_id: &str,
    ) -> Result<(), AdsError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .entry((user_id.to_string(), platform))
            .or_insert_with(|| Self::blank(user_id, platform));

        row.selected_account_id = Some(account_id.to_string());

        Ok(())
    }

    async fn get(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<Connection>, AdsError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(user_id.to_string(), platform)).cloned())
    }

    async fn mark_status(
        &self,
        user_id: &str,
        platform: Platform,
        status: ConnectionStatus,
    ) -> Result<(), AdsError> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(&(user_id.to_string(), platform)) {
            row.status = status;
        }
        Ok(())
    }
}
