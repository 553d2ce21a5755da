//! Credential store — durable persistence for platform connections.
//!
//! The token lifecycle manager only needs keyed get/upsert with atomic
//! per-row merge semantics, so the backend sits behind a trait:
//! PostgreSQL in production, an in-memory map in tests.

mod memory;
mod postgres;

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AdsError;
use crate::platforms::Platform;

/// One connection per (user, platform).
#[derive(Debug, Clone, Serialize)]
pub struct Connection {
    pub user_id: String,
    pub platform: Platform,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: ConnectionStatus,
    pub selected_account_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "disconnected" => ConnectionStatus::Disconnected,
            "error" => ConnectionStatus::Error,
            _ => ConnectionStatus::Connected,
        }
    }
}

/// Abstract durable storage keyed by (user, platform).
///
/// Upserts must be atomic per row so concurrent exchanges for the same
/// key never create duplicates. A token upsert that carries no refresh
/// token keeps the stored one (refresh tokens are often withheld on
/// repeat consent).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert-or-merge the token fields of a connection. Marks it connected.
    async fn upsert_tokens(
        &self,
        user_id: &str,
        platform: Platform,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AdsError>;

    /// Overwrite the selected account id, creating the row when none exists.
    async fn select_account(
        &self,
        user_id: &str,
        platform: Platform,
        account_id: &str,
    ) -> Result<(), AdsError>;

    async fn get(&self, user_id: &str, platform: Platform)
        -> Result<Option<Connection>, AdsError>;

    /// Flip the connection status. Rows are never deleted by this service;
    /// disconnection is a status change.
    async fn mark_status(
        &self,
        user_id: &str,
        platform: Platform,
        status: ConnectionStatus,
    ) -> Result<(), AdsError>;
}
