use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Platform;
use crate::error::AdsError;

/// A set of tokens returned from a platform after code exchange or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

/// OAuth adapter for one advertising platform.
///
/// Encodes the platform's endpoint URLs, scope strings and account-id
/// grammar. Used only by the token lifecycle manager and the connect flow;
/// data queries live in the API invoker.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Default OAuth scopes requested when the caller passes none.
    fn default_scopes(&self) -> Vec<String>;

    /// Build the authorization URL the user is redirected to.
    ///
    /// - `scopes`: requested scopes; empty means platform defaults.
    /// - `state`: an opaque, HMAC-signed state string for CSRF protection.
    fn authorization_url(&self, scopes: &[String], state: &str) -> String;

    /// Exchange an authorization code for an access token set.
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, AdsError>;

    /// Exchange a refresh token for a new access token set.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AdsError>;

    /// Validate a raw account identifier against the platform's resource-name
    /// grammar and return the normalized id to store.
    fn validate_account_id(&self, raw: &str) -> Result<String, AdsError>;
}
