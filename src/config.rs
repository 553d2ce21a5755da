use anyhow::{Context, Result};

use crate::platforms::Platform;

/// Application configuration, loaded from environment variables.
///
/// Platform credentials are grouped so each adapter receives an explicit
/// config object at startup instead of reading ambient process state.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    pub base_url: String,

    // ── Database (PostgreSQL) ───────────────────────────────────────────
    pub database_url: String,

    // ── Crypto ──────────────────────────────────────────────────────────
    /// 32-byte base64-encoded HMAC key for OAuth state signing.
    pub state_secret: String,

    // ── Platform credentials ────────────────────────────────────────────
    pub google: Option<GoogleConfig>,
    pub meta: Option<MetaConfig>,
    pub linkedin: Option<LinkedInConfig>,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Google Ads API developer token, required for data queries.
    pub developer_token: Option<String>,
    /// Manager (MCC) account id, digits only. Sent as `login-customer-id`
    /// when present.
    pub login_customer_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MetaConfig {
    pub app_id: String,
    pub app_secret: String,
}

#[derive(Debug, Clone)]
pub struct LinkedInConfig {
    pub client_id: String,
    pub client_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .context("Invalid PORT")?,
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),

            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL is required (PostgreSQL connection string)")?,
            state_secret: std::env::var("STATE_SECRET")
                .context("STATE_SECRET is required (32 bytes, base64)")?,

            google: match (
                std::env::var("GOOGLE_CLIENT_ID").ok(),
                std::env::var("GOOGLE_CLIENT_SECRET").ok(),
            ) {
                (Some(client_id), Some(client_secret)) => Some(GoogleConfig {
                    client_id,
                    client_secret,
                    developer_token: std::env::var("GOOGLE_ADS_DEVELOPER_TOKEN").ok(),
                    login_customer_id: std::env::var("GOOGLE_ADS_LOGIN_CUSTOMER_ID")
                        .ok()
                        .map(|v| v.replace('-', "")),
                }),
                _ => None,
            },
            meta: match (
                std::env::var("META_APP_ID").ok(),
                std::env::var("META_APP_SECRET").ok(),
            ) {
                (Some(app_id), Some(app_secret)) => Some(MetaConfig { app_id, app_secret }),
                _ => None,
            },
            linkedin: match (
                std::env::var("LINKEDIN_CLIENT_ID").ok(),
                std::env::var("LINKEDIN_CLIENT_SECRET").ok(),
            ) {
                (Some(client_id), Some(client_secret)) => {
                    Some(LinkedInConfig { client_id, client_secret })
                }
                _ => None,
            },
        })
    }

    /// The OAuth callback URL registered with a platform.
    pub fn callback_url(&self, platform: Platform) -> String {
        format!("{}/ads/{}/callback", self.base_url, platform.as_str())
    }
}
