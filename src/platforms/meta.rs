use async_trait::async_trait;
use serde::Deserialize;

use super::traits::{PlatformAdapter, TokenSet};
use super::{http_client, urlencoding, Platform};
use crate::error::{upstream_payload, AdsError};

const DIALOG_URL: &str = "https://www.facebook.com/v21.0/dialog/oauth";
const GRAPH_URL: &str = "https://graph.facebook.com/v21.0";

/// Meta (Facebook) Ads OAuth adapter.
///
/// Meta issues no refresh tokens. The code exchange is two-step: the
/// authorization code buys a short-lived user token, which is immediately
/// traded for a long-lived one (~60 days) via `fb_exchange_token`. Once
/// that expires the user reconnects.
pub struct MetaAdapter {
    app_id: String,
    app_secret: String,
    redirect_uri: String,
    graph_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MetaTokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

impl MetaAdapter {
    pub fn new(app_id: String, app_secret: String, redirect_uri: String) -> Self {
        Self {
            app_id,
            app_secret,
            redirect_uri,
            graph_url: GRAPH_URL.into(),
            http: http_client(),
        }
    }

    /// Point the Graph API at a mock server. Test hook.
    pub fn with_graph_url(mut self, url: impl Into<String>) -> Self {
        self.graph_url = url.into();
        self
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<MetaTokenResponse, AdsError> {
        let resp = self
            .http
            .get(format!("{}/oauth/access_token", self.graph_url))
            .query(params)
            .send()
            .await
            .map_err(|e| AdsError::UpstreamAuth {
                platform: Platform::MetaAds,
                body: serde_json::Value::String(format!("token request failed: {e}")),
            })?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AdsError::UpstreamAuth {
                platform: Platform::MetaAds,
                body: upstream_payload(text),
            });
        }

        serde_json::from_str(&text).map_err(|e| AdsError::UpstreamAuth {
            platform: Platform::MetaAds,
            body: serde_json::Value::String(format!("malformed token response: {e}")),
        })
    }
}

#[async_trait]
impl PlatformAdapter for MetaAdapter {
    fn platform(&self) -> Platform {
        Platform::MetaAds
    }

    fn default_scopes(&self) -> Vec<String> {
        vec![
            "ads_management".into(),
            "ads_read".into(),
            "business_management".into(),
        ]
    }

    fn authorization_url(&self, scopes: &[String], state: &str) -> String {
        let scopes = if scopes.is_empty() {
            self.default_scopes()
        } else {
            scopes.to_vec()
        };
        format!(
            "{DIALOG_URL}?\
             client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &response_type=code\
             &scope={scope}\
             &state={state}",
            client_id = urlencoding(&self.app_id),
            redirect_uri = urlencoding(&self.redirect_uri),
            scope = urlencoding(&scopes.join(",")),
            state = urlencoding(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, AdsError> {
        // Step 1: code → short-lived user token.
        let short = self
            .token_request(&[
                ("client_id", self.app_id.as_str()),
                ("client_secret", self.app_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code", code),
            ])
            .await?;

        // Step 2: short-lived → long-lived token.
        let long = self
            .token_request(&[
                ("grant_type", "fb_exchange_token"),
                ("client_id", self.app_id.as_str()),
                ("client_secret", self.app_secret.as_str()),
                ("fb_exchange_token", short.access_token.as_str()),
            ])
            .await?;

        Ok(TokenSet {
            access_token: long.access_token,
            refresh_token: None,
            expires_in: long.expires_in,
            scope: None,
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenSet, AdsError> {
        // No refresh grant on the Graph API; a fresh consent is the only remedy.
        Err(AdsError::ReauthorizationRequired {
            platform: Platform::MetaAds,
        })
    }

    /// Expected format: `act_1234567890` (ad account id).
    fn validate_account_id(&self, raw: &str) -> Result<String, AdsError> {
        raw.strip_prefix("act_")
            .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| {
                AdsError::InvalidAccountId(format!("expected 'act_<digits>', got '{raw}'"))
            })?;
        Ok(raw.to_string())
    }
}
