use async_trait::async_trait;
use serde::Deserialize;

use super::traits::{PlatformAdapter, TokenSet};
use super::{http_client, urlencoding, Platform};
use crate::error::{upstream_payload, AdsError};

const AUTH_URL: &str = "https://www.linkedin.com/oauth/v2/authorization";
const TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";

const URN_PREFIX: &str = "urn:li:sponsoredAccount:";

/// LinkedIn Ads OAuth 2.0 adapter.
///
/// Access tokens live ~60 days; refresh tokens require partner approval
/// and may therefore be absent on a connection.
pub struct LinkedInAdapter {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct LinkedInTokenResponse {
    access_token: String,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

impl LinkedInAdapter {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            token_url: TOKEN_URL.into(),
            http: http_client(),
        }
    }

    /// Point the token endpoint at a mock server. Test hook.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenSet, AdsError> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| AdsError::UpstreamAuth {
                platform: Platform::Linkedin,
                body: serde_json::Value::String(format!("token request failed: {e}")),
            })?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AdsError::UpstreamAuth {
                platform: Platform::Linkedin,
                body: upstream_payload(text),
            });
        }

        let token: LinkedInTokenResponse =
            serde_json::from_str(&text).map_err(|e| AdsError::UpstreamAuth {
                platform: Platform::Linkedin,
                body: serde_json::Value::String(format!("malformed token response: {e}")),
            })?;

        Ok(TokenSet {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            scope: token.scope,
        })
    }
}

#[async_trait]
impl PlatformAdapter for LinkedInAdapter {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    fn default_scopes(&self) -> Vec<String> {
        vec!["openid".into(), "profile".into(), "email".into(), "r_ads".into()]
    }

    fn authorization_url(&self, scopes: &[String], state: &str) -> String {
        let scopes = if scopes.is_empty() {
            self.default_scopes()
        } else {
            scopes.to_vec()
        };
        format!(
            "{AUTH_URL}?\
             response_type=code\
             &client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &scope={scope}\
             &state={state}",
            client_id = urlencoding(&self.client_id),
            redirect_uri = urlencoding(&self.redirect_uri),
            scope = urlencoding(&scopes.join(" ")),
            state = urlencoding(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, AdsError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AdsError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ])
        .await
    }

    /// Accepts a bare numeric ad account id or a sponsored-account URN.
    /// Stored as the bare digits.
    fn validate_account_id(&self, raw: &str) -> Result<String, AdsError> {
        let id = raw.strip_prefix(URN_PREFIX).unwrap_or(raw);
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AdsError::InvalidAccountId(format!(
                "expected '<digits>' or '{URN_PREFIX}<digits>', got '{raw}'"
            )));
        }
        Ok(id.to_string())
    }
}
