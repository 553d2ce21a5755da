use async_trait::async_trait;
use serde::Deserialize;

use super::traits::{PlatformAdapter, TokenSet};
use super::{http_client, urlencoding, Platform};
use crate::error::{upstream_payload, AdsError};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google Ads OAuth 2.0 adapter.
///
/// Access tokens live one hour. Refresh tokens are only issued with
/// `access_type=offline` and `prompt=consent`, and may be withheld on
/// repeat consent.
pub struct GoogleAdapter {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
}

impl GoogleAdapter {
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
                platform: Platform::Google,
                body: serde_json::Value::String(format!("token request failed: {e}")),
            })?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AdsError::UpstreamAuth {
                platform: Platform::Google,
                body: upstream_payload(text),
            });
        }

        let token: GoogleTokenResponse =
            serde_json::from_str(&text).map_err(|e| AdsError::UpstreamAuth {
                platform: Platform::Google,
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
impl PlatformAdapter for GoogleAdapter {
    fn platform(&self) -> Platform {
        Platform::Google
    }

    fn default_scopes(&self) -> Vec<String> {
        vec!["https://www.googleapis.com/auth/adwords".into()]
    }

    fn authorization_url(&self, scopes: &[String], state: &str) -> String {
        let scopes = if scopes.is_empty() {
            self.default_scopes()
        } else {
            scopes.to_vec()
        };
        format!(
            "{AUTH_URL}?\
             client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &response_type=code\
             &scope={scope}\
             &state={state}\
             &access_type=offline\
             &prompt=consent",
            client_id = urlencoding(&self.client_id),
            redirect_uri = urlencoding(&self.redirect_uri),
            scope = urlencoding(&scopes.join(" ")),
            state = urlencoding(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, AdsError> {
        self.token_request(&[
            ("code", code),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AdsError> {
        self.token_request(&[
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    /// Expected format: `customers/1234567890`. Stored as the bare digits.
    fn validate_account_id(&self, raw: &str) -> Result<String, AdsError> {
        let id = raw
            .strip_prefix("customers/")
            .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| {
                AdsError::InvalidAccountId(format!(
                    "expected 'customers/<digits>', got '{raw}'"
                ))
            })?;
        Ok(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> GoogleAdapter {
        GoogleAdapter::new("id".into(), "secret".into(), "http://cb".into())
    }

    #[test]
    fn test_account_id_normalized_to_digits() {
        assert_eq!(adapter().validate_account_id("customers/123").unwrap(), "123");
    }

    #[test]
    fn test_bad_account_id_rejected() {
        for raw in ["123", "customers/", "customers/12a", "act_123"] {
            assert!(matches!(
                adapter().validate_account_id(raw),
                Err(AdsError::InvalidAccountId(_))
            ));
        }
    }

    #[test]
    fn test_authorization_url_requests_offline_access() {
        let url = adapter().authorization_url(&[], "st4te");
        assert!(url.starts_with(AUTH_URL));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("state=st4te"));
        assert!(url.contains("adwords"));
    }
}
