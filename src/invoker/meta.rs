use serde_json::{json, Value};

use super::{read_json, transport_error};
use crate::error::AdsError;
use crate::platforms::{http_client, Platform};

const GRAPH_URL: &str = "https://graph.facebook.com/v21.0";

/// Meta Graph API read client.
pub struct MetaAdsApi {
    http: reqwest::Client,
    base_url: String,
}

impl MetaAdsApi {
    pub fn new() -> Self {
        Self {
            http: http_client(),
            base_url: GRAPH_URL.into(),
        }
    }

    /// Point the Graph API at a mock server. Test hook.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, AdsError> {
        let resp = self
            .http
            .get(format!("{}/{}", self.base_url, path))
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(Platform::MetaAds, e))?;

        read_json(Platform::MetaAds, resp).await
    }

    /// Ad accounts visible to the user token.
    pub async fn ad_accounts(&self, access_token: &str) -> Result<Value, AdsError> {
        self.get(
            "me/adaccounts",
            &[
                ("fields", "id,name,account_status"),
                ("access_token", access_token),
            ],
        )
        .await
    }

    /// Pages the user manages, each carrying its own page token.
    async fn pages(&self, access_token: &str) -> Result<Vec<Value>, AdsError> {
        let body = self
            .get("me/accounts", &[("access_token", access_token)])
            .await?;
        Ok(body["data"].as_array().cloned().unwrap_or_default())
    }

    /// Lead-gen forms grouped per page.
    pub async fn lead_forms(&self, access_token: &str) -> Result<Vec<Value>, AdsError> {
        let mut out = Vec::new();

        for page in self.pages(access_token).await? {
            let (Some(page_id), Some(page_token)) =
                (page["id"].as_str(), page["access_token"].as_str())
            else {
                continue;
            };

            let forms = self
                .get(
                    &format!("{page_id}/leadgen_forms"),
                    &[("fields", "id,name"), ("access_token", page_token)],
                )
                .await?;

            out.push(json!({
                "pageId": page_id,
                "pageName": page["name"],
                "forms": forms["data"],
            }));
        }

        Ok(out)
    }

    /// Leads submitted to one lead form. The form's owning page is not
    /// known up front, so every page token is tried; pages that do not
    /// own the form are skipped.
    pub async fn leads(&self, access_token: &str, form_id: &str) -> Result<Vec<Value>, AdsError> {
        let mut leads = Vec::new();

        for page in self.pages(access_token).await? {
            let Some(page_token) = page["access_token"].as_str() else {
                continue;
            };

            let resp = self
                .get(
                    &format!("{form_id}/leads"),
                    &[
                        ("fields", "created_time,field_data"),
                        ("access_token", page_token),
                    ],
                )
                .await;

            if let Ok(body) = resp {
                if let Some(rows) = body["data"].as_array() {
                    leads.extend(rows.iter().cloned());
                }
            }
        }

        Ok(leads)
    }
}

impl Default for MetaAdsApi {
    fn default() -> Self {
        Self::new()
    }
}
