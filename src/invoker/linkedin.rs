use serde_json::Value;

use super::{read_json, transport_error};
use crate::error::AdsError;
use crate::platforms::{http_client, Platform};

const API_URL: &str = "https://api.linkedin.com";

fn sponsored_account_urn(account_id: &str) -> String {
    format!("urn:li:sponsoredAccount:{account_id}")
}

/// LinkedIn Marketing API read client.
pub struct LinkedInAdsApi {
    http: reqwest::Client,
    base_url: String,
}

impl LinkedInAdsApi {
    pub fn new() -> Self {
        Self {
            http: http_client(),
            base_url: API_URL.into(),
        }
    }

    /// Point the API at a mock server. Test hook.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn get(&self, path_and_query: &str, access_token: &str) -> Result<Value, AdsError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path_and_query))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_error(Platform::Linkedin, e))?;

        read_json(Platform::Linkedin, resp).await
    }

    pub async fn ad_accounts(&self, access_token: &str) -> Result<Value, AdsError> {
        self.get("/v2/adAccountsV2?q=search", access_token).await
    }

    pub async fn campaigns(
        &self,
        access_token: &str,
        account_id: &str,
    ) -> Result<Value, AdsError> {
        let urn = sponsored_account_urn(account_id);
        self.get(
            &format!("/v2/adCampaignsV2?q=search&search.account.values[0]={urn}"),
            access_token,
        )
        .await
    }

    pub async fn lead_forms(
        &self,
        access_token: &str,
        account_id: &str,
    ) -> Result<Value, AdsError> {
        let urn = sponsored_account_urn(account_id);
        self.get(
            &format!("/v2/leadForms?q=account&account={urn}"),
            access_token,
        )
        .await
    }
}

impl Default for LinkedInAdsApi {
    fn default() -> Self {
        Self::new()
    }
}
