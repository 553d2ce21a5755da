use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;
use serde_json::{json, Value};

use super::{read_json, transport_error};
use crate::error::AdsError;
use crate::platforms::{http_client, Platform};

const API_BASE: &str = "https://googleads.googleapis.com";
const API_VERSION: &str = "v21";

/// Campaign performance over the last 7 days.
const CAMPAIGN_SUMMARY_GAQL: &str = "\
    SELECT \
      campaign.id, campaign.name, \
      metrics.impressions, metrics.clicks, metrics.cost_micros \
    FROM campaign \
    WHERE segments.date DURING LAST_7_DAYS \
    ORDER BY metrics.impressions DESC \
    LIMIT 20";

/// Lead form submissions over the last 30 days.
const LEAD_SUBMISSIONS_GAQL: &str = "\
    SELECT \
      lead_form_submission_data.asset, \
      lead_form_submission_data.campaign, \
      lead_form_submission_data.ad_group, \
      lead_form_submission_data.gclid, \
      lead_form_submission_data.submission_date_time, \
      lead_form_submission_data.lead_form_submission_fields \
    FROM lead_form_submission_data \
    WHERE segments.date DURING LAST_30_DAYS \
    ORDER BY lead_form_submission_data.submission_date_time DESC \
    LIMIT 200";

/// Google Ads REST client (`searchStream` reads only).
pub struct GoogleAdsApi {
    http: reqwest::Client,
    base_url: String,
    developer_token: Option<String>,
    login_customer_id: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummary {
    pub campaign_id: Option<Value>,
    pub campaign_name: Option<Value>,
    pub impressions: Option<Value>,
    pub clicks: Option<Value>,
    pub cost_micros: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSubmission {
    pub asset: Option<Value>,
    pub campaign: Option<Value>,
    pub ad_group: Option<Value>,
    pub gclid: Option<Value>,
    pub submission_date_time: Option<Value>,
    pub fields: Option<Value>,
}

impl GoogleAdsApi {
    pub fn new(developer_token: Option<String>, login_customer_id: Option<String>) -> Self {
        Self {
            http: http_client(),
            base_url: API_BASE.into(),
            developer_token,
            login_customer_id,
        }
    }

    /// Point the API at a mock server. Test hook.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn headers(&self, access_token: &str) -> Result<HeaderMap, AdsError> {
        let developer_token = self.developer_token.as_deref().ok_or_else(|| {
            AdsError::Internal("GOOGLE_ADS_DEVELOPER_TOKEN is not configured".into())
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {access_token}"))
                .map_err(|e| AdsError::Internal(format!("invalid access token header: {e}")))?,
        );
        headers.insert(
            "developer-token",
            HeaderValue::from_str(developer_token)
                .map_err(|e| AdsError::Internal(format!("invalid developer token: {e}")))?,
        );
        if let Some(mcc) = &self.login_customer_id {
            headers.insert(
                "login-customer-id",
                HeaderValue::from_str(mcc)
                    .map_err(|e| AdsError::Internal(format!("invalid login customer id: {e}")))?,
            );
        }

        Ok(headers)
    }

    /// Customer resource names the authorized user can access,
    /// e.g. `["customers/1234567890", ...]`.
    pub async fn list_accessible_customers(
        &self,
        access_token: &str,
    ) -> Result<Vec<String>, AdsError> {
        let url = format!(
            "{}/{}/customers:listAccessibleCustomers",
            self.base_url, API_VERSION
        );
        let resp = self
            .http
            .get(url)
            .headers(self.headers(access_token)?)
            .send()
            .await
            .map_err(|e| transport_error(Platform::Google, e))?;

        let body = read_json(Platform::Google, resp).await?;
        let names = body["resourceNames"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Ok(names)
    }

    /// Run a GAQL query through `googleAds:searchStream` and flatten the
    /// stream chunks into one row list.
    pub async fn search_stream(
        &self,
        access_token: &str,
        customer_id: &str,
        gaql: &str,
    ) -> Result<Vec<Value>, AdsError> {
        let url = format!(
            "{}/{}/customers/{}/googleAds:searchStream",
            self.base_url, API_VERSION, customer_id
        );
        let resp = self
            .http
            .post(url)
            .headers(self.headers(access_token)?)
            .json(&json!({ "query": gaql }))
            .send()
            .await
            .map_err(|e| transport_error(Platform::Google, e))?;

        let body = read_json(Platform::Google, resp).await?;

        let mut rows = Vec::new();
        if let Some(chunks) = body.as_array() {
            for chunk in chunks {
                if let Some(results) = chunk["results"].as_array() {
                    rows.extend(results.iter().cloned());
                }
            }
        }
        Ok(rows)
    }

    pub async fn campaign_summary(
        &self,
        access_token: &str,
        customer_id: &str,
    ) -> Result<Vec<CampaignSummary>, AdsError> {
        let rows = self
            .search_stream(access_token, customer_id, CAMPAIGN_SUMMARY_GAQL)
            .await?;

        Ok(rows
            .iter()
            .map(|r| CampaignSummary {
                campaign_id: r.pointer("/campaign/id").cloned(),
                campaign_name: r.pointer("/campaign/name").cloned(),
                impressions: r.pointer("/metrics/impressions").cloned(),
                clicks: r.pointer("/metrics/clicks").cloned(),
                cost_micros: r.pointer("/metrics/costMicros").cloned(),
            })
            .collect())
    }

    pub async fn lead_submissions(
        &self,
        access_token: &str,
        customer_id: &str,
    ) -> Result<Vec<LeadSubmission>, AdsError> {
        let rows = self
            .search_stream(access_token, customer_id, LEAD_SUBMISSIONS_GAQL)
            .await?;

        Ok(rows
            .iter()
            .map(|r| LeadSubmission {
                asset: r.pointer("/leadFormSubmissionData/asset").cloned(),
                campaign: r.pointer("/leadFormSubmissionData/campaign").cloned(),
                ad_group: r.pointer("/leadFormSubmissionData/adGroup").cloned(),
                gclid: r.pointer("/leadFormSubmissionData/gclid").cloned(),
                submission_date_time: r
                    .pointer("/leadFormSubmissionData/submissionDateTime")
                    .cloned(),
                fields: r
                    .pointer("/leadFormSubmissionData/leadFormSubmissionFields")
                    .cloned(),
            })
            .collect())
    }
}
