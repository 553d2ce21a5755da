//! Thin read-API clients, one per platform.
//!
//! Each client takes an access token resolved by the token lifecycle
//! manager and issues a single read call. No retries; transport and
//! non-2xx failures surface as `UpstreamApi` with the platform's raw
//! error payload.

mod google;
mod linkedin;
mod meta;

pub use google::{CampaignSummary, GoogleAdsApi, LeadSubmission};
pub use linkedin::LinkedInAdsApi;
pub use meta::MetaAdsApi;

use serde_json::Value;

use crate::error::{upstream_payload, AdsError};
use crate::platforms::Platform;

/// Decode a platform response, mapping failures to `UpstreamApi`.
async fn read_json(platform: Platform, resp: reqwest::Response) -> Result<Value, AdsError> {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(AdsError::UpstreamApi {
            platform,
            body: upstream_payload(text),
        });
    }

    serde_json::from_str(&text).map_err(|e| AdsError::UpstreamApi {
        platform,
        body: Value::String(format!("malformed response body: {e}")),
    })
}

fn transport_error(platform: Platform, e: reqwest::Error) -> AdsError {
    AdsError::UpstreamApi {
        platform,
        body: Value::String(format!("request failed: {e}")),
    }
}
