mod google;
mod linkedin;
mod meta;
mod registry;
mod traits;

pub use google::GoogleAdapter;
pub use linkedin::LinkedInAdapter;
pub use meta::MetaAdapter;
pub use registry::PlatformRegistry;
pub use traits::{PlatformAdapter, TokenSet};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AdsError;

/// The advertising platforms this service connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Google,
    MetaAds,
    Linkedin,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Google => "google",
            Platform::MetaAds => "meta_ads",
            Platform::Linkedin => "linkedin",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = AdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Platform::Google),
            "meta_ads" | "meta" => Ok(Platform::MetaAds),
            "linkedin" => Ok(Platform::Linkedin),
            other => Err(AdsError::BadRequest(format!("unknown platform: {other}"))),
        }
    }
}

/// Register an adapter for every platform that has credentials configured.
pub fn register_defaults(registry: &mut PlatformRegistry, config: &Config) {
    if let Some(google) = &config.google {
        registry.register(Box::new(GoogleAdapter::new(
            google.client_id.clone(),
            google.client_secret.clone(),
            config.callback_url(Platform::Google),
        )));
    }

    if let Some(meta) = &config.meta {
        registry.register(Box::new(MetaAdapter::new(
            meta.app_id.clone(),
            meta.app_secret.clone(),
            config.callback_url(Platform::MetaAds),
        )));
    }

    if let Some(linkedin) = &config.linkedin {
        registry.register(Box::new(LinkedInAdapter::new(
            linkedin.client_id.clone(),
            linkedin.client_secret.clone(),
            config.callback_url(Platform::Linkedin),
        )));
    }
}

/// Simple percent-encoding for URL parameters.
pub(crate) fn urlencoding(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Shared HTTP client settings for outbound platform calls.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}
