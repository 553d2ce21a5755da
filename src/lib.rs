pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod invoker;
pub mod platforms;
pub mod store;
pub mod tokens;

pub use config::Config;
pub use error::AdsError;

use std::sync::Arc;

use crypto::StateSigner;
use invoker::{GoogleAdsApi, LinkedInAdsApi, MetaAdsApi};
use platforms::PlatformRegistry;
use store::CredentialStore;
use tokens::TokenManager;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub signer: StateSigner,
    pub store: Arc<dyn CredentialStore>,
    pub registry: Arc<PlatformRegistry>,
    pub tokens: TokenManager,
    pub google_ads: GoogleAdsApi,
    pub meta_ads: MetaAdsApi,
    pub linkedin_ads: LinkedInAdsApi,
}

pub type SharedState = Arc<AppState>;
