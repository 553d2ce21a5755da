use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use adconnect::crypto::StateSigner;
use adconnect::invoker::{GoogleAdsApi, LinkedInAdsApi, MetaAdsApi};
use adconnect::platforms::{self, PlatformRegistry};
use adconnect::store::PgCredentialStore;
use adconnect::tokens::TokenManager;
use adconnect::{AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adconnect=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("adconnect v{}", env!("CARGO_PKG_VERSION"));

    let signer = StateSigner::new(&config.state_secret)?;

    let store = PgCredentialStore::new(&config.database_url).await?;
    store.migrate().await?;
    info!("Database connected and migrated");

    let mut registry = PlatformRegistry::new();
    platforms::register_defaults(&mut registry, &config);
    info!("Registered {} ad platforms", registry.count());

    let store: Arc<dyn adconnect::store::CredentialStore> = Arc::new(store);
    let registry = Arc::new(registry);
    let tokens = TokenManager::new(store.clone(), registry.clone());

    let google_ads = GoogleAdsApi::new(
        config.google.as_ref().and_then(|g| g.developer_token.clone()),
        config.google.as_ref().and_then(|g| g.login_customer_id.clone()),
    );

    let state: SharedState = Arc::new(AppState {
        signer,
        store,
        registry,
        tokens,
        google_ads,
        meta_ads: MetaAdsApi::new(),
        linkedin_ads: LinkedInAdsApi::new(),
        config: config.clone(),
    });

    let app = adconnect::api::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
