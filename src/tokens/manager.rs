use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::error::AdsError;
use crate::platforms::{Platform, PlatformRegistry, TokenSet};
use crate::store::{ConnectionStatus, CredentialStore};

/// A token with less than this many seconds of validity left is treated
/// as already expired, so it is never used right at the boundary.
pub const FRESHNESS_MARGIN_SECS: i64 = 60;

type CacheKey = (String, Platform);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

fn is_fresh(expires_at: DateTime<Utc>) -> bool {
    Utc::now() < expires_at - Duration::seconds(FRESHNESS_MARGIN_SECS)
}

fn expiry_from(tokens: &TokenSet) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(tokens.expires_in.unwrap_or(3600) as i64)
}

/// Coordinates the token cache, the credential store and the platform
/// refresh endpoints.
///
/// Token resolution is tiered: process cache, then store, then a refresh
/// exchange. The first two tiers apply the freshness margin; the refresh
/// tier is single-flight per (user, platform) so concurrent callers never
/// replay a refresh token against providers that reject reuse.
pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    registry: Arc<PlatformRegistry>,
    cache: Mutex<HashMap<CacheKey, CachedToken>>,
    // One lock per key; entries are never removed, bounded by users × platforms.
    refresh_locks: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn CredentialStore>, registry: Arc<PlatformRegistry>) -> Self {
        Self {
            store,
            registry,
            cache: Mutex::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Persist a raw OAuth token response after a code exchange, writing
    /// through to both the store and the cache. Returns the computed
    /// absolute expiry.
    pub async fn record_exchange(
        &self,
        user_id: &str,
        platform: Platform,
        tokens: &TokenSet,
    ) -> Result<DateTime<Utc>, AdsError> {
        let expires_at = expiry_from(tokens);

        self.store
            .upsert_tokens(
                user_id,
                platform,
                &tokens.access_token,
                tokens.refresh_token.as_deref(),
                expires_at,
            )
            .await?;

        self.cache_put(user_id, platform, &tokens.access_token, expires_at);

        debug!(user_id, %platform, %expires_at, "recorded token exchange");
        Ok(expires_at)
    }

    /// Resolve an access token guaranteed usable for at least the
    /// freshness margin.
    ///
    /// Fails with `NoCredential` when the user never connected, and with
    /// `ReauthorizationRequired` when no usable refresh token remains or
    /// the platform rejects the refresh exchange.
    pub async fn get_valid_token(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<String, AdsError> {
        // Tier 1: process cache, no I/O.
        if let Some(token) = self.cached_fresh(user_id, platform) {
            return Ok(token);
        }

        // Tier 2: durable store.
        let conn = self
            .store
            .get(user_id, platform)
            .await?
            .ok_or(AdsError::NoCredential { platform })?;

        if let (Some(access), Some(expires_at)) = (&conn.access_token, conn.expires_at) {
            if is_fresh(expires_at) {
                self.cache_put(user_id, platform, access, expires_at);
                return Ok(access.clone());
            }
        }

        // Tier 3: refresh exchange, single-flight per key.
        let Some(refresh_token) = conn.refresh_token else {
            return Err(AdsError::ReauthorizationRequired { platform });
        };

        let lock = self.refresh_lock(user_id, platform);
        let _guard = lock.lock().await;

        // A concurrent caller may have refreshed while we waited.
        if let Some(token) = self.cached_fresh(user_id, platform) {
            return Ok(token);
        }

        let adapter = self
            .registry
            .get(platform)
            .ok_or(AdsError::NotConfigured(platform))?;

        let tokens = match adapter.refresh(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(AdsError::UpstreamAuth { platform, body }) => {
                warn!(user_id, %platform, %body, "refresh exchange rejected");
                self.store
                    .mark_status(user_id, platform, ConnectionStatus::Error)
                    .await?;
                return Err(AdsError::ReauthorizationRequired { platform });
            }
            Err(e) => return Err(e),
        };

        let expires_at = expiry_from(&tokens);
        self.store
            .upsert_tokens(
                user_id,
                platform,
                &tokens.access_token,
                tokens.refresh_token.as_deref(),
                expires_at,
            )
            .await?;
        self.cache_put(user_id, platform, &tokens.access_token, expires_at);

        debug!(user_id, %platform, %expires_at, "refreshed access token");
        Ok(tokens.access_token)
    }

    /// Validate and store the user's selected account for a platform.
    /// Last write wins; an invalid identifier leaves any prior selection
    /// untouched. Returns the normalized id.
    pub async fn select_account(
        &self,
        user_id: &str,
        platform: Platform,
        raw: &str,
    ) -> Result<String, AdsError> {
        let adapter = self
            .registry
            .get(platform)
            .ok_or(AdsError::NotConfigured(platform))?;

        let account_id = adapter.validate_account_id(raw)?;
        self.store
            .select_account(user_id, platform, &account_id)
            .await?;

        Ok(account_id)
    }

    fn cached_fresh(&self, user_id: &str, platform: Platform) -> Option<String> {
        let cache = self.cache.lock().ok()?;
        let entry = cache.get(&(user_id.to_string(), platform))?;
        is_fresh(entry.expires_at).then(|| entry.access_token.clone())
    }

    fn cache_put(
        &self,
        user_id: &str,
        platform: Platform,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(
                (user_id.to_string(), platform),
                CachedToken {
                    access_token: access_token.to_string(),
                    expires_at,
                },
            );
        }
    }

    fn refresh_lock(&self, user_id: &str, platform: Platform) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.refresh_locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry((user_id.to_string(), platform))
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::platforms::{GoogleAdapter, PlatformAdapter};
    use crate::store::MemoryCredentialStore;

    const USER: &str = "user-1";

    /// Adapter stub whose refresh exchange is scripted and counted.
    struct StubAdapter {
        platform: Platform,
        refresh_calls: Arc<AtomicUsize>,
        refresh_delay_ms: u64,
        reject_refresh: bool,
    }

    impl StubAdapter {
        fn new(platform: Platform) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    platform,
                    refresh_calls: calls.clone(),
                    refresh_delay_ms: 0,
                    reject_refresh: false,
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl PlatformAdapter for StubAdapter {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn default_scopes(&self) -> Vec<String> {
            vec![]
        }

        fn authorization_url(&self, _scopes: &[String], _state: &str) -> String {
            String::new()
        }

        async fn exchange_code(&self, _code: &str) -> Result<TokenSet, AdsError> {
            Ok(token_set("exchanged-access", Some("exchanged-refresh"), 3600))
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenSet, AdsError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if self.refresh_delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.refresh_delay_ms)).await;
            }
            if self.reject_refresh {
                return Err(AdsError::UpstreamAuth {
                    platform: self.platform,
                    body: serde_json::json!({ "error": "invalid_grant" }),
                });
            }
            Ok(token_set("refreshed-access", None, 3600))
        }

        fn validate_account_id(&self, raw: &str) -> Result<String, AdsError> {
            Ok(raw.to_string())
        }
    }

    fn token_set(access: &str, refresh: Option<&str>, expires_in: u64) -> TokenSet {
        TokenSet {
            access_token: access.into(),
            refresh_token: refresh.map(String::from),
            expires_in: Some(expires_in),
            scope: None,
        }
    }

    fn manager_with(
        adapter: Box<dyn PlatformAdapter>,
    ) -> (TokenManager, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let mut registry = PlatformRegistry::new();
        registry.register(adapter);
        let manager = TokenManager::new(store.clone(), Arc::new(registry));
        (manager, store)
    }

    fn stub_manager(
        platform: Platform,
    ) -> (TokenManager, Arc<MemoryCredentialStore>, Arc<AtomicUsize>) {
        let (stub, calls) = StubAdapter::new(platform);
        let (manager, store) = manager_with(Box::new(stub));
        (manager, store, calls)
    }

    #[tokio::test]
    async fn fresh_token_served_without_refresh_call() {
        let (manager, _store, calls) = stub_manager(Platform::Google);

        manager
            .record_exchange(USER, Platform::Google, &token_set("a1", Some("r1"), 3600))
            .await
            .unwrap();

        let token = manager.get_valid_token(USER, Platform::Google).await.unwrap();
        assert_eq!(token, "a1");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeat_exchange_without_refresh_token_keeps_stored_one() {
        let (manager, store, calls) = stub_manager(Platform::Google);

        manager
            .record_exchange(USER, Platform::Google, &token_set("a1", Some("r1"), 3600))
            .await
            .unwrap();
        manager
            .record_exchange(USER, Platform::Google, &token_set("a2", None, 3600))
            .await
            .unwrap();

        let conn = store.get(USER, Platform::Google).await.unwrap().unwrap();
        assert_eq!(conn.access_token.as_deref(), Some("a2"));
        assert_eq!(conn.refresh_token.as_deref(), Some("r1"));

        let token = manager.get_valid_token(USER, Platform::Google).await.unwrap();
        assert_eq!(token, "a2");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_refresh_above_the_freshness_margin() {
        let (manager, _store, calls) = stub_manager(Platform::Google);

        // 61 seconds of validity left: just above the 60s margin.
        manager
            .record_exchange(USER, Platform::Google, &token_set("a1", Some("r1"), 61))
            .await
            .unwrap();

        let token = manager.get_valid_token(USER, Platform::Google).await.unwrap();
        assert_eq!(token, "a1");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_triggered_at_or_below_the_margin() {
        let (manager, store, calls) = stub_manager(Platform::Google);

        // 59 seconds left: inside the margin, must refresh.
        manager
            .record_exchange(USER, Platform::Google, &token_set("a1", Some("r1"), 59))
            .await
            .unwrap();

        let token = manager.get_valid_token(USER, Platform::Google).await.unwrap();
        assert_eq!(token, "refreshed-access");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The refresh response carried no refresh token; the stored one survives.
        let conn = store.get(USER, Platform::Google).await.unwrap().unwrap();
        assert_eq!(conn.access_token.as_deref(), Some("refreshed-access"));
        assert_eq!(conn.refresh_token.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn never_connected_fails_with_no_credential() {
        let (manager, _store, _calls) = stub_manager(Platform::Google);

        let err = manager.get_valid_token(USER, Platform::Google).await.unwrap_err();
        assert!(matches!(err, AdsError::NoCredential { platform: Platform::Google }));
    }

    #[tokio::test]
    async fn expired_without_refresh_token_requires_reauthorization() {
        let (manager, store, calls) = stub_manager(Platform::Google);

        store
            .upsert_tokens(
                USER,
                Platform::Google,
                "stale",
                None,
                Utc::now() - Duration::seconds(120),
            )
            .await
            .unwrap();

        let err = manager.get_valid_token(USER, Platform::Google).await.unwrap_err();
        assert!(matches!(
            err,
            AdsError::ReauthorizationRequired { platform: Platform::Google }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejected_refresh_marks_row_error_and_requires_reauthorization() {
        let (mut stub, calls) = StubAdapter::new(Platform::Google);
        stub.reject_refresh = true;
        let (manager, store) = manager_with(Box::new(stub));

        manager
            .record_exchange(USER, Platform::Google, &token_set("a1", Some("r1"), 0))
            .await
            .unwrap();

        let err = manager.get_valid_token(USER, Platform::Google).await.unwrap_err();
        assert!(matches!(err, AdsError::ReauthorizationRequired { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let conn = store.get(USER, Platform::Google).await.unwrap().unwrap();
        assert_eq!(conn.status, ConnectionStatus::Error);
    }

    #[tokio::test]
    async fn concurrent_callers_share_a_single_refresh() {
        let (mut stub, calls) = StubAdapter::new(Platform::Google);
        stub.refresh_delay_ms = 50;
        let (manager, _store) = manager_with(Box::new(stub));

        manager
            .record_exchange(USER, Platform::Google, &token_set("a1", Some("r1"), 0))
            .await
            .unwrap();

        let (t1, t2, t3, t4) = tokio::join!(
            manager.get_valid_token(USER, Platform::Google),
            manager.get_valid_token(USER, Platform::Google),
            manager.get_valid_token(USER, Platform::Google),
            manager.get_valid_token(USER, Platform::Google),
        );

        for token in [t1, t2, t3, t4] {
            assert_eq!(token.unwrap(), "refreshed-access");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn select_account_validates_and_normalizes() {
        let adapter = GoogleAdapter::new("id".into(), "secret".into(), "http://cb".into());
        let (manager, store) = manager_with(Box::new(adapter));

        let id = manager
            .select_account(USER, Platform::Google, "customers/123")
            .await
            .unwrap();
        assert_eq!(id, "123");

        let err = manager
            .select_account(USER, Platform::Google, "bad-format")
            .await
            .unwrap_err();
        assert!(matches!(err, AdsError::InvalidAccountId(_)));

        // The failed selection left the prior one untouched.
        let conn = store.get(USER, Platform::Google).await.unwrap().unwrap();
        assert_eq!(conn.selected_account_id.as_deref(), Some("123"));
    }

    #[tokio::test]
    async fn new_exchange_invalidates_the_cached_token() {
        let (manager, _store, calls) = stub_manager(Platform::Google);

        manager
            .record_exchange(USER, Platform::Google, &token_set("a1", Some("r1"), 3600))
            .await
            .unwrap();
        manager
            .record_exchange(USER, Platform::Google, &token_set("a2", None, 3600))
            .await
            .unwrap();

        let token = manager.get_valid_token(USER, Platform::Google).await.unwrap();
        assert_eq!(token, "a2");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
