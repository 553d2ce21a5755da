//! Integration tests for the OAuth flows and the query path, with the
//! platform endpoints mocked by wiremock.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use adconnect::invoker::GoogleAdsApi;
use adconnect::platforms::{
    GoogleAdapter, LinkedInAdapter, MetaAdapter, Platform, PlatformAdapter, PlatformRegistry,
};
use adconnect::store::MemoryCredentialStore;
use adconnect::tokens::TokenManager;
use adconnect::AdsError;

fn google_adapter(server: &MockServer) -> GoogleAdapter {
    GoogleAdapter::new("client-id".into(), "client-secret".into(), "http://cb".into())
        .with_token_url(format!("{}/token", server.uri()))
}

#[tokio::test]
async fn google_code_exchange_roundtrip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.access",
            "refresh_token": "1//refresh",
            "expires_in": 3600,
            "token_type": "Bearer",
            "scope": "https://www.googleapis.com/auth/adwords",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = google_adapter(&server).exchange_code("4/c0de").await.unwrap();

    assert_eq!(tokens.access_token, "ya29.access");
    assert_eq!(tokens.refresh_token.as_deref(), Some("1//refresh"));
    assert_eq!(tokens.expires_in, Some(3600));
}

#[tokio::test]
async fn rejected_exchange_carries_upstream_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked.",
        })))
        .mount(&server)
        .await;

    let err = google_adapter(&server).refresh("1//stale").await.unwrap_err();

    match err {
        AdsError::UpstreamAuth { platform, body } => {
            assert_eq!(platform, Platform::Google);
            assert_eq!(body["error"], "invalid_grant");
        }
        other => panic!("expected UpstreamAuth, got {other:?}"),
    }
}

#[tokio::test]
async fn meta_exchange_trades_code_for_long_lived_token() {
    let server = MockServer::start().await;

    // Step 1: authorization code → short-lived token.
    Mock::given(method("GET"))
        .and(path("/oauth/access_token"))
        .and(query_param("code", "c0de"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "short-lived",
            "token_type": "bearer",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Step 2: short-lived → long-lived token.
    Mock::given(method("GET"))
        .and(path("/oauth/access_token"))
        .and(query_param("grant_type", "fb_exchange_token"))
        .and(query_param("fb_exchange_token", "short-lived"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "long-lived",
            "token_type": "bearer",
            "expires_in": 5_184_000,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = MetaAdapter::new("app".into(), "secret".into(), "http://cb".into())
        .with_graph_url(server.uri());

    let tokens = adapter.exchange_code("c0de").await.unwrap();

    assert_eq!(tokens.access_token, "long-lived");
    assert!(tokens.refresh_token.is_none());
    assert_eq!(tokens.expires_in, Some(5_184_000));
}

#[tokio::test]
async fn linkedin_refresh_roundtrip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accessToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "li.fresh",
            "expires_in": 5_184_000,
            "refresh_token": "li.refresh2",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = LinkedInAdapter::new("id".into(), "secret".into(), "http://cb".into())
        .with_token_url(format!("{}/accessToken", server.uri()));

    let tokens = adapter.refresh("li.refresh").await.unwrap();

    assert_eq!(tokens.access_token, "li.fresh");
    assert_eq!(tokens.refresh_token.as_deref(), Some("li.refresh2"));
}

#[tokio::test]
async fn exchange_select_then_query_campaigns() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.access",
            "refresh_token": "1//refresh",
            "expires_in": 3600,
        })))
        .mount(&server)
        .await;

    // searchStream returns chunked results; the invoker flattens them.
    Mock::given(method("POST"))
        .and(path("/v21/customers/123/googleAds:searchStream"))
        .and(header("developer-token", "dev-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "results": [
                    {
                        "campaign": { "id": "111", "name": "Spring Sale" },
                        "metrics": {
                            "impressions": "1000",
                            "clicks": "50",
                            "costMicros": "12345000"
                        }
                    }
                ]
            },
            {
                "results": [
                    {
                        "campaign": { "id": "222", "name": "Brand" },
                        "metrics": { "impressions": "40", "clicks": "2", "costMicros": "999" }
                    }
                ]
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = google_adapter(&server);
    let store = Arc::new(MemoryCredentialStore::new());
    let mut registry = PlatformRegistry::new();
    registry.register(Box::new(google_adapter(&server)));
    let manager = TokenManager::new(store.clone(), Arc::new(registry));

    // Connect: exchange the code and persist the token set.
    let tokens = adapter.exchange_code("4/c0de").await.unwrap();
    manager
        .record_exchange("user-1", Platform::Google, &tokens)
        .await
        .unwrap();

    // Select the customer the queries should run against.
    let selected = manager
        .select_account("user-1", Platform::Google, "customers/123")
        .await
        .unwrap();
    assert_eq!(selected, "123");

    // Query: resolve a valid token, then read campaigns.
    let token = manager.get_valid_token("user-1", Platform::Google).await.unwrap();
    assert_eq!(token, "ya29.access");

    let api = GoogleAdsApi::new(Some("dev-token".into()), None).with_base_url(server.uri());
    let items = api.campaign_summary(&token, &selected).await.unwrap();

    assert_eq!(items.len(), 2);
    let first = serde_json::to_value(&items[0]).unwrap();
    assert_eq!(first["campaignId"], "111");
    assert_eq!(first["campaignName"], "Spring Sale");
    assert_eq!(first["impressions"], "1000");
    assert_eq!(first["clicks"], "50");
    assert_eq!(first["costMicros"], "12345000");
}

#[tokio::test]
async fn upstream_api_failure_maps_to_400_class_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v21/customers:listAccessibleCustomers"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "status": "PERMISSION_DENIED" }
        })))
        .mount(&server)
        .await;

    let api = GoogleAdsApi::new(Some("dev-token".into()), None).with_base_url(server.uri());
    let err = api.list_accessible_customers("tok").await.unwrap_err();

    match err {
        AdsError::UpstreamApi { platform, body } => {
            assert_eq!(platform, Platform::Google);
            assert_eq!(body["error"]["status"], "PERMISSION_DENIED");
        }
        other => panic!("expected UpstreamApi, got {other:?}"),
    }
}
