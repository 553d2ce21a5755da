//! Route handlers. All platform groups share one shape:
//! connect → callback → select-account → connection / campaigns / leads.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::AdsError;
use crate::platforms::Platform;
use crate::SharedState;

pub fn ads_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ads/{platform}/connect", get(connect))
        .route("/ads/{platform}/callback", get(callback))
        .route("/ads/{platform}/select-account", post(select_account))
        .route("/ads/{platform}/connection", get(connection))
        .route("/ads/{platform}/campaigns", get(campaigns))
        .route("/ads/{platform}/leads", get(leads))
        .route("/ads/{platform}/forms", get(forms))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "adconnect",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: Option<String>,
}

fn require_user(q: &UserQuery) -> Result<&str, AdsError> {
    q.user_id
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AdsError::BadRequest("user_id query parameter required".into()))
}

fn parse_platform(raw: &str) -> Result<Platform, AdsError> {
    raw.parse()
}

// ── Connect flow ─────────────────────────────────────────────────────────

/// GET /ads/{platform}/connect — redirect to the platform's consent screen.
async fn connect(
    State(state): State<SharedState>,
    Path(platform): Path<String>,
    Query(q): Query<UserQuery>,
) -> Result<Response, AdsError> {
    let platform = parse_platform(&platform)?;
    let user_id = require_user(&q)?;

    let adapter = state
        .registry
        .get(platform)
        .ok_or(AdsError::NotConfigured(platform))?;

    let signed_state = state.signer.issue(user_id)?;
    let auth_url = adapter.authorization_url(&[], &signed_state);

    Ok(Redirect::temporary(&auth_url).into_response())
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

/// GET /ads/{platform}/callback — exchange the authorization code and
/// persist the connection.
async fn callback(
    State(state): State<SharedState>,
    Path(platform): Path<String>,
    Query(q): Query<CallbackQuery>,
) -> Result<Json<serde_json::Value>, AdsError> {
    let platform = parse_platform(&platform)?;

    let code = q
        .code
        .as_deref()
        .ok_or_else(|| AdsError::BadRequest("missing code".into()))?;
    let signed = q.state.as_deref().ok_or(AdsError::InvalidState)?;
    let user_id = state.signer.open(signed)?;

    let adapter = state
        .registry
        .get(platform)
        .ok_or(AdsError::NotConfigured(platform))?;

    let tokens = adapter.exchange_code(code).await?;
    let expires_at = state
        .tokens
        .record_exchange(&user_id, platform, &tokens)
        .await?;

    tracing::info!(%user_id, %platform, "platform connected");

    // Google gets the accessible-customer list so the caller can pick one.
    if platform == Platform::Google {
        let resource_names = state
            .google_ads
            .list_accessible_customers(&tokens.access_token)
            .await?;
        return Ok(Json(json!({
            "message": "Google Ads connected. Choose a customer to proceed.",
            "accessibleCustomerResourceNames": resource_names,
            "tip": "POST one resourceName to /ads/google/select-account",
        })));
    }

    Ok(Json(json!({
        "message": format!("{platform} connected"),
        "platform": platform,
        "tokenExpiresAt": expires_at,
        "hasRefreshToken": tokens.refresh_token.is_some(),
    })))
}

// ── Account selection ────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectAccountBody {
    account_resource_identifier: String,
}

/// POST /ads/{platform}/select-account — validate and store the account
/// the data queries should run against.
async fn select_account(
    State(state): State<SharedState>,
    Path(platform): Path<String>,
    Query(q): Query<UserQuery>,
    Json(body): Json<SelectAccountBody>,
) -> Result<Json<serde_json::Value>, AdsError> {
    let platform = parse_platform(&platform)?;
    let user_id = require_user(&q)?;

    let account_id = state
        .tokens
        .select_account(user_id, platform, &body.account_resource_identifier)
        .await?;

    Ok(Json(json!({ "ok": true, "selectedAccountId": account_id })))
}

// ── Connection status ────────────────────────────────────────────────────

/// GET /ads/{platform}/connection — report connection status without
/// touching the platform.
async fn connection(
    State(state): State<SharedState>,
    Path(platform): Path<String>,
    Query(q): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, AdsError> {
    let platform = parse_platform(&platform)?;
    let user_id = require_user(&q)?;

    let conn = state
        .store
        .get(user_id, platform)
        .await?
        .ok_or(AdsError::NoCredential { platform })?;

    let seconds_to_expiry = conn
        .expires_at
        .map(|at| (at - chrono::Utc::now()).num_seconds());

    Ok(Json(json!({
        "connected": conn.access_token.is_some() || conn.refresh_token.is_some(),
        "status": conn.status,
        "selectedAccountId": conn.selected_account_id,
        "hasRefreshToken": conn.refresh_token.is_some(),
        "tokenExpiresAt": conn.expires_at,
        "secondsToExpiry": seconds_to_expiry,
    })))
}

// ── Data queries ─────────────────────────────────────────────────────────

async fn selected_account(
    state: &SharedState,
    user_id: &str,
    platform: Platform,
) -> Result<String, AdsError> {
    state
        .store
        .get(user_id, platform)
        .await?
        .and_then(|c| c.selected_account_id)
        .ok_or_else(|| {
            AdsError::BadRequest(format!(
                "no account selected; POST an accountResourceIdentifier to \
                 /ads/{platform}/select-account first"
            ))
        })
}

/// GET /ads/{platform}/campaigns — campaign read for the selected account.
async fn campaigns(
    State(state): State<SharedState>,
    Path(platform): Path<String>,
    Query(q): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, AdsError> {
    let platform = parse_platform(&platform)?;
    let user_id = require_user(&q)?;
    let token = state.tokens.get_valid_token(user_id, platform).await?;

    match platform {
        Platform::Google => {
            let customer_id = selected_account(&state, user_id, platform).await?;
            let items = state.google_ads.campaign_summary(&token, &customer_id).await?;
            Ok(Json(json!({ "customerId": customer_id, "items": items })))
        }
        Platform::MetaAds => {
            let accounts = state.meta_ads.ad_accounts(&token).await?;
            Ok(Json(json!({ "ok": true, "accounts": accounts })))
        }
        Platform::Linkedin => {
            let account_id = selected_account(&state, user_id, platform).await?;
            let campaigns = state.linkedin_ads.campaigns(&token, &account_id).await?;
            Ok(Json(json!({ "ok": true, "campaigns": campaigns })))
        }
    }
}

#[derive(Deserialize)]
struct LeadsQuery {
    user_id: Option<String>,
    form_id: Option<String>,
}

/// GET /ads/{platform}/leads — lead reads for the selected account
/// (Meta reads one lead form, passed as `form_id`).
async fn leads(
    State(state): State<SharedState>,
    Path(platform): Path<String>,
    Query(q): Query<LeadsQuery>,
) -> Result<Json<serde_json::Value>, AdsError> {
    let platform = parse_platform(&platform)?;
    let user_q = UserQuery { user_id: q.user_id.clone() };
    let user_id = require_user(&user_q)?;
    let token = state.tokens.get_valid_token(user_id, platform).await?;

    match platform {
        Platform::Google => {
            let customer_id = selected_account(&state, user_id, platform).await?;
            let items = state.google_ads.lead_submissions(&token, &customer_id).await?;
            Ok(Json(json!({
                "customerId": customer_id,
                "count": items.len(),
                "items": items,
            })))
        }
        Platform::MetaAds => {
            let form_id = q
                .form_id
                .as_deref()
                .ok_or_else(|| AdsError::BadRequest("form_id query parameter required".into()))?;
            let leads = state.meta_ads.leads(&token, form_id).await?;
            Ok(Json(json!({ "ok": true, "count": leads.len(), "leads": leads })))
        }
        Platform::Linkedin => {
            let account_id = selected_account(&state, user_id, platform).await?;
            let forms = state.linkedin_ads.lead_forms(&token, &account_id).await?;
            Ok(Json(json!({ "ok": true, "forms": forms })))
        }
    }
}

/// GET /ads/{platform}/forms — Meta lead-gen forms grouped per page.
async fn forms(
    State(state): State<SharedState>,
    Path(platform): Path<String>,
    Query(q): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, AdsError> {
    let platform = parse_platform(&platform)?;
    let user_id = require_user(&q)?;

    if platform != Platform::MetaAds {
        return Err(AdsError::BadRequest(format!(
            "forms listing is only available for meta_ads, not {platform}"
        )));
    }

    let token = state.tokens.get_valid_token(user_id, platform).await?;
    let forms = state.meta_ads.lead_forms(&token).await?;

    Ok(Json(json!({ "ok": true, "forms": forms })))
}
