use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use crate::platforms::Platform;

/// Unified error type for the adconnect service.
#[derive(Debug, thiserror::Error)]
pub enum AdsError {
    // ── Credential resolution ───────────────────────────────────────────
    #[error("no {platform} connection stored; start the connect flow first")]
    NoCredential { platform: Platform },

    #[error("{platform} authorization expired; reconnect required")]
    ReauthorizationRequired { platform: Platform },

    // ── Client input ────────────────────────────────────────────────────
    #[error("invalid account identifier: {0}")]
    InvalidAccountId(String),

    #[error("invalid state parameter")]
    InvalidState,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("platform {0} is not configured")]
    NotConfigured(Platform),

    // ── Upstream failures ───────────────────────────────────────────────
    #[error("{platform} authorization endpoint rejected the request")]
    UpstreamAuth { platform: Platform, body: Value },

    #[error("{platform} API call failed")]
    UpstreamApi { platform: Platform, body: Value },

    // ── Internal ────────────────────────────────────────────────────────
    #[error("credential store unavailable: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AdsError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("credential store error: {e}");
        AdsError::Store(e.to_string())
    }
}

/// Parse an upstream response body, falling back to the raw text when it
/// is not JSON. Keeps the platform's error payload intact for diagnosis.
pub(crate) fn upstream_payload(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

impl IntoResponse for AdsError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AdsError::NoCredential { .. } => (StatusCode::NOT_FOUND, "no_credential"),
            AdsError::ReauthorizationRequired { .. } => {
                (StatusCode::UNAUTHORIZED, "reauthorization_required")
            }
            AdsError::InvalidAccountId(_) => (StatusCode::BAD_REQUEST, "invalid_account_id"),
            AdsError::InvalidState => (StatusCode::BAD_REQUEST, "invalid_state"),
            AdsError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AdsError::NotConfigured(_) => (StatusCode::NOT_FOUND, "platform_not_configured"),
            AdsError::UpstreamAuth { .. } => (StatusCode::BAD_REQUEST, "upstream_auth_error"),
            AdsError::UpstreamApi { .. } => (StatusCode::BAD_REQUEST, "upstream_api_error"),
            AdsError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_unavailable"),
            AdsError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let mut error = json!({
            "code": code,
            "message": self.to_string(),
        });

        // Surface the platform's raw error payload for observability.
        if let AdsError::UpstreamAuth { body, .. } | AdsError::UpstreamApi { body, .. } = &self {
            error["upstream"] = body.clone();
        }

        (status, axum::Json(json!({ "error": error }))).into_response()
    }
}
