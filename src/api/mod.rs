//! HTTP router for adconnect.
//!
//! Thin request/response mapping only; the token lifecycle manager and
//! the platform invokers do the actual work. Endpoint groups:
//! - /health                  — liveness
//! - /ads/{platform}/…        — connect flow, account selection, data reads

pub mod routes;

use crate::SharedState;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::ads_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
