use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use crate::app::{dto, errors};
use crate::auth::Hs256Jwt;

/// Issue a token for the requested role, no credentials needed.
pub async fn dummy_login(
    Extension(jwt): Extension<Arc<Hs256Jwt>>,
    body: Result<Json<dto::DummyLoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    match jwt.issue(body.role, Utc::now()) {
        Ok(token) => (StatusCode::OK, Json(token)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "token issue failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "token_error", e.to_string())
        }
    }
}
