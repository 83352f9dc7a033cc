use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::app::services::LifecycleService;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", post(create_reception))
}

pub async fn create_reception(
    Extension(services): Extension<Arc<LifecycleService>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreateReceptionRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::require_role(&principal, authz::EMPLOYEE) {
        return errors::forbidden(e);
    }

    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    match services.open_reception(&body.pvz_id).await {
        Ok(reception) => (StatusCode::CREATED, Json(reception)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
