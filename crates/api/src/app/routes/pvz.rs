use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query,
    },
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
    Router::new()
        .route("/", post(create_pickup_point).get(list_history))
        .route("/:pvz_id/close_last_reception", post(close_last_reception))
        .route("/:pvz_id/delete_last_product", post(delete_last_product))
}

pub async fn create_pickup_point(
    Extension(services): Extension<Arc<LifecycleService>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreatePickupPointRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::require_role(&principal, authz::MODERATOR) {
        return errors::forbidden(e);
    }

    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    match services.create_pickup_point(&body.city).await {
        Ok(point) => (StatusCode::CREATED, Json(point)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_history(
    Extension(services): Extension<Arc<LifecycleService>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::HistoryQueryParams>, QueryRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::require_role(&principal, authz::ANY_STAFF) {
        return errors::forbidden(e);
    }

    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };
    let params = match query.validate() {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match services.history(params).await {
        Ok(history) => (StatusCode::OK, Json(history)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn close_last_reception(
    Extension(services): Extension<Arc<LifecycleService>>,
    Extension(principal): Extension<PrincipalContext>,
    pvz_id: Result<Path<String>, PathRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::require_role(&principal, authz::EMPLOYEE) {
        return errors::forbidden(e);
    }

    let Path(pvz_id) = match pvz_id {
        Ok(p) => p,
        Err(e) => return errors::path_rejection(e),
    };

    match services.close_last_reception(&pvz_id).await {
        Ok(reception) => (StatusCode::OK, Json(reception)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_last_product(
    Extension(services): Extension<Arc<LifecycleService>>,
    Extension(principal): Extension<PrincipalContext>,
    pvz_id: Result<Path<String>, PathRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::require_role(&principal, authz::EMPLOYEE) {
        return errors::forbidden(e);
    }

    let Path(pvz_id) = match pvz_id {
        Ok(p) => p,
        Err(e) => return errors::path_rejection(e),
    };

    match services.delete_last_product(&pvz_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
