//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store wiring and the lifecycle service
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request DTOs and query validation
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower::ServiceBuilder;

use crate::auth::Hs256Jwt;
use crate::config::ServerConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

const DEV_SECRET: &str = "dev-secret";

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &ServerConfig) -> Result<Router, services::SetupError> {
    let services = services::build_services(config).await?;
    let secret = config.jwt_secret.clone().unwrap_or_else(|| {
        tracing::warn!("SECRET_KEY not set; using insecure dev default");
        DEV_SECRET.to_string()
    });
    Ok(router(services, Hs256Jwt::new(secret.as_bytes())))
}

/// Router over an already-wired service and token signer.
pub fn router(services: services::LifecycleService, jwt: Hs256Jwt) -> Router {
    let jwt = Arc::new(jwt);
    let auth_state = middleware::AuthState { jwt: jwt.clone() };

    // Protected routes: require a bearer token; handlers check the role.
    let protected = routes::router().route_layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/dummyLogin", post(routes::auth::dummy_login))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_log))
                .layer(Extension(Arc::new(services)))
                .layer(Extension(jwt)),
        )
}
