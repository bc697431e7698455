use super::auth::{AccessGate, KeysetStatus};
use crate::{store::Ping, GIT_COMMIT_HASH};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
    /// `ok`, `error`, `static`, or `disabled` when no identity provider is used.
    jwks: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database and identity provider keys are healthy", body = Health),
        (status = 503, description = "Database or identity provider keys are unhealthy", body = Health)
    ),
    tag = "health"
)]
pub async fn health(
    method: Method,
    db: Extension<Arc<dyn Ping>>,
    gate: Extension<Arc<AccessGate>>,
) -> impl IntoResponse {
    let database_ok = match db.ping().await {
        Ok(()) => true,
        Err(err) => {
            error!("Failed to ping database: {err:#}");
            false
        }
    };

    let keyset_status = gate.keyset_status().await;
    let keyset_ok = keyset_status.map_or(true, KeysetStatus::is_healthy);

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if database_ok { "ok" } else { "error" }.to_string(),
        jwks: keyset_status
            .map_or("disabled", KeysetStatus::as_str)
            .to_string(),
    };
    debug!(database = %health.database, jwks = %health.jwks, "health checked");

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = health.commit.get(0..7).unwrap_or("");
    let mut headers = HeaderMap::new();
    match format!("{}:{}:{}", health.name, health.version, short_hash).parse::<HeaderValue>() {
        Ok(value) => {
            headers.insert("X-App", value);
        }
        Err(err) => error!("Failed to parse X-App header: {err}"),
    }

    let status = if database_ok && keyset_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, headers, body)
}
