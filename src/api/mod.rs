use crate::{
    api::handlers::{
        auth::{self, AccessGate, AuthService},
        health, recipes,
    },
    store::{Ping, RecipeStore},
};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Everything the handlers need, injected once at startup.
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<AuthService>,
    pub gate: Arc<AccessGate>,
    pub recipes: Arc<dyn RecipeStore>,
    pub health: Arc<dyn Ping>,
}

/// Build the application router.
///
/// `/signin`, `/refresh`, `/signout`, `GET /recipes`, `/health` and
/// `/openapi.json` are public; the remaining recipe routes run behind the
/// access gate.
#[must_use]
pub fn router(services: Services) -> Router {
    let protected = Router::new()
        .route("/recipes", post(recipes::create))
        .route("/recipes/search", get(recipes::search))
        .route(
            "/recipes/:id",
            get(recipes::get_one)
                .put(recipes::update)
                .delete(recipes::delete),
        )
        .route_layer(middleware::from_fn_with_state(
            services.gate.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/signin", post(auth::signin::signin))
        .route("/refresh", post(auth::refresh::refresh))
        .route("/signout", post(auth::session::signout))
        .route("/recipes", get(recipes::list))
        .route("/health", get(health::health).head(health::health))
        .route("/openapi.json", get(|| async { Json(openapi()) }))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID_HEADER),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID_HEADER,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(services.auth))
                .layer(Extension(services.gate))
                .layer(Extension(services.recipes))
                .layer(Extension(services.health)),
        )
}

/// Serve `app` on `[::]:port` until ctrl-c.
///
/// # Errors
/// Returns an error if the port cannot be bound or the server fails.
pub async fn serve(port: u16, app: Router) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
                std::future::pending::<()>().await;
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
