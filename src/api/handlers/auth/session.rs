//! Session cookie handling and the sign-out endpoint.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::{
    service::AuthService,
    state::AuthConfig,
    types::{ErrorResponse, MessageResponse},
};

pub const SESSION_COOKIE_NAME: &str = "recipes_api";

#[utoipa::path(
    post,
    path = "/signout",
    responses(
        (status = 200, description = "Session cleared", body = MessageResponse),
        (status = 500, description = "Session store failure", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn signout(headers: HeaderMap, auth: Extension<Arc<AuthService>>) -> impl IntoResponse {
    let session_id = extract_session_id(&headers);
    if let Err(err) = auth.sign_out(session_id.as_deref()).await {
        return err.into_response();
    }

    // Clear the cookie even when there was no session behind it.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (
        StatusCode::OK,
        response_headers,
        Json(MessageResponse::new("Signed out...")),
    )
        .into_response()
}

/// `HttpOnly` cookie carrying the raw session identifier.
pub(super) fn session_cookie(
    config: &AuthConfig,
    session_id: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Raw session identifier from the `Cookie` header(s), if any.
pub(crate) fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            let val = val.trim();
            (key.trim() == SESSION_COOKIE_NAME && !val.is_empty()).then(|| val.to_string())
        })
}
