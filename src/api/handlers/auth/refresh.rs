use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::{
    service::{AuthError, AuthService},
    types::{ErrorResponse, TokenResponse},
    utils::{extract_authorization_token, rfc3339_from_unix},
};

#[utoipa::path(
    post,
    path = "/refresh",
    params(
        ("Authorization" = String, Header, description = "Access token, raw or `Bearer <token>`")
    ),
    responses(
        (status = 200, description = "New access token", body = TokenResponse),
        (status = 400, description = "Token is not expired yet", body = ErrorResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(headers: HeaderMap, auth: Extension<Arc<AuthService>>) -> impl IntoResponse {
    let Some(token) = extract_authorization_token(&headers) else {
        return AuthError::InvalidToken.into_response();
    };

    let issued = match auth.refresh(&token) {
        Ok(issued) => issued,
        Err(err) => return err.into_response(),
    };
    match rfc3339_from_unix(issued.claims.exp) {
        Ok(expires) => (
            StatusCode::OK,
            Json(TokenResponse {
                token: issued.token,
                expires,
            }),
        )
            .into_response(),
        Err(err) => AuthError::Internal(err).into_response(),
    }
}
