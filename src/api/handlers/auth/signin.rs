use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::error;

use super::{
    service::{AuthError, AuthService},
    session::session_cookie,
    types::{ErrorResponse, SignInRequest, SignInResponse},
    utils::rfc3339_from_unix,
};

#[utoipa::path(
    post,
    path = "/signin",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SignInResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "Invalid username or password", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn signin(
    auth: Extension<Arc<AuthService>>,
    payload: Option<Json<SignInRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Invalid request body".to_string(),
            }),
        )
            .into_response();
    };

    let signed = match auth.sign_in(&request.username, &request.password).await {
        Ok(signed) => signed,
        Err(err) => return err.into_response(),
    };
    let expires = match rfc3339_from_unix(signed.access.claims.exp) {
        Ok(expires) => expires,
        Err(err) => return AuthError::Internal(err).into_response(),
    };

    let mut headers = HeaderMap::new();
    let session = match signed.session {
        Some(new_session) => match session_cookie(auth.config(), &new_session.session_id) {
            Ok(cookie) => {
                headers.insert(SET_COOKIE, cookie);
                Some("created".to_string())
            }
            Err(err) => {
                error!("Failed to build session cookie: {err}");
                None
            }
        },
        None => None,
    };

    let body = SignInResponse {
        token: signed.access.token,
        expires,
        session,
    };
    (StatusCode::OK, headers, Json(body)).into_response()
}
