#![allow(dead_code)]

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use recipes::{
    api::{
        self,
        handlers::auth::{
            hash_password, AccessGate, AuthConfig, AuthService, BearerStrategy, PasswordVerifier,
            TokenCodec,
        },
        Services,
    },
    store::{Credential, MemoryStore},
};
use secrecy::SecretString;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret";
pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "password1";

// Lowest cost bcrypt accepts, keeps the suite fast.
const TEST_COST: u32 = 4;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub codec: TokenCodec,
}

impl TestApp {
    pub async fn new(config: AuthConfig) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_credential(Credential {
                username: USERNAME.to_string(),
                password_hash: hash_password(PASSWORD, TEST_COST)?,
            })
            .await;

        let codec = TokenCodec::new(SecretString::from(SECRET.to_string()));
        let auth = Arc::new(AuthService::new(
            config,
            codec.clone(),
            PasswordVerifier::new(TEST_COST)?,
            store.clone(),
            store.clone(),
        ));
        let gate = Arc::new(AccessGate::new(
            BearerStrategy::Local(codec.clone()),
            store.clone(),
        ));

        let router = api::router(Services {
            auth,
            gate,
            recipes: store.clone(),
            health: store.clone(),
        });

        Ok(Self {
            router,
            store,
            codec,
        })
    }

    pub async fn send(&self, request: Request<Body>) -> Result<Reply> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(Reply {
            status,
            headers,
            body,
        })
    }

    /// Sign in as the seeded user and return the reply.
    pub async fn sign_in(&self) -> Result<Reply> {
        self.send(json_request(
            Method::POST,
            "/signin",
            &serde_json::json!({"username": USERNAME, "password": PASSWORD}),
        )?)
        .await
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn token(&self) -> Option<&str> {
        self.body.get("token").and_then(Value::as_str)
    }

    /// `name=value` of the session cookie, ready for a `Cookie` header.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_string)
    }
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body)?))?)
}

pub fn empty_request(method: Method, uri: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())?)
}

pub fn with_header(
    mut request: Request<Body>,
    name: header::HeaderName,
    value: &str,
) -> Result<Request<Body>> {
    request.headers_mut().insert(name, value.parse()?);
    Ok(request)
}

pub fn bearer(request: Request<Body>, token: &str) -> Result<Request<Body>> {
    with_header(request, header::AUTHORIZATION, &format!("Bearer {token}"))
}
