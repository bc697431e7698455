//! Recipe routes, health and the OpenAPI document through the full router.

mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common::{bearer, empty_request, json_request, TestApp};
use recipes::api::handlers::auth::AuthConfig;
use serde_json::{json, Value};

async fn signed_in() -> Result<(TestApp, String)> {
    let app = TestApp::new(AuthConfig::new()).await?;
    let token = app
        .sign_in()
        .await?
        .token()
        .unwrap_or_default()
        .to_string();
    Ok((app, token))
}

#[tokio::test]
async fn listing_is_public() -> Result<()> {
    let app = TestApp::new(AuthConfig::new()).await?;

    let reply = app.send(empty_request(Method::GET, "/recipes")?).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!([]));
    Ok(())
}

#[tokio::test]
async fn create_requires_authentication() -> Result<()> {
    let app = TestApp::new(AuthConfig::new()).await?;

    let reply = app
        .send(json_request(Method::POST, "/recipes", &json!({"name": "Toast"}))?)
        .await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn recipe_lifecycle() -> Result<()> {
    let (app, token) = signed_in().await?;

    let created = app
        .send(bearer(
            json_request(
                Method::POST,
                "/recipes",
                &json!({
                    "name": "Pancakes",
                    "tags": ["breakfast", "sweet"],
                    "ingredients": ["flour", "milk", "eggs"],
                    "instructions": ["mix", "fry"]
                }),
            )?,
            &token,
        )?)
        .await?;
    assert_eq!(created.status, StatusCode::OK);
    let id = created.body["id"].as_str().unwrap_or_default().to_string();
    assert!(!id.is_empty());
    assert!(created.body["publishedAt"].is_string());

    let listed = app.send(empty_request(Method::GET, "/recipes")?).await?;
    assert_eq!(listed.body.as_array().map(Vec::len), Some(1));

    let found = app
        .send(bearer(
            empty_request(Method::GET, "/recipes/search?tag=breakfast")?,
            &token,
        )?)
        .await?;
    assert_eq!(found.body.as_array().map(Vec::len), Some(1));

    let missed = app
        .send(bearer(
            empty_request(Method::GET, "/recipes/search?tag=dinner")?,
            &token,
        )?)
        .await?;
    assert_eq!(missed.body, json!([]));

    let uri = format!("/recipes/{id}");
    let fetched = app
        .send(bearer(empty_request(Method::GET, &uri)?, &token)?)
        .await?;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["name"], "Pancakes");

    let updated = app
        .send(bearer(
            json_request(
                Method::PUT,
                &uri,
                &json!({"name": "Crepes", "tags": ["breakfast"]}),
            )?,
            &token,
        )?)
        .await?;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body, json!({"message": "Recipe has been updated"}));

    let fetched = app
        .send(bearer(empty_request(Method::GET, &uri)?, &token)?)
        .await?;
    assert_eq!(fetched.body["name"], "Crepes");
    assert_eq!(fetched.body["id"], Value::String(id.clone()));

    let deleted = app
        .send(bearer(empty_request(Method::DELETE, &uri)?, &token)?)
        .await?;
    assert_eq!(deleted.body, json!({"message": "Recipe has been deleted"}));

    let gone = app
        .send(bearer(empty_request(Method::GET, &uri)?, &token)?)
        .await?;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(gone.body, json!({"error": "Recipe not found"}));
    Ok(())
}

#[tokio::test]
async fn search_without_tag_is_bad_request() -> Result<()> {
    let (app, token) = signed_in().await?;

    let reply = app
        .send(bearer(empty_request(Method::GET, "/recipes/search")?, &token)?)
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body, json!({"error": "Missing tag"}));
    Ok(())
}

#[tokio::test]
async fn health_reports_database_and_disabled_jwks() -> Result<()> {
    let app = TestApp::new(AuthConfig::new()).await?;

    let reply = app.send(empty_request(Method::GET, "/health")?).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["database"], "ok");
    assert_eq!(reply.body["jwks"], "disabled");
    assert_eq!(reply.body["name"], env!("CARGO_PKG_NAME"));
    assert!(reply.headers.get("x-app").is_some());

    let head = app.send(empty_request(Method::HEAD, "/health")?).await?;
    assert_eq!(head.status, StatusCode::OK);
    assert_eq!(head.body, Value::Null);
    Ok(())
}

#[tokio::test]
async fn openapi_document_is_served() -> Result<()> {
    let app = TestApp::new(AuthConfig::new()).await?;

    let reply = app.send(empty_request(Method::GET, "/openapi.json")?).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body["paths"]["/signin"].is_object());
    assert!(reply.body["paths"]["/recipes/{id}"].is_object());
    Ok(())
}
