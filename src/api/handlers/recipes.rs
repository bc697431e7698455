//! Recipe endpoints. Listing is public; everything else sits behind the
//! access gate.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::auth::{
    types::{ErrorResponse, MessageResponse},
    AuthOutcome,
};
use crate::store::{Recipe, RecipeDraft, RecipeStore};

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct RecipeRequest {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
}

impl From<RecipeRequest> for RecipeDraft {
    fn from(request: RecipeRequest) -> Self {
        Self {
            name: request.name,
            tags: request.tags,
            ingredients: request.ingredients,
            instructions: request.instructions,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RecipeResponse {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    /// RFC 3339.
    pub published_at: String,
}

impl From<Recipe> for RecipeResponse {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id.to_string(),
            name: recipe.name,
            tags: recipe.tags,
            ingredients: recipe.ingredients,
            instructions: recipe.instructions,
            published_at: recipe
                .published_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| recipe.published_at.to_string()),
        }
    }
}

#[derive(Deserialize, IntoParams, Debug)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Tag to match exactly.
    pub tag: String,
}

fn bad_request(message: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn not_found() -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Recipe not found".to_string(),
        }),
    )
        .into_response()
}

fn internal_error(operation: &str, err: &anyhow::Error) -> axum::response::Response {
    error!("Failed to {operation}: {err:#}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Internal server error".to_string(),
        }),
    )
        .into_response()
}

fn recipes_response(recipes: Vec<Recipe>) -> axum::response::Response {
    let body: Vec<RecipeResponse> = recipes.into_iter().map(RecipeResponse::from).collect();
    (StatusCode::OK, Json(body)).into_response()
}

#[utoipa::path(
    get,
    path = "/recipes",
    responses(
        (status = 200, description = "All recipes, newest first", body = [RecipeResponse])
    ),
    tag = "recipes"
)]
pub async fn list(store: Extension<Arc<dyn RecipeStore>>) -> impl IntoResponse {
    match store.list().await {
        Ok(recipes) => recipes_response(recipes),
        Err(err) => internal_error("list recipes", &err),
    }
}

#[utoipa::path(
    post,
    path = "/recipes",
    request_body = RecipeRequest,
    responses(
        (status = 200, description = "Recipe created", body = RecipeResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not logged in", body = MessageResponse)
    ),
    tag = "recipes"
)]
pub async fn create(
    store: Extension<Arc<dyn RecipeStore>>,
    Extension(outcome): Extension<AuthOutcome>,
    payload: Option<Json<RecipeRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return bad_request("Invalid request body");
    };
    let recipe = Recipe::publish(request.into());
    if let Err(err) = store.insert(&recipe).await {
        return internal_error("insert recipe", &err);
    }
    info!(recipe_id = %recipe.id, subject = %outcome.subject, "recipe created");
    (StatusCode::OK, Json(RecipeResponse::from(recipe))).into_response()
}

#[utoipa::path(
    get,
    path = "/recipes/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Recipes carrying the tag", body = [RecipeResponse]),
        (status = 400, description = "Missing tag", body = ErrorResponse)
    ),
    tag = "recipes"
)]
pub async fn search(
    store: Extension<Arc<dyn RecipeStore>>,
    params: Option<Query<SearchParams>>,
) -> impl IntoResponse {
    let Some(Query(params)) = params else {
        return bad_request("Missing tag");
    };
    match store.search_by_tag(&params.tag).await {
        Ok(recipes) => recipes_response(recipes),
        Err(err) => internal_error("search recipes", &err),
    }
}

#[utoipa::path(
    get,
    path = "/recipes/{id}",
    params(("id" = String, Path, description = "Recipe id")),
    responses(
        (status = 200, description = "The recipe", body = RecipeResponse),
        (status = 404, description = "No such recipe", body = ErrorResponse)
    ),
    tag = "recipes"
)]
pub async fn get_one(
    store: Extension<Arc<dyn RecipeStore>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match store.get(id).await {
        Ok(Some(recipe)) => (StatusCode::OK, Json(RecipeResponse::from(recipe))).into_response(),
        Ok(None) => not_found(),
        Err(err) => internal_error("fetch recipe", &err),
    }
}

#[utoipa::path(
    put,
    path = "/recipes/{id}",
    params(("id" = String, Path, description = "Recipe id")),
    request_body = RecipeRequest,
    responses(
        (status = 200, description = "Recipe has been updated", body = MessageResponse),
        (status = 404, description = "No such recipe", body = ErrorResponse)
    ),
    tag = "recipes"
)]
pub async fn update(
    store: Extension<Arc<dyn RecipeStore>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RecipeRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return bad_request("Invalid request body");
    };
    match store.update(id, &request.into()).await {
        Ok(true) => (
            StatusCode::OK,
            Json(MessageResponse::new("Recipe has been updated")),
        )
            .into_response(),
        Ok(false) => not_found(),
        Err(err) => internal_error("update recipe", &err),
    }
}

#[utoipa::path(
    delete,
    path = "/recipes/{id}",
    params(("id" = String, Path, description = "Recipe id")),
    responses(
        (status = 200, description = "Recipe has been deleted", body = MessageResponse),
        (status = 404, description = "No such recipe", body = ErrorResponse)
    ),
    tag = "recipes"
)]
pub async fn delete(
    store: Extension<Arc<dyn RecipeStore>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match store.delete(id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(MessageResponse::new("Recipe has been deleted")),
        )
            .into_response(),
        Ok(false) => not_found(),
        Err(err) => internal_error("delete recipe", &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn response_uses_camel_case_and_rfc3339() -> Result<(), serde_json::Error> {
        let recipe = Recipe {
            id: Uuid::nil(),
            name: "Pancakes".to_string(),
            tags: vec!["breakfast".to_string()],
            ingredients: vec!["flour".to_string()],
            instructions: vec!["mix".to_string()],
            published_at: datetime!(2024-03-01 08:30:00 UTC),
        };
        let value = serde_json::to_value(RecipeResponse::from(recipe))?;
        assert_eq!(value["publishedAt"], "2024-03-01T08:30:00Z");
        assert_eq!(value["id"], "00000000-0000-0000-0000-000000000000");
        assert!(value.get("published_at").is_none());
        Ok(())
    }

    #[test]
    fn request_defaults_missing_lists() -> Result<(), serde_json::Error> {
        let request: RecipeRequest = serde_json::from_str(r#"{"name":"Toast"}"#)?;
        let draft = RecipeDraft::from(request);
        assert_eq!(draft.name, "Toast");
        assert!(draft.tags.is_empty());
        Ok(())
    }
}
