use super::handlers::{
    auth::{self, types},
    health, recipes,
};
use utoipa::{
    openapi::{Contact, License, OpenApi as OpenApiDoc},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::signin::signin,
        auth::refresh::refresh,
        auth::session::signout,
        recipes::list,
        recipes::create,
        recipes::search,
        recipes::get_one,
        recipes::update,
        recipes::delete,
    ),
    components(schemas(
        health::Health,
        types::SignInRequest,
        types::SignInResponse,
        types::TokenResponse,
        types::ErrorResponse,
        types::MessageResponse,
        recipes::RecipeRequest,
        recipes::RecipeResponse,
    )),
    tags(
        (name = "auth", description = "Sign-in, token refresh and sign-out"),
        (name = "recipes", description = "Recipe collection"),
        (name = "health", description = "Service health")
    )
)]
struct ApiDoc;

/// OpenAPI document with Cargo metadata filled in.
#[must_use]
pub fn openapi() -> OpenApiDoc {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    doc.info.contact = cargo_contact();
    doc.info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });
    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, rest)) => (
            optional_str(name.trim()),
            rest.strip_suffix('>').and_then(|email| optional_str(email.trim())),
        ),
        None => (optional_str(author), None),
    }
}

fn optional_str(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
