//! Persistence seams for credentials, sessions and recipes.
//!
//! Handlers and the auth core only see these traits; the server wires the
//! PostgreSQL implementation and tests wire [`MemoryStore`].

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Stored credential. `password_hash` is a bcrypt hash, never a plaintext.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password_hash: String,
}

/// Server-side half of a cookie session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub username: String,
    pub session_token: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub published_at: OffsetDateTime,
}

/// Client-editable recipe fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecipeDraft {
    pub name: String,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
}

impl Recipe {
    #[must_use]
    pub fn publish(draft: RecipeDraft) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: draft.name,
            tags: draft.tags,
            ingredients: draft.ingredients,
            instructions: draft.instructions,
            published_at: OffsetDateTime::now_utc(),
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Exact-match lookup. `Ok(None)` when the user does not exist.
    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>>;
}

/// Sessions are keyed by the SHA-256 hash of the cookie value.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(
        &self,
        session_key: &[u8],
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<()>;

    /// `Ok(None)` for unknown or expired sessions.
    async fn get_session(&self, session_key: &[u8]) -> Result<Option<SessionRecord>>;

    /// Deleting a missing session is not an error.
    async fn delete_session(&self, session_key: &[u8]) -> Result<()>;
}

#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Recipe>>;
    async fn search_by_tag(&self, tag: &str) -> Result<Vec<Recipe>>;
    async fn get(&self, id: Uuid) -> Result<Option<Recipe>>;
    async fn insert(&self, recipe: &Recipe) -> Result<()>;
    /// Returns `false` when no recipe has this id.
    async fn update(&self, id: Uuid, draft: &RecipeDraft) -> Result<bool>;
    /// Returns `false` when no recipe has this id.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Liveness check used by `/health`.
#[async_trait]
pub trait Ping: Send + Sync {
    async fn ping(&self) -> Result<()>;
}
