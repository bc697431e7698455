//! PostgreSQL implementation of the store traits.

use super::{
    Credential, CredentialStore, Ping, Recipe, RecipeDraft, RecipeStore, SessionRecord,
    SessionStore,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use std::time::Duration;
use tracing::{info_span, Instrument, Span};
use uuid::Uuid;

const SCHEMA_SQL: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/db/sql/01_recipes.sql"));
const SESSION_SCHEMA_SQL: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/db/sql/02_sessions.sql"));

fn db_span(operation: &'static str, statement: &'static str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the credential and recipe tables that do not exist yet.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .instrument(info_span!("db.schema", db.system = "postgresql", db.schema = "recipes"))
            .await
            .context("failed to apply schema")?;
        Ok(())
    }

    /// Create the session table. Safe on a database without `users`.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn ensure_session_schema(&self) -> Result<()> {
        sqlx::raw_sql(SESSION_SCHEMA_SQL)
            .execute(&self.pool)
            .instrument(info_span!("db.schema", db.system = "postgresql", db.schema = "sessions"))
            .await
            .context("failed to apply session schema")?;
        Ok(())
    }

    /// Insert or replace a credential; used by the `provision` command.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    pub async fn upsert_credential(&self, credential: &Credential) -> Result<()> {
        let query = r"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (username) DO UPDATE SET password_hash = EXCLUDED.password_hash
        ";
        sqlx::query(query)
            .bind(&credential.username)
            .bind(&credential.password_hash)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to upsert credential")?;
        Ok(())
    }
}

fn recipe_from_row(row: &PgRow) -> Result<Recipe> {
    Ok(Recipe {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        tags: row.try_get("tags")?,
        ingredients: row.try_get("ingredients")?,
        instructions: row.try_get("instructions")?,
        published_at: row.try_get("published_at")?,
    })
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>> {
        let query = "SELECT username, password_hash FROM users WHERE username = $1";
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup credential")?;

        row.map(|row| -> Result<Credential> {
            Ok(Credential {
                username: row.try_get("username")?,
                password_hash: row.try_get("password_hash")?,
            })
        })
        .transpose()
        .context("failed to decode credential")
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(
        &self,
        session_key: &[u8],
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<()> {
        let query = r"
            INSERT INTO sessions (session_hash, username, session_token, expires_at)
            VALUES ($1, $2, $3, now() + make_interval(secs => $4))
        ";
        sqlx::query(query)
            .bind(session_key)
            .bind(&record.username)
            .bind(&record.session_token)
            .bind(ttl.as_secs_f64())
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to create session")?;
        Ok(())
    }

    async fn get_session(&self, session_key: &[u8]) -> Result<Option<SessionRecord>> {
        let query = r"
            SELECT username, session_token
            FROM sessions
            WHERE session_hash = $1 AND expires_at > now()
        ";
        let row = sqlx::query(query)
            .bind(session_key)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup session")?;

        row.map(|row| -> Result<SessionRecord> {
            Ok(SessionRecord {
                username: row.try_get("username")?,
                session_token: row.try_get("session_token")?,
            })
        })
        .transpose()
        .context("failed to decode session")
    }

    async fn delete_session(&self, session_key: &[u8]) -> Result<()> {
        let query = "DELETE FROM sessions WHERE session_hash = $1 OR expires_at <= now()";
        sqlx::query(query)
            .bind(session_key)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete session")?;
        Ok(())
    }
}

#[async_trait]
impl RecipeStore for PgStore {
    async fn list(&self) -> Result<Vec<Recipe>> {
        let query = r"
            SELECT id, name, tags, ingredients, instructions, published_at
            FROM recipes
            ORDER BY published_at DESC
        ";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to list recipes")?;
        rows.iter()
            .map(recipe_from_row)
            .collect::<Result<Vec<_>>>()
            .context("failed to decode recipe")
    }

    async fn search_by_tag(&self, tag: &str) -> Result<Vec<Recipe>> {
        let query = r"
            SELECT id, name, tags, ingredients, instructions, published_at
            FROM recipes
            WHERE $1 = ANY(tags)
            ORDER BY published_at DESC
        ";
        let rows = sqlx::query(query)
            .bind(tag)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to search recipes")?;
        rows.iter()
            .map(recipe_from_row)
            .collect::<Result<Vec<_>>>()
            .context("failed to decode recipe")
    }

    async fn get(&self, id: Uuid) -> Result<Option<Recipe>> {
        let query = r"
            SELECT id, name, tags, ingredients, instructions, published_at
            FROM recipes
            WHERE id = $1
        ";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to fetch recipe")?;
        row.as_ref()
            .map(recipe_from_row)
            .transpose()
            .context("failed to decode recipe")
    }

    async fn insert(&self, recipe: &Recipe) -> Result<()> {
        let query = r"
            INSERT INTO recipes (id, name, tags, ingredients, instructions, published_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        sqlx::query(query)
            .bind(recipe.id)
            .bind(&recipe.name)
            .bind(&recipe.tags)
            .bind(&recipe.ingredients)
            .bind(&recipe.instructions)
            .bind(recipe.published_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to insert recipe")?;
        Ok(())
    }

    async fn update(&self, id: Uuid, draft: &RecipeDraft) -> Result<bool> {
        let query = r"
            UPDATE recipes
            SET name = $2, tags = $3, ingredients = $4, instructions = $5
            WHERE id = $1
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(&draft.name)
            .bind(&draft.tags)
            .bind(&draft.ingredients)
            .bind(&draft.instructions)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to update recipe")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let query = "DELETE FROM recipes WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete recipe")?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Ping for PgStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await
            .context("failed to acquire database connection")?;
        conn.ping()
            .instrument(info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await
            .context("failed to ping database")?;
        Ok(())
    }
}
