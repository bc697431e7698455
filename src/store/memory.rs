//! In-process store for tests and local runs without a database.

use super::{
    Credential, CredentialStore, Ping, Recipe, RecipeDraft, RecipeStore, SessionRecord,
    SessionStore,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

struct StoredSession {
    record: SessionRecord,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl StoredSession {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    credentials: RwLock<HashMap<String, String>>,
    sessions: RwLock<HashMap<Vec<u8>, StoredSession>>,
    recipes: RwLock<Vec<Recipe>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_credential(&self, credential: Credential) {
        self.credentials
            .write()
            .await
            .insert(credential.username, credential.password_hash);
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_live(now))
            .count()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>> {
        Ok(self
            .credentials
            .read()
            .await
            .get(username)
            .map(|hash| Credential {
                username: username.to_string(),
                password_hash: hash.clone(),
            }))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        session_key: &[u8],
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        sessions.retain(|_, s| s.is_live(now));
        sessions.insert(
            session_key.to_vec(),
            StoredSession {
                record: record.clone(),
                expires_at: now.checked_add(ttl),
            },
        );
        Ok(())
    }

    async fn get_session(&self, session_key: &[u8]) -> Result<Option<SessionRecord>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_key)
            .filter(|s| s.is_live(Instant::now()))
            .map(|s| s.record.clone()))
    }

    async fn delete_session(&self, session_key: &[u8]) -> Result<()> {
        self.sessions.write().await.remove(session_key);
        Ok(())
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Recipe>> {
        let mut recipes = self.recipes.read().await.clone();
        recipes.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(recipes)
    }

    async fn search_by_tag(&self, tag: &str) -> Result<Vec<Recipe>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|r| r.tags.iter().any(|t| t == tag))
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Recipe>> {
        Ok(self.recipes.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn insert(&self, recipe: &Recipe) -> Result<()> {
        self.recipes.write().await.push(recipe.clone());
        Ok(())
    }

    async fn update(&self, id: Uuid, draft: &RecipeDraft) -> Result<bool> {
        let mut recipes = self.recipes.write().await;
        let Some(recipe) = recipes.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        recipe.name.clone_from(&draft.name);
        recipe.tags.clone_from(&draft.tags);
        recipe.ingredients.clone_from(&draft.ingredients);
        recipe.instructions.clone_from(&draft.instructions);
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut recipes = self.recipes.write().await;
        let before = recipes.len();
        recipes.retain(|r| r.id != id);
        Ok(recipes.len() != before)
    }
}

#[async_trait]
impl Ping for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SessionRecord {
        SessionRecord {
            username: "admin".to_string(),
            session_token: "01J0000000000000000000000".to_string(),
        }
    }

    #[tokio::test]
    async fn sessions_expire_and_delete() -> Result<()> {
        let store = MemoryStore::new();
        store
            .create_session(b"live", &record(), Duration::from_secs(60))
            .await?;
        store
            .create_session(b"stale", &record(), Duration::ZERO)
            .await?;

        assert_eq!(store.get_session(b"live").await?, Some(record()));
        assert_eq!(store.get_session(b"stale").await?, None);
        assert_eq!(store.session_count().await, 1);

        store.delete_session(b"live").await?;
        store.delete_session(b"live").await?;
        assert_eq!(store.get_session(b"live").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn unbounded_ttl_does_not_overflow() -> Result<()> {
        let store = MemoryStore::new();
        store
            .create_session(b"forever", &record(), Duration::MAX)
            .await?;
        assert_eq!(store.get_session(b"forever").await?, Some(record()));
        assert_eq!(store.session_count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn recipes_round_trip_through_crud() -> Result<()> {
        let store = MemoryStore::new();
        let recipe = Recipe::publish(RecipeDraft {
            name: "Oregano Marinated Chicken".to_string(),
            tags: vec!["main".to_string(), "chicken".to_string()],
            ..RecipeDraft::default()
        });
        store.insert(&recipe).await?;

        assert_eq!(store.search_by_tag("chicken").await?.len(), 1);
        assert!(store.search_by_tag("dessert").await?.is_empty());

        let draft = RecipeDraft {
            name: "Lemon Chicken".to_string(),
            ..RecipeDraft::default()
        };
        assert!(store.update(recipe.id, &draft).await?);
        assert!(!store.update(Uuid::now_v7(), &draft).await?);
        assert_eq!(
            store.get(recipe.id).await?.map(|r| r.name),
            Some("Lemon Chicken".to_string())
        );

        assert!(store.delete(recipe.id).await?);
        assert!(!store.delete(recipe.id).await?);
        assert!(store.list().await?.is_empty());
        Ok(())
    }
}
