//! In-memory credential repository mock.

use crate::db::{CredentialRepository, DbError};
use crate::secret::Secret;
use crate::user::Credential;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory [`CredentialRepository`] for tests.
#[derive(Default)]
pub struct MockCredentialRepository {
    keys: Arc<RwLock<HashMap<i64, Vec<Credential>>>>,
}

impl MockCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor: one active key for one owner.
    pub async fn with_active_key(owner_id: i64, key: &str) -> Self {
        let repo = Self::new();
        repo.add(owner_id, &Secret::from(key), "test").await.unwrap();
        repo
    }
}

#[async_trait]
impl CredentialRepository for MockCredentialRepository {
    async fn add(&self, owner_id: i64, key: &Secret, name: &str) -> Result<(), DbError> {
        let mut keys = self.keys.write().await;
        let entry = keys.entry(owner_id).or_default();
        for existing in entry.iter_mut() {
            existing.is_active = false;
        }
        entry.push(Credential {
            key: key.clone(),
            owner_id,
            name: name.to_string(),
            is_active: true,
        });
        Ok(())
    }

    async fn get_active(&self, owner_id: i64) -> Result<Option<Credential>, DbError> {
        Ok(self
            .keys
            .read()
            .await
            .get(&owner_id)
            .and_then(|list| list.iter().find(|c| c.is_active).cloned()))
    }

    async fn list(&self, owner_id: i64) -> Result<Vec<Credential>, DbError> {
        Ok(self.keys.read().await.get(&owner_id).cloned().unwrap_or_default())
    }
}
