//! In-memory user repository mock.

use crate::db::{DbError, UserRepository};
use crate::user::UserAccount;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory [`UserRepository`] for tests.
#[derive(Default)]
pub struct MockUserRepository {
    users: Arc<RwLock<HashMap<i64, UserAccount>>>,
}

impl MockUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully specified user, bypassing `register` defaults.
    pub async fn insert(&self, user: UserAccount) {
        self.users.write().await.insert(user.owner_id, user);
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn register(&self, owner_id: i64) -> Result<(), DbError> {
        self.users
            .write()
            .await
            .entry(owner_id)
            .or_insert_with(|| UserAccount {
                owner_id,
                lang: "en".to_string(),
                is_admin: false,
                is_banned: false,
                is_deleted: false,
                first_seen: Utc::now(),
            });
        Ok(())
    }

    async fn get(&self, owner_id: i64) -> Result<Option<UserAccount>, DbError> {
        Ok(self.users.read().await.get(&owner_id).cloned())
    }

    async fn set_language(&self, owner_id: i64, lang: &str) -> Result<(), DbError> {
        if let Some(user) = self.users.write().await.get_mut(&owner_id) {
            user.lang = lang.to_string();
        }
        Ok(())
    }

    async fn set_banned(&self, owner_id: i64, banned: bool) -> Result<(), DbError> {
        if let Some(user) = self.users.write().await.get_mut(&owner_id) {
            user.is_banned = banned;
        }
        Ok(())
    }

    async fn set_deleted(&self, owner_id: i64, deleted: bool) -> Result<(), DbError> {
        if let Some(user) = self.users.write().await.get_mut(&owner_id) {
            user.is_deleted = deleted;
        }
        Ok(())
    }
}
