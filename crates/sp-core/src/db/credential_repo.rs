//! Credential (API key) repository.

use super::{DbError, DbPool};
use crate::secret::Secret;
use crate::user::Credential;
use async_trait::async_trait;
use std::sync::Arc;

/// Repository trait for sandbox API keys.
///
/// The single-active-key invariant lives here: adding or activating a key
/// deactivates every other key the owner has.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Stores a new key as the owner's active credential.
    async fn add(&self, owner_id: i64, key: &Secret, name: &str) -> Result<(), DbError>;

    /// Returns the owner's active credential, if any.
    async fn get_active(&self, owner_id: i64) -> Result<Option<Credential>, DbError>;

    /// Lists all credentials for an owner.
    async fn list(&self, owner_id: i64) -> Result<Vec<Credential>, DbError>;
}

/// SQLite implementation of [`CredentialRepository`].
pub struct SqliteCredentialRepository {
    pool: DbPool,
}

impl SqliteCredentialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SqliteCredentialRow {
    owner_id: i64,
    api_key: String,
    name: String,
    is_active: i64,
}

impl From<SqliteCredentialRow> for Credential {
    fn from(row: SqliteCredentialRow) -> Self {
        Credential {
            key: Secret::new(row.api_key),
            owner_id: row.owner_id,
            name: row.name,
            is_active: row.is_active != 0,
        }
    }
}

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    async fn add(&self, owner_id: i64, key: &Secret, name: &str) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE api_keys SET is_active = 0 WHERE owner_id = ?")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO api_keys (owner_id, api_key, name, is_active) VALUES (?, ?, ?, 1)")
            .bind(owner_id)
            .bind(key.expose())
            .bind(name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_active(&self, owner_id: i64) -> Result<Option<Credential>, DbError> {
        let row: Option<SqliteCredentialRow> = sqlx::query_as(
            "SELECT owner_id, api_key, name, is_active FROM api_keys WHERE owner_id = ? AND is_active = 1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list(&self, owner_id: i64) -> Result<Vec<Credential>, DbError> {
        let rows: Vec<SqliteCredentialRow> = sqlx::query_as(
            "SELECT owner_id, api_key, name, is_active FROM api_keys WHERE owner_id = ? ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Creates a SQLite-backed credential repository.
pub fn create_credential_repository(pool: DbPool) -> Arc<dyn CredentialRepository> {
    Arc::new(SqliteCredentialRepository::new(pool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::create_memory_pool;

    async fn test_repo() -> SqliteCredentialRepository {
        SqliteCredentialRepository::new(create_memory_pool().await.unwrap())
    }

    #[tokio::test]
    async fn add_and_get_active() {
        let repo = test_repo().await;

        repo.add(1, &Secret::from("key-a"), "work").await.unwrap();
        let active = repo.get_active(1).await.unwrap().unwrap();
        assert_eq!(active.key.expose(), "key-a");
        assert_eq!(active.name, "work");
        assert!(active.is_active);
    }

    #[tokio::test]
    async fn adding_a_key_deactivates_siblings() {
        let repo = test_repo().await;

        repo.add(1, &Secret::from("key-a"), "first").await.unwrap();
        repo.add(1, &Secret::from("key-b"), "second").await.unwrap();

        let active = repo.get_active(1).await.unwrap().unwrap();
        assert_eq!(active.key.expose(), "key-b");

        let all = repo.list(1).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().filter(|c| c.is_active).count(), 1);
    }

    #[tokio::test]
    async fn owners_are_isolated() {
        let repo = test_repo().await;

        repo.add(1, &Secret::from("key-a"), "mine").await.unwrap();
        repo.add(2, &Secret::from("key-b"), "theirs").await.unwrap();

        assert_eq!(repo.get_active(1).await.unwrap().unwrap().key.expose(), "key-a");
        assert_eq!(repo.get_active(2).await.unwrap().unwrap().key.expose(), "key-b");
    }

    #[tokio::test]
    async fn no_key_is_none() {
        let repo = test_repo().await;
        assert!(repo.get_active(5).await.unwrap().is_none());
    }
}
