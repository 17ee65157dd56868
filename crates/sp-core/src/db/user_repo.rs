//! User repository.

use super::{DbError, DbPool};
use crate::user::UserAccount;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Repository trait for user persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Registers a user if not already known. Re-registration is a no-op.
    async fn register(&self, owner_id: i64) -> Result<(), DbError>;

    /// Gets a user by id.
    async fn get(&self, owner_id: i64) -> Result<Option<UserAccount>, DbError>;

    /// Updates the preferred language.
    async fn set_language(&self, owner_id: i64, lang: &str) -> Result<(), DbError>;

    /// Sets or clears the ban flag.
    async fn set_banned(&self, owner_id: i64, banned: bool) -> Result<(), DbError>;

    /// Sets or clears the soft-delete flag.
    async fn set_deleted(&self, owner_id: i64, deleted: bool) -> Result<(), DbError>;
}

/// SQLite implementation of [`UserRepository`].
pub struct SqliteUserRepository {
    pool: DbPool,
}

impl SqliteUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SqliteUserRow {
    owner_id: i64,
    lang: String,
    is_admin: i64,
    is_banned: i64,
    is_deleted: i64,
    first_seen: String,
}

impl TryFrom<SqliteUserRow> for UserAccount {
    type Error = DbError;

    fn try_from(row: SqliteUserRow) -> Result<Self, Self::Error> {
        let first_seen = DateTime::parse_from_rfc3339(&row.first_seen)
            .map_err(|e| DbError::Serialization(e.to_string()))?
            .with_timezone(&Utc);
        Ok(UserAccount {
            owner_id: row.owner_id,
            lang: row.lang,
            is_admin: row.is_admin != 0,
            is_banned: row.is_banned != 0,
            is_deleted: row.is_deleted != 0,
            first_seen,
        })
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn register(&self, owner_id: i64) -> Result<(), DbError> {
        sqlx::query("INSERT OR IGNORE INTO users (owner_id, first_seen) VALUES (?, ?)")
            .bind(owner_id)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, owner_id: i64) -> Result<Option<UserAccount>, DbError> {
        let row: Option<SqliteUserRow> = sqlx::query_as(
            "SELECT owner_id, lang, is_admin, is_banned, is_deleted, first_seen FROM users WHERE owner_id = ?",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn set_language(&self, owner_id: i64, lang: &str) -> Result<(), DbError> {
        sqlx::query("UPDATE users SET lang = ? WHERE owner_id = ?")
            .bind(lang)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_banned(&self, owner_id: i64, banned: bool) -> Result<(), DbError> {
        sqlx::query("UPDATE users SET is_banned = ? WHERE owner_id = ?")
            .bind(banned as i64)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_deleted(&self, owner_id: i64, deleted: bool) -> Result<(), DbError> {
        sqlx::query("UPDATE users SET is_deleted = ? WHERE owner_id = ?")
            .bind(deleted as i64)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Creates a SQLite-backed user repository.
pub fn create_user_repository(pool: DbPool) -> Arc<dyn UserRepository> {
    Arc::new(SqliteUserRepository::new(pool))
}
