//! Active-task repository.
//!
//! Records in-flight sandbox tasks so a restart or a later lookup can
//! recall which submissions have not yet resolved.

use super::{DbError, DbPool};
use crate::user::ActiveTask;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::warn;

/// Repository trait for active-task bookkeeping.
#[async_trait]
pub trait ActiveTaskRepository: Send + Sync {
    /// Records a freshly submitted task as active.
    ///
    /// A duplicate task id is a store-level integrity problem, not a
    /// caller problem: it is logged and reported as `Ok(false)`.
    async fn record(&self, owner_id: i64, task_id: &str) -> Result<bool, DbError>;

    /// Marks a task inactive. Idempotent; marking an already-inactive or
    /// unknown task still succeeds.
    async fn mark_inactive(&self, task_id: &str) -> Result<bool, DbError>;

    /// Lists the tasks still marked active for an owner, newest first.
    async fn list_active(&self, owner_id: i64) -> Result<Vec<ActiveTask>, DbError>;
}

/// SQLite implementation of [`ActiveTaskRepository`].
pub struct SqliteActiveTaskRepository {
    pool: DbPool,
}

impl SqliteActiveTaskRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SqliteActiveTaskRow {
    task_id: String,
    owner_id: i64,
    is_active: i64,
    created_at: String,
}

impl TryFrom<SqliteActiveTaskRow> for ActiveTask {
    type Error = DbError;

    fn try_from(row: SqliteActiveTaskRow) -> Result<Self, Self::Error> {
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| DbError::Serialization(e.to_string()))?
            .with_timezone(&Utc);
        Ok(ActiveTask {
            task_id: row.task_id,
            owner_id: row.owner_id,
            is_active: row.is_active != 0,
            created_at,
        })
    }
}

#[async_trait]
impl ActiveTaskRepository for SqliteActiveTaskRepository {
    async fn record(&self, owner_id: i64, task_id: &str) -> Result<bool, DbError> {
        let result = sqlx::query(
            "INSERT INTO active_tasks (task_id, owner_id, is_active, created_at) VALUES (?, ?, 1, ?)",
        )
        .bind(task_id)
        .bind(owner_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => match DbError::from(e) {
                DbError::Constraint(detail) => {
                    warn!(task_id, detail = %detail, "duplicate active-task record ignored");
                    Ok(false)
                }
                other => Err(other),
            },
        }
    }

    async fn mark_inactive(&self, task_id: &str) -> Result<bool, DbError> {
        // Zero affected rows means the task was already inactive or never
        // recorded; both are fine.
        sqlx::query("UPDATE active_tasks SET is_active = 0 WHERE task_id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    async fn list_active(&self, owner_id: i64) -> Result<Vec<ActiveTask>, DbError> {
        let rows: Vec<SqliteActiveTaskRow> = sqlx::query_as(
            "SELECT task_id, owner_id, is_active, created_at FROM active_tasks \
             WHERE owner_id = ? AND is_active = 1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

/// Creates a SQLite-backed active-task repository.
pub fn create_active_task_repository(pool: DbPool) -> Arc<dyn ActiveTaskRepository> {
    Arc::new(SqliteActiveTaskRepository::new(pool))
}
