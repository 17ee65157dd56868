//! In-memory active-task repository mock with call counters.

use crate::db::{ActiveTaskRepository, DbError};
use crate::user::ActiveTask;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory [`ActiveTaskRepository`] for tests.
///
/// Counts `mark_inactive` invocations so monitor tests can assert how
/// often the terminal transition was driven.
#[derive(Default)]
pub struct MockActiveTaskRepository {
    tasks: Arc<RwLock<Vec<ActiveTask>>>,
    mark_inactive_calls: AtomicUsize,
}

impl MockActiveTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `mark_inactive` calls observed so far.
    pub fn mark_inactive_calls(&self) -> usize {
        self.mark_inactive_calls.load(Ordering::SeqCst)
    }

    /// All recorded tasks, active or not.
    pub async fn recorded(&self) -> Vec<ActiveTask> {
        self.tasks.read().await.clone()
    }
}

#[async_trait]
impl ActiveTaskRepository for MockActiveTaskRepository {
    async fn record(&self, owner_id: i64, task_id: &str) -> Result<bool, DbError> {
        let mut tasks = self.tasks.write().await;
        if tasks.iter().any(|t| t.task_id == task_id) {
            return Ok(false);
        }
        tasks.push(ActiveTask {
            task_id: task_id.to_string(),
            owner_id,
            is_active: true,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn mark_inactive(&self, task_id: &str) -> Result<bool, DbError> {
        self.mark_inactive_calls.fetch_add(1, Ordering::SeqCst);
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.iter_mut().find(|t| t.task_id == task_id) {
            task.is_active = false;
        }
        Ok(true)
    }

    async fn list_active(&self, owner_id: i64) -> Result<Vec<ActiveTask>, DbError> {
        Ok(self
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| t.owner_id == owner_id && t.is_active)
            .cloned()
            .collect())
    }
}
