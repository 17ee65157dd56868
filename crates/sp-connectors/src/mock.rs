//! Scripted mock sandbox connector for tests.

use crate::traits::{ConnectorError, ConnectorResult, SandboxApi};
use crate::types::{
    AnalysisState, ApiLimits, HistoryEntry, MainObject, ObjectKind, Report, TaskId, Verdict,
};
use async_trait::async_trait;
use sp_core::Secret;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// What was submitted to the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmittedTarget {
    Url(String),
    File { filename: String, size: usize },
}

/// Mock sandbox connector with scripted status sequences.
///
/// `get_status` pops the front of the task's script; once the script is
/// exhausted it keeps returning the configured steady state (default
/// `Running`), which lets timeout tests poll forever.
pub struct MockSandboxConnector {
    submissions: Arc<RwLock<Vec<SubmittedTarget>>>,
    scripts: Arc<RwLock<HashMap<String, VecDeque<ConnectorResult<AnalysisState>>>>>,
    steady_state: Arc<RwLock<ConnectorResult<AnalysisState>>>,
    reports: Arc<RwLock<HashMap<String, ConnectorResult<Report>>>>,
    next_task_id: Arc<RwLock<Option<String>>>,
    submit_error: Arc<RwLock<Option<ConnectorError>>>,
    submission_counter: AtomicUsize,
    status_calls: AtomicUsize,
    report_calls: AtomicUsize,
}

impl Default for MockSandboxConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSandboxConnector {
    pub fn new() -> Self {
        Self {
            submissions: Arc::new(RwLock::new(Vec::new())),
            scripts: Arc::new(RwLock::new(HashMap::new())),
            steady_state: Arc::new(RwLock::new(Ok(AnalysisState::Running))),
            reports: Arc::new(RwLock::new(HashMap::new())),
            next_task_id: Arc::new(RwLock::new(None)),
            submit_error: Arc::new(RwLock::new(None)),
            submission_counter: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            report_calls: AtomicUsize::new(0),
        }
    }

    /// Forces the next submission to return this task id.
    pub async fn set_next_task_id(&self, task_id: &str) {
        *self.next_task_id.write().await = Some(task_id.to_string());
    }

    /// Makes every submission fail with the given error.
    pub async fn fail_submissions(&self, error: ConnectorError) {
        *self.submit_error.write().await = Some(error);
    }

    /// Scripts the status sequence for a task id.
    pub async fn script_statuses(
        &self,
        task_id: &str,
        statuses: impl IntoIterator<Item = ConnectorResult<AnalysisState>>,
    ) {
        self.scripts
            .write()
            .await
            .insert(task_id.to_string(), statuses.into_iter().collect());
    }

    /// Sets the state returned once a script is exhausted (or when no
    /// script exists). Defaults to `Running`.
    pub async fn set_steady_state(&self, state: ConnectorResult<AnalysisState>) {
        *self.steady_state.write().await = state;
    }

    /// Preloads the report returned for a task id.
    pub async fn add_report(&self, task_id: &str, report: ConnectorResult<Report>) {
        self.reports.write().await.insert(task_id.to_string(), report);
    }

    pub async fn submissions(&self) -> Vec<SubmittedTarget> {
        self.submissions.read().await.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submission_counter.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn report_calls(&self) -> usize {
        self.report_calls.load(Ordering::SeqCst)
    }

    /// A minimal completed report for a task id.
    pub fn sample_report(task_id: &str) -> Report {
        Report {
            uuid: task_id.to_string(),
            verdict: Verdict::NoThreats,
            main_object: MainObject {
                kind: ObjectKind::Url,
                name: Some("https://example.com".to_string()),
                download_url: None,
            },
            created_at: None,
            tags: vec!["mock".to_string()],
            video_url: None,
            screenshot_urls: Vec::new(),
            has_network_capture: false,
        }
    }

    async fn submit(&self, target: SubmittedTarget) -> ConnectorResult<TaskId> {
        if let Some(error) = self.submit_error.read().await.clone() {
            return Err(error);
        }

        let seq = self.submission_counter.fetch_add(1, Ordering::SeqCst);
        self.submissions.write().await.push(target);

        let id = match self.next_task_id.write().await.take() {
            Some(id) => id,
            None => format!("mock-task-{}", seq),
        };
        Ok(TaskId(id))
    }
}

#[async_trait]
impl SandboxApi for MockSandboxConnector {
    async fn submit_url(
        &self,
        _key: &Secret,
        url: &str,
        _owner_id: i64,
    ) -> ConnectorResult<TaskId> {
        self.submit(SubmittedTarget::Url(url.to_string())).await
    }

    async fn submit_file(
        &self,
        _key: &Secret,
        bytes: Vec<u8>,
        filename: &str,
        _owner_id: i64,
    ) -> ConnectorResult<TaskId> {
        self.submit(SubmittedTarget::File {
            filename: filename.to_string(),
            size: bytes.len(),
        })
        .await
    }

    async fn get_status(&self, _key: &Secret, task_id: &TaskId) -> ConnectorResult<AnalysisState> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(script) = self.scripts.write().await.get_mut(task_id.as_str()) {
            if let Some(next) = script.pop_front() {
                return next;
            }
        }
        self.steady_state.read().await.clone()
    }

    async fn get_report(&self, _key: &Secret, task_id: &TaskId) -> ConnectorResult<Report> {
        self.report_calls.fetch_add(1, Ordering::SeqCst);

        match self.reports.read().await.get(task_id.as_str()) {
            Some(result) => result.clone(),
            None => Err(ConnectorError::NotFound(format!(
                "Report not found: {}",
                task_id
            ))),
        }
    }

    async fn get_history(
        &self,
        _key: &Secret,
        _limit: u32,
        _skip: u32,
    ) -> ConnectorResult<Vec<HistoryEntry>> {
        Ok(Vec::new())
    }

    async fn get_limits(&self, _key: &Secret) -> ConnectorResult<ApiLimits> {
        Ok(ApiLimits {
            month: -1,
            day: 100,
            hour: 10,
            minute: -1,
        })
    }
}
