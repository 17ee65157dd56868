//! Status monitoring: the bounded polling loop that turns "submitted"
//! into a rendered terminal outcome.
//!
//! One monitor instance runs per submitted task, spawned fire-and-forget
//! on the [`MonitorPool`]. Monitors share nothing mutable with each
//! other; the task store and sandbox client are the only common
//! collaborators and both tolerate concurrent use.

use crate::chat::{ChatId, ChatMessenger, MessageRef};
use crate::render::{self, escape_markdown, RenderConfig};
use sp_connectors::{AnalysisState, SandboxApi, TaskId};
use sp_core::db::ActiveTaskRepository;
use sp_core::{Secret, TextCatalog};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Polling policy. The defaults bound a monitor to roughly five minutes
/// of wall clock; tests shrink the interval to zero.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Maximum status polls before giving up.
    pub max_attempts: u32,
    /// Sleep between polls.
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Everything one monitor run needs to know about its task.
pub struct MonitorContext {
    pub chat: ChatId,
    pub lang: String,
    pub key: Secret,
    pub task_id: TaskId,
    /// The progress message the controller already sent; edited in
    /// place, never replaced.
    pub progress: MessageRef,
}

/// Bounded polling loop for one submitted task.
pub struct StatusMonitor {
    api: Arc<dyn SandboxApi>,
    tasks: Arc<dyn ActiveTaskRepository>,
    chat: Arc<dyn ChatMessenger>,
    texts: Arc<TextCatalog>,
    render: RenderConfig,
    config: MonitorConfig,
}

impl StatusMonitor {
    pub fn new(
        api: Arc<dyn SandboxApi>,
        tasks: Arc<dyn ActiveTaskRepository>,
        chat: Arc<dyn ChatMessenger>,
        texts: Arc<TextCatalog>,
        render: RenderConfig,
        config: MonitorConfig,
    ) -> Self {
        Self {
            api,
            tasks,
            chat,
            texts,
            render,
            config,
        }
    }

    /// Runs the loop to a terminal outcome. Never panics and never
    /// returns an error; every failure path ends in a user-visible
    /// message and a log line.
    pub async fn run(self, ctx: MonitorContext) {
        let task_id = ctx.task_id.as_str().to_string();
        let mut last_text: Option<String> = None;

        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.config.poll_interval).await;
            }

            let state = match self.api.get_status(&ctx.key, &ctx.task_id).await {
                Ok(state) => state,
                Err(e) => {
                    error!(task_id = %task_id, error = %e, "status check failed");
                    let text = self.texts.resolve(&ctx.lang, "STATUS_CHECK_ERROR");
                    self.update_progress(&ctx, &text, &mut last_text).await;
                    return;
                }
            };
            debug!(task_id = %task_id, ?state, attempt, "status poll");

            match state {
                AnalysisState::Completed => {
                    self.finish_completed(&ctx, &mut last_text).await;
                    return;
                }
                AnalysisState::Failed => {
                    info!(task_id = %task_id, "analysis failed on the sandbox side");
                    self.mark_inactive(&task_id).await;
                    let text = self.texts.resolve(&ctx.lang, "ANALYSIS_FAILED");
                    self.update_progress(&ctx, &text, &mut last_text).await;
                    return;
                }
                AnalysisState::Running | AnalysisState::Unknown => {
                    let key = match state {
                        AnalysisState::Unknown => "ANALYSIS_STATUS_UNKNOWN",
                        _ => "ANALYSIS_STATUS_RUNNING",
                    };
                    let text = self.texts.resolve(&ctx.lang, key);
                    self.update_progress(&ctx, &text, &mut last_text).await;
                }
            }
        }

        // Attempt budget exhausted. The task stays active: the remote
        // job may still finish, and a later lookup by task id can
        // reconcile.
        info!(task_id = %task_id, attempts = self.config.max_attempts, "monitor timed out");
        let text = self.texts.resolve_with(
            &ctx.lang,
            "ANALYSIS_TIMEOUT",
            &[("task_id", escape_markdown(&task_id).as_str())],
        );
        self.update_progress(&ctx, &text, &mut last_text).await;
    }

    async fn finish_completed(&self, ctx: &MonitorContext, last_text: &mut Option<String>) {
        let task_id = ctx.task_id.as_str();
        info!(task_id, "analysis completed");
        self.mark_inactive(task_id).await;

        let text = self.texts.resolve(&ctx.lang, "ANALYSIS_STATUS_COMPLETED");
        self.update_progress(ctx, &text, last_text).await;

        match self.api.get_report(&ctx.key, &ctx.task_id).await {
            Ok(report) => {
                let (text, actions) =
                    render::format_report(&report, &self.render, &self.texts, &ctx.lang);
                if let Err(e) = self
                    .chat
                    .send_with_actions(ctx.chat, &text, &actions)
                    .await
                {
                    error!(task_id, error = %e, "failed to deliver report");
                }
            }
            Err(e) => {
                // The task is already inactive; only the rendering is lost.
                error!(task_id, error = %e, "report fetch failed");
                let text = self.texts.resolve(&ctx.lang, "REPORT_ERROR");
                if let Err(e) = self.chat.send(ctx.chat, &text).await {
                    error!(task_id, error = %e, "failed to deliver report-error notice");
                }
            }
        }
    }

    async fn mark_inactive(&self, task_id: &str) {
        if let Err(e) = self.tasks.mark_inactive(task_id).await {
            warn!(task_id, error = %e, "failed to mark task inactive");
        }
    }

    /// Edits the progress message, suppressing no-op edits. An edit
    /// failure is logged and swallowed; it never stops the monitor.
    async fn update_progress(
        &self,
        ctx: &MonitorContext,
        text: &str,
        last_text: &mut Option<String>,
    ) {
        if last_text.as_deref() == Some(text) {
            return;
        }
        if let Err(e) = self.chat.edit(ctx.chat, &ctx.progress, text).await {
            warn!(task_id = ctx.task_id.as_str(), error = %e, "progress edit failed");
        }
        *last_text = Some(text.to_string());
    }
}

/// Registry of running monitors, keyed by task id.
///
/// Submissions are fire-and-forget from the chat turn's point of view,
/// but the process still owns the handles: shutdown aborts them
/// explicitly instead of letting the runtime drop them silently, and the
/// CLI awaits them before exiting.
#[derive(Default)]
pub struct MonitorPool {
    handles: tokio::sync::Mutex<HashMap<String, JoinHandle<()>>>,
}

impl MonitorPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a monitor future under the given task id. A second spawn
    /// for the same id replaces (and aborts) the first; task ids are
    /// unique per the remote contract, so this only defends against a
    /// duplicated submission event.
    pub async fn spawn<F>(&self, task_id: &str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut handles = self.handles.lock().await;
        handles.retain(|_, handle| !handle.is_finished());
        if let Some(previous) = handles.insert(task_id.to_string(), tokio::spawn(fut)) {
            previous.abort();
        }
    }

    /// Number of monitors still running.
    pub async fn active_count(&self) -> usize {
        let mut handles = self.handles.lock().await;
        handles.retain(|_, handle| !handle.is_finished());
        handles.len()
    }

    /// Awaits every outstanding monitor to completion.
    pub async fn wait_all(&self) {
        let drained: Vec<(String, JoinHandle<()>)> = {
            let mut handles = self.handles.lock().await;
            handles.drain().collect()
        };
        for (task_id, handle) in drained {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!(task_id = %task_id, error = %e, "monitor task panicked");
                }
            }
        }
    }

    /// Aborts every outstanding monitor. Used on process shutdown.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, JoinHandle<()>)> = {
            let mut handles = self.handles.lock().await;
            handles.drain().collect()
        };
        for (task_id, handle) in drained {
            debug!(task_id = %task_id, "aborting monitor");
            handle.abort();
        }
    }
}
