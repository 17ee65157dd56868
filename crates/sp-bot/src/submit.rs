//! Submission controller: raw chat input to a running remote task.
//!
//! The chat turn that triggers a submission returns as soon as the
//! monitor is spawned; nothing here blocks on the analysis itself.

use crate::chat::{ChatId, ChatMessenger};
use crate::extract::{extract_target, AnalysisTarget, ChatInput};
use crate::monitor::{MonitorConfig, MonitorContext, MonitorPool, StatusMonitor};
use crate::render::{escape_markdown, RenderConfig};
use sp_connectors::{SandboxApi, TaskId};
use sp_core::db::ActiveTaskRepository;
use sp_core::{AccessDecision, AccessGate, TextCatalog};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Orchestrates extract → authorize → submit → record → monitor for one
/// chat message.
pub struct SubmissionController {
    api: Arc<dyn SandboxApi>,
    tasks: Arc<dyn ActiveTaskRepository>,
    gate: Arc<AccessGate>,
    chat: Arc<dyn ChatMessenger>,
    texts: Arc<TextCatalog>,
    pool: Arc<MonitorPool>,
    render: RenderConfig,
    monitor_config: MonitorConfig,
}

impl SubmissionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn SandboxApi>,
        tasks: Arc<dyn ActiveTaskRepository>,
        gate: Arc<AccessGate>,
        chat: Arc<dyn ChatMessenger>,
        texts: Arc<TextCatalog>,
        pool: Arc<MonitorPool>,
        render: RenderConfig,
        monitor_config: MonitorConfig,
    ) -> Self {
        Self {
            api,
            tasks,
            gate,
            chat,
            texts,
            pool,
            render,
            monitor_config,
        }
    }

    /// Handles one submission event. Returns the task id when a monitor
    /// was launched; `None` when the flow ended earlier (no target,
    /// denied access, submission failure). Every early exit has already
    /// messaged the user.
    pub async fn handle(
        &self,
        chat: ChatId,
        owner_id: i64,
        lang: &str,
        input: ChatInput,
    ) -> Option<TaskId> {
        let Some(target) = extract_target(input) else {
            self.reply(chat, &self.texts.resolve(lang, "NO_ITEMS_TO_ANALYZE"))
                .await;
            return None;
        };

        let decision = match self.gate.check(owner_id).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(owner_id, error = %e, "access check failed");
                self.reply(chat, &self.texts.resolve(lang, "UNKNOWN_ERROR"))
                    .await;
                return None;
            }
        };
        let credential = match decision {
            AccessDecision::Granted(credential) => credential,
            AccessDecision::Denied(message) => {
                self.reply(chat, &message).await;
                return None;
            }
        };

        let submitted = match target {
            AnalysisTarget::Url { url } => {
                self.api.submit_url(&credential.key, &url, owner_id).await
            }
            AnalysisTarget::File { filename, bytes } => {
                self.api
                    .submit_file(&credential.key, bytes, &filename, owner_id)
                    .await
            }
        };
        let task_id = match submitted {
            Ok(task_id) => task_id,
            Err(e) => {
                error!(owner_id, error = %e, "submission failed");
                let text = self.texts.resolve_with(
                    lang,
                    "ANALYSIS_ERROR",
                    &[("error", escape_markdown(&e.to_string()).as_str())],
                );
                self.reply(chat, &text).await;
                return None;
            }
        };
        info!(owner_id, task_id = task_id.as_str(), "analysis submitted");

        // The remote job exists either way; a failed local record only
        // degrades history display.
        if let Err(e) = self.tasks.record(owner_id, task_id.as_str()).await {
            warn!(task_id = task_id.as_str(), error = %e, "failed to record active task");
        }

        let started = self.texts.resolve_with(
            lang,
            "ANALYSIS_STARTED",
            &[("task_id", escape_markdown(task_id.as_str()).as_str())],
        );
        let progress = match self.chat.send(chat, &started).await {
            Ok(message) => message,
            Err(e) => {
                // No way to show progress; the task id was never
                // delivered, so monitoring would talk to nobody.
                error!(task_id = task_id.as_str(), error = %e, "failed to send progress message");
                return None;
            }
        };

        let monitor = StatusMonitor::new(
            self.api.clone(),
            self.tasks.clone(),
            self.chat.clone(),
            self.texts.clone(),
            self.render.clone(),
            self.monitor_config.clone(),
        );
        let ctx = MonitorContext {
            chat,
            lang: lang.to_string(),
            key: credential.key.clone(),
            task_id: task_id.clone(),
            progress,
        };
        self.pool
            .spawn(task_id.as_str(), async move { monitor.run(ctx).await })
            .await;

        Some(task_id)
    }

    async fn reply(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.chat.send(chat, text).await {
            error!(error = %e, "failed to send reply");
        }
    }
}
